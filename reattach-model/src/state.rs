//! Persistence states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state a live context holds (or will hold) an entity in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Tracked, no pending changes.
    Unchanged,
    /// Insert candidate.
    Added,
    /// Tracked with pending property changes.
    Modified,
    /// Delete candidate.
    Deleted,
    /// Not associated with any change tracker.
    Detached,
}

impl EntityState {
    /// Whether the state represents pending database work.
    pub fn is_dirty(self) -> bool {
        !matches!(self, EntityState::Unchanged | EntityState::Detached)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Unchanged => "unchanged",
            EntityState::Added => "added",
            EntityState::Modified => "modified",
            EntityState::Deleted => "deleted",
            EntityState::Detached => "detached",
        };
        f.write_str(name)
    }
}
