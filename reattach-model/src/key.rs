//! Primary-key values.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An opaque, equality-comparable primary-key value.
///
/// Identity matching is value-based: two keys identify the same row
/// exactly when they compare equal, never because they are the same
/// instance. Composite keys compare element-wise in declaration order,
/// which gives them a stable combined comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    /// No key value at all (a freshly constructed entity).
    Absent,
    Int(i64),
    Uuid(Uuid),
    Text(String),
    Composite(Vec<EntityKey>),
}

impl EntityKey {
    /// Whether this key can identify a stored row.
    ///
    /// `Absent` never can. `Int(0)`, the nil UUID and the empty string
    /// are unsaved defaults and count as invalid too. A composite key is
    /// valid only when it is non-empty and every part is valid.
    pub fn is_valid(&self) -> bool {
        match self {
            EntityKey::Absent => false,
            EntityKey::Int(value) => *value != 0,
            EntityKey::Uuid(value) => !value.is_nil(),
            EntityKey::Text(value) => !value.is_empty(),
            EntityKey::Composite(parts) => {
                !parts.is_empty() && parts.iter().all(EntityKey::is_valid)
            }
        }
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        EntityKey::Absent
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Absent => write!(f, "?"),
            EntityKey::Int(value) => write!(f, "{value}"),
            EntityKey::Uuid(value) => write!(f, "{value}"),
            EntityKey::Text(value) => write!(f, "{value}"),
            EntityKey::Composite(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        EntityKey::Int(value)
    }
}

impl From<Uuid> for EntityKey {
    fn from(value: Uuid) -> Self {
        EntityKey::Uuid(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        EntityKey::Text(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        EntityKey::Text(value)
    }
}
