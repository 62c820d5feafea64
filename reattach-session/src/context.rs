//! The live persistence context interface.
//!
//! The engine assumes an external context capable of tracking object
//! identity, per-property change detection and commit execution; this
//! module is the narrow seam it is consumed through. The context and its
//! connection are exclusively owned by the [`crate::ContextManager`] —
//! no other component disposes or reassigns them.

use reattach_model::{EntityKey, EntityRecord, EntityState, EntityType};
use serde_json::Value;
use thiserror::Error;

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors reported by a live context implementation.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context could not be constructed from the descriptor.
    #[error("context construction failed: {0}")]
    Construction(String),

    /// The factory does not support the requested construction shape.
    #[error("unsupported construction shape: {0}")]
    UnsupportedShape(String),

    /// The entity is not known to this context.
    #[error("entity not tracked: {0}")]
    UnknownEntity(String),

    /// Backend (database) failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Payload (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection details handed to a context factory.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub connection_string: String,
    pub timeout_secs: u32,
    pub lazy_loading: bool,
    /// Combined schema-resource locator, present only when the backend
    /// requires external schema resources.
    pub metadata_locator: Option<String>,
}

/// A tracked entry as reported by the live context: the managed current
/// values, the original (as-loaded) values, and the tracked state.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub record: EntityRecord,
    pub original: Value,
    pub state: EntityState,
}

/// A store-assigned key for an entry committed as an insert.
#[derive(Debug, Clone)]
pub struct KeyAssignment {
    pub entity_type: EntityType,
    pub previous: EntityKey,
    pub assigned: EntityKey,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub rows_affected: u64,
    pub assignments: Vec<KeyAssignment>,
}

/// The external persistence/change-tracking session.
///
/// All identity arguments are `(runtime type, key)` pairs with value
/// equality; implementations must never rely on instance identity.
pub trait LiveContext {
    fn context_name(&self) -> &str;

    /// Structural compatibility probe: whether this context can manage
    /// the given entity type.
    fn supports(&self, entity_type: &EntityType) -> bool;

    fn set_lazy_loading(&mut self, enabled: bool);
    fn lazy_loading(&self) -> bool;

    /// Whether the context detects property changes on its own. When
    /// false, the engine forces [`LiveContext::detect_changes`] before
    /// commit.
    fn auto_detect_changes(&self) -> bool;
    fn detect_changes(&mut self);
    fn has_changes(&self) -> bool;

    /// Tracked state of the identity, `Detached` when unknown.
    fn entry_state(&self, entity_type: &EntityType, key: &EntityKey) -> EntityState;

    /// Snapshot of all currently tracked entries.
    fn tracked(&self) -> Vec<ContextEntry>;

    /// Puts the record's identity into the given state, attaching it
    /// first when unknown.
    fn apply_state(&mut self, record: &EntityRecord, state: EntityState) -> ContextResult<()>;

    /// Merges the candidate's current values into the already-managed
    /// instance (a merge, not a replace — the managed object survives so
    /// relationships and proxies stay valid). Returns the managed
    /// snapshot after the merge.
    fn update_values(&mut self, record: &EntityRecord) -> ContextResult<EntityRecord>;

    /// Loads an entity by key, attaching it as `Unchanged`.
    fn find(
        &mut self,
        entity_type: &EntityType,
        key: &EntityKey,
    ) -> ContextResult<Option<EntityRecord>>;

    /// Client-wins refresh: reloads original values from the store while
    /// keeping pending client edits.
    fn refresh(&mut self, record: &mut EntityRecord) -> ContextResult<()>;

    /// Ordered `(name, value)` pairs of the entry's original values,
    /// restricted to modified properties unless `all_properties`.
    fn original_values(
        &self,
        entity_type: &EntityType,
        key: &EntityKey,
        all_properties: bool,
    ) -> ContextResult<Vec<(String, Value)>>;

    /// Executes the pending work in one commit.
    fn commit(&mut self) -> ContextResult<CommitReceipt>;

    /// Primary-key column names for the entity type.
    fn key_fields(&self, entity_type: &EntityType) -> Vec<String>;

    /// Most recent backend statement, for diagnostics.
    fn last_statement(&self) -> Option<String> {
        None
    }
}

impl std::fmt::Debug for dyn LiveContext + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveContext")
            .field("context_name", &self.context_name())
            .finish_non_exhaustive()
    }
}

/// Constructs a live context from a connection descriptor.
pub type ContextFactory = Box<dyn Fn(&ConnectionDescriptor) -> ContextResult<Box<dyn LiveContext>>>;
