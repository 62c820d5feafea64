//! The tracking ledger and its entries.

use crate::{LedgerError, LedgerResult};
use reattach_model::{EntityIdentity, EntityKey, EntityRecord, EntityState, SchemaSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One tracked entity: the detached snapshot, the state it should reach
/// in the database, and whether it is the session's main entity.
///
/// The snapshot holds current values — or original values when the state
/// is [`EntityState::Deleted`], since a delete is issued against what the
/// row looked like, not against edits that will never be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub record: EntityRecord,
    pub state: EntityState,
    pub is_main: bool,
}

impl TrackedEntry {
    pub fn identity(&self) -> EntityIdentity {
        self.record.identity()
    }
}

/// Ordered, serialization-safe store of tracked entities.
///
/// Invariant: at most one entry per distinct `(base type, key)` identity
/// — re-marking an identity overwrites its snapshot and state rather than
/// appending — and at most one entry carries the main flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingLedger {
    entries: Vec<TrackedEntry>,
}

impl TrackingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts an entry by identity.
    ///
    /// Marking with `is_main = true` clears the flag from every other
    /// entry first: the main entity is replaced on set, never accumulated.
    pub fn mark_entity(&mut self, record: EntityRecord, state: EntityState, is_main: bool) {
        if is_main {
            for entry in &mut self.entries {
                entry.is_main = false;
            }
        }

        let identity = record.identity();
        match self.position(&identity) {
            Some(index) => {
                debug!(entity = %record, %state, "re-marking tracked entity");
                let entry = &mut self.entries[index];
                entry.record = record;
                entry.state = state;
                entry.is_main = is_main;
            }
            None => {
                debug!(entity = %record, %state, is_main, "tracking entity");
                self.entries.push(TrackedEntry {
                    record,
                    state,
                    is_main,
                });
            }
        }
    }

    /// The ordered live view of all entries.
    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    /// The single entry flagged as the main entity.
    pub fn main_entity(&self) -> LedgerResult<&TrackedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.is_main)
            .ok_or(LedgerError::NoMainEntity)
    }

    /// Entries that represent pending database work.
    pub fn changed_entries(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.iter().filter(|entry| entry.state.is_dirty())
    }

    /// Drops declared related-collection fields whose snapshot value is an
    /// empty array. Reattaching a snapshot with an empty collection would
    /// otherwise tell the context to clear related rows that were simply
    /// never loaded.
    pub fn unload_empty_collections(&mut self, schemas: &SchemaSet) {
        for entry in &mut self.entries {
            let Some(descriptor) = schemas.get(&entry.record.entity_type) else {
                continue;
            };
            let entity_display = entry.record.to_string();
            let Some(object) = entry.record.data.as_object_mut() else {
                continue;
            };
            for field in &descriptor.collection_fields {
                if matches!(object.get(field), Some(Value::Array(items)) if items.is_empty()) {
                    debug!(entity = %entity_display, field, "unloading empty collection");
                    object.remove(field);
                }
            }
        }
    }

    /// Rebinds a store-assigned key onto the entry tracked under the old
    /// identity, mirroring the key into the snapshot payload.
    pub fn rebind_key(&mut self, identity: &EntityIdentity, key: EntityKey, key_fields: &[String]) {
        if let Some(index) = self.position(identity) {
            self.entries[index].record.apply_key(key, key_fields);
        }
    }

    /// Settles the ledger after a successful commit: deleted entries are
    /// gone from the database and leave the ledger, everything else is
    /// now unchanged.
    pub fn settle_after_commit(&mut self) {
        self.entries
            .retain(|entry| entry.state != EntityState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntityState::Unchanged;
        }
    }

    /// Clears all entries.
    pub fn clean(&mut self) {
        if !self.entries.is_empty() {
            debug!(count = self.entries.len(), "cleaning tracking ledger");
        }
        self.entries.clear();
    }

    pub fn has_entities(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, identity: &EntityIdentity) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.identity() == *identity)
    }
}
