//! In-memory reference implementation of [`LiveContext`].
//!
//! Backs the crate's test suite and embedded/local use: committed rows
//! live in a map keyed by identity, tracked entries carry original and
//! current values for per-property change detection, and commit assigns
//! integer keys to insert candidates without a valid key.

use crate::context::{
    CommitReceipt, ContextEntry, ContextError, ContextResult, KeyAssignment, LiveContext,
};
use reattach_model::{EntityKey, EntityRecord, EntityState, EntityType, SchemaSet};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

struct MemoryEntry {
    record: EntityRecord,
    original: Value,
    state: EntityState,
}

/// An in-memory persistence context.
pub struct MemoryContext {
    name: String,
    schemas: SchemaSet,
    committed: HashMap<(String, EntityKey), Value>,
    entries: Vec<MemoryEntry>,
    next_id: i64,
    lazy_loading: bool,
    auto_detect: bool,
    last_statement: Option<String>,
}

impl MemoryContext {
    /// A context able to manage exactly the types in `schemas`.
    pub fn new(name: impl Into<String>, schemas: SchemaSet) -> Self {
        Self {
            name: name.into(),
            schemas,
            committed: HashMap::new(),
            entries: Vec::new(),
            next_id: 1,
            lazy_loading: true,
            auto_detect: false,
            last_statement: None,
        }
    }

    pub fn with_auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect = enabled;
        self
    }

    /// Writes a row directly into the committed store (test seeding).
    pub fn seed(&mut self, record: EntityRecord) {
        self.committed.insert(
            (record.entity_type.base_name().to_string(), record.key),
            record.data,
        );
    }

    /// The committed row for an identity, if any.
    pub fn committed_row(&self, entity_type: &EntityType, key: &EntityKey) -> Option<&Value> {
        self.committed
            .get(&(entity_type.base_name().to_string(), key.clone()))
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    fn identity_of(record: &EntityRecord) -> (String, EntityKey) {
        (
            record.entity_type.base_name().to_string(),
            record.key.clone(),
        )
    }

    fn position(&self, entity_type: &EntityType, key: &EntityKey) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry.record.entity_type.base_name() == entity_type.base_name()
                && entry.record.key == *key
        })
    }

    fn assign_key(&mut self, index: usize) -> Option<KeyAssignment> {
        let entry = &self.entries[index];
        if entry.record.key.is_valid() {
            return None;
        }

        let assigned = EntityKey::Int(self.next_id);
        self.next_id += 1;

        let key_fields = self
            .schemas
            .get(&entry.record.entity_type)
            .map(|d| d.key_fields.clone())
            .unwrap_or_else(|| vec!["id".to_string()]);

        let entry = &mut self.entries[index];
        let previous = entry.record.key.clone();
        entry.record.apply_key(assigned.clone(), &key_fields);

        Some(KeyAssignment {
            entity_type: entry.record.entity_type.clone(),
            previous,
            assigned,
        })
    }
}

impl LiveContext for MemoryContext {
    fn context_name(&self) -> &str {
        &self.name
    }

    fn supports(&self, entity_type: &EntityType) -> bool {
        self.schemas.contains(entity_type)
    }

    fn set_lazy_loading(&mut self, enabled: bool) {
        self.lazy_loading = enabled;
    }

    fn lazy_loading(&self) -> bool {
        self.lazy_loading
    }

    fn auto_detect_changes(&self) -> bool {
        self.auto_detect
    }

    fn detect_changes(&mut self) {
        for entry in &mut self.entries {
            if entry.state == EntityState::Unchanged && entry.record.data != entry.original {
                debug!(entity = %entry.record, "detected property changes");
                entry.state = EntityState::Modified;
            }
        }
    }

    fn has_changes(&self) -> bool {
        self.entries.iter().any(|entry| entry.state.is_dirty())
    }

    fn entry_state(&self, entity_type: &EntityType, key: &EntityKey) -> EntityState {
        self.position(entity_type, key)
            .map(|index| self.entries[index].state)
            .unwrap_or(EntityState::Detached)
    }

    fn tracked(&self) -> Vec<ContextEntry> {
        self.entries
            .iter()
            .map(|entry| ContextEntry {
                record: entry.record.clone(),
                original: entry.original.clone(),
                state: entry.state,
            })
            .collect()
    }

    fn apply_state(&mut self, record: &EntityRecord, state: EntityState) -> ContextResult<()> {
        match self.position(&record.entity_type, &record.key) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.record = record.clone();
                entry.state = state;
            }
            None => {
                let original = self
                    .committed
                    .get(&Self::identity_of(record))
                    .cloned()
                    .unwrap_or_else(|| record.data.clone());
                self.entries.push(MemoryEntry {
                    record: record.clone(),
                    original,
                    state,
                });
            }
        }
        Ok(())
    }

    fn update_values(&mut self, record: &EntityRecord) -> ContextResult<EntityRecord> {
        let index = self
            .position(&record.entity_type, &record.key)
            .ok_or_else(|| ContextError::UnknownEntity(record.to_string()))?;

        let auto_detect = self.auto_detect;
        let entry = &mut self.entries[index];
        if let (Some(target), Some(source)) =
            (entry.record.data.as_object_mut(), record.data.as_object())
        {
            for (field, value) in source {
                target.insert(field.clone(), value.clone());
            }
        } else {
            entry.record.data = record.data.clone();
        }

        if auto_detect
            && entry.state == EntityState::Unchanged
            && entry.record.data != entry.original
        {
            entry.state = EntityState::Modified;
        }

        Ok(entry.record.clone())
    }

    fn find(
        &mut self,
        entity_type: &EntityType,
        key: &EntityKey,
    ) -> ContextResult<Option<EntityRecord>> {
        if let Some(index) = self.position(entity_type, key) {
            return Ok(Some(self.entries[index].record.clone()));
        }

        let identity = (entity_type.base_name().to_string(), key.clone());
        let Some(data) = self.committed.get(&identity).cloned() else {
            return Ok(None);
        };

        self.last_statement = Some(format!("SELECT {} WHERE key = {key}", entity_type.base_name()));
        let record = EntityRecord::new(entity_type.base(), key.clone(), data.clone());
        self.entries.push(MemoryEntry {
            record: record.clone(),
            original: data,
            state: EntityState::Unchanged,
        });
        Ok(Some(record))
    }

    fn refresh(&mut self, record: &mut EntityRecord) -> ContextResult<()> {
        let identity = Self::identity_of(record);
        let stored = self
            .committed
            .get(&identity)
            .cloned()
            .ok_or_else(|| ContextError::UnknownEntity(record.to_string()))?;

        // Client wins: reload originals, keep pending client edits. An
        // entry whose client values still differ from the store stays a
        // pending update.
        match self.position(&record.entity_type, &record.key) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.record = record.clone();
                entry.original = stored;
                if entry.state == EntityState::Unchanged && entry.record.data != entry.original {
                    entry.state = EntityState::Modified;
                }
            }
            None => {
                let state = if record.data != stored {
                    EntityState::Modified
                } else {
                    EntityState::Unchanged
                };
                self.entries.push(MemoryEntry {
                    record: record.clone(),
                    original: stored,
                    state,
                });
            }
        }
        Ok(())
    }

    fn original_values(
        &self,
        entity_type: &EntityType,
        key: &EntityKey,
        all_properties: bool,
    ) -> ContextResult<Vec<(String, Value)>> {
        let index = self.position(entity_type, key).ok_or_else(|| {
            ContextError::UnknownEntity(format!("{}[{key}]", entity_type.base_name()))
        })?;
        let entry = &self.entries[index];

        let Some(original) = entry.original.as_object() else {
            return Ok(Vec::new());
        };
        let current = entry.record.data.as_object();

        let mut values = Vec::new();
        for (field, value) in original {
            if !all_properties {
                let modified = current
                    .and_then(|c| c.get(field))
                    .map_or(true, |c| c != value);
                if !modified {
                    continue;
                }
            }
            values.push((field.clone(), value.clone()));
        }
        Ok(values)
    }

    fn commit(&mut self) -> ContextResult<CommitReceipt> {
        let mut receipt = CommitReceipt::default();

        for index in 0..self.entries.len() {
            match self.entries[index].state {
                EntityState::Added => {
                    if let Some(assignment) = self.assign_key(index) {
                        receipt.assignments.push(assignment);
                    }
                    let entry = &mut self.entries[index];
                    self.committed.insert(
                        (
                            entry.record.entity_type.base_name().to_string(),
                            entry.record.key.clone(),
                        ),
                        entry.record.data.clone(),
                    );
                    entry.original = entry.record.data.clone();
                    entry.state = EntityState::Unchanged;
                    self.last_statement =
                        Some(format!("INSERT INTO {}", entry.record.entity_type.base_name()));
                    receipt.rows_affected += 1;
                }
                EntityState::Modified => {
                    let entry = &mut self.entries[index];
                    let identity = (
                        entry.record.entity_type.base_name().to_string(),
                        entry.record.key.clone(),
                    );
                    // An update against a row that vanished writes nothing.
                    if self.committed.contains_key(&identity) {
                        self.committed.insert(identity, entry.record.data.clone());
                        receipt.rows_affected += 1;
                    }
                    entry.original = entry.record.data.clone();
                    entry.state = EntityState::Unchanged;
                    self.last_statement =
                        Some(format!("UPDATE {}", entry.record.entity_type.base_name()));
                }
                EntityState::Deleted => {
                    let entry = &self.entries[index];
                    let removed = self.committed.remove(&(
                        entry.record.entity_type.base_name().to_string(),
                        entry.record.key.clone(),
                    ));
                    if removed.is_some() {
                        receipt.rows_affected += 1;
                    }
                    self.last_statement =
                        Some(format!("DELETE FROM {}", entry.record.entity_type.base_name()));
                }
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }

        self.entries
            .retain(|entry| entry.state != EntityState::Deleted);

        Ok(receipt)
    }

    fn key_fields(&self, entity_type: &EntityType) -> Vec<String> {
        self.schemas
            .get(entity_type)
            .map(|d| d.key_fields.clone())
            .unwrap_or_else(|| vec!["id".to_string()])
    }

    fn last_statement(&self) -> Option<String> {
        self.last_statement.clone()
    }
}
