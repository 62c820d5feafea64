//! The SQLite [`LiveContext`] implementation.

use reattach_model::{EntityKey, EntityRecord, EntityState, EntityType, SchemaSet};
use reattach_session::{
    CommitReceipt, ConnectionDescriptor, ContextEntry, ContextError, ContextResult, KeyAssignment,
    LiveContext,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

struct SqliteEntry {
    record: EntityRecord,
    original: Value,
    state: EntityState,
}

/// A live context over a single SQLite database.
///
/// All entity types share one table; payloads are JSON blobs, keys are
/// serialized into a text column so every key shape round-trips. The
/// context tracks attached entries in memory and writes them through in
/// one transaction on commit.
pub struct SqliteContext {
    conn: Connection,
    schemas: SchemaSet,
    entries: Vec<SqliteEntry>,
    lazy_loading: bool,
    last_statement: Option<String>,
}

fn backend(operation: &str) -> impl Fn(rusqlite::Error) -> ContextError + '_ {
    move |e| ContextError::Backend(format!("{operation}: {e}"))
}

fn encode_key(key: &EntityKey) -> ContextResult<String> {
    Ok(serde_json::to_string(key)?)
}

impl SqliteContext {
    /// Opens (or creates) the database named by the descriptor.
    pub fn open(descriptor: &ConnectionDescriptor, schemas: SchemaSet) -> ContextResult<Self> {
        let conn = if descriptor.connection_string == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&descriptor.connection_string)
        }
        .map_err(|e| ContextError::Construction(format!("failed to open database: {e}")))?;

        conn.busy_timeout(Duration::from_secs(u64::from(descriptor.timeout_secs)))
            .map_err(|e| ContextError::Construction(format!("failed to set busy timeout: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                pk TEXT,
                data TEXT NOT NULL,
                UNIQUE(entity_type, pk)
            );
            ",
        )
        .map_err(|e| ContextError::Construction(format!("failed to init schema: {e}")))?;

        Ok(Self {
            conn,
            schemas,
            entries: Vec::new(),
            lazy_loading: descriptor.lazy_loading,
            last_statement: None,
        })
    }

    fn position(&self, entity_type: &EntityType, key: &EntityKey) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry.record.entity_type.base_name() == entity_type.base_name()
                && entry.record.key == *key
        })
    }

    fn select_row(&self, entity_type: &EntityType, key: &EntityKey) -> ContextResult<Option<Value>> {
        let pk = encode_key(key)?;
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM entities WHERE entity_type = ?1 AND pk = ?2",
                params![entity_type.base_name(), pk],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend("select"))?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

impl LiveContext for SqliteContext {
    fn context_name(&self) -> &str {
        "SqliteContext"
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
        false
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
                    .select_row(&record.entity_type, &record.key)?
                    .unwrap_or_else(|| record.data.clone());
                self.entries.push(SqliteEntry {
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

        let Some(data) = self.select_row(entity_type, key)? else {
            return Ok(None);
        };

        self.last_statement = Some(format!(
            "SELECT data FROM entities WHERE entity_type = '{}' AND pk = ?",
            entity_type.base_name()
        ));
        let record = EntityRecord::new(entity_type.base(), key.clone(), data.clone());
        self.entries.push(SqliteEntry {
            record: record.clone(),
            original: data,
            state: EntityState::Unchanged,
        });
        Ok(Some(record))
    }

    fn refresh(&mut self, record: &mut EntityRecord) -> ContextResult<()> {
        let stored = self
            .select_row(&record.entity_type, &record.key)?
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
                self.entries.push(SqliteEntry {
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

        let tx = self
            .conn
            .transaction()
            .map_err(backend("begin transaction"))?;

        for entry in &mut self.entries {
            match entry.state {
                EntityState::Added => {
                    if entry.record.key.is_valid() {
                        let pk = encode_key(&entry.record.key)?;
                        let inserted = tx
                            .execute(
                                "INSERT INTO entities (entity_type, pk, data) VALUES (?1, ?2, ?3)",
                                params![
                                    entry.record.entity_type.base_name(),
                                    pk,
                                    entry.record.data.to_string(),
                                ],
                            )
                            .map_err(backend("insert"))?;
                        receipt.rows_affected += inserted as u64;
                    } else {
                        let inserted = tx
                            .execute(
                                "INSERT INTO entities (entity_type, pk, data) VALUES (?1, NULL, ?2)",
                                params![
                                    entry.record.entity_type.base_name(),
                                    entry.record.data.to_string(),
                                ],
                            )
                            .map_err(backend("insert"))?;
                        receipt.rows_affected += inserted as u64;

                        let assigned = EntityKey::Int(tx.last_insert_rowid());
                        let key_fields = self
                            .schemas
                            .get(&entry.record.entity_type)
                            .map(|d| d.key_fields.clone())
                            .unwrap_or_else(|| vec!["id".to_string()]);
                        let previous = entry.record.key.clone();
                        entry.record.apply_key(assigned.clone(), &key_fields);

                        tx.execute(
                            "UPDATE entities SET pk = ?1, data = ?2 WHERE seq = ?3",
                            params![
                                encode_key(&assigned)?,
                                entry.record.data.to_string(),
                                tx.last_insert_rowid(),
                            ],
                        )
                        .map_err(backend("bind key"))?;

                        receipt.assignments.push(KeyAssignment {
                            entity_type: entry.record.entity_type.clone(),
                            previous,
                            assigned,
                        });
                    }
                    entry.original = entry.record.data.clone();
                    entry.state = EntityState::Unchanged;
                    self.last_statement = Some(format!(
                        "INSERT INTO entities ({})",
                        entry.record.entity_type.base_name()
                    ));
                }
                EntityState::Modified => {
                    let pk = encode_key(&entry.record.key)?;
                    let updated = tx
                        .execute(
                            "UPDATE entities SET data = ?1 WHERE entity_type = ?2 AND pk = ?3",
                            params![
                                entry.record.data.to_string(),
                                entry.record.entity_type.base_name(),
                                pk,
                            ],
                        )
                        .map_err(backend("update"))?;
                    receipt.rows_affected += updated as u64;
                    entry.original = entry.record.data.clone();
                    entry.state = EntityState::Unchanged;
                    self.last_statement = Some(format!(
                        "UPDATE entities ({})",
                        entry.record.entity_type.base_name()
                    ));
                }
                EntityState::Deleted => {
                    let pk = encode_key(&entry.record.key)?;
                    let deleted = tx
                        .execute(
                            "DELETE FROM entities WHERE entity_type = ?1 AND pk = ?2",
                            params![entry.record.entity_type.base_name(), pk],
                        )
                        .map_err(backend("delete"))?;
                    receipt.rows_affected += deleted as u64;
                    self.last_statement = Some(format!(
                        "DELETE FROM entities ({})",
                        entry.record.entity_type.base_name()
                    ));
                }
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }

        tx.commit().map_err(backend("commit transaction"))?;

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
