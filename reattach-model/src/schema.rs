//! Per-type shape metadata.
//!
//! The original assembly-scanning reflection is replaced by an explicit
//! registry populated at startup: each entity type the session may manage
//! gets an [`EntityDescriptor`] registered in a [`SchemaSet`].

use crate::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Describes an entity type's persisted shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Base (non-proxy) type name.
    pub entity_type: String,
    /// Primary-key column names, in declaration order.
    pub key_fields: Vec<String>,
    /// Related-collection navigation properties. Empty placeholders for
    /// these are dropped before reattachment so "no related rows loaded"
    /// is not read as "set all related rows to empty".
    pub collection_fields: Vec<String>,
    /// Whether detached snapshots of this type may cross a serialization
    /// boundary. Types that cannot are rejected by the session when bound.
    pub serializable: bool,
}

impl EntityDescriptor {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_fields: vec!["id".to_string()],
            collection_fields: Vec::new(),
            serializable: true,
        }
    }

    pub fn with_key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_collection(mut self, field: &str) -> Self {
        self.collection_fields.push(field.to_string());
        self
    }

    pub fn not_serializable(mut self) -> Self {
        self.serializable = false;
        self
    }
}

/// Registry of entity descriptors, keyed by base type name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSet {
    descriptors: HashMap<String, EntityDescriptor>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: EntityDescriptor) {
        self.descriptors
            .insert(descriptor.entity_type.clone(), descriptor);
    }

    pub fn get(&self, entity_type: &EntityType) -> Option<&EntityDescriptor> {
        self.descriptors.get(entity_type.base_name())
    }

    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.descriptors.contains_key(entity_type.base_name())
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
