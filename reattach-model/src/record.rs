//! Runtime type markers and detached entity snapshots.

use crate::EntityKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A runtime entity type marker.
///
/// Persistence backends that hand out structural proxies (lazy-loading
/// wrappers around a pure entity class) report a proxy type; identity
/// bookkeeping always works on the base type, which [`EntityType::base`]
/// resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    proxy: bool,
}

impl EntityType {
    /// A pure entity type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proxy: false,
        }
    }

    /// A structural proxy over the named base type.
    pub fn proxy_of(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proxy: true,
        }
    }

    /// The base type name (proxy wrappers resolve to their wrapped type).
    pub fn base_name(&self) -> &str {
        &self.name
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// The pure (non-proxy) form of this type.
    pub fn base(&self) -> EntityType {
        EntityType {
            name: self.name.clone(),
            proxy: false,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The `(base type, key)` pair that identifies an entity across
/// detachment and context rebuilds.
pub type EntityIdentity = (EntityType, EntityKey);

/// A detached entity snapshot: runtime type, key and a JSON payload of
/// property values. This is what crosses serialization, remote-call and
/// UI round-trip boundaries, and what the shadow ledger stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub key: EntityKey,
    pub data: Value,
}

impl EntityRecord {
    pub fn new(entity_type: EntityType, key: EntityKey, data: Value) -> Self {
        Self {
            entity_type,
            key,
            data,
        }
    }

    /// A record with no key yet (insert candidate).
    pub fn unsaved(entity_type: EntityType, data: Value) -> Self {
        Self::new(entity_type, EntityKey::Absent, data)
    }

    /// The identity pair used for ledger and tracker lookups.
    pub fn identity(&self) -> EntityIdentity {
        (self.entity_type.base(), self.key.clone())
    }

    pub fn key_is_valid(&self) -> bool {
        self.key.is_valid()
    }

    /// A property value by name, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Binds a store-assigned key, mirroring it into the payload when the
    /// type declares a single key column.
    pub fn apply_key(&mut self, key: EntityKey, key_fields: &[String]) {
        if let [field] = key_fields {
            let value = match &key {
                EntityKey::Int(n) => Some(Value::from(*n)),
                EntityKey::Uuid(u) => Some(Value::from(u.to_string())),
                EntityKey::Text(s) => Some(Value::from(s.clone())),
                EntityKey::Absent | EntityKey::Composite(_) => None,
            };
            if let (Some(value), Some(object)) = (value, self.data.as_object_mut()) {
                object.insert(field.clone(), value);
            }
        }
        self.key = key;
    }
}

impl fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.entity_type.base_name(), self.key)
    }
}
