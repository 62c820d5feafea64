//! Explicit registry of candidate context implementations.
//!
//! Replaces runtime scanning of candidate context types: each concrete
//! context is registered at startup with the entity types it claims and
//! a constructor function. Selection walks the candidates that claim the
//! bound entity type, constructs each, and keeps the first whose built
//! context is structurally compatible with that type.

use crate::context::{ConnectionDescriptor, ContextError, ContextFactory, LiveContext};
use crate::error::{SessionError, SessionResult};
use crate::metadata::{MetadataResolver, ResourceMetadataResolver};
use reattach_model::EntityType;
use tracing::{debug, warn};

/// A candidate context implementation.
pub struct ContextRegistration {
    /// Context type name (used for logging and metadata resolution).
    pub name: String,
    /// Base entity type names this context claims to manage.
    pub entity_types: Vec<String>,
    /// External schema resource identifiers, when the backend needs them.
    pub resources: Vec<String>,
    pub factory: ContextFactory,
}

impl ContextRegistration {
    pub fn new(name: impl Into<String>, factory: ContextFactory) -> Self {
        Self {
            name: name.into(),
            entity_types: Vec::new(),
            resources: Vec::new(),
            factory,
        }
    }

    pub fn claims(mut self, entity_type: &str) -> Self {
        self.entity_types.push(entity_type.to_string());
        self
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resources.push(resource.to_string());
        self
    }

    fn claims_type(&self, entity_type: &EntityType) -> bool {
        self.entity_types
            .iter()
            .any(|name| name == entity_type.base_name())
    }
}

/// Registry of candidate contexts, populated at startup.
pub struct ContextRegistry {
    registrations: Vec<ContextRegistration>,
    resolver: Box<dyn MetadataResolver>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            resolver: Box::new(ResourceMetadataResolver),
        }
    }

    pub fn with_resolver(resolver: Box<dyn MetadataResolver>) -> Self {
        Self {
            registrations: Vec::new(),
            resolver,
        }
    }

    pub fn register(&mut self, registration: ContextRegistration) {
        self.registrations.push(registration);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Builds a context for the bound entity type, or from the first
    /// usable registration when no type is bound yet.
    ///
    /// A candidate whose construction fails is skipped; having no viable
    /// candidate at all is fatal.
    pub fn build(
        &self,
        entity_type: Option<&EntityType>,
        base: &ConnectionDescriptor,
        operation: &str,
    ) -> SessionResult<Box<dyn LiveContext>> {
        let mut last_failure: Option<ContextError> = None;

        for registration in self.candidates(entity_type) {
            let descriptor = self.descriptor_for(registration, base);

            match (registration.factory)(&descriptor) {
                Ok(context) => {
                    let compatible = match entity_type {
                        Some(entity_type) => context.supports(entity_type),
                        None => true,
                    };
                    if compatible {
                        debug!(context = %registration.name, "selected context implementation");
                        return Ok(context);
                    }
                    debug!(
                        context = %registration.name,
                        "built context is not structurally compatible, trying next"
                    );
                }
                Err(source) => {
                    // Not fatal: another registration may still work.
                    warn!(context = %registration.name, error = %source, "candidate construction failed");
                    last_failure = Some(source);
                }
            }
        }

        let what = entity_type
            .map(|t| t.base_name().to_string())
            .unwrap_or_else(|| "<unbound>".to_string());
        let detail = match last_failure {
            Some(source) => format!("no compatible context for entity type {what}: {source}"),
            None => format!("no compatible context for entity type {what}"),
        };
        Err(SessionError::provider(operation, detail))
    }

    fn candidates<'a>(
        &'a self,
        entity_type: Option<&'a EntityType>,
    ) -> impl Iterator<Item = &'a ContextRegistration> {
        self.registrations.iter().filter(move |registration| {
            entity_type.map_or(true, |entity_type| registration.claims_type(entity_type))
        })
    }

    fn descriptor_for(
        &self,
        registration: &ContextRegistration,
        base: &ConnectionDescriptor,
    ) -> ConnectionDescriptor {
        let metadata_locator = if registration.resources.is_empty() {
            None
        } else {
            Some(
                self.resolver
                    .metadata_locator(&registration.name, &registration.resources),
            )
        };
        ConnectionDescriptor {
            metadata_locator,
            ..base.clone()
        }
    }
}
