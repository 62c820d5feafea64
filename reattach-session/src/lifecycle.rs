//! Live context lifecycle management.
//!
//! The [`ContextManager`] is the exclusive owner of the live context: it
//! builds one from the registry when none exists or the configuration
//! went stale, configures it, replays the shadow ledger onto a fresh
//! context, and gates every commit through the registered hooks.

use crate::config::SessionConfig;
use crate::context::{CommitReceipt, ConnectionDescriptor, LiveContext};
use crate::error::{SessionError, SessionResult};
use crate::registry::ContextRegistry;
use crate::resolver::reattach_entity;
use crate::token::SessionToken;
use reattach_ledger::TrackingLedger;
use reattach_model::{EntityType, SchemaSet};
use tracing::{debug, info};

/// Callbacks invoked at the two lifecycle points.
///
/// Registered once at construction; there is no runtime subscription.
pub struct LifecycleHooks {
    /// Runs before every commit. The default rejects a commit made while
    /// the session token is untracked — write activity that bypassed the
    /// reconciliation engine.
    pub before_commit: Box<dyn Fn(&SessionToken) -> SessionResult<()>>,
    /// Runs after the live context has been torn down.
    pub after_teardown: Box<dyn Fn(&SessionToken)>,
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self {
            before_commit: Box::new(|token| {
                if token.is_tracked {
                    Ok(())
                } else {
                    Err(SessionError::canceled(
                        token.last_operation.clone(),
                        "commit attempted outside the reconciliation engine",
                    ))
                }
            }),
            after_teardown: Box::new(|_token| {}),
        }
    }
}

/// Builds, configures, replays onto, and disposes the live context.
pub struct ContextManager {
    registry: ContextRegistry,
    hooks: LifecycleHooks,
    context: Option<Box<dyn LiveContext>>,
}

impl ContextManager {
    pub fn new(registry: ContextRegistry, hooks: LifecycleHooks) -> Self {
        Self {
            registry,
            hooks,
            context: None,
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self, operation: &str) -> SessionResult<&dyn LiveContext> {
        self.context
            .as_deref()
            .ok_or_else(|| SessionError::provider(operation, "live context not available"))
    }

    pub fn context_mut(&mut self, operation: &str) -> SessionResult<&mut dyn LiveContext> {
        match self.context.as_deref_mut() {
            Some(context) => Ok(context),
            None => Err(SessionError::provider(
                operation,
                "live context not available",
            )),
        }
    }

    /// Builds a live context when none exists or the configuration is
    /// stale, then replays the ledger onto it. Returns whether a build
    /// happened.
    pub fn ensure_context(
        &mut self,
        entity_type: Option<&EntityType>,
        config: &mut dyn SessionConfig,
        ledger: &mut TrackingLedger,
        token: &mut SessionToken,
        schemas: &SchemaSet,
        operation: &str,
    ) -> SessionResult<bool> {
        if self.context.is_some() && !config.is_stale() {
            return Ok(false);
        }

        if config.connection_descriptor().is_empty() {
            return Err(SessionError::configuration(
                operation,
                "empty connection descriptor",
            ));
        }

        let descriptor = ConnectionDescriptor {
            connection_string: config.connection_descriptor().to_string(),
            timeout_secs: config.timeout_secs(),
            lazy_loading: config.lazy_loading_default(),
            metadata_locator: None,
        };

        let mut context = self.registry.build(entity_type, &descriptor, operation)?;
        context.set_lazy_loading(descriptor.lazy_loading);
        config.mark_synced();

        info!(context = context.context_name(), "live context created");
        config.log(&format!("live context {} created", context.context_name()));

        self.context = Some(context);
        self.apply_tracking_if_needed(ledger, token, schemas, operation)?;

        Ok(true)
    }

    /// Replays every ledger entry's state onto the freshly built context.
    ///
    /// The token's tracked flag is cleared for the duration of the replay
    /// so the replay itself is not mistaken for unmanaged write activity,
    /// and restored afterwards even on failure.
    pub fn apply_tracking_if_needed(
        &mut self,
        ledger: &mut TrackingLedger,
        token: &mut SessionToken,
        schemas: &SchemaSet,
        operation: &str,
    ) -> SessionResult<()> {
        if !ledger.has_entities() || !token.is_tracked {
            return Ok(());
        }

        debug!(entries = ledger.len(), "replaying shadow ledger onto rebuilt context");

        token.is_tracked = false;
        ledger.unload_empty_collections(schemas);
        let result = self.replay(ledger, operation);
        token.is_tracked = true;

        result
    }

    fn replay(&mut self, ledger: &TrackingLedger, operation: &str) -> SessionResult<()> {
        let context = self.context_mut(operation)?;
        for entry in ledger.entries() {
            reattach_entity(context, &entry.record, None, entry.state, operation)?;
        }
        Ok(())
    }

    /// Commits pending work, gated by the pre-commit hook.
    pub fn commit(&mut self, token: &mut SessionToken) -> SessionResult<CommitReceipt> {
        (self.hooks.before_commit)(token)?;

        let operation = token.last_operation.clone();
        let context = self.context_mut(&operation)?;
        let receipt = context
            .commit()
            .map_err(|source| SessionError::context(operation, source))?;

        if let Some(statement) = context.last_statement() {
            token.last_statement = Some(statement);
        }

        Ok(receipt)
    }

    /// Releases the live context and notifies the teardown hook.
    pub fn teardown(&mut self, token: &SessionToken) {
        if let Some(context) = self.context.take() {
            debug!(context = context.context_name(), "tearing down live context");
            drop(context);
            (self.hooks.after_teardown)(token);
        }
    }
}
