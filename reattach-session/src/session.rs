//! The reconciliation engine.
//!
//! [`EntitySession`] is the composition root orchestrating the identity
//! resolver, the state transition calculator, the shadow ledger and the
//! context lifecycle manager across one logical unit of work.
//!
//! A session moves `Uninitialized → Ready` on first use, loops through
//! operations while `Ready`, and ends `Disposed` — terminal: any further
//! call fails. Single-threaded sequential use only; sharing a session
//! across threads requires external synchronization.

use crate::config::SessionConfig;
use crate::context::ContextEntry;
use crate::error::{SessionError, SessionResult};
use crate::lifecycle::{ContextManager, LifecycleHooks};
use crate::registry::ContextRegistry;
use crate::resolver::reattach_entity;
use crate::token::SessionToken;
use crate::transition::{compute_target_state, explicit_target_allowed};
use reattach_ledger::TrackingLedger;
use reattach_model::{EntityIdentity, EntityRecord, EntityState, EntityType, SchemaSet};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
    Disposed,
}

/// A reconciliation session over detached entities.
pub struct EntitySession {
    config: Box<dyn SessionConfig>,
    schemas: SchemaSet,
    manager: ContextManager,
    ledger: TrackingLedger,
    token: SessionToken,
    current_type: Option<EntityType>,
    main_identity: Option<EntityIdentity>,
    phase: Phase,
}

impl EntitySession {
    pub fn new(
        config: Box<dyn SessionConfig>,
        registry: ContextRegistry,
        schemas: SchemaSet,
    ) -> Self {
        Self::with_hooks(config, registry, schemas, LifecycleHooks::default())
    }

    pub fn with_hooks(
        config: Box<dyn SessionConfig>,
        registry: ContextRegistry,
        schemas: SchemaSet,
        hooks: LifecycleHooks,
    ) -> Self {
        Self {
            config,
            schemas,
            manager: ContextManager::new(registry, hooks),
            ledger: TrackingLedger::new(),
            token: SessionToken::new(),
            current_type: None,
            main_identity: None,
            phase: Phase::Uninitialized,
        }
    }

    /// Builds the live context and installs the session hooks.
    ///
    /// Calling this explicitly is optional: every operation initializes
    /// on demand, and the context is rebuilt whenever the configuration
    /// has gone stale.
    pub fn initialize(&mut self) -> SessionResult<()> {
        self.ensure_ready("initialize")
    }

    /// Reconciles a detached entity with the live context, computing the
    /// target state from its current state and key. Returns the state
    /// that was applied.
    pub fn manage(&mut self, record: &EntityRecord) -> SessionResult<EntityState> {
        self.ensure_ready("manage")?;

        let context = self.manager.context_mut("manage")?;
        let current = context.entry_state(&record.entity_type, &record.key);
        let key_known = current != EntityState::Detached;
        let target = compute_target_state(current, record.key_is_valid(), key_known);

        self.apply_and_track(record, Some(current), target, "manage")
    }

    /// Reconciles a detached entity under a caller-chosen state.
    ///
    /// The explicit state seeds the transition policy, so an entity with
    /// an invalid key still resolves to `Added` whatever was requested.
    /// Requesting `Detached` is rejected before anything is mutated.
    pub fn manage_with_state(
        &mut self,
        record: &EntityRecord,
        explicit_state: EntityState,
    ) -> SessionResult<EntityState> {
        self.ensure_ready("manage")?;

        if !explicit_target_allowed(explicit_state) {
            return Err(SessionError::provider_for(
                "manage",
                record,
                format!("unexpected target state {explicit_state}"),
            ));
        }

        let context = self.manager.context_mut("manage")?;
        let key_known =
            context.entry_state(&record.entity_type, &record.key) != EntityState::Detached;
        let target = compute_target_state(explicit_state, record.key_is_valid(), key_known);

        self.apply_and_track(record, None, target, "manage")
    }

    /// Commits the session's pending work and returns the number of
    /// affected rows.
    ///
    /// An empty ledger first triggers the local-mode capture pass so at
    /// least the main entity is represented; a still-empty ledger fails
    /// with [`SessionError::NoTrackedEntity`].
    pub fn save(&mut self) -> SessionResult<u64> {
        self.ensure_ready("save")?;

        let context = self.manager.context_mut("save")?;
        if !context.auto_detect_changes() {
            self.config.log("forcing change detection");
            context.detect_changes();
        }

        if !self.ledger.has_entities() {
            // Local mode: the caller never went through a tracking pass.
            self.capture("save")?;
        }
        if !self.ledger.has_entities() {
            return Err(SessionError::NoTrackedEntity {
                operation: "save".to_string(),
            });
        }

        self.token.is_tracked = true;
        self.config.log("saving changes");
        info!(entries = self.ledger.len(), "saving changes");

        let receipt = self.manager.commit(&mut self.token)?;

        // Follow store-assigned keys so the ledger keeps identifying the
        // rows it just created.
        for assignment in &receipt.assignments {
            let key_fields = self
                .manager
                .context("save")?
                .key_fields(&assignment.entity_type);
            let identity = (assignment.entity_type.base(), assignment.previous.clone());
            self.ledger
                .rebind_key(&identity, assignment.assigned.clone(), &key_fields);
            if self.main_identity.as_ref() == Some(&identity) {
                self.main_identity =
                    Some((assignment.entity_type.base(), assignment.assigned.clone()));
            }
        }
        self.ledger.settle_after_commit();

        Ok(receipt.rows_affected)
    }

    /// Client-wins refresh of the entity through the live context.
    pub fn refresh(&mut self, record: &mut EntityRecord) -> SessionResult<()> {
        self.ensure_ready("refresh")?;
        self.manager
            .context_mut("refresh")?
            .refresh(record)
            .map_err(|source| SessionError::context("refresh", source))
    }

    /// Ordered `(name, value)` pairs of the entity's original values,
    /// all of them or only the modified ones.
    pub fn original_values(
        &mut self,
        record: &EntityRecord,
        all_properties: bool,
    ) -> SessionResult<Vec<(String, Value)>> {
        self.ensure_ready("original_values")?;
        self.manager
            .context("original_values")?
            .original_values(&record.entity_type, &record.key, all_properties)
            .map_err(|source| SessionError::context("original_values", source))
    }

    /// Changes the entity type this session manages.
    ///
    /// Proxy types resolve to their base type; an unchanged type is a
    /// no-op. Only the cached current type is updated — the live context
    /// is not rebuilt by this call.
    pub fn switch_entity_type(&mut self, entity_type: &EntityType) -> SessionResult<()> {
        self.token.begin("switch_entity_type");
        self.fail_if_disposed("switch_entity_type")?;

        let base = entity_type.base();
        if self.current_type.as_ref() == Some(&base) {
            return Ok(());
        }

        let descriptor = self.schemas.get(&base).ok_or_else(|| {
            SessionError::reflection(
                "switch_entity_type",
                base.base_name(),
                "no descriptor registered for entity type",
            )
        })?;
        if !descriptor.serializable {
            return Err(SessionError::provider(
                "switch_entity_type",
                format!("entity type {} is not serializable", base.base_name()),
            ));
        }

        debug!(entity_type = base.base_name(), "switching current entity type");
        self.config
            .log(&format!("current entity type is now {}", base.base_name()));
        self.current_type = Some(base);
        Ok(())
    }

    /// The tracked state the live context reports for the entity.
    pub fn entity_state(&mut self, record: &EntityRecord) -> SessionResult<EntityState> {
        self.ensure_ready("entity_state")?;
        Ok(self
            .manager
            .context("entity_state")?
            .entry_state(&record.entity_type, &record.key))
    }

    /// Whether the live context reports pending changes.
    pub fn has_changes(&mut self) -> SessionResult<bool> {
        self.ensure_ready("has_changes")?;
        Ok(self.manager.context("has_changes")?.has_changes())
    }

    /// The snapshot of the session's main entity.
    pub fn main_entity(&self) -> SessionResult<EntityRecord> {
        self.fail_if_disposed("main_entity")?;
        Ok(self.ledger.main_entity()?.record.clone())
    }

    /// Explicit tracking capture pass, run before serializing a session.
    ///
    /// A tracked session captures every dirty entry plus the main entity;
    /// an untracked one captures the main entity only.
    pub fn capture_tracking(&mut self) -> SessionResult<()> {
        self.ensure_ready("capture_tracking")?;
        self.capture("capture_tracking")?;
        if self.ledger.has_entities() {
            self.token.is_tracked = true;
        }
        Ok(())
    }

    /// Stops tracking: clears the ledger and the tracked flag.
    pub fn untrack(&mut self) -> SessionResult<()> {
        self.token.begin("untrack");
        self.fail_if_disposed("untrack")?;
        self.ledger.clean();
        self.token.is_tracked = false;
        Ok(())
    }

    /// Read access to the shadow ledger.
    pub fn ledger(&self) -> &TrackingLedger {
        &self.ledger
    }

    /// Read access to the session token.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Releases the live context, clears the ledger and marks the
    /// configuration as requiring resynchronization. Terminal: every
    /// further operation fails.
    pub fn dispose(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        self.token.begin("dispose");

        self.manager.teardown(&self.token);
        self.ledger.clean();
        self.current_type = None;
        self.main_identity = None;
        self.config.mark_stale();
        self.phase = Phase::Disposed;

        info!("session disposed");
    }

    // ── Internals ────────────────────────────────────────────────

    fn fail_if_disposed(&self, operation: &str) -> SessionResult<()> {
        if self.phase == Phase::Disposed {
            return Err(SessionError::disposed(operation));
        }
        Ok(())
    }

    fn ensure_ready(&mut self, operation: &str) -> SessionResult<()> {
        self.token.begin(operation);
        self.fail_if_disposed(operation)?;

        self.manager.ensure_context(
            self.current_type.as_ref(),
            self.config.as_mut(),
            &mut self.ledger,
            &mut self.token,
            &self.schemas,
            operation,
        )?;

        // A session that is not tracking must not keep stale intentions.
        if !self.token.is_tracked {
            self.ledger.clean();
        }

        self.phase = Phase::Ready;
        Ok(())
    }

    fn apply_and_track(
        &mut self,
        record: &EntityRecord,
        current: Option<EntityState>,
        target: EntityState,
        operation: &str,
    ) -> SessionResult<EntityState> {
        self.config
            .log(&format!("changing {record} to state {target}"));

        let context = self.manager.context_mut(operation)?;
        let managed = reattach_entity(context, record, current, target, operation)?;

        let snapshot = if target == EntityState::Deleted {
            self.context_snapshot(&managed, target, operation)?
        } else {
            managed.clone()
        };

        let identity = managed.identity();
        let is_main = match &self.main_identity {
            None => {
                self.main_identity = Some(identity.clone());
                true
            }
            Some(main) => *main == identity,
        };

        self.ledger.mark_entity(snapshot, target, is_main);
        self.token.is_tracked = true;

        Ok(target)
    }

    /// Ledger snapshot for an entity: original values for a delete,
    /// current values otherwise.
    fn context_snapshot(
        &mut self,
        record: &EntityRecord,
        state: EntityState,
        operation: &str,
    ) -> SessionResult<EntityRecord> {
        let context = self.manager.context(operation)?;
        let entry = context.tracked().into_iter().find(|entry| {
            entry.record.entity_type == record.entity_type && entry.record.key == record.key
        });

        Ok(match entry {
            Some(ContextEntry { original, .. }) if state == EntityState::Deleted => EntityRecord {
                entity_type: record.entity_type.clone(),
                key: record.key.clone(),
                data: original,
            },
            Some(entry) => entry.record,
            None => record.clone(),
        })
    }

    /// Capture pass: tracked sessions capture all dirty entries plus the
    /// main entity, untracked ones only the main entity. (Secondary
    /// entities managed without an explicit tracking pass are already in
    /// the ledger; this pass covers context-side mutations.)
    fn capture(&mut self, operation: &str) -> SessionResult<()> {
        let main_identity = self.main_identity.clone();
        let entries = self.manager.context(operation)?.tracked();

        let capture_all = self.token.is_tracked;
        for entry in entries {
            let identity = entry.record.identity();
            let is_main = main_identity.as_ref() == Some(&identity);
            if !capture_all && !is_main {
                continue;
            }
            if !entry.state.is_dirty() && !is_main {
                continue;
            }

            let snapshot = if entry.state == EntityState::Deleted {
                EntityRecord {
                    entity_type: entry.record.entity_type.clone(),
                    key: entry.record.key.clone(),
                    data: entry.original,
                }
            } else {
                entry.record
            };
            self.ledger.mark_entity(snapshot, entry.state, is_main);
        }

        Ok(())
    }
}

impl Drop for EntitySession {
    fn drop(&mut self) {
        self.dispose();
    }
}
