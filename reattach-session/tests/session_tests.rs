use pretty_assertions::assert_eq;
use reattach_model::{EntityDescriptor, EntityKey, EntityRecord, EntityState, EntityType, SchemaSet};
use reattach_session::{
    ClientConfig, ContextRegistration, ContextRegistry, EntitySession, MemoryContext,
    SessionConfig, SessionError,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn schemas() -> SchemaSet {
    let mut schemas = SchemaSet::new();
    schemas.register(EntityDescriptor::new("Person").with_collection("orders"));
    schemas.register(EntityDescriptor::new("Order"));
    schemas.register(EntityDescriptor::new("AuditRow").not_serializable());
    schemas
}

fn registry_with(seeds: Vec<EntityRecord>, builds: Arc<AtomicUsize>) -> ContextRegistry {
    let mut registry = ContextRegistry::new();
    registry.register(
        ContextRegistration::new(
            "MemoryContext",
            Box::new(move |_descriptor| {
                builds.fetch_add(1, Ordering::SeqCst);
                let mut context = MemoryContext::new("MemoryContext", schemas());
                for seed in &seeds {
                    context.seed(seed.clone());
                }
                Ok(Box::new(context))
            }),
        )
        .claims("Person")
        .claims("Order"),
    );
    registry
}

fn session_over(seeds: Vec<EntityRecord>) -> EntitySession {
    let builds = Arc::new(AtomicUsize::new(0));
    EntitySession::new(
        Box::new(ClientConfig::new("mem://people")),
        registry_with(seeds, builds),
        schemas(),
    )
}

fn person(id: i64, name: &str) -> EntityRecord {
    EntityRecord::new(
        EntityType::new("Person"),
        EntityKey::Int(id),
        json!({"id": id, "name": name}),
    )
}

/// Configuration whose stale flag can be flipped from outside the
/// session, standing in for an external configuration source.
#[derive(Clone)]
struct SharedConfig {
    stale: Arc<AtomicBool>,
}

impl SharedConfig {
    fn new() -> Self {
        Self {
            stale: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl SessionConfig for SharedConfig {
    fn connection_descriptor(&self) -> &str {
        "mem://people"
    }

    fn timeout_secs(&self) -> u32 {
        30
    }

    fn lazy_loading_default(&self) -> bool {
        true
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    fn mark_synced(&mut self) {
        self.stale.store(false, Ordering::SeqCst);
    }

    fn mark_stale(&mut self) {
        self.stale.store(true, Ordering::SeqCst);
    }
}

// ── Managing detached entities ───────────────────────────────────

#[test]
fn detached_entity_with_valid_key_becomes_modified() {
    let mut session = session_over(vec![person(1, "Ada")]);
    let applied = session.manage(&person(1, "Ada Lovelace")).unwrap();
    assert_eq!(applied, EntityState::Modified);

    assert_eq!(session.entity_state(&person(1, "x")).unwrap(), EntityState::Modified);
    assert!(session.has_changes().unwrap());
    assert!(session.token().is_tracked);
}

#[test]
fn detached_entity_without_key_becomes_insert_candidate() {
    let mut session = session_over(vec![]);
    let unsaved = EntityRecord::unsaved(EntityType::new("Person"), json!({"name": "Grace"}));
    let applied = session.manage(&unsaved).unwrap();
    assert_eq!(applied, EntityState::Added);

    let ledger = session.ledger();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.entries()[0].state, EntityState::Added);
    assert!(ledger.entries()[0].is_main);
}

#[test]
fn first_managed_entity_becomes_the_main_entity() {
    let mut session = session_over(vec![person(1, "Ada"), person(2, "Grace")]);
    session.manage(&person(1, "Ada")).unwrap();
    session.manage(&person(2, "Grace")).unwrap();

    let main = session.main_entity().unwrap();
    assert_eq!(main.key, EntityKey::Int(1));
    assert_eq!(session.ledger().len(), 2);
}

#[test]
fn re_managing_the_same_identity_updates_its_ledger_slot() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Ada")).unwrap();
    session.manage(&person(1, "Ada Lovelace")).unwrap();

    assert_eq!(session.ledger().len(), 1);
    assert_eq!(
        session.ledger().entries()[0].record.get("name"),
        Some(&json!("Ada Lovelace"))
    );
}

#[test]
fn explicit_state_seeds_the_transition() {
    let mut session = session_over(vec![person(10, "Ada")]);
    let applied = session
        .manage_with_state(&person(10, "Edited"), EntityState::Modified)
        .unwrap();
    assert_eq!(applied, EntityState::Modified);
}

#[test]
fn explicit_state_cannot_override_an_invalid_key() {
    let mut session = session_over(vec![]);
    let unsaved = EntityRecord::unsaved(EntityType::new("Person"), json!({"name": "Grace"}));
    let applied = session
        .manage_with_state(&unsaved, EntityState::Modified)
        .unwrap();
    assert_eq!(applied, EntityState::Added);
}

#[test]
fn explicit_detached_is_rejected_without_mutating() {
    let mut session = session_over(vec![person(1, "Ada")]);
    let err = session
        .manage_with_state(&person(1, "Ada"), EntityState::Detached)
        .unwrap_err();
    assert!(matches!(err, SessionError::Provider { .. }));

    assert!(session.ledger().is_empty());
    assert!(!session.token().is_tracked);
    assert_eq!(session.entity_state(&person(1, "x")).unwrap(), EntityState::Detached);
}

// ── Saving ───────────────────────────────────────────────────────

#[test]
fn insert_save_assigns_and_rebinds_the_key() {
    let mut session = session_over(vec![]);
    let unsaved = EntityRecord::unsaved(EntityType::new("Person"), json!({"name": "Grace"}));
    session.manage(&unsaved).unwrap();

    let rows = session.save().unwrap();
    assert_eq!(rows, 1);

    let main = session.main_entity().unwrap();
    let EntityKey::Int(id) = main.key else {
        panic!("expected a store-assigned integer key");
    };
    assert!(id > 0);
    assert_eq!(main.get("id"), Some(&json!(id)));
    assert_eq!(session.ledger().entries()[0].state, EntityState::Unchanged);
}

#[test]
fn update_save_writes_one_row() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Ada Lovelace")).unwrap();

    assert_eq!(session.save().unwrap(), 1);
    assert!(!session.has_changes().unwrap());
    assert_eq!(session.entity_state(&person(1, "x")).unwrap(), EntityState::Unchanged);
}

#[test]
fn delete_save_removes_the_ledger_entry() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session
        .manage_with_state(&person(1, "Ada"), EntityState::Deleted)
        .unwrap();

    assert_eq!(session.save().unwrap(), 1);
    assert!(session.ledger().is_empty());
    assert!(session.main_entity().is_err());
}

#[test]
fn deleted_snapshot_keeps_original_values() {
    // The ledger snapshot for a delete is what the row looked like, not
    // the client's never-to-be-written edits.
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Ada")).unwrap();
    session
        .manage_with_state(&person(1, "EDITED"), EntityState::Deleted)
        .unwrap();

    let entry = &session.ledger().entries()[0];
    assert_eq!(entry.state, EntityState::Deleted);
    assert_eq!(entry.record.get("name"), Some(&json!("Ada")));
}

#[test]
fn save_with_nothing_tracked_fails() {
    let mut session = session_over(vec![person(1, "Ada")]);
    let err = session.save().unwrap_err();
    assert!(matches!(err, SessionError::NoTrackedEntity { .. }));
}

#[test]
fn save_reports_rows_across_multiple_entities() {
    let mut session = session_over(vec![person(1, "Ada"), person(2, "Grace")]);
    session.manage(&person(1, "Ada v2")).unwrap();
    session.manage(&person(2, "Grace v2")).unwrap();
    assert_eq!(session.save().unwrap(), 2);
}

// ── Ledger replay across context rebuilds ────────────────────────

#[test]
fn stale_config_rebuild_replays_the_ledger() {
    let builds = Arc::new(AtomicUsize::new(0));
    let config = SharedConfig::new();
    let handle = config.clone();
    let mut session = EntitySession::new(
        Box::new(config),
        registry_with(vec![person(10, "Ada")], Arc::clone(&builds)),
        schemas(),
    );

    session
        .manage_with_state(&person(10, "Edited"), EntityState::Modified)
        .unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    // External configuration change: the next operation rebuilds the
    // live context and replays tracked intentions onto it.
    handle.stale.store(true, Ordering::SeqCst);
    let state = session.entity_state(&person(10, "x")).unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(state, EntityState::Modified);
    assert!(session.token().is_tracked);
}

#[test]
fn untracked_session_loses_nothing_on_rebuild_but_replays_nothing() {
    let builds = Arc::new(AtomicUsize::new(0));
    let config = SharedConfig::new();
    let handle = config.clone();
    let mut session = EntitySession::new(
        Box::new(config),
        registry_with(vec![person(10, "Ada")], Arc::clone(&builds)),
        schemas(),
    );

    session.initialize().unwrap();
    handle.stale.store(true, Ordering::SeqCst);
    let state = session.entity_state(&person(10, "x")).unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(state, EntityState::Detached);
}

// ── Tracking control ─────────────────────────────────────────────

#[test]
fn capture_tracking_marks_the_session_tracked() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Edited")).unwrap();
    session.capture_tracking().unwrap();
    assert!(session.token().is_tracked);
    assert!(session.ledger().has_entities());
}

#[test]
fn tracked_capture_includes_secondary_dirty_entities() {
    let mut session = session_over(vec![person(1, "Ada"), person(2, "Grace")]);
    session.manage(&person(1, "Ada v2")).unwrap();

    // Secondary entity goes dirty through the context only, never
    // through a manage call.
    let mut secondary = person(2, "Grace v2");
    session.refresh(&mut secondary).unwrap();
    assert_eq!(session.ledger().len(), 1);

    session.capture_tracking().unwrap();

    let ledger = session.ledger();
    assert_eq!(ledger.len(), 2);
    assert!(ledger
        .entries()
        .iter()
        .any(|entry| entry.record.key == EntityKey::Int(2) && !entry.is_main));
}

#[test]
fn untracked_capture_is_main_entity_only() {
    let mut session = session_over(vec![person(1, "Ada"), person(2, "Grace")]);
    session.manage(&person(1, "Ada v2")).unwrap();
    session.untrack().unwrap();

    let mut secondary = person(2, "Grace v2");
    session.refresh(&mut secondary).unwrap();

    session.capture_tracking().unwrap();

    // The secondary entity is pending in the context but stays out of
    // the ledger while the capture runs untracked.
    let ledger = session.ledger();
    assert_eq!(ledger.len(), 1);
    assert!(ledger.entries()[0].is_main);
    assert_eq!(ledger.entries()[0].record.key, EntityKey::Int(1));
    assert!(session.token().is_tracked);
}

#[test]
fn untrack_clears_the_ledger() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Edited")).unwrap();
    session.untrack().unwrap();

    assert!(session.ledger().is_empty());
    assert!(!session.token().is_tracked);
}

#[test]
fn untracked_save_still_captures_the_main_entity() {
    // Local mode: context-side changes are captured at save time even
    // when no tracking pass ran.
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Edited")).unwrap();
    session.untrack().unwrap();

    assert_eq!(session.save().unwrap(), 1);
    assert_eq!(session.ledger().len(), 1);
}

// ── Refresh & original values ────────────────────────────────────

#[test]
fn refresh_keeps_client_edits() {
    let mut session = session_over(vec![person(1, "Ada")]);
    let mut edited = person(1, "Hopper");
    session.refresh(&mut edited).unwrap();
    assert_eq!(edited.get("name"), Some(&json!("Hopper")));
}

#[test]
fn original_values_reports_pre_edit_values() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Hopper")).unwrap();

    let modified = session.original_values(&person(1, "x"), false).unwrap();
    assert_eq!(modified, vec![("name".to_string(), json!("Ada"))]);

    let all = session.original_values(&person(1, "x"), true).unwrap();
    assert_eq!(all.len(), 2);
}

// ── Entity type binding ──────────────────────────────────────────

#[test]
fn switch_entity_type_resolves_proxies() {
    let mut session = session_over(vec![]);
    session
        .switch_entity_type(&EntityType::proxy_of("Person"))
        .unwrap();
    // Unchanged base type: a no-op.
    session.switch_entity_type(&EntityType::new("Person")).unwrap();
}

#[test]
fn switch_to_unknown_type_fails_introspection() {
    let mut session = session_over(vec![]);
    let err = session
        .switch_entity_type(&EntityType::new("Mystery"))
        .unwrap_err();
    assert!(matches!(err, SessionError::Reflection { .. }));
}

#[test]
fn switch_to_non_serializable_type_is_rejected() {
    let mut session = session_over(vec![]);
    let err = session
        .switch_entity_type(&EntityType::new("AuditRow"))
        .unwrap_err();
    assert!(matches!(err, SessionError::Provider { .. }));
}

// ── Disposal ─────────────────────────────────────────────────────

#[test]
fn disposed_session_rejects_every_operation() {
    let mut session = session_over(vec![person(1, "Ada")]);
    session.manage(&person(1, "Edited")).unwrap();
    session.dispose();

    let err = session.manage(&person(1, "Again")).unwrap_err();
    assert!(err.is_disposal());
    assert!(session.save().unwrap_err().is_disposal());
    assert!(session.main_entity().unwrap_err().is_disposal());
    assert!(session
        .switch_entity_type(&EntityType::new("Person"))
        .unwrap_err()
        .is_disposal());
    assert!(session.ledger().is_empty());
}

#[test]
fn dispose_is_idempotent() {
    let mut session = session_over(vec![]);
    session.initialize().unwrap();
    session.dispose();
    session.dispose();
}

// ── Collection unloading on replay ───────────────────────────────

#[test]
fn empty_collections_are_unloaded_before_replay() {
    let builds = Arc::new(AtomicUsize::new(0));
    let config = SharedConfig::new();
    let handle = config.clone();
    let mut session = EntitySession::new(
        Box::new(config),
        registry_with(vec![], Arc::clone(&builds)),
        schemas(),
    );

    let record = EntityRecord::new(
        EntityType::new("Person"),
        EntityKey::Int(5),
        json!({"id": 5, "name": "Ada", "orders": []}),
    );
    session
        .manage_with_state(&record, EntityState::Modified)
        .unwrap();

    handle.stale.store(true, Ordering::SeqCst);
    session.initialize().unwrap();

    let entry = &session.ledger().entries()[0];
    assert_eq!(entry.record.get("orders"), None);
    assert_eq!(entry.record.get("name"), Some(&json!("Ada")));
}
