use pretty_assertions::assert_eq;
use reattach_model::{EntityKey, EntityRecord, EntityState, EntityType};
use serde_json::json;

fn person(key: EntityKey) -> EntityRecord {
    EntityRecord::new(
        EntityType::new("Person"),
        key,
        json!({"id": 0, "name": "Ada", "email": "ada@example.com"}),
    )
}

// ── Runtime types ────────────────────────────────────────────────

#[test]
fn proxy_resolves_to_base_type() {
    let proxy = EntityType::proxy_of("Person");
    assert!(proxy.is_proxy());
    assert_eq!(proxy.base_name(), "Person");
    assert_eq!(proxy.base(), EntityType::new("Person"));
    assert!(!proxy.base().is_proxy());
}

#[test]
fn base_type_equality_ignores_nothing_but_proxy_flag() {
    let pure = EntityType::new("Person");
    let proxy = EntityType::proxy_of("Person");
    assert_ne!(pure, proxy);
    assert_eq!(pure, proxy.base());
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn identity_uses_base_type_and_key() {
    let record = EntityRecord::new(
        EntityType::proxy_of("Person"),
        EntityKey::Int(4),
        json!({}),
    );
    let (entity_type, key) = record.identity();
    assert_eq!(entity_type, EntityType::new("Person"));
    assert!(!entity_type.is_proxy());
    assert_eq!(key, EntityKey::Int(4));
}

#[test]
fn identity_is_value_equal_across_clones() {
    let a = person(EntityKey::Int(7));
    let b = person(EntityKey::Int(7));
    assert_eq!(a.identity(), b.identity());
}

#[test]
fn unsaved_record_has_absent_key() {
    let record = EntityRecord::unsaved(EntityType::new("Person"), json!({"name": "Ada"}));
    assert_eq!(record.key, EntityKey::Absent);
    assert!(!record.key_is_valid());
}

// ── Key binding ──────────────────────────────────────────────────

#[test]
fn apply_key_mirrors_single_key_field_into_payload() {
    let mut record = person(EntityKey::Absent);
    record.apply_key(EntityKey::Int(12), &["id".to_string()]);
    assert_eq!(record.key, EntityKey::Int(12));
    assert_eq!(record.get("id"), Some(&json!(12)));
}

#[test]
fn apply_key_with_composite_fields_only_sets_key() {
    let mut record = person(EntityKey::Absent);
    let fields = vec!["tenant".to_string(), "id".to_string()];
    let key = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Int(2)]);
    record.apply_key(key.clone(), &fields);
    assert_eq!(record.key, key);
    // Payload untouched: no single column to mirror into.
    assert_eq!(record.get("id"), Some(&json!(0)));
}

// ── Display & states ─────────────────────────────────────────────

#[test]
fn record_display_is_type_and_key() {
    let record = person(EntityKey::Int(3));
    assert_eq!(record.to_string(), "Person[3]");
}

#[test]
fn dirty_states_are_the_write_states() {
    assert!(EntityState::Added.is_dirty());
    assert!(EntityState::Modified.is_dirty());
    assert!(EntityState::Deleted.is_dirty());
    assert!(!EntityState::Unchanged.is_dirty());
    assert!(!EntityState::Detached.is_dirty());
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn record_survives_serialization() {
    let record = person(EntityKey::Int(5));
    let json = serde_json::to_string(&record).unwrap();
    let back: EntityRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(record, back);
}
