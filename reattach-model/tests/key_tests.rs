use reattach_model::EntityKey;
use uuid::Uuid;

// ── Validity ─────────────────────────────────────────────────────

#[test]
fn absent_key_is_invalid() {
    assert!(!EntityKey::Absent.is_valid());
}

#[test]
fn zero_int_key_is_invalid() {
    assert!(!EntityKey::Int(0).is_valid());
    assert!(EntityKey::Int(1).is_valid());
    assert!(EntityKey::Int(-5).is_valid());
}

#[test]
fn nil_uuid_key_is_invalid() {
    assert!(!EntityKey::Uuid(Uuid::nil()).is_valid());
    assert!(EntityKey::Uuid(Uuid::new_v4()).is_valid());
}

#[test]
fn empty_text_key_is_invalid() {
    assert!(!EntityKey::Text(String::new()).is_valid());
    assert!(EntityKey::Text("order-7".to_string()).is_valid());
}

#[test]
fn composite_key_valid_only_when_all_parts_valid() {
    let valid = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Text("a".into())]);
    assert!(valid.is_valid());

    let with_invalid_part = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Int(0)]);
    assert!(!with_invalid_part.is_valid());

    let empty = EntityKey::Composite(vec![]);
    assert!(!empty.is_valid());
}

// ── Equality ─────────────────────────────────────────────────────

#[test]
fn keys_compare_by_value() {
    assert_eq!(EntityKey::Int(42), EntityKey::Int(42));
    assert_ne!(EntityKey::Int(42), EntityKey::Int(43));
    assert_ne!(EntityKey::Int(42), EntityKey::Text("42".to_string()));
}

#[test]
fn composite_keys_compare_elementwise_in_order() {
    let a = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Int(2)]);
    let b = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Int(2)]);
    let swapped = EntityKey::Composite(vec![EntityKey::Int(2), EntityKey::Int(1)]);
    assert_eq!(a, b);
    assert_ne!(a, swapped);
}

// ── Conversions & display ────────────────────────────────────────

#[test]
fn from_impls_build_expected_variants() {
    assert_eq!(EntityKey::from(7i64), EntityKey::Int(7));
    assert_eq!(EntityKey::from("x"), EntityKey::Text("x".to_string()));
    let id = Uuid::new_v4();
    assert_eq!(EntityKey::from(id), EntityKey::Uuid(id));
}

#[test]
fn display_forms() {
    assert_eq!(EntityKey::Absent.to_string(), "?");
    assert_eq!(EntityKey::Int(9).to_string(), "9");
    let composite = EntityKey::Composite(vec![EntityKey::Int(1), EntityKey::Text("a".into())]);
    assert_eq!(composite.to_string(), "1+a");
}

#[test]
fn default_is_absent() {
    assert_eq!(EntityKey::default(), EntityKey::Absent);
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn key_survives_serialization() {
    let key = EntityKey::Composite(vec![EntityKey::Int(3), EntityKey::Uuid(Uuid::new_v4())]);
    let json = serde_json::to_string(&key).unwrap();
    let back: EntityKey = serde_json::from_str(&json).unwrap();
    assert_eq!(key, back);
}
