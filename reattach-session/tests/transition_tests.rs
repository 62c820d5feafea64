use reattach_model::EntityState;
use reattach_session::transition::{compute_target_state, explicit_target_allowed};

// ── Invalid keys force inserts ───────────────────────────────────

#[test]
fn invalid_key_targets_added_regardless_of_current_state() {
    for current in [
        EntityState::Unchanged,
        EntityState::Modified,
        EntityState::Deleted,
        EntityState::Detached,
    ] {
        assert_eq!(
            compute_target_state(current, false, false),
            EntityState::Added,
            "current {current} with invalid key must become an insert candidate"
        );
    }
}

#[test]
fn registered_re_add_is_not_downgraded() {
    // An Added entry whose key the context already knows stays Added
    // even while the key is still invalid.
    assert_eq!(
        compute_target_state(EntityState::Added, false, true),
        EntityState::Added
    );
}

#[test]
fn unregistered_add_with_invalid_key_stays_added() {
    assert_eq!(
        compute_target_state(EntityState::Added, false, false),
        EntityState::Added
    );
}

// ── Detached promotion ───────────────────────────────────────────

#[test]
fn detached_with_valid_key_is_promoted_to_modified() {
    assert_eq!(
        compute_target_state(EntityState::Detached, true, false),
        EntityState::Modified
    );
    assert_eq!(
        compute_target_state(EntityState::Detached, true, true),
        EntityState::Modified
    );
}

#[test]
fn detached_without_valid_key_becomes_added_not_modified() {
    assert_eq!(
        compute_target_state(EntityState::Detached, false, false),
        EntityState::Added
    );
}

// ── Valid keys pass through ──────────────────────────────────────

#[test]
fn valid_key_keeps_the_requested_state() {
    assert_eq!(
        compute_target_state(EntityState::Unchanged, true, true),
        EntityState::Unchanged
    );
    assert_eq!(
        compute_target_state(EntityState::Modified, true, true),
        EntityState::Modified
    );
    assert_eq!(
        compute_target_state(EntityState::Deleted, true, true),
        EntityState::Deleted
    );
    assert_eq!(
        compute_target_state(EntityState::Added, true, false),
        EntityState::Added
    );
}

// ── Explicit targets ─────────────────────────────────────────────

#[test]
fn detached_is_never_an_acceptable_explicit_target() {
    assert!(!explicit_target_allowed(EntityState::Detached));
    assert!(explicit_target_allowed(EntityState::Added));
    assert!(explicit_target_allowed(EntityState::Modified));
    assert!(explicit_target_allowed(EntityState::Deleted));
    assert!(explicit_target_allowed(EntityState::Unchanged));
}
