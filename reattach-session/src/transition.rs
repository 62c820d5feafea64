//! State transition policy.
//!
//! Pure decision logic mapping (current state, key validity, key
//! presence) to the state an entity should reach in the live context.

use reattach_model::EntityState;

/// Computes the state to apply to an entity.
///
/// Policy, in order:
/// 1. An entity without a valid key can only ever be an insert
///    candidate: target is `Added` regardless of the current state.
/// 2. A current `Added` whose key is already registered in the live
///    context stays `Added` (an idempotent re-add is not downgraded).
/// 3. A `Detached` result is promoted to `Modified`: a detached-but-keyed
///    entity needs reattachment plus an update, not a silent no-op.
/// 4. An explicitly requested `Deleted` is never remapped.
pub fn compute_target_state(
    current: EntityState,
    key_valid: bool,
    key_known: bool,
) -> EntityState {
    let mut target = current;

    // Rule 2 exempts a registered re-add from the invalid-key override.
    if (target != EntityState::Added || !key_known) && !key_valid {
        target = EntityState::Added;
    }

    if target == EntityState::Detached {
        target = EntityState::Modified;
    }

    target
}

/// Whether a caller-supplied explicit target state is acceptable.
///
/// `Detached` may never be requested: detaching is a side effect of
/// disposal, not a manageable target.
pub fn explicit_target_allowed(target: EntityState) -> bool {
    target != EntityState::Detached
}
