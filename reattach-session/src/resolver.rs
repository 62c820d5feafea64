//! Identity resolution against the live change tracker.
//!
//! Finds the managed instance matching a detached candidate by runtime
//! type and value-equal key, and hosts the shared reattachment routine
//! used by both `manage` and ledger replay.

use crate::context::{ContextResult, LiveContext};
use crate::error::{SessionError, SessionResult};
use crate::transition::explicit_target_allowed;
use reattach_model::{EntityRecord, EntityState};
use tracing::debug;

/// Looks up the instance the live context already tracks for the
/// candidate's identity.
///
/// The scan is linear over currently tracked entries — session-sized
/// entity counts keep that cheap. On a hit with `update_values`, the
/// candidate's current values are merged into the managed instance (the
/// context keeps the original managed object, so relationships and
/// proxies stay valid) and the merged snapshot is returned. A miss is
/// not an error: the entity is simply not yet tracked.
///
/// Never constructs a duplicate managed instance for an identity the
/// context already holds.
pub fn find_tracked(
    context: &mut dyn LiveContext,
    record: &EntityRecord,
    update_values: bool,
) -> ContextResult<Option<EntityRecord>> {
    let hit = context.tracked().into_iter().find(|entry| {
        entry.record.entity_type == record.entity_type && entry.record.key == record.key
    });

    let Some(entry) = hit else {
        return Ok(None);
    };

    if update_values {
        debug!(entity = %record, "merging candidate values into tracked instance");
        context.update_values(record).map(Some)
    } else {
        Ok(Some(entry.record))
    }
}

/// Applies a target state to an entity, reconciling a detached candidate
/// with the already-managed instance first.
///
/// The current state is only queried when needed (an addition does not
/// require it). Returns the managed snapshot the state was applied to.
pub fn reattach_entity(
    context: &mut dyn LiveContext,
    record: &EntityRecord,
    current: Option<EntityState>,
    target: EntityState,
    operation: &str,
) -> SessionResult<EntityRecord> {
    if !explicit_target_allowed(target) {
        return Err(SessionError::provider_for(
            operation,
            record,
            format!("unexpected target state {target}"),
        ));
    }

    let current = match current {
        Some(state) => Some(state),
        None if target != EntityState::Added => {
            Some(context.entry_state(&record.entity_type, &record.key))
        }
        None => None,
    };

    let mut managed = record.clone();
    if current == Some(EntityState::Detached) {
        // Deletes keep the candidate as-is: merging edits into a row
        // about to be removed would be wasted work.
        let update_values = target != EntityState::Deleted;
        if let Some(tracked) = find_tracked(context, record, update_values)
            .map_err(|source| SessionError::context(operation, source))?
        {
            managed = tracked;
        }
    }

    debug!(entity = %managed, state = %target, "applying entity state");
    context
        .apply_state(&managed, target)
        .map_err(|source| SessionError::context(operation, source))?;

    Ok(managed)
}
