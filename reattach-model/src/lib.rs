//! Entity value model for Reattach.
//!
//! Defines the detached-entity types every other subsystem depends on:
//! - [`EntityKey`] — opaque, value-equality primary-key values
//! - [`EntityType`] — runtime type markers (with proxy → base resolution)
//! - [`EntityState`] — persistence states (unchanged/added/modified/deleted/detached)
//! - [`EntityRecord`] — a detached snapshot: type + key + JSON values
//! - [`EntityDescriptor`] / [`SchemaSet`] — per-type shape metadata registry
//!
//! Everything here is a plain serializable value with no handle into any
//! live persistence context; that is what makes the shadow ledger safe to
//! serialize across context rebuilds.

mod key;
mod record;
mod schema;
mod state;

pub use key::EntityKey;
pub use record::{EntityIdentity, EntityRecord, EntityType};
pub use schema::{EntityDescriptor, SchemaSet};
pub use state::EntityState;
