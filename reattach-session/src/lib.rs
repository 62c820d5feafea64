//! Entity state reconciliation engine.
//!
//! Sits between application code and a live, change-tracking persistence
//! context. Callers work with plain detached [`reattach_model::EntityRecord`]
//! values (from serialization, a remote call, a UI round-trip); the
//! [`EntitySession`] reconciles them with the live context before commit,
//! surviving context recreation without duplicating rows, losing edits or
//! attaching an entity to the wrong underlying type.
//!
//! # Architecture
//!
//! - [`transition`] — pure insert/update/delete/reattach state policy
//! - [`resolver`] — identity-based lookup against the live change tracker
//! - [`ContextManager`] — exclusive owner of the live context: builds it
//!   from the [`ContextRegistry`], replays the shadow ledger onto a fresh
//!   context, and guards commits through [`LifecycleHooks`]
//! - [`EntitySession`] — the composition root orchestrating the above
//!
//! The persistence backend itself is an external collaborator consumed
//! through the narrow [`LiveContext`] trait; [`MemoryContext`] is the
//! in-crate reference implementation backing the test suite.

mod config;
mod context;
mod error;
mod lifecycle;
mod memory;
mod metadata;
mod registry;
pub mod resolver;
mod session;
mod token;
pub mod transition;

pub use config::{ClientConfig, SessionConfig};
pub use context::{
    CommitReceipt, ConnectionDescriptor, ContextEntry, ContextError, ContextFactory,
    ContextResult, KeyAssignment, LiveContext,
};
pub use error::{SessionError, SessionResult};
pub use lifecycle::{ContextManager, LifecycleHooks};
pub use memory::MemoryContext;
pub use metadata::{MetadataResolver, ResourceMetadataResolver};
pub use registry::{ContextRegistration, ContextRegistry};
pub use session::EntitySession;
pub use token::SessionToken;
