//! Shadow ledger for Reattach.
//!
//! The ledger is the session's durable memory of "what this unit of work
//! intends to do": a serialization-safe list of entity snapshots and
//! their intended database states, independent of any live context's own
//! change tracker. It is the only session state guaranteed to survive a
//! context rebuild — when a new live context replaces a disposed one, the
//! ledger is replayed onto it entry by entry.
//!
//! Every snapshot stored here is a detached copy with no handle back into
//! a context; the whole ledger derives serde for exactly that reason.

mod error;
mod ledger;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{TrackedEntry, TrackingLedger};
