//! SQLite-backed live context for the reattach engine.
//!
//! Stores entity payloads as typed JSON blobs in a single table, keyed
//! by `(entity type, serialized key)`. Inserts without a valid key get
//! an integer key from the row id, reported back through the commit
//! receipt so the engine can rebind ledger identities.

mod context;

pub use context::SqliteContext;

use reattach_model::SchemaSet;
use reattach_session::{ContextError, ContextFactory};

/// A context factory for [`SqliteContext`] over the given schema set.
///
/// The descriptor's connection string is the database path; `:memory:`
/// opens a private in-memory database.
pub fn sqlite_context_factory(schemas: SchemaSet) -> ContextFactory {
    Box::new(move |descriptor| {
        if descriptor.connection_string.is_empty() {
            return Err(ContextError::UnsupportedShape(
                "sqlite requires a database path".to_string(),
            ));
        }
        let context = SqliteContext::open(descriptor, schemas.clone())?;
        Ok(Box::new(context))
    })
}
