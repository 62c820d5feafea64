//! Error types for the ledger.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No entry carries the main flag; callers must establish a main
    /// entity before using the session.
    #[error("no main entity has been tracked")]
    NoMainEntity,
}
