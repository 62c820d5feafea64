//! Error types for the reconciliation engine.
//!
//! Every user-visible failure carries the last attempted operation, and
//! the involved entity's display form where one exists. Identity-lookup
//! misses are not errors (they surface as `Option`), and the engine never
//! retries database failures itself.

use crate::context::ContextError;
use reattach_ledger::LedgerError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad connection or configuration state.
    #[error("configuration error during {operation}: {detail}")]
    Configuration { operation: String, detail: String },

    /// Context construction/selection failures, invalid state
    /// transitions, or other provider-level misuse.
    #[error("provider error during {operation} on {entity}: {detail}")]
    Provider {
        operation: String,
        /// Display form of the involved entity, or `-` when none applies.
        entity: String,
        detail: String,
    },

    /// Entity shape introspection failure.
    #[error("introspection failed during {operation} for {entity_type}: {detail}")]
    Reflection {
        operation: String,
        entity_type: String,
        detail: String,
    },

    /// Unmanaged commit attempt, or session torn down mid-operation.
    #[error("transaction canceled during {operation}: {detail}")]
    TransactionCanceled { operation: String, detail: String },

    /// The shadow ledger is still empty after the local capture pass.
    #[error("no tracked entity for {operation}: nothing to save")]
    NoTrackedEntity { operation: String },

    /// Ledger-level failure (missing main entity).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Failure reported by the live persistence context.
    #[error("context error during {operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: ContextError,
    },
}

impl SessionError {
    pub fn configuration(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        SessionError::Configuration {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// A provider error with no specific entity involved.
    pub fn provider(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        SessionError::Provider {
            operation: operation.into(),
            entity: "-".to_string(),
            detail: detail.into(),
        }
    }

    pub fn provider_for(
        operation: impl Into<String>,
        entity: impl ToString,
        detail: impl Into<String>,
    ) -> Self {
        SessionError::Provider {
            operation: operation.into(),
            entity: entity.to_string(),
            detail: detail.into(),
        }
    }

    pub fn reflection(
        operation: impl Into<String>,
        entity_type: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        SessionError::Reflection {
            operation: operation.into(),
            entity_type: entity_type.into(),
            detail: detail.into(),
        }
    }

    pub fn canceled(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        SessionError::TransactionCanceled {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Use of a session after `dispose`.
    pub fn disposed(operation: impl Into<String>) -> Self {
        Self::canceled(operation, "session disposed")
    }

    pub fn context(operation: impl Into<String>, source: ContextError) -> Self {
        SessionError::Context {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error reports use of a disposed session.
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            SessionError::TransactionCanceled { detail, .. } if detail == "session disposed"
        )
    }
}
