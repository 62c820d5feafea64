//! Per-session bookkeeping token.

/// Mutable session bookkeeping shared between the engine and the context
/// lifecycle manager.
///
/// `is_tracked` is the unmanaged-write guard: commits are only legal
/// while it is set, and ledger replay clears it temporarily so the replay
/// itself is not mistaken for unmanaged activity.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    /// Whether the shadow ledger currently represents this session.
    pub is_tracked: bool,
    /// Last attempted operation, for error diagnostics.
    pub last_operation: String,
    /// Most recent backend statement reported by the live context.
    pub last_statement: Option<String>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the operation about to run.
    pub fn begin(&mut self, operation: &str) {
        self.last_operation = operation.to_string();
    }
}
