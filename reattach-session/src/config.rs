//! Configuration collaborator interface.
//!
//! The engine does not load configuration itself; it consumes a
//! [`SessionConfig`] and reacts to its stale flag by rebuilding the live
//! context on next use. [`ClientConfig`] is the plain local
//! implementation used by tests and embedded callers.

use std::fmt;

/// Connection configuration consumed by the context lifecycle manager.
pub trait SessionConfig {
    /// Raw connection descriptor (connection string, path, DSN…).
    fn connection_descriptor(&self) -> &str;

    /// Maximum time in seconds for a backend operation.
    fn timeout_secs(&self) -> u32;

    /// Default lazy-loading flag for newly built contexts.
    fn lazy_loading_default(&self) -> bool;

    /// Whether the configuration changed since the last context build.
    fn is_stale(&self) -> bool;

    /// Marks the current context as synchronized with this configuration.
    fn mark_synced(&mut self);

    /// Forces a context rebuild on next use (invoked on disposal).
    fn mark_stale(&mut self);

    /// Optional log sink for engine messages.
    fn log(&self, _message: &str) {}
}

/// Local configuration with an optional log sink.
///
/// Setters follow the original validation rules: an empty connection
/// string is ignored, and timeouts of three seconds or less are ignored.
/// Every accepted change marks the configuration stale so the next
/// operation rebuilds the live context.
pub struct ClientConfig {
    connection_string: String,
    timeout_secs: u32,
    lazy_loading: bool,
    stale: bool,
    log_sink: Option<Box<dyn Fn(&str) + Send>>,
}

impl ClientConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            timeout_secs: 30,
            lazy_loading: true,
            stale: true,
            log_sink: None,
        }
    }

    pub fn set_connection_string(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.connection_string = value;
            self.stale = true;
        }
    }

    /// Values of three seconds or less are ignored.
    pub fn set_timeout_secs(&mut self, value: u32) {
        if value > 3 {
            self.timeout_secs = value;
            self.stale = true;
        }
    }

    pub fn set_lazy_loading(&mut self, enabled: bool) {
        self.lazy_loading = enabled;
        self.stale = true;
    }

    pub fn with_log_sink(mut self, sink: impl Fn(&str) + Send + 'static) -> Self {
        self.log_sink = Some(Box::new(sink));
        self
    }
}

impl SessionConfig for ClientConfig {
    fn connection_descriptor(&self) -> &str {
        &self.connection_string
    }

    fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    fn lazy_loading_default(&self) -> bool {
        self.lazy_loading
    }

    fn is_stale(&self) -> bool {
        self.stale
    }

    fn mark_synced(&mut self) {
        self.stale = false;
    }

    fn mark_stale(&mut self) {
        self.stale = true;
    }

    fn log(&self, message: &str) {
        if let Some(sink) = &self.log_sink {
            sink(message);
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("connection_string", &self.connection_string)
            .field("timeout_secs", &self.timeout_secs)
            .field("lazy_loading", &self.lazy_loading)
            .field("stale", &self.stale)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}
