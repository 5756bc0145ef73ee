//! Common error types shared across crates.

use thiserror::Error;

/// Top-level error type for the observability wrapper.
///
/// SDK errors are carried as their rendered message so that this crate does
/// not have to track the error types of every exporter backend.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// A configuration value is missing, malformed, or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An exporter or provider pipeline could not be built.
    #[error("exporter setup failed: {0}")]
    Exporter(String),

    /// One or more providers failed to flush buffered telemetry.
    #[error("flush failed: {0}")]
    Flush(String),

    /// One or more providers failed to shut down cleanly.
    #[error("shutdown failed: {0}")]
    Shutdown(String),

    /// The manager has been shut down and no longer hands out instruments.
    #[error("observability manager already shut down")]
    AlreadyShutdown,
}

impl ObservabilityError {
    /// Returns `true` for errors raised while configuration was being read.
    ///
    /// These can be fixed by the operator; everything else comes from the
    /// SDK or the collector connection.
    pub fn is_config_error(&self) -> bool {
        matches!(self, ObservabilityError::InvalidConfig(_))
    }
}
