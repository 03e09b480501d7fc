//! Error types for collaborator calls.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// A measurement could not be taken this epoch.
    #[error("metric unavailable: {0}")]
    MetricUnavailable(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    /// The process could not be spawned or exited non-zero.
    #[error("command {program:?} failed: {reason}")]
    Command { program: String, reason: String },

    /// The scaling action was attempted but did not succeed.
    #[error("dispatch of {action} failed: {reason}")]
    Dispatch { action: String, reason: String },

    #[error("cannot decode provider output: {0}")]
    Decode(String),
}
