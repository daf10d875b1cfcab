//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level or a directive is not a valid filter.
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// The offending level or directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// The rolling file appender could not be created.
    #[error("Failed to open log file appender: {0}")]
    FileAppender(String),

    /// A global subscriber is already installed.
    #[error("Initialization error: {0}")]
    InitError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
