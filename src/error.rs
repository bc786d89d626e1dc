//! Error types for the Hostwatch service.

use thiserror::Error;

/// Main error type for Hostwatch operations.
///
/// Rate limit rejections are not errors; they are reported as a
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum HostwatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while layering configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Host telemetry collection errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Hostwatch operations.
pub type Result<T> = std::result::Result<T, HostwatchError>;
