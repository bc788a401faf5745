//! Error types for the Tempo crate.

use thiserror::Error;

/// Main error type for Tempo operations.
#[derive(Error, Debug)]
pub enum TempoError {
    /// A required argument was missing or unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No tokio runtime was available to back the default timer service
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TempoError {
    fn from(err: config::ConfigError) -> Self {
        TempoError::Config(err.to_string())
    }
}

/// Result type alias for Tempo operations.
pub type Result<T> = std::result::Result<T, TempoError>;
