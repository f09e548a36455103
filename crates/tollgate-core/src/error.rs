//! Unified error types for Tollgate Core.

use serde::Serialize;
use thiserror::Error;
use tollgate_types::ConfigError;

/// Main error type for mediation operations.
///
/// Anything surfacing as `AppError` inside a call is fatal to that call and is
/// answered with a `server_error` envelope.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Network request failed (HTTP client).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading, merging, or validation failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named wordlist could not be loaded.
    #[error("Wordlist '{name}' unavailable: {message}")]
    Wordlist { name: String, message: String },

    /// A wordlist entry is not a valid regular expression.
    #[error("Invalid wordlist pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// Result type alias for Tollgate operations.
pub type AppResult<T> = Result<T, AppError>;
