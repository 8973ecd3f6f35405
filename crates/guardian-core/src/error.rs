//! Unified error types for Guardian Core.

use guardian_types::{ConfigError, RelayError};
use serde::Serialize;
use thiserror::Error;

/// Error type for setup and orchestration outside the per-call relay path.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Worker base URL or endpoint path is malformed.
    #[error("Invalid worker URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A relayed call failed.
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Unclassified error with message.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for Guardian Core operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Unknown(s)
    }
}
