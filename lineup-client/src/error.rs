//! Error types for the client binary and library surface.

use lineup_cache::FetchError;
use lineup_core::ApiError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Usage: {0}")]
    Usage(String),
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        Self::Fetch(FetchError::Api(err))
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
