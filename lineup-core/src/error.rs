//! Error types for remote API calls

use std::time::Duration;
use thiserror::Error;

/// HTTP status the server uses to reject a missing or expired credential.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Failure of a remote read or write.
///
/// `Clone` so a single in-flight load can hand the same failure to every
/// caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: String,
    },

    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The response body did not match the expected schema.
    #[error("Invalid response payload: {reason}")]
    Decode { reason: String },
}

impl ApiError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = server_message(&body).unwrap_or_else(|| body.clone());
        Self::Status {
            status,
            message,
            body,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The distinguished credential-rejected signal.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(STATUS_UNAUTHORIZED)
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(400..=499))
    }

    /// Transport failures, timeouts and 5xx may succeed on a second attempt.
    /// Client errors and schema mismatches will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode { .. } => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }
}

/// Pull `message` (or `error`) out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Result type alias for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;
