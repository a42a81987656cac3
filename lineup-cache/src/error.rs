//! Error types for cache reads and writes

use lineup_core::ApiError;
use thiserror::Error;

/// Failure surfaced by the fetch coordinator or mutation executor.
///
/// Remote failures pass through untouched as [`FetchError::Api`]. The other
/// variants cover data that could not cross the typed schema boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to encode value for {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Cached value for {key} does not match the requested type: {reason}")]
    Decode { key: String, reason: String },

    /// The session changed while the load for `key` was running, so its
    /// data was withheld.
    #[error("Load for {key} was cancelled by a session change")]
    Cancelled { key: String },
}

impl FetchError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_unauthorized)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.api_error().and_then(ApiError::status_code)
    }
}

/// Result type alias for cache operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_passes_through_display() {
        let err = FetchError::from(ApiError::status(404, r#"{"message":"no such player"}"#));
        assert_eq!(format!("{}", err), "HTTP 404: no such player");
        assert_eq!(err.status_code(), Some(404));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(FetchError::from(ApiError::status(401, "")).is_unauthorized());
        let decode = FetchError::Decode {
            key: "me".to_string(),
            reason: "missing field `id`".to_string(),
        };
        assert!(!decode.is_unauthorized());
        assert!(decode.api_error().is_none());
    }

    #[test]
    fn test_cancelled_has_no_status() {
        let err = FetchError::Cancelled {
            key: "coach/players".to_string(),
        };
        assert_eq!(err.status_code(), None);
        assert!(err.to_string().contains("coach/players"));
    }
}
