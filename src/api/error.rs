use crate::cache::CacheError;
use thiserror::Error;

/// Errors surfaced by the remote transport and the API client.
///
/// `SessionExpired` is produced by the transport and consumed by the session
/// guard; callers of [`ApiClient`](super::ApiClient) only see it converted to
/// `AuthenticationFailed` when a re-login did not help.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (DNS, connect, TLS, timeout, non-2xx HTTP status)
    #[error("Network error: {0}")]
    Transport(String),

    /// The server no longer recognises the session id
    #[error("Session expired")]
    SessionExpired,

    /// Credentials were rejected, or the session could not be re-established
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested category, feed or article does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server answered with something that is not a valid API response
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Any other error reported by the server (e.g. INCORRECT_USAGE)
    #[error("Server error: {0}")]
    Api(String),

    #[error(transparent)]
    InvalidCapacity(#[from] CacheError),
}

impl ApiError {
    /// Returns true if the user action may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::SessionExpired
            | ApiError::AuthenticationFailed(_)
            | ApiError::NotFound(_)
            | ApiError::MalformedResponse(_)
            | ApiError::Api(_)
            | ApiError::InvalidCapacity(_) => false,
        }
    }

    /// Returns true if the UI should prompt for a fresh login.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailed(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::MalformedResponse(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::MalformedResponse(err.to_string())
    }
}
