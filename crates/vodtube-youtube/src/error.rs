//! Remote video host error types.

use thiserror::Error;
use vodtube_firestore::FirestoreError;

/// Result type for remote host operations.
pub type YoutubeResult<T> = Result<T, YoutubeError>;

/// Errors that can occur while talking to the remote video host.
#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("No remote credential configured")]
    MissingCredential,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upload session missing from insert response")]
    UploadSessionMissing,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Store(#[from] FirestoreError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl YoutubeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn refresh_failed(msg: impl Into<String>) -> Self {
        Self::RefreshFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True when no usable credential could be produced.
    pub fn is_credential(&self) -> bool {
        matches!(
            self,
            YoutubeError::MissingCredential | YoutubeError::RefreshFailed(_)
        )
    }

    /// Check if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::Api { status, .. } => *status == 429 || *status >= 500,
            YoutubeError::Network(_) | YoutubeError::Io(_) => true,
            YoutubeError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(YoutubeError::api(503, "backend").is_retryable());
        assert!(YoutubeError::api(429, "quota").is_retryable());
        assert!(!YoutubeError::api(400, "bad snippet").is_retryable());
        assert!(!YoutubeError::MissingCredential.is_retryable());
    }

    #[test]
    fn test_credential_classification() {
        assert!(YoutubeError::MissingCredential.is_credential());
        assert!(YoutubeError::refresh_failed("invalid_grant").is_credential());
        assert!(!YoutubeError::api(401, "unauthorized").is_credential());
    }

    #[test]
    fn test_api_error_display() {
        let err = YoutubeError::api(403, "quotaExceeded");
        assert_eq!(err.to_string(), "API error (403): quotaExceeded");
    }
}
