//! Worker error types.

use thiserror::Error;
use vodtube_models::TransitionError;
use vodtube_youtube::YoutubeError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Video, channel or upload config is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No usable remote credential for this attempt.
    #[error("Credential error: {0}")]
    Credential(#[source] YoutubeError),

    /// The file transfer to the remote host failed.
    #[error("Transfer failed: {0}")]
    Transfer(#[source] YoutubeError),

    #[error("Invalid upload state: {0}")]
    InvalidState(#[from] TransitionError),

    #[error("Job timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] vodtube_firestore::FirestoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vodtube_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if a later attempt of the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Transfer(_)
            | WorkerError::Timeout(_)
            | WorkerError::Queue(_)
            | WorkerError::Io(_) => true,
            WorkerError::Credential(e) => e.is_retryable(),
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::NotFound(_)
            | WorkerError::InvalidState(_)
            | WorkerError::Config(_) => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::NotFound(_) => "not_found",
            WorkerError::Credential(_) => "credential",
            WorkerError::Transfer(_) => "transfer",
            WorkerError::InvalidState(_) => "invalid_state",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::Config(_) => "config",
            WorkerError::Store(_) => "store",
            WorkerError::Queue(_) => "queue",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_fatal() {
        assert!(!WorkerError::not_found("video vod-1").is_retryable());
    }

    #[test]
    fn test_transfer_is_retryable() {
        let err = WorkerError::Transfer(YoutubeError::api(400, "invalid file"));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "transfer");
    }

    #[test]
    fn test_credential_follows_cause() {
        assert!(!WorkerError::Credential(YoutubeError::MissingCredential).is_retryable());
    }
}
