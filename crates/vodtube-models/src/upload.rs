//! Upload tracking records and remote metadata.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::upload_config::PrivacyStatus;
use crate::video::VideoId;

/// Base URL for watching an uploaded video.
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Public watch URL for a remote video id.
pub fn watch_url(remote_video_id: &str) -> String {
    format!("{}{}", WATCH_URL_BASE, remote_video_id)
}

/// Upload lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Queued, no attempt made yet
    #[default]
    Pending,
    /// Transfer in progress (or interrupted mid-transfer)
    Uploading,
    /// Uploaded; absorbing
    Completed,
    /// Last attempt failed
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed)
    }

    /// Whether another upload attempt may start from this status.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    /// Allowed persisted transitions.
    ///
    /// `Uploading -> Uploading` covers re-invocation after an interrupted
    /// attempt. Any non-completed status may be reset to `Pending`.
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        match (self, next) {
            (Completed, _) => false,
            (_, Pending) => true,
            (Pending | Uploading | Failed, Uploading) => true,
            (Uploading, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = UploadStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "uploading" => Ok(UploadStatus::Uploading),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            _ => Err(UploadStatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown upload status: {0}")]
pub struct UploadStatusParseError(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid upload transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: UploadStatus,
    pub to: UploadStatus,
}

/// Upload state for one archived video.
///
/// Created at most once per video and never deleted. `status` alone decides
/// whether a new attempt is allowed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadRecord {
    pub video_id: VideoId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_video_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub status: UploadStatus,

    /// Present only while failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Failed transfer attempts. Never decreases.
    #[serde(default)]
    pub retry_count: u32,

    /// Set on first success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    /// Playlists targeted on success (attempted, not necessarily added).
    #[serde(default)]
    pub playlist_ids: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(video_id: VideoId) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            remote_video_id: None,
            remote_url: None,
            status: UploadStatus::Pending,
            error_message: None,
            retry_count: 0,
            uploaded_at: None,
            playlist_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: UploadStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enter `uploading` ahead of a transfer.
    pub fn mark_uploading(&mut self) -> Result<(), TransitionError> {
        self.transition(UploadStatus::Uploading)
    }

    /// Enter `failed` with a non-empty error message.
    ///
    /// `count_attempt` bumps `retry_count`; only transfer failures count.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        count_attempt: bool,
    ) -> Result<(), TransitionError> {
        self.transition(UploadStatus::Failed)?;
        let error = error.into();
        self.error_message = Some(if error.is_empty() {
            "unknown error".to_string()
        } else {
            error
        });
        if count_attempt {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        Ok(())
    }

    /// Enter `completed`, recording the remote video and targeted playlists.
    pub fn mark_completed(
        &mut self,
        remote_video_id: impl Into<String>,
        playlist_ids: Vec<String>,
    ) -> Result<(), TransitionError> {
        self.transition(UploadStatus::Completed)?;
        let remote_video_id = remote_video_id.into();
        self.remote_url = Some(watch_url(&remote_video_id));
        self.remote_video_id = Some(remote_video_id);
        self.error_message = None;
        self.playlist_ids = playlist_ids;
        if self.uploaded_at.is_none() {
            self.uploaded_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Reset to `pending` for an externally triggered retry.
    pub fn reset_for_retry(&mut self) -> Result<(), TransitionError> {
        self.transition(UploadStatus::Pending)?;
        self.error_message = None;
        Ok(())
    }
}

/// Metadata sent to the remote host on insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub category_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub privacy: PrivacyStatus,
    #[serde(default)]
    pub notify_subscribers: bool,
}

impl UploadMetadata {
    /// Same metadata with `block` appended to the description after a blank line.
    pub fn with_appended_description(&self, block: &str) -> Self {
        let mut next = self.clone();
        next.description = format!("{}\n\n{}", self.description, block);
        next
    }
}
