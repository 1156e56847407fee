//! Job types for the queue.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vodtube_models::VideoId;

/// Identifier of one enqueued job; a retry gets a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload an archived video to the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Archived video to upload
    pub video_id: VideoId,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl UploadVideoJob {
    /// Attempts before the job moves to the dead-letter stream.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Wall-clock bound on a single attempt.
    pub const TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);
    pub const TAGS: &'static [&'static str] = &["youtube", "upload"];

    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("upload:{}", self.video_id)
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    UploadVideo(UploadVideoJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::UploadVideo(j) => &j.job_id,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        match self {
            QueueJob::UploadVideo(j) => &j.video_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::UploadVideo(j) => j.idempotency_key(),
        }
    }

    /// Operation name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::UploadVideo(_) => "upload_video",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            QueueJob::UploadVideo(_) => UploadVideoJob::TIMEOUT,
        }
    }

    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            QueueJob::UploadVideo(_) => UploadVideoJob::TAGS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_job_wire_format() {
        let job = UploadVideoJob::new(VideoId::from("vod-1"));
        let json = serde_json::to_value(QueueJob::UploadVideo(job.clone())).unwrap();

        assert_eq!(json["type"], "upload_video");
        assert_eq!(json["video_id"], "vod-1");

        let decoded: QueueJob = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.job_id(), &job.job_id);
        assert_eq!(decoded.video_id(), &job.video_id);
    }

    #[test]
    fn test_idempotency_key_is_per_video() {
        let a = UploadVideoJob::new(VideoId::from("vod-1"));
        let b = UploadVideoJob::new(VideoId::from("vod-1"));
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_eq!(a.idempotency_key(), "upload:vod-1");
    }

    #[test]
    fn test_job_options() {
        let job = QueueJob::UploadVideo(UploadVideoJob::new(VideoId::from("v")));
        assert_eq!(job.timeout(), Duration::from_secs(43_200));
        assert_eq!(job.tags(), &["youtube", "upload"]);
        assert_eq!(UploadVideoJob::MAX_ATTEMPTS, 3);
        assert_eq!(job.kind(), "upload_video");
    }
}
