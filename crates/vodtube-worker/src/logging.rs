//! Structured job logging.

use tracing::{error, info, warn, Span};
use vodtube_models::VideoId;
use vodtube_queue::JobId;

/// Logs job lifecycle events with the job id, video id and operation
/// attached to every line.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_id: &VideoId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
            operation,
        }
    }

    /// Logger for work that was not started from a queued job.
    pub fn detached(video_id: &VideoId, operation: &'static str) -> Self {
        Self {
            job_id: "-".to_string(),
            video_id: video_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span covering the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = self.operation
        )
    }
}
