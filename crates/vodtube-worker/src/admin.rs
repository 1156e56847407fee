//! Upload administration: status queries and manual retries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use vodtube_firestore::UploadStore;
use vodtube_models::{UploadRecord, VideoId};
use vodtube_queue::{JobQueue, QueueResult, UploadVideoJob};

use crate::error::WorkerResult;

/// Anything that can schedule an upload job.
#[async_trait]
pub trait UploadScheduler: Send + Sync {
    /// Enqueue an upload of `video_id`. Returns the queue message id.
    async fn schedule_upload(&self, video_id: &VideoId) -> QueueResult<String>;
}

#[async_trait]
impl UploadScheduler for JobQueue {
    async fn schedule_upload(&self, video_id: &VideoId) -> QueueResult<String> {
        self.enqueue_upload(UploadVideoJob::new(video_id.clone())).await
    }
}

/// Operator-facing upload operations.
pub struct UploadAdmin {
    store: Arc<dyn UploadStore>,
    scheduler: Arc<dyn UploadScheduler>,
}

impl UploadAdmin {
    pub fn new(store: Arc<dyn UploadStore>, scheduler: Arc<dyn UploadScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// The persisted upload record, as stored.
    pub async fn get_upload_status(&self, video_id: &VideoId) -> WorkerResult<Option<UploadRecord>> {
        Ok(self.store.get_upload(video_id).await?)
    }

    /// Reset a non-completed upload to `pending` and enqueue it again.
    ///
    /// Fails with [`WorkerError::InvalidState`](crate::WorkerError::InvalidState)
    /// for a completed upload. A video without an upload record is simply enqueued.
    pub async fn retry_upload(&self, video_id: &VideoId) -> WorkerResult<String> {
        if let Some(mut record) = self.store.get_upload(video_id).await? {
            // Completed uploads refuse the reset.
            record.reset_for_retry()?;
            self.store.save_upload(&record).await?;
        }

        let message_id = self.scheduler.schedule_upload(video_id).await?;
        info!(video_id = %video_id, message_id = %message_id, "Upload retry scheduled");
        Ok(message_id)
    }
}
