//! In-process [`UploadStore`] and [`CredentialStore`] for tests.
//!
//! Compiled for this crate's tests and, through the `test-util` feature, for
//! dependents' tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use vodtube_models::{
    ChannelId, ChannelUploadConfig, RemoteCredential, UploadRecord, UploadStatus, VideoId,
    VideoRecord,
};

use crate::error::FirestoreResult;
use crate::store::{CredentialStore, UploadStore};

#[derive(Default)]
struct MemoryState {
    videos: HashMap<VideoId, VideoRecord>,
    configs: HashMap<ChannelId, ChannelUploadConfig>,
    uploads: HashMap<VideoId, UploadRecord>,
    credential: Option<RemoteCredential>,
    status_history: HashMap<VideoId, Vec<UploadStatus>>,
    credential_saves: usize,
}

/// In-process store. Records every persisted upload status per video.
#[derive(Clone, Default)]
pub struct MemoryUploadStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_video(&self, video: VideoRecord) {
        self.state.lock().await.videos.insert(video.id.clone(), video);
    }

    /// Store a config; its mappings are kept in the order given.
    pub async fn insert_config(&self, config: ChannelUploadConfig) {
        self.state
            .lock()
            .await
            .configs
            .insert(config.channel_id.clone(), config);
    }

    pub async fn insert_upload(&self, record: UploadRecord) {
        self.state
            .lock()
            .await
            .uploads
            .insert(record.video_id.clone(), record);
    }

    pub async fn set_credential(&self, credential: Option<RemoteCredential>) {
        self.state.lock().await.credential = credential;
    }

    pub async fn upload(&self, video_id: &VideoId) -> Option<UploadRecord> {
        self.state.lock().await.uploads.get(video_id).cloned()
    }

    /// Statuses passed to `save_upload`, oldest first.
    pub async fn status_history(&self, video_id: &VideoId) -> Vec<UploadStatus> {
        self.state
            .lock()
            .await
            .status_history
            .get(video_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn credential_saves(&self) -> usize {
        self.state.lock().await.credential_saves
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn load_video(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        Ok(self.state.lock().await.videos.get(video_id).cloned())
    }

    async fn load_upload_config(
        &self,
        channel_id: &ChannelId,
    ) -> FirestoreResult<Option<ChannelUploadConfig>> {
        Ok(self.state.lock().await.configs.get(channel_id).cloned())
    }

    async fn get_upload(&self, video_id: &VideoId) -> FirestoreResult<Option<UploadRecord>> {
        Ok(self.state.lock().await.uploads.get(video_id).cloned())
    }

    async fn get_or_create_upload(&self, video_id: &VideoId) -> FirestoreResult<UploadRecord> {
        let mut state = self.state.lock().await;
        let record = state
            .uploads
            .entry(video_id.clone())
            .or_insert_with(|| UploadRecord::new(video_id.clone()));
        Ok(record.clone())
    }

    async fn save_upload(&self, record: &UploadRecord) -> FirestoreResult<()> {
        let mut state = self.state.lock().await;
        state
            .status_history
            .entry(record.video_id.clone())
            .or_default()
            .push(record.status);
        state.uploads.insert(record.video_id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryUploadStore {
    async fn load_credential(&self) -> FirestoreResult<Option<RemoteCredential>> {
        Ok(self.state.lock().await.credential.clone())
    }

    async fn save_credential(&self, credential: &RemoteCredential) -> FirestoreResult<()> {
        let mut state = self.state.lock().await;
        state.credential = Some(credential.clone());
        state.credential_saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryUploadStore::new();
        let id = VideoId::from("vod-1");

        let first = store.get_or_create_upload(&id).await.unwrap();
        assert_eq!(first.status, UploadStatus::Pending);

        let mut record = first.clone();
        record.mark_uploading().unwrap();
        store.save_upload(&record).await.unwrap();

        let second = store.get_or_create_upload(&id).await.unwrap();
        assert_eq!(second.status, UploadStatus::Uploading);
        assert_eq!(store.status_history(&id).await, vec![UploadStatus::Uploading]);
    }

    #[tokio::test]
    async fn test_credential_roundtrip() {
        let store = MemoryUploadStore::new();
        assert!(store.load_credential().await.unwrap().is_none());

        let cred = RemoteCredential::new("a", "r", chrono::Utc::now());
        store.save_credential(&cred).await.unwrap();
        assert_eq!(store.load_credential().await.unwrap().unwrap().access_token, "a");
        assert_eq!(store.credential_saves().await, 1);
    }
}
