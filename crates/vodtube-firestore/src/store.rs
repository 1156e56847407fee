//! Store capabilities used by the upload pipeline.
//!
//! [`UploadStore`] and [`CredentialStore`] are the persistence seams of the
//! worker. [`FirestoreUploadStore`] backs them with the repositories in this
//! crate.

use async_trait::async_trait;

use vodtube_models::{
    ChannelId, ChannelUploadConfig, RemoteCredential, UploadRecord, VideoId, VideoRecord,
};

use crate::client::FirestoreClient;
use crate::credential_repo::CredentialRepository;
use crate::error::FirestoreResult;
use crate::upload_config_repo::UploadConfigRepository;
use crate::upload_repo::UploadRepository;
use crate::video_repo::VideoRepository;

/// Reads videos and configs, and owns upload records.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Video with channel and chapters.
    async fn load_video(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>>;

    /// Channel config with mappings ordered by descending priority.
    async fn load_upload_config(
        &self,
        channel_id: &ChannelId,
    ) -> FirestoreResult<Option<ChannelUploadConfig>>;

    async fn get_upload(&self, video_id: &VideoId) -> FirestoreResult<Option<UploadRecord>>;

    /// Existing upload record, or a newly stored `pending` one.
    async fn get_or_create_upload(&self, video_id: &VideoId) -> FirestoreResult<UploadRecord>;

    async fn save_upload(&self, record: &UploadRecord) -> FirestoreResult<()>;
}

/// Persists the single remote host credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_credential(&self) -> FirestoreResult<Option<RemoteCredential>>;

    async fn save_credential(&self, credential: &RemoteCredential) -> FirestoreResult<()>;
}

// =============================================================================
// Firestore
// =============================================================================

pub struct FirestoreUploadStore {
    videos: VideoRepository,
    configs: UploadConfigRepository,
    uploads: UploadRepository,
    credentials: CredentialRepository,
}

impl FirestoreUploadStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            videos: VideoRepository::new(client.clone()),
            configs: UploadConfigRepository::new(client.clone()),
            uploads: UploadRepository::new(client.clone()),
            credentials: CredentialRepository::new(client),
        }
    }
}

#[async_trait]
impl UploadStore for FirestoreUploadStore {
    async fn load_video(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        self.videos.get(video_id).await
    }

    async fn load_upload_config(
        &self,
        channel_id: &ChannelId,
    ) -> FirestoreResult<Option<ChannelUploadConfig>> {
        self.configs.get(channel_id).await
    }

    async fn get_upload(&self, video_id: &VideoId) -> FirestoreResult<Option<UploadRecord>> {
        self.uploads.get(video_id).await
    }

    async fn get_or_create_upload(&self, video_id: &VideoId) -> FirestoreResult<UploadRecord> {
        self.uploads.get_or_create(video_id).await
    }

    async fn save_upload(&self, record: &UploadRecord) -> FirestoreResult<()> {
        self.uploads.save(record).await
    }
}

#[async_trait]
impl CredentialStore for FirestoreUploadStore {
    async fn load_credential(&self) -> FirestoreResult<Option<RemoteCredential>> {
        self.credentials.get().await
    }

    async fn save_credential(&self, credential: &RemoteCredential) -> FirestoreResult<()> {
        self.credentials.save(credential).await
    }
}
