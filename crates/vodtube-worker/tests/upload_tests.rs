//! End-to-end upload state machine tests against an in-memory store and a
//! scripted host.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tempfile::NamedTempFile;

use vodtube_firestore::{FirestoreError, FirestoreResult, MemoryUploadStore, UploadStore};
use vodtube_models::{
    Channel, ChannelId, ChannelUploadConfig, Chapter, PlaylistMapping, UploadMetadata,
    UploadRecord, UploadStatus, VideoId, VideoRecord,
};
use vodtube_queue::QueueResult;
use vodtube_worker::{
    process_upload, EnhancementWarning, JobLogger, SkipReason, UploadAdmin, UploadContext,
    UploadOutcome, UploadScheduler, WorkerError,
};
use vodtube_youtube::{HostConnector, MediaBody, VideoHost, YoutubeError, YoutubeResult};

// ============================================================================
// Scripted host
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Insert { title: String, bytes: u64 },
    Update { id: String, description: String },
    AddToPlaylist { video_id: String, playlist_id: String },
}

#[derive(Default)]
struct ScriptedHost {
    calls: Mutex<Vec<Call>>,
    fail_insert: bool,
    fail_update: bool,
    fail_playlists: HashSet<String>,
}

impl ScriptedHost {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoHost for ScriptedHost {
    async fn insert_video(
        &self,
        metadata: &UploadMetadata,
        mut media: MediaBody,
    ) -> YoutubeResult<String> {
        let mut bytes = 0u64;
        while let Some(chunk) = media.stream.next().await {
            bytes += chunk?.len() as u64;
        }
        self.calls.lock().unwrap().push(Call::Insert {
            title: metadata.title.clone(),
            bytes,
        });
        if self.fail_insert {
            return Err(YoutubeError::api(503, "backend unavailable"));
        }
        Ok("yt-abc123".to_string())
    }

    async fn update_video_metadata(
        &self,
        remote_video_id: &str,
        metadata: &UploadMetadata,
    ) -> YoutubeResult<()> {
        self.calls.lock().unwrap().push(Call::Update {
            id: remote_video_id.to_string(),
            description: metadata.description.clone(),
        });
        if self.fail_update {
            return Err(YoutubeError::api(400, "invalid description"));
        }
        Ok(())
    }

    async fn add_video_to_playlist(&self, video_id: &str, playlist_id: &str) -> YoutubeResult<()> {
        self.calls.lock().unwrap().push(Call::AddToPlaylist {
            video_id: video_id.to_string(),
            playlist_id: playlist_id.to_string(),
        });
        if self.fail_playlists.contains(playlist_id) {
            return Err(YoutubeError::api(404, "playlist not found"));
        }
        Ok(())
    }
}

struct ScriptedConnector {
    host: Arc<ScriptedHost>,
    missing_credential: bool,
}

#[async_trait]
impl HostConnector for ScriptedConnector {
    async fn connect(&self) -> YoutubeResult<Arc<dyn VideoHost>> {
        if self.missing_credential {
            return Err(YoutubeError::MissingCredential);
        }
        Ok(self.host.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    store: MemoryUploadStore,
    host: Arc<ScriptedHost>,
    ctx: UploadContext,
    video_id: VideoId,
    _file: NamedTempFile,
}

fn media_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&vec![7u8; len]).unwrap();
    file.flush().unwrap();
    file
}

fn video(path: &Path) -> VideoRecord {
    VideoRecord {
        id: VideoId::from("vod-42"),
        title: "Stream #42".to_string(),
        streamed_at: Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap(),
        duration_secs: 3661,
        video_path: path.to_path_buf(),
        channel: Channel {
            id: ChannelId::from("chan-1"),
            display_name: "Shroud".to_string(),
        },
        chapters: vec![
            Chapter::new(0, "Just Chatting"),
            Chapter::new(600, "Valorant"),
        ],
    }
}

fn config() -> ChannelUploadConfig {
    let mut config = ChannelUploadConfig::new(ChannelId::from("chan-1"))
        .enabled()
        .with_mappings(vec![
            PlaylistMapping::new("valorant", "PL1").with_priority(5),
            PlaylistMapping::new("just*", "PL2").with_priority(1),
        ]);
    config.add_chapters = true;
    config
}

async fn harness(
    host: ScriptedHost,
    config: ChannelUploadConfig,
    missing_credential: bool,
) -> Harness {
    let file = media_file(300 * 1024);
    let store = MemoryUploadStore::new();
    let video = video(file.path());
    let video_id = video.id.clone();
    store.insert_video(video).await;
    store.insert_config(config).await;

    let host = Arc::new(host);
    let connector = Arc::new(ScriptedConnector {
        host: host.clone(),
        missing_credential,
    });
    let ctx = UploadContext::new(Arc::new(store.clone()), connector);

    Harness {
        store,
        host,
        ctx,
        video_id,
        _file: file,
    }
}

fn logger(video_id: &VideoId) -> JobLogger {
    JobLogger::detached(video_id, "upload_video")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_successful_upload_persists_completed() {
    let h = harness(ScriptedHost::default(), config(), false).await;

    let outcome = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    match &outcome {
        UploadOutcome::Completed {
            remote_video_id,
            remote_url,
            playlist_ids,
            warnings,
        } => {
            assert_eq!(remote_video_id, "yt-abc123");
            assert_eq!(remote_url, "https://www.youtube.com/watch?v=yt-abc123");
            assert_eq!(playlist_ids, &vec!["PL1".to_string(), "PL2".to_string()]);
            assert!(warnings.is_empty());
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(
        h.store.status_history(&h.video_id).await,
        vec![UploadStatus::Uploading, UploadStatus::Completed]
    );

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.remote_video_id.as_deref(), Some("yt-abc123"));
    assert!(record.uploaded_at.is_some());
    assert!(record.error_message.is_none());

    let calls = h.host.calls();
    assert_eq!(
        calls[0],
        Call::Insert {
            title: "Stream #42".to_string(),
            bytes: 300 * 1024,
        }
    );
    match &calls[1] {
        Call::Update { id, description } => {
            assert_eq!(id, "yt-abc123");
            assert!(description.starts_with("Streamed by Shroud on "));
            assert!(description.contains("0:00 - Just Chatting"));
            assert!(description.contains("10:00 - Valorant"));
        }
        other => panic!("expected chapter update, got {:?}", other),
    }
    assert_eq!(
        &calls[2..],
        &[
            Call::AddToPlaylist {
                video_id: "yt-abc123".to_string(),
                playlist_id: "PL1".to_string(),
            },
            Call::AddToPlaylist {
                video_id: "yt-abc123".to_string(),
                playlist_id: "PL2".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_completed_upload_is_noop() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    let log = logger(&h.video_id);

    process_upload(&h.ctx, &h.video_id, &log).await.unwrap();
    let calls_after_first = h.host.calls().len();

    for _ in 0..2 {
        let outcome = process_upload(&h.ctx, &h.video_id, &log).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Skipped(SkipReason::AlreadyCompleted));
    }

    assert_eq!(h.host.calls().len(), calls_after_first);
    assert_eq!(h.store.status_history(&h.video_id).await.len(), 2);
}

#[tokio::test]
async fn test_disabled_channel_is_skipped() {
    let mut config = config();
    config.upload_enabled = false;
    let h = harness(ScriptedHost::default(), config, false).await;

    let outcome = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Skipped(SkipReason::Disabled));
    assert!(h.host.calls().is_empty());
    assert!(h.store.upload(&h.video_id).await.is_none());
}

#[tokio::test]
async fn test_missing_video_is_not_found() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    let missing = VideoId::from("vod-missing");

    let err = process_upload(&h.ctx, &missing, &logger(&missing))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_config_is_not_found() {
    let file = media_file(16);
    let store = MemoryUploadStore::new();
    let video = video(file.path());
    let video_id = video.id.clone();
    store.insert_video(video).await;

    let ctx = UploadContext::new(
        Arc::new(store.clone()),
        Arc::new(ScriptedConnector {
            host: Arc::new(ScriptedHost::default()),
            missing_credential: false,
        }),
    );

    let err = process_upload(&ctx, &video_id, &logger(&video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));
}

#[tokio::test]
async fn test_transfer_failure_marks_failed() {
    let host = ScriptedHost {
        fail_insert: true,
        ..Default::default()
    };
    let h = harness(host, config(), false).await;

    let err = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Transfer(_)));
    assert!(err.is_retryable());

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Failed);
    assert_eq!(record.retry_count, 1);
    let message = record.error_message.unwrap();
    assert!(message.starts_with("upload failed:"));
    assert!(message.contains("backend unavailable"));

    assert_eq!(
        h.store.status_history(&h.video_id).await,
        vec![UploadStatus::Uploading, UploadStatus::Failed]
    );
    assert_eq!(h.host.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_file_counts_as_transfer_failure() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    h.store
        .insert_video(video(Path::new("/nonexistent/vod-42.mp4")))
        .await;

    let err = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Transfer(_)));

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Failed);
    assert_eq!(record.retry_count, 1);
    assert!(h.host.calls().is_empty());
}

#[tokio::test]
async fn test_credential_failure_does_not_count_attempt() {
    let h = harness(ScriptedHost::default(), config(), true).await;

    let err = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Credential(_)));

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Failed);
    assert_eq!(record.retry_count, 0);
    assert_eq!(
        record.error_message.as_deref(),
        Some(YoutubeError::MissingCredential.to_string().as_str())
    );
    assert!(h.host.calls().is_empty());
}

#[tokio::test]
async fn test_enhancement_failures_are_warnings() {
    let host = ScriptedHost {
        fail_update: true,
        fail_playlists: HashSet::from(["PL1".to_string()]),
        ..Default::default()
    };
    let h = harness(host, config(), false).await;

    let outcome = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    assert_eq!(outcome.warnings().len(), 2);
    assert!(matches!(
        outcome.warnings()[0],
        EnhancementWarning::ChapterUpdate { .. }
    ));
    assert!(matches!(
        &outcome.warnings()[1],
        EnhancementWarning::PlaylistAdd { playlist_id, .. } if playlist_id == "PL1"
    ));

    // PL2 is still attempted after PL1 fails.
    let adds: Vec<_> = h
        .host
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::AddToPlaylist { .. }))
        .collect();
    assert_eq!(adds.len(), 2);

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.playlist_ids, vec!["PL1", "PL2"]);
}

#[tokio::test]
async fn test_chapters_skipped_when_disabled() {
    let mut config = config();
    config.add_chapters = false;
    let h = harness(ScriptedHost::default(), config, false).await;

    process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    assert!(!h
        .host
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Update { .. })));
}

#[tokio::test]
async fn test_title_template_applied() {
    let config = config().with_templates(Some("{channel} - {title}"), None::<String>);
    let h = harness(ScriptedHost::default(), config, false).await;

    process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    assert!(matches!(
        &h.host.calls()[0],
        Call::Insert { title, .. } if title == "Shroud - Stream #42"
    ));
}

#[tokio::test]
async fn test_failed_upload_can_be_retried() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    let mut record = UploadRecord::new(h.video_id.clone());
    record.mark_uploading().unwrap();
    record.mark_failed("upload failed: timeout", true).unwrap();
    h.store.insert_upload(record).await;

    process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.retry_count, 1);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_interrupted_upload_is_resumed() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    let mut record = UploadRecord::new(h.video_id.clone());
    record.mark_uploading().unwrap();
    h.store.insert_upload(record).await;

    let outcome = process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();
    assert!(!outcome.is_skipped());

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.retry_count, 0);
    assert_eq!(
        h.store.status_history(&h.video_id).await,
        vec![UploadStatus::Uploading, UploadStatus::Completed]
    );
}

#[tokio::test]
async fn test_reset_upload_is_uploaded() {
    let h = harness(ScriptedHost::default(), config(), false).await;
    let mut record = UploadRecord::new(h.video_id.clone());
    record.mark_uploading().unwrap();
    record.mark_failed("upload failed: timeout", true).unwrap();
    record.reset_for_retry().unwrap();
    h.store.insert_upload(record).await;

    process_upload(&h.ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap();

    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.retry_count, 1);
    assert_eq!(
        h.store.status_history(&h.video_id).await,
        vec![UploadStatus::Uploading, UploadStatus::Completed]
    );
}

/// Delegates to a [`MemoryUploadStore`] but refuses to persist `failed`.
struct FailedSaveRejectingStore {
    inner: MemoryUploadStore,
}

#[async_trait]
impl UploadStore for FailedSaveRejectingStore {
    async fn load_video(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        self.inner.load_video(video_id).await
    }

    async fn load_upload_config(
        &self,
        channel_id: &ChannelId,
    ) -> FirestoreResult<Option<ChannelUploadConfig>> {
        self.inner.load_upload_config(channel_id).await
    }

    async fn get_upload(&self, video_id: &VideoId) -> FirestoreResult<Option<UploadRecord>> {
        self.inner.get_upload(video_id).await
    }

    async fn get_or_create_upload(&self, video_id: &VideoId) -> FirestoreResult<UploadRecord> {
        self.inner.get_or_create_upload(video_id).await
    }

    async fn save_upload(&self, record: &UploadRecord) -> FirestoreResult<()> {
        if record.status == UploadStatus::Failed {
            return Err(FirestoreError::request_failed("write rejected"));
        }
        self.inner.save_upload(record).await
    }
}

#[tokio::test]
async fn test_failure_cause_survives_store_error() {
    let h = harness(
        ScriptedHost {
            fail_insert: true,
            ..Default::default()
        },
        config(),
        false,
    )
    .await;
    let ctx = UploadContext::new(
        Arc::new(FailedSaveRejectingStore {
            inner: h.store.clone(),
        }),
        h.ctx.connector.clone(),
    );

    let err = process_upload(&ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Transfer(_)));

    // Only the uploading transition reached the store.
    let record = h.store.upload(&h.video_id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Uploading);
}

#[tokio::test]
async fn test_credential_cause_survives_store_error() {
    let h = harness(ScriptedHost::default(), config(), true).await;
    let ctx = UploadContext::new(
        Arc::new(FailedSaveRejectingStore {
            inner: h.store.clone(),
        }),
        h.ctx.connector.clone(),
    );

    let err = process_upload(&ctx, &h.video_id, &logger(&h.video_id))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Credential(_)));
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Default)]
struct RecordingScheduler {
    scheduled: Mutex<Vec<VideoId>>,
}

#[async_trait]
impl UploadScheduler for RecordingScheduler {
    async fn schedule_upload(&self, video_id: &VideoId) -> QueueResult<String> {
        let mut scheduled = self.scheduled.lock().unwrap();
        scheduled.push(video_id.clone());
        Ok(format!("{}-0", scheduled.len()))
    }
}

#[tokio::test]
async fn test_retry_resets_failed_upload() {
    let store = MemoryUploadStore::new();
    let video_id = VideoId::from("vod-7");
    let mut record = UploadRecord::new(video_id.clone());
    record.mark_uploading().unwrap();
    record.mark_failed("upload failed: reset", true).unwrap();
    store.insert_upload(record).await;

    let scheduler = Arc::new(RecordingScheduler::default());
    let admin = UploadAdmin::new(Arc::new(store.clone()), scheduler.clone());

    let message_id = admin.retry_upload(&video_id).await.unwrap();
    assert_eq!(message_id, "1-0");

    let record = admin.get_upload_status(&video_id).await.unwrap().unwrap();
    assert_eq!(record.status, UploadStatus::Pending);
    assert!(record.error_message.is_none());
    assert_eq!(record.retry_count, 1);
    assert_eq!(*scheduler.scheduled.lock().unwrap(), vec![video_id]);
}

#[tokio::test]
async fn test_retry_rejects_completed_upload() {
    let store = MemoryUploadStore::new();
    let video_id = VideoId::from("vod-8");
    let mut record = UploadRecord::new(video_id.clone());
    record.mark_uploading().unwrap();
    record.mark_completed("yt-1", vec![]).unwrap();
    store.insert_upload(record).await;

    let scheduler = Arc::new(RecordingScheduler::default());
    let admin = UploadAdmin::new(Arc::new(store), scheduler.clone());

    let err = admin.retry_upload(&video_id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidState(_)));
    assert!(scheduler.scheduled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_without_record_just_enqueues() {
    let store = MemoryUploadStore::new();
    let scheduler = Arc::new(RecordingScheduler::default());
    let admin = UploadAdmin::new(Arc::new(store), scheduler.clone());
    let video_id = VideoId::from("vod-9");

    admin.retry_upload(&video_id).await.unwrap();

    assert!(admin.get_upload_status(&video_id).await.unwrap().is_none());
    assert_eq!(scheduler.scheduled.lock().unwrap().len(), 1);
}
