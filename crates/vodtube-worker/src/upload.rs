//! Upload state machine.
//!
//! [`process_upload`] moves one video through
//! `pending -> uploading -> completed | failed`, persisting every transition
//! before acting on it. Chapter and playlist enhancements run only after a
//! successful transfer and never fail the upload; their problems come back
//! as [`EnhancementWarning`]s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use vodtube_firestore::UploadStore;
use vodtube_models::format::{build_chapter_block, render_description, render_title};
use vodtube_models::playlist::{categories_from_chapters, dedup_playlist_ids, route_playlists};
use vodtube_models::{
    ChannelUploadConfig, TemplateFields, UploadMetadata, UploadRecord, UploadStatus, VideoId,
    VideoRecord,
};
use vodtube_youtube::{HostConnector, ResumableTransfer, VideoHost};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Collaborators for one upload attempt.
#[derive(Clone)]
pub struct UploadContext {
    pub store: Arc<dyn UploadStore>,
    pub connector: Arc<dyn HostConnector>,
}

impl UploadContext {
    pub fn new(store: Arc<dyn UploadStore>, connector: Arc<dyn HostConnector>) -> Self {
        Self { store, connector }
    }
}

/// Why an upload did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The channel has uploads switched off.
    Disabled,
    /// The video was uploaded by an earlier attempt.
    AlreadyCompleted,
}

/// A best-effort step that failed after the video was uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementWarning {
    ChapterUpdate { message: String },
    PlaylistAdd { playlist_id: String, message: String },
}

impl EnhancementWarning {
    fn kind(&self) -> &'static str {
        match self {
            EnhancementWarning::ChapterUpdate { .. } => "chapter_update",
            EnhancementWarning::PlaylistAdd { .. } => "playlist_add",
        }
    }
}

/// Successful result of [`process_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Skipped(SkipReason),
    Completed {
        remote_video_id: String,
        remote_url: String,
        /// Playlists an add was attempted for, in order.
        playlist_ids: Vec<String>,
        warnings: Vec<EnhancementWarning>,
    },
}

impl UploadOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, UploadOutcome::Skipped(_))
    }

    pub fn warnings(&self) -> &[EnhancementWarning] {
        match self {
            UploadOutcome::Completed { warnings, .. } => warnings,
            UploadOutcome::Skipped(_) => &[],
        }
    }

    fn metric_status(&self) -> &'static str {
        match self {
            UploadOutcome::Skipped(SkipReason::Disabled) => "skipped_disabled",
            UploadOutcome::Skipped(SkipReason::AlreadyCompleted) => "skipped_completed",
            UploadOutcome::Completed { .. } => "completed",
        }
    }
}

/// Upload one archived video to the remote host.
pub async fn process_upload(
    ctx: &UploadContext,
    video_id: &VideoId,
    logger: &JobLogger,
) -> WorkerResult<UploadOutcome> {
    let started = Instant::now();
    let result = run_upload(ctx, video_id, logger).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(outcome) => metrics::record_upload(outcome.metric_status(), elapsed),
        Err(_) => metrics::record_upload("failed", elapsed),
    }
    result
}

async fn run_upload(
    ctx: &UploadContext,
    video_id: &VideoId,
    logger: &JobLogger,
) -> WorkerResult<UploadOutcome> {
    let video = ctx
        .store
        .load_video(video_id)
        .await?
        .ok_or_else(|| WorkerError::not_found(format!("video {}", video_id)))?;

    let config = ctx
        .store
        .load_upload_config(&video.channel.id)
        .await?
        .ok_or_else(|| {
            WorkerError::not_found(format!("upload config for channel {}", video.channel.id))
        })?;

    if !config.upload_enabled {
        logger.log_progress("uploads disabled for channel, skipping");
        return Ok(UploadOutcome::Skipped(SkipReason::Disabled));
    }

    let mut record = ctx.store.get_or_create_upload(video_id).await?;
    if record.status == UploadStatus::Completed {
        logger.log_progress("already uploaded, skipping");
        return Ok(UploadOutcome::Skipped(SkipReason::AlreadyCompleted));
    }

    record.mark_uploading()?;
    ctx.store.save_upload(&record).await?;
    logger.log_start(&format!("uploading {}", video.video_path.display()));

    let host = match ctx.connector.connect().await {
        Ok(host) => host,
        Err(e) => {
            fail(ctx, &mut record, e.to_string(), false, logger).await;
            return Err(WorkerError::Credential(e));
        }
    };

    let metadata = build_metadata(&video, &config);
    let sent = Arc::new(AtomicU64::new(0));
    let transfer = ResumableTransfer::new(video.video_path.clone(), metadata.clone())
        .on_progress(progress_logger(logger.clone(), Arc::clone(&sent)));

    let remote_id = match transfer.run(host.as_ref()).await {
        Ok(remote_id) => remote_id,
        Err(e) => {
            fail(ctx, &mut record, format!("upload failed: {}", e), true, logger).await;
            return Err(WorkerError::Transfer(e));
        }
    };
    metrics::record_bytes_uploaded(sent.load(Ordering::Relaxed));
    logger.log_progress(&format!("transfer complete, remote id {}", remote_id));

    let mut warnings = Vec::new();

    if config.add_chapters && video.has_chapters() {
        let chaptered = metadata.with_appended_description(&build_chapter_block(&video.chapters));
        if let Err(e) = host.update_video_metadata(&remote_id, &chaptered).await {
            logger.log_warning(&format!("chapter update failed: {}", e));
            warnings.push(EnhancementWarning::ChapterUpdate {
                message: e.to_string(),
            });
        }
    }

    let playlist_ids = target_playlists(&video, &config);
    add_to_playlists(host.as_ref(), &remote_id, &playlist_ids, logger, &mut warnings).await;

    for warning in &warnings {
        metrics::record_enhancement_warning(warning.kind());
    }

    record.mark_completed(remote_id.clone(), playlist_ids.clone())?;
    ctx.store.save_upload(&record).await?;

    let remote_url = record.remote_url.clone().unwrap_or_default();
    logger.log_completion(&format!(
        "{} ({} playlists, {} warnings)",
        remote_url,
        playlist_ids.len(),
        warnings.len()
    ));

    Ok(UploadOutcome::Completed {
        remote_video_id: remote_id,
        remote_url,
        playlist_ids,
        warnings,
    })
}

/// Persist a failed attempt. Store errors are logged so the caller still
/// returns the failure cause.
async fn fail(
    ctx: &UploadContext,
    record: &mut UploadRecord,
    message: String,
    count_attempt: bool,
    logger: &JobLogger,
) {
    logger.log_error(&message);
    if let Err(e) = record.mark_failed(message, count_attempt) {
        logger.log_error(&format!("cannot mark upload failed: {}", e));
        return;
    }
    if let Err(e) = ctx.store.save_upload(record).await {
        logger.log_error(&format!("failed to persist upload failure: {}", e));
    }
}

/// Title, description and host settings for a video under its channel config.
pub fn build_metadata(video: &VideoRecord, config: &ChannelUploadConfig) -> UploadMetadata {
    let fields = TemplateFields::from_video(video);
    UploadMetadata {
        title: render_title(config.title_template.as_deref().unwrap_or_default(), &fields),
        description: render_description(
            config.description_template.as_deref().unwrap_or_default(),
            &fields,
        ),
        category_id: config.default_category_id.clone(),
        tags: config.tags.clone(),
        privacy: config.default_privacy,
        notify_subscribers: config.notify_subscribers,
    }
}

/// Playlists the video should be added to, in mapping order.
pub fn target_playlists(video: &VideoRecord, config: &ChannelUploadConfig) -> Vec<String> {
    let categories = categories_from_chapters(&video.chapters);
    let routed = route_playlists(&config.playlist_mappings, &categories);
    if config.dedup_playlist_ids {
        dedup_playlist_ids(routed)
    } else {
        routed
    }
}

async fn add_to_playlists(
    host: &dyn VideoHost,
    remote_id: &str,
    playlist_ids: &[String],
    logger: &JobLogger,
    warnings: &mut Vec<EnhancementWarning>,
) {
    for playlist_id in playlist_ids {
        match host.add_video_to_playlist(remote_id, playlist_id).await {
            Ok(()) => logger.log_progress(&format!("added to playlist {}", playlist_id)),
            Err(e) => {
                logger.log_warning(&format!("playlist {} add failed: {}", playlist_id, e));
                warnings.push(EnhancementWarning::PlaylistAdd {
                    playlist_id: playlist_id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Logs transfer progress at each 10% step and tracks bytes sent.
fn progress_logger(
    logger: JobLogger,
    sent: Arc<AtomicU64>,
) -> impl Fn(u64, u64) + Send + Sync + 'static {
    let last_decile = AtomicU64::new(0);
    move |read, total| {
        sent.store(read, Ordering::Relaxed);
        if total == 0 {
            return;
        }
        let decile = read.saturating_mul(10) / total;
        if decile > last_decile.fetch_max(decile, Ordering::Relaxed) {
            logger.log_progress(&format!("{}% ({} / {} bytes)", decile * 10, read, total));
        }
    }
}
