//! Archived video repository.
//!
//! Videos live in `vods/{video_id}` and reference their channel in
//! `channels/{channel_id}`. Both are written by the archiving pipeline;
//! uploads only read them.

use tracing::debug;

use vodtube_models::{Channel, ChannelId, Chapter, VideoId, VideoRecord};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, Fields};

pub const VIDEOS_COLLECTION: &str = "vods";
pub const CHANNELS_COLLECTION: &str = "channels";

pub struct VideoRepository {
    client: FirestoreClient,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Load a video with its channel and chapters.
    ///
    /// A video whose channel document is missing is reported as not found.
    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        let Some(doc) = self
            .client
            .get_document(VIDEOS_COLLECTION, video_id.as_str())
            .await?
        else {
            return Ok(None);
        };

        let fields = doc.view()?;
        let channel_id = ChannelId::from(fields.require::<String>("channel_id")?);
        let Some(channel_doc) = self
            .client
            .get_document(CHANNELS_COLLECTION, channel_id.as_str())
            .await?
        else {
            debug!(video_id = %video_id, channel_id = %channel_id, "Video references a missing channel");
            return Ok(None);
        };

        let channel = document_to_channel(&channel_doc, channel_id)?;
        Ok(Some(document_to_video(&doc, video_id, channel)?))
    }
}

fn document_to_channel(doc: &Document, id: ChannelId) -> FirestoreResult<Channel> {
    let fields = doc.view()?;
    let display_name = fields
        .opt_string("display_name")
        .or_else(|| fields.opt_string("name"))
        .unwrap_or_else(|| id.to_string());
    Ok(Channel { id, display_name })
}

fn document_to_video(
    doc: &Document,
    video_id: &VideoId,
    channel: Channel,
) -> FirestoreResult<VideoRecord> {
    let fields = doc.view()?;
    let invalid = |what: &str| {
        FirestoreError::invalid_response(format!("Video {} has no valid {}", video_id, what))
    };

    let video_path = fields.opt_string("video_path").ok_or_else(|| invalid("video_path"))?;
    let title = fields.get::<String>("title").ok_or_else(|| invalid("title"))?;
    let streamed_at = fields
        .timestamp("streamed_at")
        .or_else(|| fields.timestamp("created_at"))
        .ok_or_else(|| invalid("streamed_at"))?;
    let duration_secs = fields.get::<u64>("duration").ok_or_else(|| invalid("duration"))?;
    let chapters = fields
        .maps("chapters")
        .iter()
        .map(fields_to_chapter)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid("chapters"))?;

    Ok(VideoRecord {
        id: video_id.clone(),
        title,
        streamed_at,
        duration_secs,
        video_path: video_path.into(),
        channel,
        chapters,
    })
}

/// `None` when `start` or `type` is missing or mistyped.
fn fields_to_chapter(f: &Fields<'_>) -> Option<Chapter> {
    Some(Chapter {
        start_secs: f.get("start")?,
        kind: f.get("type")?,
        title: f.opt_string("title"),
    })
}
