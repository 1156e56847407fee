//! Remote video host capability.
//!
//! [`VideoHost`] is the surface the upload state machine talks to. A
//! [`HostConnector`] produces an authenticated host per attempt, so a
//! credential problem surfaces before any byte is sent.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use vodtube_models::UploadMetadata;

use crate::error::YoutubeResult;

/// Streamed media chunks.
pub type MediaStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// A media payload streamed from disk.
pub struct MediaBody {
    pub stream: MediaStream,
    /// Total payload size in bytes.
    pub content_length: u64,
    pub content_type: String,
}

impl MediaBody {
    pub fn new(stream: MediaStream, content_length: u64) -> Self {
        Self {
            stream,
            content_length,
            content_type: "video/*".to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl fmt::Debug for MediaBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBody")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Upload, metadata update and playlist membership on the remote host.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Create the remote video from `media`. Returns the remote video id.
    async fn insert_video(&self, metadata: &UploadMetadata, media: MediaBody)
        -> YoutubeResult<String>;

    /// Replace the title, description, category and tags of a remote video.
    async fn update_video_metadata(
        &self,
        video_id: &str,
        metadata: &UploadMetadata,
    ) -> YoutubeResult<()>;

    async fn add_video_to_playlist(&self, video_id: &str, playlist_id: &str) -> YoutubeResult<()>;
}

/// Produces an authenticated [`VideoHost`].
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(&self) -> YoutubeResult<Arc<dyn VideoHost>>;
}
