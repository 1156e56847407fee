//! Streaming upload of a local file with progress reporting.
//!
//! The file is never loaded into memory: it is read in chunks through a
//! [`ProgressReader`] and handed to the host as a byte stream.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use vodtube_models::UploadMetadata;

use crate::error::{YoutubeError, YoutubeResult};
use crate::host::{MediaBody, VideoHost};

/// Read size used when streaming the file.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;
type CompleteFn = Box<dyn FnOnce(&str) + Send>;
type ErrorFn = Box<dyn FnOnce(&YoutubeError) + Send>;

/// Wraps a reader and reports cumulative bytes read after every read.
pub struct ProgressReader<R> {
    inner: R,
    read: u64,
    total: u64,
    on_progress: Option<ProgressFn>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, on_progress: Option<ProgressFn>) -> Self {
        Self {
            inner,
            read: 0,
            total,
            on_progress,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = poll {
            let n = (buf.filled().len() - before) as u64;
            if n > 0 {
                self.read += n;
                if let Some(on_progress) = &self.on_progress {
                    on_progress(self.read, self.total);
                }
            }
        }

        poll
    }
}

/// One upload of a local file to a [`VideoHost`].
///
/// Callbacks are optional. On success `on_complete` runs once with the
/// remote id; on failure `on_error` runs once with the cause. Never both.
pub struct ResumableTransfer {
    path: PathBuf,
    metadata: UploadMetadata,
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl ResumableTransfer {
    pub fn new(path: impl Into<PathBuf>, metadata: UploadMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
            on_progress: None,
            on_complete: None,
            on_error: None,
        }
    }

    pub fn on_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce(&str) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&YoutubeError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Stream the file to `host`. Returns the remote video id.
    pub async fn run(self, host: &dyn VideoHost) -> YoutubeResult<String> {
        let Self {
            path,
            metadata,
            on_progress,
            on_complete,
            on_error,
        } = self;

        let result = send_file(host, &path, &metadata, on_progress).await;

        match &result {
            Ok(remote_id) => {
                info!(path = %path.display(), remote_video_id = %remote_id, "Transfer complete");
                if let Some(on_complete) = on_complete {
                    on_complete(remote_id);
                }
            }
            Err(e) => {
                if let Some(on_error) = on_error {
                    on_error(e);
                }
            }
        }

        result
    }
}

async fn send_file(
    host: &dyn VideoHost,
    path: &Path,
    metadata: &UploadMetadata,
    on_progress: Option<ProgressFn>,
) -> YoutubeResult<String> {
    let file = File::open(path).await?;
    let total = file.metadata().await?.len();
    debug!(path = %path.display(), bytes = total, "Starting transfer");

    let reader = ProgressReader::new(file, total, on_progress);
    let stream = ReaderStream::with_capacity(reader, CHUNK_SIZE);
    let media = MediaBody::new(Box::pin(stream), total).with_content_type(content_type_for(path));

    host.insert_video(metadata, media).await
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("ts") => "video/mp2t",
        Some("flv") => "video/x-flv",
        _ => "video/*",
    }
}
