//! YouTube Data API v3 client.
//!
//! Videos are created with the resumable upload protocol: an initial
//! metadata POST opens an upload session (returned in `Location`), then the
//! media is streamed to the session URL in a single PUT.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Response};
use tracing::{debug, info};
use url::Url;
use vodtube_models::UploadMetadata;

use crate::error::{YoutubeError, YoutubeResult};
use crate::host::{MediaBody, VideoHost};
use crate::types::{ApiErrorEnvelope, PlaylistItemResource, VideoResource};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com";

// =============================================================================
// Configuration
// =============================================================================

/// YouTube endpoint configuration.
#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub api_base: String,
    pub upload_base: String,
    /// Timeout for metadata calls. Media transfers are not bounded here.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl YoutubeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> YoutubeResult<Self> {
        let defaults = Self::default();

        let api_base = std::env::var("YOUTUBE_API_BASE").unwrap_or(defaults.api_base);
        let upload_base = std::env::var("YOUTUBE_UPLOAD_BASE").unwrap_or(defaults.upload_base);
        for base in [&api_base, &upload_base] {
            Url::parse(base)
                .map_err(|e| YoutubeError::config(format!("invalid base URL {}: {}", base, e)))?;
        }

        let timeout_secs: u64 = std::env::var("YOUTUBE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let connect_timeout_secs: u64 = std::env::var("YOUTUBE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }

    /// Config pointing both endpoints at `base` (a mock server in tests).
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            upload_base: base,
            ..Self::default()
        }
    }

    /// Shared HTTP client for API and token calls.
    pub fn build_http_client(&self) -> YoutubeResult<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vodtube-youtube/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(YoutubeError::Network)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Authenticated YouTube client.
#[derive(Clone)]
pub struct YoutubeClient {
    http: Client,
    config: YoutubeConfig,
    authorization: String,
}

impl YoutubeClient {
    /// `authorization` is the full header value, e.g. `Bearer ya29...`.
    pub fn new(http: Client, config: YoutubeConfig, authorization: impl Into<String>) -> Self {
        Self {
            http,
            config,
            authorization: authorization.into(),
        }
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/youtube/v3/{}", self.config.api_base, resource)
    }

    /// Open a resumable upload session. Returns the session URL.
    async fn start_upload_session(
        &self,
        metadata: &UploadMetadata,
        media: &MediaBody,
    ) -> YoutubeResult<Url> {
        let url = format!("{}/upload/youtube/v3/videos", self.config.upload_base);

        let mut query = vec![("uploadType", "resumable"), ("part", "snippet,status")];
        if !metadata.notify_subscribers {
            query.push(("notifySubscribers", "false"));
        }

        let response = self
            .http
            .post(&url)
            .query(&query)
            .header(AUTHORIZATION, &self.authorization)
            .header("X-Upload-Content-Length", media.content_length)
            .header("X-Upload-Content-Type", media.content_type.as_str())
            .timeout(self.config.timeout)
            .json(&VideoResource::for_insert(metadata))
            .send()
            .await?;

        let response = check_response(response).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(YoutubeError::UploadSessionMissing)?;

        Url::parse(location)
            .map_err(|e| YoutubeError::invalid_response(format!("bad session URL: {}", e)))
    }
}

#[async_trait]
impl VideoHost for YoutubeClient {
    async fn insert_video(
        &self,
        metadata: &UploadMetadata,
        media: MediaBody,
    ) -> YoutubeResult<String> {
        let session = self.start_upload_session(metadata, &media).await?;
        debug!(bytes = media.content_length, "Opened resumable upload session");

        let response = self
            .http
            .put(session)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_LENGTH, media.content_length)
            .header(CONTENT_TYPE, media.content_type.as_str())
            .body(reqwest::Body::wrap_stream(media.stream))
            .send()
            .await?;

        let video: VideoResource = check_response(response).await?.json().await?;
        let video_id = video
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| YoutubeError::invalid_response("insert response has no video id"))?;

        info!(remote_video_id = %video_id, "Video inserted");
        Ok(video_id)
    }

    async fn update_video_metadata(
        &self,
        video_id: &str,
        metadata: &UploadMetadata,
    ) -> YoutubeResult<()> {
        let response = self
            .http
            .put(self.api_url("videos"))
            .query(&[("part", "snippet")])
            .header(AUTHORIZATION, &self.authorization)
            .timeout(self.config.timeout)
            .json(&VideoResource::for_snippet_update(video_id, metadata))
            .send()
            .await?;

        check_response(response).await?;
        debug!(remote_video_id = %video_id, "Video snippet updated");
        Ok(())
    }

    async fn add_video_to_playlist(&self, video_id: &str, playlist_id: &str) -> YoutubeResult<()> {
        let response = self
            .http
            .post(self.api_url("playlistItems"))
            .query(&[("part", "snippet")])
            .header(AUTHORIZATION, &self.authorization)
            .timeout(self.config.timeout)
            .json(&PlaylistItemResource::video(playlist_id, video_id))
            .send()
            .await?;

        check_response(response).await?;
        debug!(remote_video_id = %video_id, playlist_id = %playlist_id, "Added to playlist");
        Ok(())
    }
}

/// Pass through 2xx responses; turn anything else into [`YoutubeError::Api`].
async fn check_response(response: Response) -> YoutubeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);

    Err(YoutubeError::api(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        std::env::remove_var("YOUTUBE_API_BASE");
        std::env::remove_var("YOUTUBE_UPLOAD_BASE");
        std::env::set_var("YOUTUBE_TIMEOUT_SECS", "not-a-number");

        let config = YoutubeConfig::from_env().unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.upload_base, DEFAULT_UPLOAD_BASE);
        assert_eq!(config.timeout, Duration::from_secs(30));

        std::env::remove_var("YOUTUBE_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_config_rejects_invalid_base() {
        std::env::set_var("YOUTUBE_API_BASE", "not a url");
        assert!(matches!(
            YoutubeConfig::from_env(),
            Err(YoutubeError::Config(_))
        ));
        std::env::remove_var("YOUTUBE_API_BASE");
    }

    #[test]
    #[serial]
    fn test_config_trims_trailing_slash() {
        std::env::set_var("YOUTUBE_UPLOAD_BASE", "http://localhost:9000/");
        let config = YoutubeConfig::from_env().unwrap();
        assert_eq!(config.upload_base, "http://localhost:9000");
        std::env::remove_var("YOUTUBE_UPLOAD_BASE");
    }
}
