//! OAuth2 credential refresh for the remote host.
//!
//! The credential is a single shared record. Refresh reads it, and writes
//! back only when the access token is about to expire. Concurrent workers
//! may refresh at the same time; the last write wins, and every refreshed
//! token stays valid at the provider.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use tracing::{debug, info, warn};
use vodtube_firestore::CredentialStore;
use vodtube_models::RemoteCredential;

use crate::client::{YoutubeClient, YoutubeConfig};
use crate::error::{YoutubeError, YoutubeResult};
use crate::host::{HostConnector, VideoHost};
use crate::types::{OAuthErrorBody, TokenResponse};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Access token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// OAuth client settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    /// Refresh when the access token expires within this window.
    pub refresh_margin: Duration,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            refresh_margin: Duration::seconds(60),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> YoutubeResult<Self> {
        let client_id = std::env::var("YOUTUBE_CLIENT_ID")
            .map_err(|_| YoutubeError::config("YOUTUBE_CLIENT_ID not set"))?;
        let client_secret = std::env::var("YOUTUBE_CLIENT_SECRET")
            .map_err(|_| YoutubeError::config("YOUTUBE_CLIENT_SECRET not set"))?;

        let mut config = Self::new(client_id, client_secret);
        if let Ok(url) = std::env::var("YOUTUBE_TOKEN_URL") {
            config.token_url = url;
        }
        Ok(config)
    }
}

/// Loads the stored credential, refreshes it when needed and hands out
/// authenticated [`YoutubeClient`]s.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    oauth: OAuthConfig,
    youtube: YoutubeConfig,
    http: Client,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        oauth: OAuthConfig,
        youtube: YoutubeConfig,
    ) -> YoutubeResult<Self> {
        let http = youtube.build_http_client()?;
        Ok(Self {
            store,
            oauth,
            youtube,
            http,
        })
    }

    /// A credential whose access token is usable now.
    ///
    /// A failed refresh falls back to the stored token while it has not
    /// expired yet.
    pub async fn credential(&self) -> YoutubeResult<RemoteCredential> {
        let current = self
            .store
            .load_credential()
            .await?
            .ok_or(YoutubeError::MissingCredential)?;

        if !current.expires_within(self.oauth.refresh_margin) {
            return Ok(current);
        }

        match self.refresh(&current).await {
            Ok(refreshed) => {
                if let Err(e) = self.store.save_credential(&refreshed).await {
                    warn!(error = %e, "Failed to persist refreshed credential");
                }
                Ok(refreshed)
            }
            Err(e) if !current.is_expired() => {
                warn!(error = %e, expiry = %current.expiry, "Token refresh failed, using current token");
                Ok(current)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self, current: &RemoteCredential) -> YoutubeResult<RemoteCredential> {
        if current.refresh_token.is_empty() {
            return Err(YoutubeError::refresh_failed("credential has no refresh token"));
        }

        debug!(token_url = %self.oauth.token_url, "Refreshing access token");

        let response = self
            .http
            .post(&self.oauth.token_url)
            .timeout(self.youtube.timeout)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| YoutubeError::refresh_failed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| YoutubeError::refresh_failed(e.to_string()))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}", status.as_u16()),
            };
            return Err(YoutubeError::refresh_failed(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| YoutubeError::refresh_failed(format!("invalid token response: {}", e)))?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let refreshed = RemoteCredential {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
            token_type: token
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.token_type.clone()),
            expiry: Utc::now() + Duration::seconds(expires_in),
            updated_at: Utc::now(),
        };

        info!(expiry = %refreshed.expiry, "Access token refreshed");
        Ok(refreshed)
    }
}

#[async_trait]
impl HostConnector for CredentialManager {
    async fn connect(&self) -> YoutubeResult<Arc<dyn VideoHost>> {
        let credential = self.credential().await?;
        Ok(Arc::new(YoutubeClient::new(
            self.http.clone(),
            self.youtube.clone(),
            credential.authorization(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_oauth_config_requires_client_credentials() {
        std::env::remove_var("YOUTUBE_CLIENT_ID");
        std::env::remove_var("YOUTUBE_CLIENT_SECRET");
        assert!(matches!(OAuthConfig::from_env(), Err(YoutubeError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_oauth_config_token_url_override() {
        std::env::set_var("YOUTUBE_CLIENT_ID", "id");
        std::env::set_var("YOUTUBE_CLIENT_SECRET", "secret");
        std::env::set_var("YOUTUBE_TOKEN_URL", "http://localhost:9999/token");

        let config = OAuthConfig::from_env().unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.token_url, "http://localhost:9999/token");

        std::env::remove_var("YOUTUBE_CLIENT_ID");
        std::env::remove_var("YOUTUBE_CLIENT_SECRET");
        std::env::remove_var("YOUTUBE_TOKEN_URL");
    }

    #[test]
    fn test_default_token_url() {
        assert_eq!(OAuthConfig::new("a", "b").token_url, DEFAULT_TOKEN_URL);
    }
}
