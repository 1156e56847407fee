//! Access token caching for Firestore requests.
//!
//! Tokens come from a `gcp_auth` service account, or are a fixed value when
//! talking to the emulator. Service-account tokens are refreshed ahead of
//! expiry under a write lock, so concurrent callers trigger one refresh.
//! A failed refresh falls back to the cached token while it is still valid.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

// =============================================================================
// Constants
// =============================================================================

/// Refresh this long before the provider-reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot convert.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for the Firestore REST API.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Bearer token accepted by the Firestore emulator.
pub const EMULATOR_TOKEN: &str = "owner";

// =============================================================================
// Token Cache
// =============================================================================

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Fixed(String),
}

/// Shared access token cache.
pub struct TokenCache {
    source: TokenSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(auth),
            cache: RwLock::new(None),
        }
    }

    /// Cache that always hands out `token`.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token.into()),
            cache: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Current access token, refreshing when close to expiry.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        let auth = match &self.source {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::Provider(auth) => auth,
        };

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let now = Utc::now();
                let expires_at = match (token.expires_at() - now).to_std() {
                    Ok(ttl) => Instant::now() + ttl,
                    // Already expired: force a refresh on the next request.
                    Err(_) if token.expires_at() <= now => Instant::now(),
                    Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                };
                let access_token = token.as_str().to_string();
                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore access token");
                Ok(access_token)
            }
            Err(e) => match cache.as_ref() {
                Some(cached) if cached.is_usable() => {
                    warn!("Firestore token refresh failed, reusing cached token: {}", e);
                    Ok(cached.access_token.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
