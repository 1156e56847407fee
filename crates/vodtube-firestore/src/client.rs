//! Firestore REST API client.
//!
//! - Cached service-account tokens, re-fetched once on `ACCESS_TOKEN_EXPIRED`
//! - Pooled HTTP client with request and connect timeouts
//! - Retries with exponential backoff for network, 429 and 5xx failures
//! - A tracing span and request metrics per call
//! - Emulator mode (`FIRESTORE_EMULATOR_HOST`) with plain HTTP and a fixed token

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::{TokenCache, EMULATOR_TOKEN};
use crate::types::{Document, ListDocumentsResponse, Value};

/// Page size used when listing a whole collection.
const LIST_PAGE_SIZE: u32 = 300;

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Usually "(default)"
    pub database_id: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
    /// `host:port` of a Firestore emulator. Disables service-account auth.
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let timeout_secs: u64 = std::env::var("FIRESTORE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
        })
    }

    /// Config for a local emulator (or a mock server in tests).
    pub fn emulator(host: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
            emulator_host: Some(host.into()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn documents_url(&self) -> String {
        let (scheme, host) = match &self.emulator_host {
            Some(host) => ("http", host.as_str()),
            None => ("https", "firestore.googleapis.com"),
        };
        format!(
            "{}://{}/v1/projects/{}/databases/{}/documents",
            scheme, host, self.project_id, self.database_id
        )
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let token_cache = match config.emulator_host {
            Some(_) => TokenCache::fixed(EMULATOR_TOKEN),
            None => TokenCache::new(Self::create_auth_provider()?),
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vodtube-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        Ok(Self {
            http,
            base_url: config.documents_url(),
            config,
            token_cache: Arc::new(token_cache),
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        )
    }

    fn mask_params(mask: &[String]) -> impl Iterator<Item = String> + '_ {
        mask.iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Fetch a document, `None` if it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);

        self.with_retry("get_document", || {
            self.execute_request("get_document", collection, Some(doc_id), async {
                let response = self.send(Method::GET, &url, None).await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::error_from_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Create a document. Fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.with_retry("create_document", || {
            self.execute_request("create_document", collection, Some(doc_id), async {
                let response = self.send(Method::POST, &url, Some(&body)).await?;
                match response.status() {
                    StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                    StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                        "{}/{}",
                        collection, doc_id
                    ))),
                    status => Err(Self::error_from_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Update fields of an existing document. Fails with `NotFound` if absent.
    ///
    /// With a mask, only the listed fields are written; fields in the mask
    /// but absent from `fields` are deleted.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = update_mask
            .as_deref()
            .map(|m| Self::mask_params(m).collect())
            .unwrap_or_default();
        params.push("currentDocument.exists=true".to_string());
        self.patch("update_document", collection, doc_id, fields, params)
            .await
    }

    /// Write a document, creating it if needed.
    pub async fn upsert_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        let params: Vec<String> = update_mask
            .as_deref()
            .map(|m| Self::mask_params(m).collect())
            .unwrap_or_default();
        self.patch("upsert_document", collection, doc_id, fields, params)
            .await
    }

    async fn patch(
        &self,
        operation: &'static str,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        params: Vec<String>,
    ) -> FirestoreResult<Document> {
        let mut url = self.document_url(collection, doc_id);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        let body = Document::new(fields);

        self.with_retry(operation, || {
            self.execute_request(operation, collection, Some(doc_id), async {
                let response = self.send(Method::PATCH, &url, Some(&body)).await?;
                match response.status() {
                    StatusCode::OK => Ok(response.json().await?),
                    StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!(
                        "{}/{}",
                        collection, doc_id
                    ))),
                    status => Err(Self::error_from_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_url(collection, doc_id);

        self.with_retry("delete_document", || {
            self.execute_request("delete_document", collection, Some(doc_id), async {
                let response = self.send(Method::DELETE, &url, None).await?;
                match response.status() {
                    StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                    StatusCode::NOT_FOUND => {
                        debug!("Document {}/{} already deleted", collection, doc_id);
                        Ok(())
                    }
                    status => Err(Self::error_from_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// List one page of a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let mut url = format!("{}/{}", self.base_url, collection);
        let mut params = Vec::new();
        if let Some(size) = page_size {
            params.push(format!("pageSize={}", size));
        }
        if let Some(token) = page_token {
            params.push(format!("pageToken={}", urlencoding::encode(token)));
        }
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        self.with_retry("list_documents", || {
            self.execute_request("list_documents", collection, None, async {
                let response = self.send(Method::GET, &url, None).await?;
                match response.status() {
                    StatusCode::OK => Ok(response.json().await?),
                    // Listing a collection under a missing parent is empty.
                    StatusCode::NOT_FOUND => Ok(ListDocumentsResponse::default()),
                    status => Err(Self::error_from_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Every document of a collection, following page tokens.
    pub async fn list_all(&self, collection: &str) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_documents(collection, Some(LIST_PAGE_SIZE), page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(documents),
            }
        }
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &'static str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send an authorized request, re-fetching the token once if it expired.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Document>,
    ) -> FirestoreResult<Response> {
        let token = self.token_cache.get_token().await?;
        let response = self.request(method.clone(), url, body, &token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&text) {
            return Err(FirestoreError::from_http_status(
                401,
                format!("{} failed: {}", url, text),
            ));
        }

        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(self.request(method, url, body, &token).send().await?)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Document>,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url).bearer_auth(token);
        match body {
            Some(doc) => builder.json(doc),
            None => builder,
        }
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &'static str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = doc_id.unwrap_or("")
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();
        match (status, retry_after_ms) {
            (StatusCode::TOO_MANY_REQUESTS, Some(ms)) => FirestoreError::RateLimited(ms),
            _ => FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
