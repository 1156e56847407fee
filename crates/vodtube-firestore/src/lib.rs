//! Firestore REST API client and upload persistence.
//!
//! This crate provides:
//! - A Firestore REST client with token caching, retries and metrics
//! - Typed repositories for videos, upload configs, playlist mappings,
//!   upload records and the remote host credential
//! - The [`UploadStore`] and [`CredentialStore`] capabilities, backed by
//!   Firestore, plus an in-memory store behind the `test-util` feature

pub mod client;
pub mod credential_repo;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;
pub mod upload_config_repo;
pub mod upload_repo;
pub mod video_repo;

pub use client::{FirestoreClient, FirestoreConfig};
pub use credential_repo::CredentialRepository;
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryUploadStore;
pub use store::{CredentialStore, FirestoreUploadStore, UploadStore};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use upload_config_repo::UploadConfigRepository;
pub use upload_repo::UploadRepository;
pub use video_repo::VideoRepository;
