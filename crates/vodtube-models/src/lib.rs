//! Shared data models for vodtube.
//!
//! This crate provides Serde-serializable types for:
//! - Archived videos, channels and chapters
//! - Per-channel upload configuration and playlist mappings
//! - Upload records and their lifecycle
//! - The remote host credential
//!
//! It also holds the pure logic used during an upload: template rendering
//! ([`format`]), category matching ([`category`]) and playlist routing
//! ([`playlist`]).

pub mod category;
pub mod credential;
pub mod format;
pub mod playlist;
pub mod upload;
pub mod upload_config;
pub mod video;

// Re-export common types
pub use credential::RemoteCredential;
pub use format::TemplateFields;
pub use upload::{
    watch_url, TransitionError, UploadMetadata, UploadRecord, UploadStatus,
    UploadStatusParseError, WATCH_URL_BASE,
};
pub use upload_config::{
    ChannelUploadConfig, CreatePlaylistMappingInput, CreateUploadConfigInput, PlaylistMapping,
    PrivacyParseError, PrivacyStatus, UpdatePlaylistMappingInput, UpdateUploadConfigInput,
    DEFAULT_CATEGORY_ID,
};
pub use video::{Channel, ChannelId, Chapter, VideoId, VideoRecord};
