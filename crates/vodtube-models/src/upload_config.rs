//! Per-channel upload configuration and playlist mappings.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::video::ChannelId;

/// Default YouTube category ("Gaming").
pub const DEFAULT_CATEGORY_ID: &str = "20";

/// Visibility of an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub const ALL: &'static [PrivacyStatus] = &[
        PrivacyStatus::Private,
        PrivacyStatus::Unlisted,
        PrivacyStatus::Public,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = PrivacyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "public" => Ok(PrivacyStatus::Public),
            _ => Err(PrivacyParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown privacy status: {0}")]
pub struct PrivacyParseError(String);

/// Routes videos with a matching chapter category to a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlaylistMapping {
    pub id: String,

    /// Category pattern, optionally containing a single `*` wildcard.
    pub category_pattern: String,

    pub playlist_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,

    /// Higher values are evaluated first.
    #[serde(default)]
    pub priority: i32,
}

impl PlaylistMapping {
    pub fn new(category_pattern: impl Into<String>, playlist_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_pattern: category_pattern.into(),
            playlist_id: playlist_id.into(),
            playlist_name: None,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.playlist_name = Some(name.into());
        self
    }

    pub fn from_input(input: CreatePlaylistMappingInput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_pattern: input.category_pattern,
            playlist_id: input.playlist_id,
            playlist_name: input.playlist_name,
            priority: input.priority.unwrap_or(0),
        }
    }

    /// Apply a partial update. Absent fields keep their value.
    pub fn apply(&mut self, input: UpdatePlaylistMappingInput) {
        if let Some(pattern) = input.category_pattern {
            self.category_pattern = pattern;
        }
        if let Some(playlist_id) = input.playlist_id {
            self.playlist_id = playlist_id;
        }
        if let Some(name) = input.playlist_name {
            self.playlist_name = Some(name);
        }
        if let Some(priority) = input.priority {
            self.priority = priority;
        }
    }
}

/// Upload settings for one source channel.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChannelUploadConfig {
    pub channel_id: ChannelId,

    /// Uploads are skipped unless this is set.
    #[serde(default)]
    pub upload_enabled: bool,

    #[serde(default)]
    pub default_privacy: PrivacyStatus,

    #[serde(default = "default_category_id")]
    pub default_category_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_template: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Append a chapter block to the description after upload.
    #[serde(default = "default_true")]
    pub add_chapters: bool,

    #[serde(default)]
    pub notify_subscribers: bool,

    /// Collapse repeated playlist ids before adding to playlists.
    #[serde(default)]
    pub dedup_playlist_ids: bool,

    /// Ordered by descending priority when loaded from the store.
    #[serde(default)]
    pub playlist_mappings: Vec<PlaylistMapping>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

fn default_category_id() -> String {
    DEFAULT_CATEGORY_ID.to_string()
}

fn default_true() -> bool {
    true
}

impl ChannelUploadConfig {
    /// Create a config with defaults: disabled, private, gaming category.
    pub fn new(channel_id: ChannelId) -> Self {
        let now = Utc::now();
        Self {
            channel_id,
            upload_enabled: false,
            default_privacy: PrivacyStatus::Private,
            default_category_id: default_category_id(),
            title_template: None,
            description_template: None,
            tags: Vec::new(),
            add_chapters: true,
            notify_subscribers: false,
            dedup_playlist_ids: false,
            playlist_mappings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn enabled(mut self) -> Self {
        self.upload_enabled = true;
        self
    }

    pub fn with_templates(
        mut self,
        title: Option<impl Into<String>>,
        description: Option<impl Into<String>>,
    ) -> Self {
        self.title_template = title.map(Into::into);
        self.description_template = description.map(Into::into);
        self
    }

    pub fn with_mappings(mut self, mappings: Vec<PlaylistMapping>) -> Self {
        self.playlist_mappings = mappings;
        self
    }

    pub fn from_input(channel_id: ChannelId, input: CreateUploadConfigInput) -> Self {
        let mut config = Self::new(channel_id);
        config.upload_enabled = input.upload_enabled.unwrap_or(false);
        config.default_privacy = input.default_privacy.unwrap_or_default();
        if let Some(category) = input.default_category_id {
            config.default_category_id = category;
        }
        config.title_template = input.title_template;
        config.description_template = input.description_template;
        config.tags = input.tags.unwrap_or_default();
        config.add_chapters = input.add_chapters.unwrap_or(true);
        config.notify_subscribers = input.notify_subscribers.unwrap_or(false);
        config.dedup_playlist_ids = input.dedup_playlist_ids.unwrap_or(false);
        config
    }

    /// Apply a partial update. Absent fields keep their value.
    pub fn apply(&mut self, input: UpdateUploadConfigInput) {
        if let Some(v) = input.upload_enabled {
            self.upload_enabled = v;
        }
        if let Some(v) = input.default_privacy {
            self.default_privacy = v;
        }
        if let Some(v) = input.default_category_id {
            self.default_category_id = v;
        }
        if let Some(v) = input.title_template {
            self.title_template = Some(v);
        }
        if let Some(v) = input.description_template {
            self.description_template = Some(v);
        }
        if let Some(v) = input.tags {
            self.tags = v;
        }
        if let Some(v) = input.add_chapters {
            self.add_chapters = v;
        }
        if let Some(v) = input.notify_subscribers {
            self.notify_subscribers = v;
        }
        if let Some(v) = input.dedup_playlist_ids {
            self.dedup_playlist_ids = v;
        }
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Admin inputs
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CreateUploadConfigInput {
    pub upload_enabled: Option<bool>,
    pub default_privacy: Option<PrivacyStatus>,
    #[validate(length(min = 1, max = 8))]
    pub default_category_id: Option<String>,
    pub title_template: Option<String>,
    pub description_template: Option<String>,
    pub tags: Option<Vec<String>>,
    pub add_chapters: Option<bool>,
    pub notify_subscribers: Option<bool>,
    pub dedup_playlist_ids: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, Validate)]
pub struct UpdateUploadConfigInput {
    pub upload_enabled: Option<bool>,
    pub default_privacy: Option<PrivacyStatus>,
    #[validate(length(min = 1, max = 8))]
    pub default_category_id: Option<String>,
    pub title_template: Option<String>,
    pub description_template: Option<String>,
    pub tags: Option<Vec<String>>,
    pub add_chapters: Option<bool>,
    pub notify_subscribers: Option<bool>,
    pub dedup_playlist_ids: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CreatePlaylistMappingInput {
    #[validate(length(min = 1, max = 200))]
    pub category_pattern: String,
    #[validate(length(min = 1))]
    pub playlist_id: String,
    pub playlist_name: Option<String>,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, Validate)]
pub struct UpdatePlaylistMappingInput {
    #[validate(length(min = 1, max = 200))]
    pub category_pattern: Option<String>,
    #[validate(length(min = 1))]
    pub playlist_id: Option<String>,
    pub playlist_name: Option<String>,
    pub priority: Option<i32>,
}
