//! Archived video (VOD) models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for an archived video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the source channel a video was archived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Source channel of an archived video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Channel {
    pub id: ChannelId,
    /// Human-readable channel name, used as `{channel}` in templates.
    pub display_name: String,
}

/// A chapter marker inside an archived video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    /// Offset from the start of the video, in seconds.
    pub start_secs: u64,

    /// Category of the segment (e.g. the game being played).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Optional human title for the chapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Chapter {
    pub fn new(start_secs: u64, kind: impl Into<String>) -> Self {
        Self {
            start_secs,
            kind: kind.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Label shown in the description chapter block.
    ///
    /// The title wins when present and non-empty, otherwise the category.
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => &self.kind,
        }
    }
}

/// An archived video eligible for upload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub id: VideoId,

    pub title: String,

    /// When the original broadcast started.
    pub streamed_at: DateTime<Utc>,

    /// Length in whole seconds.
    #[serde(default)]
    pub duration_secs: u64,

    /// Local filesystem path of the media file.
    #[schemars(with = "String")]
    pub video_path: PathBuf,

    pub channel: Channel,

    /// Chapters in chronological order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl VideoRecord {
    pub fn has_chapters(&self) -> bool {
        !self.chapters.is_empty()
    }
}
