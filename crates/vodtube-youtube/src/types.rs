//! YouTube Data API v3 wire types.

use serde::{Deserialize, Serialize};
use vodtube_models::UploadMetadata;

/// `videos` resource (the parts this crate sends and reads).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: String,
    pub self_declared_made_for_kids: bool,
}

impl VideoSnippet {
    pub fn from_metadata(metadata: &UploadMetadata) -> Self {
        Self {
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            category_id: metadata.category_id.clone(),
            tags: metadata.tags.clone(),
        }
    }
}

impl VideoResource {
    /// Body of a new upload: snippet plus status. Uploads never declare
    /// made-for-kids content.
    pub fn for_insert(metadata: &UploadMetadata) -> Self {
        Self {
            id: None,
            snippet: Some(VideoSnippet::from_metadata(metadata)),
            status: Some(VideoStatus {
                privacy_status: metadata.privacy.as_str().to_string(),
                self_declared_made_for_kids: false,
            }),
        }
    }

    /// Body of a snippet-only update of an existing video.
    pub fn for_snippet_update(video_id: &str, metadata: &UploadMetadata) -> Self {
        Self {
            id: Some(video_id.to_string()),
            snippet: Some(VideoSnippet::from_metadata(metadata)),
            status: None,
        }
    }
}

/// `playlistItems` resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItemResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub playlist_id: String,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub video_id: String,
}

impl PlaylistItemResource {
    pub fn video(playlist_id: &str, video_id: &str) -> Self {
        Self {
            id: None,
            snippet: PlaylistItemSnippet {
                playlist_id: playlist_id.to_string(),
                resource_id: ResourceId {
                    kind: "youtube#video".to_string(),
                    video_id: video_id.to_string(),
                },
            },
        }
    }
}

/// OAuth2 token endpoint response for a refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// OAuth2 error body (`{"error": "invalid_grant", ...}`).
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
