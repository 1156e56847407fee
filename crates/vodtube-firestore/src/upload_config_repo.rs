//! Upload configuration and playlist mapping repository.
//!
//! Layout:
//! - `upload_configs/{channel_id}`: one config per channel
//! - `upload_configs/{channel_id}/playlist_mappings/{mapping_id}`: its mappings
//!
//! Mappings are returned ordered by descending priority. Equal priorities
//! keep creation order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;
use validator::Validate;

use vodtube_models::playlist::sort_by_priority;
use vodtube_models::{
    ChannelId, ChannelUploadConfig, CreatePlaylistMappingInput, CreateUploadConfigInput,
    PlaylistMapping, PrivacyStatus, UpdatePlaylistMappingInput, UpdateUploadConfigInput,
    DEFAULT_CATEGORY_ID,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

pub const UPLOAD_CONFIGS_COLLECTION: &str = "upload_configs";
const MAPPINGS_SUBCOLLECTION: &str = "playlist_mappings";

const CONFIG_FIELDS: &[&str] = &[
    "upload_enabled",
    "default_privacy",
    "default_category_id",
    "title_template",
    "description_template",
    "tags",
    "add_chapters",
    "notify_subscribers",
    "dedup_playlist_ids",
    "updated_at",
];

pub struct UploadConfigRepository {
    client: FirestoreClient,
}

impl UploadConfigRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn mappings_collection(channel_id: &ChannelId) -> String {
        format!(
            "{}/{}/{}",
            UPLOAD_CONFIGS_COLLECTION,
            urlencoding::encode(channel_id.as_str()),
            MAPPINGS_SUBCOLLECTION
        )
    }

    // =========================================================================
    // Config
    // =========================================================================

    /// Config for a channel with its mappings in priority order.
    pub async fn get(&self, channel_id: &ChannelId) -> FirestoreResult<Option<ChannelUploadConfig>> {
        let Some(doc) = self
            .client
            .get_document(UPLOAD_CONFIGS_COLLECTION, channel_id.as_str())
            .await?
        else {
            return Ok(None);
        };

        let mut config = document_to_config(&doc, channel_id)?;
        config.playlist_mappings = self.list_mappings(channel_id).await?;
        Ok(Some(config))
    }

    pub async fn create(
        &self,
        channel_id: &ChannelId,
        input: CreateUploadConfigInput,
    ) -> FirestoreResult<ChannelUploadConfig> {
        input
            .validate()
            .map_err(|e| FirestoreError::invalid_input(e.to_string()))?;

        let config = ChannelUploadConfig::from_input(channel_id.clone(), input);
        self.client
            .create_document(
                UPLOAD_CONFIGS_COLLECTION,
                channel_id.as_str(),
                config_to_fields(&config),
            )
            .await?;
        info!(channel_id = %channel_id, "Created upload config");
        Ok(config)
    }

    /// Apply a partial update. Fails with `NotFound` if there is no config.
    pub async fn update(
        &self,
        channel_id: &ChannelId,
        input: UpdateUploadConfigInput,
    ) -> FirestoreResult<ChannelUploadConfig> {
        input
            .validate()
            .map_err(|e| FirestoreError::invalid_input(e.to_string()))?;

        let mut config = self
            .get(channel_id)
            .await?
            .ok_or_else(|| not_found_config(channel_id))?;
        config.apply(input);

        let mut fields = config_to_fields(&config);
        fields.retain(|k, _| CONFIG_FIELDS.contains(&k.as_str()));
        self.client
            .update_document(
                UPLOAD_CONFIGS_COLLECTION,
                channel_id.as_str(),
                fields,
                Some(CONFIG_FIELDS.iter().map(|s| s.to_string()).collect()),
            )
            .await?;
        info!(channel_id = %channel_id, "Updated upload config");
        Ok(config)
    }

    /// Delete a config and its mappings.
    pub async fn delete(&self, channel_id: &ChannelId) -> FirestoreResult<()> {
        let collection = Self::mappings_collection(channel_id);
        for doc in self.client.list_all(&collection).await? {
            if let Some(id) = doc.id() {
                self.client.delete_document(&collection, id).await?;
            }
        }
        self.client
            .delete_document(UPLOAD_CONFIGS_COLLECTION, channel_id.as_str())
            .await?;
        info!(channel_id = %channel_id, "Deleted upload config");
        Ok(())
    }

    // =========================================================================
    // Playlist mappings
    // =========================================================================

    pub async fn list_mappings(&self, channel_id: &ChannelId) -> FirestoreResult<Vec<PlaylistMapping>> {
        let docs = self
            .client
            .list_all(&Self::mappings_collection(channel_id))
            .await?;

        let mut entries = docs
            .iter()
            .map(document_to_mapping)
            .collect::<FirestoreResult<Vec<_>>>()?;
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));

        let mut mappings: Vec<PlaylistMapping> = entries.into_iter().map(|(m, _)| m).collect();
        sort_by_priority(&mut mappings);
        Ok(mappings)
    }

    pub async fn create_mapping(
        &self,
        channel_id: &ChannelId,
        input: CreatePlaylistMappingInput,
    ) -> FirestoreResult<PlaylistMapping> {
        input
            .validate()
            .map_err(|e| FirestoreError::invalid_input(e.to_string()))?;

        if self
            .client
            .get_document(UPLOAD_CONFIGS_COLLECTION, channel_id.as_str())
            .await?
            .is_none()
        {
            return Err(not_found_config(channel_id));
        }

        let mapping = PlaylistMapping::from_input(input);
        self.client
            .create_document(
                &Self::mappings_collection(channel_id),
                &mapping.id,
                mapping_to_fields(&mapping, Utc::now()),
            )
            .await?;
        info!(
            channel_id = %channel_id,
            mapping_id = %mapping.id,
            pattern = %mapping.category_pattern,
            "Created playlist mapping"
        );
        Ok(mapping)
    }

    pub async fn update_mapping(
        &self,
        channel_id: &ChannelId,
        mapping_id: &str,
        input: UpdatePlaylistMappingInput,
    ) -> FirestoreResult<PlaylistMapping> {
        input
            .validate()
            .map_err(|e| FirestoreError::invalid_input(e.to_string()))?;

        let collection = Self::mappings_collection(channel_id);
        let doc = self
            .client
            .get_document(&collection, mapping_id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", collection, mapping_id)))?;

        let (mut mapping, created_at) = document_to_mapping(&doc)?;
        mapping.apply(input);

        self.client
            .update_document(
                &collection,
                mapping_id,
                mapping_to_fields(&mapping, created_at),
                None,
            )
            .await?;
        Ok(mapping)
    }

    pub async fn delete_mapping(&self, channel_id: &ChannelId, mapping_id: &str) -> FirestoreResult<()> {
        self.client
            .delete_document(&Self::mappings_collection(channel_id), mapping_id)
            .await
    }
}

fn not_found_config(channel_id: &ChannelId) -> FirestoreError {
    FirestoreError::not_found(format!("{}/{}", UPLOAD_CONFIGS_COLLECTION, channel_id))
}

fn config_to_fields(config: &ChannelUploadConfig) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("upload_enabled".to_string(), config.upload_enabled.to_firestore_value());
    fields.insert(
        "default_privacy".to_string(),
        config.default_privacy.as_str().to_firestore_value(),
    );
    fields.insert(
        "default_category_id".to_string(),
        config.default_category_id.to_firestore_value(),
    );
    fields.insert("title_template".to_string(), config.title_template.to_firestore_value());
    fields.insert(
        "description_template".to_string(),
        config.description_template.to_firestore_value(),
    );
    fields.insert("tags".to_string(), config.tags.to_firestore_value());
    fields.insert("add_chapters".to_string(), config.add_chapters.to_firestore_value());
    fields.insert(
        "notify_subscribers".to_string(),
        config.notify_subscribers.to_firestore_value(),
    );
    fields.insert(
        "dedup_playlist_ids".to_string(),
        config.dedup_playlist_ids.to_firestore_value(),
    );
    fields.insert("created_at".to_string(), config.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), config.updated_at.to_firestore_value());
    fields
}

fn document_to_config(doc: &Document, channel_id: &ChannelId) -> FirestoreResult<ChannelUploadConfig> {
    let f = doc.view()?;

    let default_privacy = match f.opt_string("default_privacy") {
        Some(s) => s
            .parse::<PrivacyStatus>()
            .map_err(|e| FirestoreError::SerializationError(e.to_string()))?,
        None => PrivacyStatus::default(),
    };

    Ok(ChannelUploadConfig {
        channel_id: channel_id.clone(),
        upload_enabled: f.get_or("upload_enabled", false),
        default_privacy,
        default_category_id: f
            .opt_string("default_category_id")
            .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
        title_template: f.opt_string("title_template"),
        description_template: f.opt_string("description_template"),
        tags: f.get_or("tags", Vec::new()),
        add_chapters: f.get_or("add_chapters", true),
        notify_subscribers: f.get_or("notify_subscribers", false),
        dedup_playlist_ids: f.get_or("dedup_playlist_ids", false),
        playlist_mappings: Vec::new(),
        created_at: f.timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: f.timestamp("updated_at").unwrap_or_else(Utc::now),
    })
}

fn mapping_to_fields(mapping: &PlaylistMapping, created_at: DateTime<Utc>) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "category_pattern".to_string(),
        mapping.category_pattern.to_firestore_value(),
    );
    fields.insert("playlist_id".to_string(), mapping.playlist_id.to_firestore_value());
    fields.insert("playlist_name".to_string(), mapping.playlist_name.to_firestore_value());
    fields.insert("priority".to_string(), mapping.priority.to_firestore_value());
    fields.insert("created_at".to_string(), created_at.to_firestore_value());
    fields
}

fn document_to_mapping(doc: &Document) -> FirestoreResult<(PlaylistMapping, DateTime<Utc>)> {
    let f = doc.view()?;
    let id = doc
        .id()
        .ok_or_else(|| FirestoreError::invalid_response("Mapping document has no name"))?;

    let mapping = PlaylistMapping {
        id: id.to_string(),
        category_pattern: f.require("category_pattern")?,
        playlist_id: f.require("playlist_id")?,
        playlist_name: f.opt_string("playlist_name"),
        priority: f.get_or("priority", 0i32),
    };
    let created_at = f.timestamp("created_at").unwrap_or(DateTime::<Utc>::MIN_UTC);
    Ok((mapping, created_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_fields_roundtrip() {
        let mut config = ChannelUploadConfig::new(ChannelId::from("chan-1"))
            .enabled()
            .with_templates(Some("{title}"), None::<String>);
        config.default_privacy = PrivacyStatus::Unlisted;
        config.tags = vec!["vod".into(), "gaming".into()];

        let doc = Document::new(config_to_fields(&config));
        let loaded = document_to_config(&doc, &config.channel_id).unwrap();

        assert!(loaded.upload_enabled);
        assert_eq!(loaded.default_privacy, PrivacyStatus::Unlisted);
        assert_eq!(loaded.default_category_id, "20");
        assert_eq!(loaded.title_template.as_deref(), Some("{title}"));
        assert_eq!(loaded.description_template, None);
        assert_eq!(loaded.tags, vec!["vod", "gaming"]);
        assert!(loaded.add_chapters);
    }

    #[test]
    fn test_sparse_config_document_uses_defaults() {
        let doc = Document::new(HashMap::new());
        let config = document_to_config(&doc, &ChannelId::from("chan-1")).unwrap();
        assert!(!config.upload_enabled);
        assert_eq!(config.default_privacy, PrivacyStatus::Private);
        assert_eq!(config.default_category_id, "20");
        assert!(config.add_chapters);
        assert!(!config.notify_subscribers);
    }

    #[test]
    fn test_unknown_privacy_is_rejected() {
        let mut fields = HashMap::new();
        fields.insert("default_privacy".to_string(), "secret".to_firestore_value());
        let doc = Document::new(fields);
        assert!(matches!(
            document_to_config(&doc, &ChannelId::from("chan-1")),
            Err(FirestoreError::SerializationError(_))
        ));
    }

    #[test]
    fn test_mapping_document_reads_name_as_id() {
        let mapping = PlaylistMapping::new("val*", "PL1").with_priority(4);
        let mut doc = Document::new(mapping_to_fields(&mapping, Utc::now()));
        doc.name = Some(format!(
            "projects/p/databases/(default)/documents/upload_configs/chan-1/playlist_mappings/{}",
            mapping.id
        ));

        let (loaded, _) = document_to_mapping(&doc).unwrap();
        assert_eq!(loaded, mapping);
    }
}
