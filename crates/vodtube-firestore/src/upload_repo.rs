//! Upload record repository (`uploads/{video_id}`).

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use vodtube_models::{UploadRecord, UploadStatus, VideoId};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

pub const UPLOADS_COLLECTION: &str = "uploads";

pub struct UploadRepository {
    client: FirestoreClient,
}

impl UploadRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<UploadRecord>> {
        self.client
            .get_document(UPLOADS_COLLECTION, video_id.as_str())
            .await?
            .map(|doc| document_to_upload(&doc, video_id))
            .transpose()
    }

    /// Existing record, or a new `pending` one.
    ///
    /// A concurrent create for the same video resolves to the stored record.
    pub async fn get_or_create(&self, video_id: &VideoId) -> FirestoreResult<UploadRecord> {
        if let Some(record) = self.get(video_id).await? {
            return Ok(record);
        }

        let record = UploadRecord::new(video_id.clone());
        match self
            .client
            .create_document(UPLOADS_COLLECTION, video_id.as_str(), upload_to_fields(&record))
            .await
        {
            Ok(_) => {
                info!(video_id = %video_id, "Created upload record");
                Ok(record)
            }
            Err(FirestoreError::AlreadyExists(_)) => {
                debug!(video_id = %video_id, "Upload record created concurrently");
                self.get(video_id)
                    .await?
                    .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", UPLOADS_COLLECTION, video_id)))
            }
            Err(e) => Err(e),
        }
    }

    /// Write the full record.
    pub async fn save(&self, record: &UploadRecord) -> FirestoreResult<()> {
        self.client
            .upsert_document(
                UPLOADS_COLLECTION,
                record.video_id.as_str(),
                upload_to_fields(record),
                None,
            )
            .await?;
        debug!(video_id = %record.video_id, status = %record.status, "Saved upload record");
        Ok(())
    }
}

fn upload_to_fields(record: &UploadRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert(
        "remote_video_id".to_string(),
        record.remote_video_id.to_firestore_value(),
    );
    fields.insert("remote_url".to_string(), record.remote_url.to_firestore_value());
    fields.insert("error_message".to_string(), record.error_message.to_firestore_value());
    fields.insert("retry_count".to_string(), record.retry_count.to_firestore_value());
    fields.insert("uploaded_at".to_string(), record.uploaded_at.to_firestore_value());
    fields.insert("playlist_ids".to_string(), record.playlist_ids.to_firestore_value());
    fields.insert("created_at".to_string(), record.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), record.updated_at.to_firestore_value());
    fields
}

fn document_to_upload(doc: &Document, video_id: &VideoId) -> FirestoreResult<UploadRecord> {
    let f = doc.view()?;

    let status = match f.opt_string("status") {
        Some(s) => s
            .parse::<UploadStatus>()
            .map_err(|e| FirestoreError::SerializationError(e.to_string()))?,
        None => UploadStatus::Pending,
    };

    Ok(UploadRecord {
        video_id: video_id.clone(),
        remote_video_id: f.opt_string("remote_video_id"),
        remote_url: f.opt_string("remote_url"),
        status,
        error_message: f.opt_string("error_message"),
        retry_count: f.get_or("retry_count", 0u32),
        uploaded_at: f.timestamp("uploaded_at"),
        playlist_ids: f.get_or("playlist_ids", Vec::new()),
        created_at: f.timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: f.timestamp("updated_at").unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_fields_roundtrip() {
        let mut record = UploadRecord::new(VideoId::from("vod-1"));
        record.mark_uploading().unwrap();
        record.mark_failed("quota exceeded", true).unwrap();

        let doc = Document::new(upload_to_fields(&record));
        let loaded = document_to_upload(&doc, &record.video_id).unwrap();

        assert_eq!(loaded.status, UploadStatus::Failed);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(loaded.error_message.as_deref(), Some("quota exceeded"));
        assert_eq!(loaded.remote_video_id, None);
        assert_eq!(loaded.uploaded_at, None);
        assert!(loaded.playlist_ids.is_empty());
    }

    #[test]
    fn test_completed_record_keeps_playlists() {
        let mut record = UploadRecord::new(VideoId::from("vod-1"));
        record.mark_uploading().unwrap();
        record
            .mark_completed("yt123", vec!["PL1".into(), "PL2".into()])
            .unwrap();

        let doc = Document::new(upload_to_fields(&record));
        let loaded = document_to_upload(&doc, &record.video_id).unwrap();

        assert_eq!(loaded.status, UploadStatus::Completed);
        assert_eq!(loaded.remote_url.as_deref(), Some("https://www.youtube.com/watch?v=yt123"));
        assert_eq!(loaded.playlist_ids, vec!["PL1", "PL2"]);
        assert!(loaded.uploaded_at.is_some());
    }
}
