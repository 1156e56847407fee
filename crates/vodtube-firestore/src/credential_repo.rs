//! Remote host credential repository.
//!
//! A single document, `credentials/youtube`, holds the active credential.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use vodtube_models::RemoteCredential;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, ToFirestoreValue, Value};

pub const CREDENTIALS_COLLECTION: &str = "credentials";
pub const CREDENTIAL_DOC_ID: &str = "youtube";

pub struct CredentialRepository {
    client: FirestoreClient,
}

impl CredentialRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> FirestoreResult<Option<RemoteCredential>> {
        self.client
            .get_document(CREDENTIALS_COLLECTION, CREDENTIAL_DOC_ID)
            .await?
            .map(|doc| document_to_credential(&doc))
            .transpose()
    }

    /// Upsert the credential. Last writer wins.
    pub async fn save(&self, credential: &RemoteCredential) -> FirestoreResult<()> {
        self.client
            .upsert_document(
                CREDENTIALS_COLLECTION,
                CREDENTIAL_DOC_ID,
                credential_to_fields(credential),
                None,
            )
            .await?;
        info!(expiry = %credential.expiry, "Saved remote credential");
        Ok(())
    }
}

fn credential_to_fields(credential: &RemoteCredential) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("access_token".to_string(), credential.access_token.to_firestore_value());
    fields.insert("refresh_token".to_string(), credential.refresh_token.to_firestore_value());
    fields.insert("token_type".to_string(), credential.token_type.to_firestore_value());
    fields.insert("expiry".to_string(), credential.expiry.to_firestore_value());
    fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
    fields
}

fn document_to_credential(doc: &Document) -> FirestoreResult<RemoteCredential> {
    let f = doc.view()?;
    Ok(RemoteCredential {
        access_token: f.require("access_token")?,
        refresh_token: f.string("refresh_token"),
        token_type: f
            .opt_string("token_type")
            .unwrap_or_else(|| "Bearer".to_string()),
        // A credential without expiry is treated as expired.
        expiry: f.timestamp("expiry").unwrap_or_else(Utc::now),
        updated_at: f.timestamp("updated_at").unwrap_or_else(Utc::now),
    })
}
