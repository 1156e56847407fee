//! Repository tests against a mocked Firestore REST endpoint.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vodtube_firestore::{
    FirestoreClient, FirestoreConfig, FirestoreError, RetryConfig, UploadConfigRepository,
    UploadRepository,
};
use vodtube_models::{ChannelId, CreatePlaylistMappingInput, UploadStatus, VideoId};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

async fn client(server: &MockServer) -> FirestoreClient {
    let config = FirestoreConfig::emulator(server.address().to_string(), "demo").with_retry(
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    );
    FirestoreClient::new(config).await.expect("client")
}

fn upload_doc(status: &str) -> serde_json::Value {
    json!({
        "name": "projects/demo/databases/(default)/documents/uploads/vod-1",
        "fields": {
            "status": {"stringValue": status},
            "retry_count": {"integerValue": "1"},
            "error_message": {"stringValue": "quota exceeded"},
            "playlist_ids": {"arrayValue": {}}
        }
    })
}

fn mapping_doc(id: &str, pattern: &str, playlist: &str, priority: i32, created: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/upload_configs/chan-1/playlist_mappings/{}", id),
        "fields": {
            "category_pattern": {"stringValue": pattern},
            "playlist_id": {"stringValue": playlist},
            "priority": {"integerValue": priority.to_string()},
            "created_at": {"timestampValue": created}
        }
    })
}

#[tokio::test]
async fn test_get_or_create_resolves_concurrent_create() {
    let server = MockServer::start().await;
    let doc_path = format!("{}/uploads/vod-1", DOCS);

    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/uploads", DOCS).as_str()))
        .and(query_param("documentId", "vod-1"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_doc("failed")))
        .with_priority(2)
        .mount(&server)
        .await;

    let repo = UploadRepository::new(client(&server).await);
    let record = repo.get_or_create(&VideoId::from("vod-1")).await.unwrap();

    assert_eq!(record.status, UploadStatus::Failed);
    assert_eq!(record.retry_count, 1);
}

#[tokio::test]
async fn test_get_or_create_creates_pending_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/uploads/vod-2", DOCS).as_str()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/uploads", DOCS).as_str()))
        .and(body_partial_json(json!({
            "fields": {"status": {"stringValue": "pending"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = UploadRepository::new(client(&server).await);
    let record = repo.get_or_create(&VideoId::from("vod-2")).await.unwrap();
    assert_eq!(record.status, UploadStatus::Pending);
    assert_eq!(record.retry_count, 0);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    let doc_path = format!("{}/uploads/vod-1", DOCS);

    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_doc("completed")))
        .with_priority(2)
        .mount(&server)
        .await;

    let repo = UploadRepository::new(client(&server).await);
    let record = repo.get(&VideoId::from("vod-1")).await.unwrap().unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
}

#[tokio::test]
async fn test_expired_token_is_refetched_once() {
    let server = MockServer::start().await;
    let doc_path = format!("{}/uploads/vod-1", DOCS);

    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"status": "UNAUTHENTICATED"}})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(doc_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_doc("pending")))
        .with_priority(2)
        .mount(&server)
        .await;

    let repo = UploadRepository::new(client(&server).await);
    let record = repo.get(&VideoId::from("vod-1")).await.unwrap().unwrap();
    assert_eq!(record.status, UploadStatus::Pending);
}

#[tokio::test]
async fn test_config_mappings_are_priority_ordered() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/upload_configs/chan-1", DOCS).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/upload_configs/chan-1",
            "fields": {
                "upload_enabled": {"booleanValue": true},
                "default_privacy": {"stringValue": "public"}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            format!("{}/upload_configs/chan-1/playlist_mappings", DOCS).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                mapping_doc("a", "just*", "PL2", 1, "2024-01-01T00:00:00Z"),
                mapping_doc("b", "valorant", "PL1", 5, "2024-01-03T00:00:00Z"),
                mapping_doc("c", "*", "PL-late", 1, "2024-01-02T00:00:00Z"),
                mapping_doc("d", "apex", "PL3", 5, "2024-01-02T00:00:00Z")
            ]
        })))
        .mount(&server)
        .await;

    let repo = UploadConfigRepository::new(client(&server).await);
    let config = repo.get(&ChannelId::from("chan-1")).await.unwrap().unwrap();

    assert!(config.upload_enabled);
    assert_eq!(config.default_category_id, "20");
    let order: Vec<_> = config
        .playlist_mappings
        .iter()
        .map(|m| m.playlist_id.as_str())
        .collect();
    assert_eq!(order, vec!["PL3", "PL1", "PL2", "PL-late"]);
}

#[tokio::test]
async fn test_missing_config_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/upload_configs/chan-9", DOCS).as_str()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repo = UploadConfigRepository::new(client(&server).await);
    assert!(repo.get(&ChannelId::from("chan-9")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_mapping_input_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let repo = UploadConfigRepository::new(client(&server).await);
    let err = repo
        .create_mapping(
            &ChannelId::from("chan-1"),
            CreatePlaylistMappingInput {
                category_pattern: String::new(),
                playlist_id: "PL1".into(),
                playlist_name: None,
                priority: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_mapping_for_missing_config_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/upload_configs/chan-1", DOCS).as_str()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repo = UploadConfigRepository::new(client(&server).await);
    let err = repo
        .create_mapping(
            &ChannelId::from("chan-1"),
            CreatePlaylistMappingInput {
                category_pattern: "valorant".into(),
                playlist_id: "PL1".into(),
                playlist_name: None,
                priority: Some(5),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

/// Live Firestore smoke test.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_firestore_connection() {
    dotenvy::dotenv().ok();

    let client = FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");

    let result = client.get_document("_health", "_check").await;
    assert!(result.is_ok(), "Unexpected error: {:?}", result.err());
}
