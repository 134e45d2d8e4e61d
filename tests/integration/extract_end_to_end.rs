//! End-to-end extraction against a mock OpenPhone API

use openphone_data_downloader::downloader::config::RetryPolicy;
use openphone_data_downloader::downloader::{generate_phone_data, ExtractError, ExtractionOptions};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(server: &MockServer, dir: &TempDir) -> ExtractionOptions {
    ExtractionOptions::new("test-key")
        .with_base_url(server.uri())
        .with_requests_per_second(1000.0)
        .with_output_path(dir.path().join("out/consolidated_phone_data.json"))
        .with_failed_output_path(dir.path().join("out/failed_items.json"))
        .with_retry_policy(
            RetryPolicy::default()
                .with_max_retries(1)
                .with_backoff_unit(Duration::from_millis(1)),
        )
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Workspace with one user, one number, one conversation, one call and one message
async fn mount_workspace(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ok(json!({
            "data": [{"id": "US1", "firstName": "Ada", "lastName": "Lovelace", "role": "owner"}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/phone-numbers"))
        .and(query_param("userId", "US1"))
        .respond_with(ok(json!({
            "data": [{"id": "PN1", "number": "+15550001111", "userIds": ["US1"]}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("phoneNumberId", "PN1"))
        .respond_with(ok(json!({
            "data": [{"id": "CV1", "phoneNumberId": "PN1", "participants": ["+15550002222"]}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calls"))
        .and(query_param("phoneNumberId", "PN1"))
        .and(query_param("participants", "+15550002222"))
        .respond_with(ok(json!({
            "data": [{"id": "AC1", "direction": "incoming", "duration": 30}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/call-transcripts/AC1"))
        .respond_with(ok(json!({
            "data": {"callId": "AC1", "status": "completed", "dialogue": [{"content": "hello"}]}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_extract_writes_consolidated_document() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(query_param("phoneNumberId", "PN1"))
        .and(query_param("participants", "+15550001111"))
        .respond_with(ok(json!({"data": [{"id": "M1", "text": "hi", "to": ["+15550002222"]}]})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = options(&server, &dir);
    let outcome = generate_phone_data(options.clone()).await.unwrap();

    assert!(outcome.failure_report.is_none());
    assert!(outcome.failed_output_path.is_none());
    assert!(!options.failed_output_path.exists());

    let document = read_json(&options.output_path);
    assert_eq!(document["totalUsers"], 1);
    assert_eq!(document["totalConversations"], 1);
    assert_eq!(document["totalCalls"], 1);
    assert_eq!(document["totalMessages"], 1);
    assert_eq!(document["totalTranscripts"], 1);
    assert!(document["generatedAt"].as_str().unwrap().ends_with('Z'));

    let user = &document["userData"][0];
    assert_eq!(user["user"]["id"], "US1");
    assert_eq!(user["phoneNumbers"][0]["userId"], "US1");
    assert_eq!(user["calls"][0]["transcript"]["dialogue"][0]["content"], "hello");
    assert_eq!(user["messages"][0]["body"], "hi");
    // unset fields are omitted, never null
    assert!(user["user"].get("email").is_none());
}

#[tokio::test]
async fn test_extract_records_failures_and_still_writes_output() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    // initial attempt + 1 retry
    Mock::given(method("GET"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = options(&server, &dir);
    let outcome = generate_phone_data(options.clone()).await.unwrap();

    assert_eq!(outcome.consolidated.total_messages, 0);
    assert_eq!(outcome.consolidated.total_calls, 1);
    assert_eq!(
        outcome.failed_output_path.as_deref(),
        Some(options.failed_output_path.as_path())
    );

    let report = read_json(&options.failed_output_path);
    assert_eq!(report["totalFailed"], 1);
    assert_eq!(report["messages"]["count"], 1);
    assert_eq!(report["messages"]["items"][0]["phoneNumberId"], "PN1");
    assert_eq!(report["messages"]["items"][0]["phoneNumber"], "+15550001111");
    assert!(report["messages"]["items"][0]["error"]
        .as_str()
        .unwrap()
        .contains("502"));
    assert_eq!(report["generatedAt"], read_json(&options.output_path)["generatedAt"]);
}

#[tokio::test]
async fn test_authentication_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = options(&server, &dir);
    let err = generate_phone_data(options.clone()).await.unwrap_err();

    match err {
        ExtractError::Fetcher(e) => assert!(e.is_fatal()),
        other => panic!("expected fetcher error, got {other:?}"),
    }
    assert!(!options.output_path.exists());
    assert!(!options.failed_output_path.exists());
}

#[tokio::test]
async fn test_max_count_limits_user_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ok(json!({
            "data": [{"id": "US1"}, {"id": "US2"}, {"id": "US3"}],
            "nextPageToken": "more"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/phone-numbers"))
        .respond_with(ok(json!({"data": []})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = options(&server, &dir).with_max_count(Some(2));
    let outcome = generate_phone_data(options).await.unwrap();

    assert_eq!(outcome.consolidated.total_users, 2);
    assert_eq!(outcome.consolidated.total_calls, 0);
}
