//! Integration tests for message webhook management

use openphone_data_downloader::downloader::RateLimiter;
use openphone_data_downloader::fetcher::webhooks::{
    build_webhook_url, WebhookManager, WebhookOptions,
};
use openphone_data_downloader::fetcher::OpenPhoneHttpClient;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager(server: &MockServer) -> WebhookManager {
    let http = OpenPhoneHttpClient::new(
        "test-key",
        server.uri(),
        Arc::new(RateLimiter::new(1000.0)),
        4,
    )
    .unwrap();
    WebhookManager::new(http)
}

#[tokio::test]
async fn test_existing_webhook_is_reused() {
    let server = MockServer::start().await;
    let url = build_webhook_url("https://hooks.example.com");
    Mock::given(method("GET"))
        .and(path("/webhooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "WH1", "url": url, "events": ["message.received", "message.delivered"]},
                {"id": "WH2", "url": "https://other.example.com/op_new_message", "events": ["message.received"]},
                {"id": "WH3", "url": url, "events": ["message.received"], "status": "enabled"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let webhook = manager(&server)
        .ensure_message_received_webhook(&url, &WebhookOptions::default())
        .await
        .unwrap();
    assert_eq!(webhook.id.as_deref(), Some("WH3"));
}

#[tokio::test]
async fn test_missing_webhook_is_created() {
    let server = MockServer::start().await;
    let url = build_webhook_url("https://hooks.example.com/");
    Mock::given(method("GET"))
        .and(path("/webhooks"))
        .and(query_param("userId", "US1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webhooks/messages"))
        .and(body_json(json!({
            "events": ["message.received"],
            "url": "https://hooks.example.com/op_new_message",
            "status": "enabled",
            "label": "op_new_message",
            "userId": "US1",
            "resourceIds": ["PN1"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": "WH9",
                "url": "https://hooks.example.com/op_new_message",
                "events": ["message.received"],
                "status": "enabled"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = WebhookOptions {
        label: Some("op_new_message".to_string()),
        user_id: Some("US1".to_string()),
        resource_ids: Some(vec!["PN1".to_string()]),
    };
    let webhook = manager(&server)
        .ensure_message_received_webhook(&url, &options)
        .await
        .unwrap();
    assert_eq!(webhook.id.as_deref(), Some("WH9"));
    assert_eq!(webhook.events, vec!["message.received"]);
}

#[tokio::test]
async fn test_malformed_webhook_records_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "WH1", "events": null}, {"id": "WH2", "events": ["call.completed"]}]
        })))
        .mount(&server)
        .await;

    let webhooks = manager(&server).list_webhooks(None).await.unwrap();
    assert_eq!(webhooks.len(), 1);
    assert_eq!(webhooks[0].id.as_deref(), Some("WH2"));
}

#[tokio::test]
async fn test_unauthorized_listing_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = manager(&server)
        .ensure_message_received_webhook("https://x/op_new_message", &WebhookOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}
