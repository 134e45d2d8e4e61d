//! Integration tests for request classification and retry against a mock server

use openphone_data_downloader::downloader::config::RetryPolicy;
use openphone_data_downloader::downloader::RateLimiter;
use openphone_data_downloader::fetcher::{
    FetcherError, OpenPhoneFetcher, OpenPhoneHttpClient, PhoneDataFetcher,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str, max_retries: u32) -> OpenPhoneHttpClient {
    OpenPhoneHttpClient::new(
        "test-key",
        base_url,
        Arc::new(RateLimiter::new(1000.0)),
        10,
    )
    .unwrap()
    .with_retry_policy(
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_backoff_unit(Duration::from_millis(1)),
    )
}

#[tokio::test]
async fn test_sends_raw_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("authorization", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server.uri(), 0).get("users", &[]).await.unwrap();
    assert_eq!(body, json!({"data": []}));
}

#[tokio::test]
async fn test_unauthorized_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 5).get("users", &[]).await.unwrap_err();
    match err {
        FetcherError::Authentication { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 3).get("users", &[]).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.status(), 403);
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    // initial attempt + 2 retries
    Mock::given(method("GET"))
        .and(path("/calls"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 2).get("calls", &[]).await.unwrap_err();
    match err {
        FetcherError::Api { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("persisted after 2 retries"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_backoff_doubles_each_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let client = OpenPhoneHttpClient::new(
        "test-key",
        server.uri(),
        Arc::new(RateLimiter::new(1000.0)),
        10,
    )
    .unwrap()
    .with_retry_policy(
        RetryPolicy::default()
            .with_max_retries(3)
            .with_backoff_unit(Duration::from_millis(10)),
    );

    let start = Instant::now();
    let err = client.get("messages", &[]).await.unwrap_err();

    // 20ms + 40ms + 80ms between the four attempts
    assert!(start.elapsed() >= Duration::from_millis(140));
    assert_eq!(err.status(), 502);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 1).get("messages", &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::RateLimit { .. }));
    assert_eq!(err.status(), 429);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "US1"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server.uri(), 5).get("users", &[]).await.unwrap();
    assert_eq!(body["data"][0]["id"], "US1");
}

#[tokio::test]
async fn test_retry_after_header_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let start = Instant::now();
    client(&server.uri(), 5).get("users", &[]).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(950));
}

#[tokio::test]
async fn test_other_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad participants"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 5).get("calls", &[]).await.unwrap_err();
    match err {
        FetcherError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "bad participants");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_and_non_json_bodies_are_empty_objects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/accepted"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client(&server.uri(), 0);
    assert_eq!(client.get("empty", &[]).await.unwrap(), json!({}));
    assert_eq!(client.get("html", &[]).await.unwrap(), json!({}));
    assert_eq!(client.post("accepted", &json!({"a": 1})).await.unwrap(), json!({}));
}

#[tokio::test]
async fn test_undecodable_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri(), 3).get("users", &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::Parse(_)));
}

#[tokio::test]
async fn test_transport_failure_has_status_zero() {
    // nothing listens on port 1
    let err = client("http://127.0.0.1:1", 3).get("users", &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::Api { status: 0, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_conversations_repeat_phone_number_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("phoneNumberId", "PN1"))
        .and(query_param("phoneNumberId", "PN2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "CV1", "phoneNumberId": "PN1", "participants": ["+15550002222"]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = OpenPhoneFetcher::new(client(&server.uri(), 0));
    let conversations = fetcher
        .conversations(&["PN1".to_string(), "PN2".to_string()])
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);

    let requests = server.received_requests().await.unwrap();
    let ids: Vec<String> = requests[0]
        .url
        .query_pairs()
        .filter(|(key, _)| key == "phoneNumberId")
        .map(|(_, value)| value.into_owned())
        .collect();
    assert_eq!(ids, vec!["PN1", "PN2"]);
}

#[tokio::test]
async fn test_missing_transcript_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call-transcripts/AC404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/call-transcripts/AC200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"callId": "AC200", "status": "completed", "dialogue": [{"content": "hi"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/call-transcripts/AC500"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = OpenPhoneFetcher::new(client(&server.uri(), 1));
    assert!(fetcher.transcript("AC404").await.unwrap().is_none());

    let transcript = fetcher.transcript("AC200").await.unwrap().unwrap();
    assert_eq!(transcript.dialogue.len(), 1);

    let err = fetcher.transcript("AC500").await.unwrap_err();
    assert_eq!(err.status(), 500);
}

#[tokio::test]
async fn test_users_follow_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "US3"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "US1"}, {"id": "US2"}],
            "nextPageToken": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = OpenPhoneFetcher::new(client(&server.uri(), 0));
    let users = fetcher.list_users(None).await.unwrap();
    let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["US1", "US2", "US3"]);
}

#[tokio::test]
async fn test_phone_numbers_belong_to_queried_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phone-numbers"))
        .and(query_param("userId", "US1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "PN1", "number": "+15550001111", "userIds": ["US7"]}]
        })))
        .mount(&server)
        .await;

    let fetcher = OpenPhoneFetcher::new(client(&server.uri(), 0));
    let numbers = fetcher.phone_numbers_for_user("US1").await.unwrap();
    assert_eq!(numbers.len(), 1);
    assert_eq!(numbers[0].user_id.as_deref(), Some("US1"));
}
