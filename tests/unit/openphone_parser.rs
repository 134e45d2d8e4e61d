//! Unit tests for the OpenPhone record parser

use openphone_data_downloader::fetcher::openphone_parser::OpenPhoneParser;
use openphone_data_downloader::fetcher::pagination::parse_page;
use serde_json::json;

#[test]
fn test_phone_number_owner_from_user_ids() {
    let number = OpenPhoneParser::parse_phone_number(&json!({
        "id": "PN1",
        "number": "+15550001111",
        "name": "Sales",
        "type": "local",
        "userIds": ["US1", "US2"],
        "userId": "US9"
    }))
    .unwrap();

    assert_eq!(number.user_id.as_deref(), Some("US1"));
    assert_eq!(number.number_type.as_deref(), Some("local"));

    let number = OpenPhoneParser::parse_phone_number(&json!({"id": "PN2", "userId": "US9"})).unwrap();
    assert_eq!(number.user_id.as_deref(), Some("US9"));
}

#[test]
fn test_conversation_participants_keep_order() {
    let conversation = OpenPhoneParser::parse_conversation(&json!({
        "id": "CV1",
        "phoneNumberId": "PN1",
        "participants": ["+15550002222", 7, "+15550003333"],
        "lastActivityAt": "2024-05-01T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(
        conversation.participants,
        vec!["+15550002222".to_string(), "+15550003333".to_string()]
    );
    assert_eq!(conversation.last_activity_at.as_deref(), Some("2024-05-01T10:00:00Z"));
}

#[test]
fn test_call_without_participants_field_defaults() {
    let call = OpenPhoneParser::parse_call(&json!({
        "id": "AC1",
        "duration": 42.7,
        "direction": "incoming"
    }))
    .unwrap();
    assert_eq!(call.duration, Some(42));
    assert!(call.transcript.is_none());
    assert!(call.from.is_none());
}

#[test]
fn test_message_keeps_recipients_verbatim() {
    let message = OpenPhoneParser::parse_message(&json!({
        "id": "M1",
        "from": "+15550002222",
        "to": ["+15550001111"],
        "text": "hello",
        "media": [{"url": "https://example.com/a.png"}]
    }))
    .unwrap();

    assert_eq!(message.to, Some(json!(["+15550001111"])));
    assert_eq!(message.body.as_deref(), Some("hello"));
    assert_eq!(message.media.as_ref().map(Vec::len), Some(1));
}

#[test]
fn test_transcript_shapes() {
    let dialogue = json!([{"content": "hi", "start": 0.0, "end": 1.5, "identifier": "+1555"}]);

    let nested = json!({"data": {"callId": "AC1", "status": "completed", "dialogue": dialogue}});
    let transcript = OpenPhoneParser::extract_transcript(&nested, "AC1").unwrap();
    assert_eq!(transcript.call_id, "AC1");
    assert_eq!(transcript.dialogue.len(), 1);
    assert_eq!(transcript.dialogue[0].end, Some(1.5));

    let listed = json!({"data": [{"status": "completed"}]});
    let transcript = OpenPhoneParser::extract_transcript(&listed, "AC2").unwrap();
    assert_eq!(transcript.call_id, "AC2");
    assert!(transcript.dialogue.is_empty());

    let direct = json!({"callId": "AC3", "dialogue": []});
    assert!(OpenPhoneParser::extract_transcript(&direct, "AC3").is_some());
}

#[test]
fn test_empty_transcript_bodies() {
    assert!(OpenPhoneParser::extract_transcript(&json!({}), "AC1").is_none());
    assert!(OpenPhoneParser::extract_transcript(&json!({"data": []}), "AC1").is_none());
    assert!(OpenPhoneParser::extract_transcript(&json!({"data": null}), "AC1").is_none());
}

#[test]
fn test_list_response_skips_records_without_id() {
    let body = json!({
        "data": [{"id": "US1"}, {"firstName": "No id"}, {"id": ""}, {"id": "US2"}],
        "nextPageToken": "next"
    });
    let page = parse_page(&body, OpenPhoneParser::parse_user);
    let ids: Vec<_> = page.items.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["US1", "US2"]);
    assert_eq!(page.next_page_token.as_deref(), Some("next"));
}
