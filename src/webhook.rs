//! Inbound `message.received` webhook payloads
//!
//! The receiver itself lives outside this crate; this module only turns a
//! decoded payload into a [`WebhookNewMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetcher::openphone_config::MESSAGE_RECEIVED_EVENT;

/// A `message.received` event: webhook metadata plus the nested message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WebhookNewMessage {
    /// Message id
    pub id: String,
    /// Event id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// API version of the payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// When the event was emitted (top-level `createdAt`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_created_at: Option<String>,
    /// Event type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Object kind of the nested record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Sender number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient numbers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    /// `incoming` or `outgoing`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Message text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Delivery status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Message creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Message update timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Workspace user the message belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Phone number id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    /// Conversation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Contact ids linked to the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_ids: Vec<String>,
    /// Media attachments, raw
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<Value>>,
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a decoded webhook payload
///
/// Returns `None` unless the payload is a `message.received` event whose
/// `data.object` is a JSON object. Other event types are not errors.
pub fn parse_new_message_event(payload: &Value) -> Option<WebhookNewMessage> {
    if payload.get("type").and_then(Value::as_str) != Some(MESSAGE_RECEIVED_EVENT) {
        return None;
    }
    let object = payload.get("data")?.get("object").filter(|o| o.is_object())?;

    let to = match object.get("to") {
        Some(Value::String(number)) => vec![number.clone()],
        other => string_list(other),
    };
    let text = opt_str(object, "text")
        .filter(|t| !t.is_empty())
        .or_else(|| opt_str(object, "body"));

    Some(WebhookNewMessage {
        id: opt_str(object, "id").unwrap_or_default(),
        event: opt_str(payload, "event"),
        api_version: opt_str(payload, "apiVersion"),
        event_created_at: opt_str(payload, "createdAt"),
        event_type: opt_str(payload, "type"),
        object: opt_str(object, "object"),
        from: opt_str(object, "from"),
        to,
        direction: opt_str(object, "direction"),
        text,
        status: opt_str(object, "status"),
        created_at: opt_str(object, "createdAt"),
        updated_at: opt_str(object, "updatedAt"),
        user_id: opt_str(object, "userId"),
        phone_number_id: opt_str(object, "phoneNumberId"),
        conversation_id: opt_str(object, "conversationId"),
        contact_ids: string_list(object.get("contactIds")),
        media: object.get("media").and_then(Value::as_array).cloned(),
    })
}
