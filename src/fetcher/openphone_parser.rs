//! OpenPhone JSON response parser
//!
//! Converts raw API records into the crate's entities. Parsing is lenient:
//! unknown fields are ignored and wrongly-typed optional fields are treated as
//! absent. Only a missing `id` rejects a record.

use serde_json::Value;

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{Call, Conversation, Message, PhoneNumber, Transcript, TranscriptDialogue, User};

/// Parser for OpenPhone API records
pub struct OpenPhoneParser;

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn required_id(value: &Value, entity: &str) -> FetcherResult<String> {
    match value.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(FetcherError::Parse(format!("{entity} record without id"))),
    }
}

impl OpenPhoneParser {
    /// Parse a user record
    pub fn parse_user(value: &Value) -> FetcherResult<User> {
        Ok(User {
            id: required_id(value, "user")?,
            first_name: opt_str(value, "firstName"),
            last_name: opt_str(value, "lastName"),
            email: opt_str(value, "email"),
            role: opt_str(value, "role"),
            created_at: opt_str(value, "createdAt"),
        })
    }

    /// Parse a phone number record
    ///
    /// The API lists owners under `userIds`; the first entry wins, falling back
    /// to a scalar `userId`.
    pub fn parse_phone_number(value: &Value) -> FetcherResult<PhoneNumber> {
        let user_id = value
            .get("userIds")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| opt_str(value, "userId"));

        Ok(PhoneNumber {
            id: required_id(value, "phone number")?,
            number: opt_str(value, "number"),
            name: opt_str(value, "name"),
            number_type: opt_str(value, "type"),
            user_id,
            created_at: opt_str(value, "createdAt"),
        })
    }

    /// Parse a conversation record
    pub fn parse_conversation(value: &Value) -> FetcherResult<Conversation> {
        let participants = value
            .get("participants")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Conversation {
            id: required_id(value, "conversation")?,
            phone_number_id: opt_str(value, "phoneNumberId"),
            participants,
            created_at: opt_str(value, "createdAt"),
            updated_at: opt_str(value, "updatedAt"),
            last_activity_at: opt_str(value, "lastActivityAt"),
        })
    }

    /// Parse a call record; the transcript is attached later
    pub fn parse_call(value: &Value) -> FetcherResult<Call> {
        let duration = value.get("duration").and_then(|d| {
            d.as_i64()
                .or_else(|| d.as_f64().map(|f| f as i64))
        });

        Ok(Call {
            id: required_id(value, "call")?,
            phone_number_id: opt_str(value, "phoneNumberId"),
            from: opt_str(value, "from"),
            to: opt_str(value, "to"),
            direction: opt_str(value, "direction"),
            status: opt_str(value, "status"),
            duration,
            created_at: opt_str(value, "createdAt"),
            answered_at: opt_str(value, "answeredAt"),
            completed_at: opt_str(value, "completedAt"),
            user_id: opt_str(value, "userId"),
            conversation_id: opt_str(value, "conversationId"),
            transcript: None,
        })
    }

    /// Parse a message record
    pub fn parse_message(value: &Value) -> FetcherResult<Message> {
        let to = value.get("to").filter(|v| !v.is_null()).cloned();
        let media = value.get("media").and_then(Value::as_array).cloned();

        Ok(Message {
            id: required_id(value, "message")?,
            phone_number_id: opt_str(value, "phoneNumberId"),
            from: opt_str(value, "from"),
            to,
            body: opt_str(value, "body").or_else(|| opt_str(value, "text")),
            direction: opt_str(value, "direction"),
            status: opt_str(value, "status"),
            created_at: opt_str(value, "createdAt"),
            user_id: opt_str(value, "userId"),
            conversation_id: opt_str(value, "conversationId"),
            media,
        })
    }

    /// Parse a transcript object
    ///
    /// `fallback_call_id` is used when the object carries no `callId`.
    pub fn parse_transcript(value: &Value, fallback_call_id: &str) -> Transcript {
        let dialogue = value
            .get("dialogue")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(Self::parse_dialogue).collect())
            .unwrap_or_default();

        Transcript {
            call_id: opt_str(value, "callId")
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| fallback_call_id.to_string()),
            status: opt_str(value, "status"),
            created_at: opt_str(value, "createdAt"),
            duration: value.get("duration").and_then(Value::as_f64),
            dialogue,
        }
    }

    /// Parse one dialogue segment
    pub fn parse_dialogue(value: &Value) -> TranscriptDialogue {
        TranscriptDialogue {
            content: opt_str(value, "content"),
            start: value.get("start").and_then(Value::as_f64),
            end: value.get("end").and_then(Value::as_f64),
            identifier: opt_str(value, "identifier"),
            user_id: opt_str(value, "userId"),
        }
    }

    /// Extract the transcript from a transcript endpoint response
    ///
    /// Accepted shapes: the transcript object itself, `{"data": {...}}`, or
    /// `{"data": [{...}, ...]}` (first element). An empty body or empty list
    /// means the call has no transcript.
    pub fn extract_transcript(body: &Value, call_id: &str) -> Option<Transcript> {
        let object = match body.get("data") {
            Some(Value::Object(_)) => body.get("data")?,
            Some(Value::Array(items)) => items.first().filter(|item| item.is_object())?,
            Some(_) => return None,
            None => match body.as_object() {
                Some(map) if !map.is_empty() => body,
                _ => return None,
            },
        };
        Some(Self::parse_transcript(object, call_id))
    }
}
