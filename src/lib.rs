//! # OpenPhone Data Downloader Library
//!
//! Bulk extraction of an OpenPhone workspace: users, their phone numbers,
//! conversations, calls (with transcripts) and messages, consolidated into a
//! single JSON document.
//!
//! ## Features
//!
//! - **Global Rate Limiting**: A token bucket shared by every concurrent request
//! - **Retry With Backoff**: Transparent recovery from 429 and 5xx responses
//! - **Concurrent Fan-Out**: Users, conversations, participants, phone numbers and
//!   calls are all fetched concurrently
//! - **Failure Isolation**: A failing branch is recorded with its retry parameters
//!   instead of aborting the run
//! - **Webhook Support**: Subscription management and parsing of `message.received`
//!   events
//!
//! ## Quick Start
//!
//! ```no_run
//! use openphone_data_downloader::downloader::{generate_phone_data, ExtractionOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ExtractionOptions::new("my-api-key")
//!     .with_max_count(Some(10))
//!     .with_output_path("consolidated_phone_data.json");
//!
//! let outcome = generate_phone_data(options).await?;
//! println!("users: {}", outcome.consolidated.total_users);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - HTTP client, pagination and the OpenPhone endpoint bindings
//! - [`downloader`] - Rate limiting, failure collection, orchestration and consolidation
//! - [`output`] - JSON persistence of the consolidated result and failure report
//! - [`webhook`] - Inbound `message.received` webhook payload model
//! - [`cli`] - Command line interface
//!
//! ## Data Types
//!
//! - [`User`], [`PhoneNumber`], [`Conversation`], [`Call`], [`Transcript`], [`Message`]
//!
//! Every record omits unset fields when serialized; absent values are never
//! written as explicit nulls.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Fetch orchestration, rate limiting and consolidation
pub mod downloader;

/// OpenPhone API client and fetchers
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// JSON output writers
pub mod output;

/// Webhook event model
pub mod webhook;

pub use webhook::{parse_new_message_event, WebhookNewMessage};

/// Workspace user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID (e.g. "US123")
    pub id: String,
    /// First name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Workspace role (owner, admin, member)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    /// Display name used in logs and failure records ("First Last").
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

}

/// Phone number owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    /// Phone number ID (e.g. "PN123")
    pub id: String,
    /// E.164 number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Display name of the line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Line type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub number_type: Option<String>,
    /// Owning user ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Conversation between a phone number and one or more participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID
    pub id: String,
    /// Phone number the conversation belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    /// Participant addresses, in provider order
    #[serde(default)]
    pub participants: Vec<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Last activity timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<String>,
}

/// Phone call, optionally carrying its transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Call ID (e.g. "AC123")
    pub id: String,
    /// Phone number the call was placed on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    /// Caller address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Callee address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// incoming / outgoing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Call status (completed, missed, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Answer timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<String>,
    /// Completion timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// User who handled the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Conversation the call belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Transcript, attached once its fetch completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
}

impl Call {

    /// Attach a fetched transcript, consuming the call.
    pub fn with_transcript(mut self, transcript: Option<Transcript>) -> Self {
        self.transcript = transcript;
        self
    }
}

/// One dialogue segment of a transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptDialogue {
    /// Spoken text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Segment start (seconds from call start)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Segment end (seconds from call start)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// Speaker address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Speaker user ID, when the speaker is a workspace user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Call transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Call the transcript belongs to
    pub call_id: String,
    /// Transcription status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Transcribed duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Ordered dialogue segments (always serialized, possibly empty)
    #[serde(default)]
    pub dialogue: Vec<TranscriptDialogue>,
}

/// Text message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: String,
    /// Phone number the message was sent or received on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    /// Sender address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient address(es) exactly as provided by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<serde_json::Value>,
    /// Message body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// incoming / outgoing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Delivery status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Sending user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Conversation the message belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Attached media descriptors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<serde_json::Value>>,
}
