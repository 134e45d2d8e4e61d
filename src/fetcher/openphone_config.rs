//! OpenPhone API configuration
//!
//! Base URL and endpoint paths live here so the HTTP client and fetchers only
//! deal in relative paths, and tests can point the same paths at a mock server.

/// Configuration for the OpenPhone public API
#[derive(Debug, Clone)]
pub struct OpenPhoneApiConfig {
    /// Base URL for API (e.g., <https://api.openphone.com/v1>)
    pub base_url: &'static str,

    /// Users listing endpoint (paginated via pageToken)
    pub users_endpoint: &'static str,

    /// Phone numbers endpoint (filtered by userId)
    pub phone_numbers_endpoint: &'static str,

    /// Conversations endpoint (accepts repeated phoneNumberId)
    pub conversations_endpoint: &'static str,

    /// Calls endpoint (phoneNumberId + participants)
    pub calls_endpoint: &'static str,

    /// Messages endpoint (phoneNumberId + participants)
    pub messages_endpoint: &'static str,

    /// Transcript endpoint prefix; the call id is appended as a path segment
    pub transcripts_endpoint: &'static str,

    /// Webhook listing endpoint
    pub webhooks_endpoint: &'static str,

    /// Message webhook creation endpoint
    pub message_webhooks_endpoint: &'static str,
}

impl OpenPhoneApiConfig {
    /// Path of the transcript of one call
    pub fn transcript_path(&self, call_id: &str) -> String {
        format!("{}/{}", self.transcripts_endpoint, call_id)
    }
}

/// Production OpenPhone API configuration
pub const OPENPHONE_API_CONFIG: OpenPhoneApiConfig = OpenPhoneApiConfig {
    base_url: "https://api.openphone.com/v1",
    users_endpoint: "users",
    phone_numbers_endpoint: "phone-numbers",
    conversations_endpoint: "conversations",
    calls_endpoint: "calls",
    messages_endpoint: "messages",
    transcripts_endpoint: "call-transcripts",
    webhooks_endpoint: "webhooks",
    message_webhooks_endpoint: "webhooks/messages",
};

/// Path the inbound message webhook receiver listens on
pub const NEW_MESSAGE_WEBHOOK_PATH: &str = "/op_new_message";

/// Webhook event type for inbound messages
pub const MESSAGE_RECEIVED_EVENT: &str = "message.received";
