//! OpenPhone API client and data fetchers

use crate::{Call, Conversation, Message, PhoneNumber, Transcript, User};
use async_trait::async_trait;

pub mod openphone;
pub mod openphone_config;
pub mod openphone_http;
pub mod openphone_parser;
pub mod pagination;
pub mod retry_formatter;
pub mod webhooks;

pub use openphone::OpenPhoneFetcher;
pub use openphone_http::OpenPhoneHttpClient;

/// Fetcher errors
///
/// A closed set of kinds: only [`FetcherError::Authentication`] is fatal for a
/// run, every other kind is handled at the branch that produced it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetcherError {
    /// 401/403 response. Never retried.
    #[error("[HTTP {status}] Authentication failed: {message}")]
    Authentication {
        /// HTTP status (401 or 403)
        status: u16,
        /// Response body
        message: String,
    },

    /// 429 responses persisted through every retry
    #[error("[HTTP 429] {message}")]
    RateLimit {
        /// Failure description
        message: String,
    },

    /// Any other API failure; status 0 means the request never got a response
    #[error("[HTTP {status}] {message}")]
    Api {
        /// HTTP status, or 0 for transport failures
        status: u16,
        /// Response body or failure description
        message: String,
    },

    /// 2xx response whose JSON body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetcherError {
    /// Build a transport-level (status 0) error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Api {
            status: 0,
            message: message.into(),
        }
    }

    /// Whether the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// HTTP status carried by the error (0 for transport and parse failures)
    pub fn status(&self) -> u16 {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => *status,
            Self::RateLimit { .. } => 429,
            Self::Parse(_) => 0,
        }
    }

    /// Whether the provider answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of OpenPhone entities consumed by the orchestrator
///
/// Every method is one logical fetch; pagination happens inside. Implementations
/// must be shareable across concurrently running branches.
#[async_trait]
pub trait PhoneDataFetcher: Send + Sync {
    /// List workspace users, stopping as soon as `max_count` users are collected
    async fn list_users(&self, max_count: Option<usize>) -> FetcherResult<Vec<User>>;

    /// Phone numbers assigned to a user; each record's `user_id` is set to `user_id`
    async fn phone_numbers_for_user(&self, user_id: &str) -> FetcherResult<Vec<PhoneNumber>>;

    /// All conversations of the given phone numbers in one batched request chain
    async fn conversations(&self, phone_number_ids: &[String]) -> FetcherResult<Vec<Conversation>>;

    /// All calls between a phone number and one participant
    async fn calls_for_participant(
        &self,
        phone_number_id: &str,
        participant: &str,
    ) -> FetcherResult<Vec<Call>>;

    /// All messages of a phone number
    async fn messages(&self, phone_number_id: &str, phone_number: &str)
        -> FetcherResult<Vec<Message>>;

    /// Transcript of a call; `Ok(None)` when the provider has none
    async fn transcript(&self, call_id: &str) -> FetcherResult<Option<Transcript>>;
}
