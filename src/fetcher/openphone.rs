//! OpenPhone data fetcher
//!
//! Implements [`PhoneDataFetcher`] on top of [`OpenPhoneHttpClient`]. Each
//! method is one logical fetch; list endpoints are drained with
//! [`PaginationHelper`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::fetcher::openphone_config::{OpenPhoneApiConfig, OPENPHONE_API_CONFIG};
use crate::fetcher::openphone_http::OpenPhoneHttpClient;
use crate::fetcher::openphone_parser::OpenPhoneParser;
use crate::fetcher::pagination::{parse_page, PaginationHelper};
use crate::fetcher::{FetcherResult, PhoneDataFetcher};
use crate::{Call, Conversation, Message, PhoneNumber, Transcript, User};

/// Fetcher for the OpenPhone public API
#[derive(Debug, Clone)]
pub struct OpenPhoneFetcher {
    http: OpenPhoneHttpClient,
    config: OpenPhoneApiConfig,
}

impl OpenPhoneFetcher {
    /// Create a fetcher using the production endpoint paths
    pub fn new(http: OpenPhoneHttpClient) -> Self {
        Self {
            http,
            config: OPENPHONE_API_CONFIG,
        }
    }

    /// Drain a paginated listing
    async fn collect_pages<T>(
        &self,
        endpoint: &'static str,
        query: Vec<(&'static str, String)>,
        max_count: Option<usize>,
        parse: fn(&Value) -> FetcherResult<T>,
    ) -> FetcherResult<Vec<T>> {
        PaginationHelper::collect(endpoint, max_count, |cursor| {
            let mut query = query.clone();
            if let Some(token) = cursor {
                query.push(("pageToken", token));
            }
            async move {
                let body = self.http.get(endpoint, &query).await?;
                Ok(parse_page(&body, parse))
            }
        })
        .await
    }
}

#[async_trait]
impl PhoneDataFetcher for OpenPhoneFetcher {
    async fn list_users(&self, max_count: Option<usize>) -> FetcherResult<Vec<User>> {
        let users = self
            .collect_pages(
                self.config.users_endpoint,
                Vec::new(),
                max_count,
                OpenPhoneParser::parse_user,
            )
            .await?;
        info!("Fetched {} users", users.len());
        Ok(users)
    }

    async fn phone_numbers_for_user(&self, user_id: &str) -> FetcherResult<Vec<PhoneNumber>> {
        // Single page: the endpoint is not paginated per user
        let body = self
            .http
            .get(
                self.config.phone_numbers_endpoint,
                &[("userId", user_id.to_string())],
            )
            .await?;
        let numbers: Vec<PhoneNumber> = parse_page(&body, OpenPhoneParser::parse_phone_number)
            .items
            .into_iter()
            .map(|mut number| {
                number.user_id = Some(user_id.to_string());
                number
            })
            .collect();

        info!("Found {} phone numbers for user {}", numbers.len(), user_id);
        Ok(numbers)
    }

    async fn conversations(&self, phone_number_ids: &[String]) -> FetcherResult<Vec<Conversation>> {
        let query = phone_number_ids
            .iter()
            .map(|id| ("phoneNumberId", id.clone()))
            .collect();
        let conversations = self
            .collect_pages(
                self.config.conversations_endpoint,
                query,
                None,
                OpenPhoneParser::parse_conversation,
            )
            .await?;
        info!(
            "Fetched {} conversations for {} phone numbers",
            conversations.len(),
            phone_number_ids.len()
        );
        Ok(conversations)
    }

    async fn calls_for_participant(
        &self,
        phone_number_id: &str,
        participant: &str,
    ) -> FetcherResult<Vec<Call>> {
        let query = vec![
            ("phoneNumberId", phone_number_id.to_string()),
            ("participants", participant.to_string()),
        ];
        let calls = self
            .collect_pages(self.config.calls_endpoint, query, None, OpenPhoneParser::parse_call)
            .await?;
        debug!(
            "Fetched {} calls for {} with {}",
            calls.len(),
            phone_number_id,
            participant
        );
        Ok(calls)
    }

    async fn messages(
        &self,
        phone_number_id: &str,
        phone_number: &str,
    ) -> FetcherResult<Vec<Message>> {
        let query = vec![
            ("phoneNumberId", phone_number_id.to_string()),
            ("participants", phone_number.to_string()),
        ];
        let messages = self
            .collect_pages(
                self.config.messages_endpoint,
                query,
                None,
                OpenPhoneParser::parse_message,
            )
            .await?;
        info!("Fetched {} messages for {}", messages.len(), phone_number_id);
        Ok(messages)
    }

    async fn transcript(&self, call_id: &str) -> FetcherResult<Option<Transcript>> {
        let path = self.config.transcript_path(call_id);
        match self.http.get(&path, &[]).await {
            Ok(body) => {
                let transcript = OpenPhoneParser::extract_transcript(&body, call_id);
                if transcript.is_none() {
                    debug!("Empty transcript for call {}", call_id);
                }
                Ok(transcript)
            }
            Err(e) if e.is_not_found() => {
                debug!("No transcript for call {}", call_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
