//! Extraction pipeline
//!
//! Fan-out structure:
//! 1. List users (one cursor chain)
//! 2. Per user, concurrently:
//!    - phone numbers, then two concurrent branches:
//!      - conversations (one batched request chain), then calls per
//!        conversation (per participant), then one transcript per call
//!      - messages per phone number
//!
//! Every level launches all siblings and joins them. Non-fatal errors are
//! recorded in the [`FailureAggregator`] at the branch that produced them and
//! degrade to an empty result; authentication errors propagate and abort the run.

use futures::future::try_join_all;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::downloader::consolidate::UserPhoneData;
use crate::downloader::failures::{
    CallsFailure, ConversationsFailure, FailureAggregator, MessagesFailure, PhoneNumbersFailure,
    TranscriptsFailure,
};
use crate::fetcher::{FetcherResult, PhoneDataFetcher};
use crate::{Call, Conversation, Message, PhoneNumber, User};

/// Drives the fetch pipeline over a [`PhoneDataFetcher`]
pub struct FetchOrchestrator {
    fetcher: Arc<dyn PhoneDataFetcher>,
    failures: Arc<FailureAggregator>,
    progress: Option<ProgressBar>,
}

impl FetchOrchestrator {
    /// Create an orchestrator recording into `failures`
    pub fn new(fetcher: Arc<dyn PhoneDataFetcher>, failures: Arc<FailureAggregator>) -> Self {
        Self {
            fetcher,
            failures,
            progress: None,
        }
    }

    /// Advance `progress` once per completed user
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Shared failure sink
    pub fn failures(&self) -> &Arc<FailureAggregator> {
        &self.failures
    }

    /// Run the whole pipeline
    ///
    /// # Errors
    /// Fails when the user listing fails or any request is rejected with an
    /// authentication error. Every other failure is recorded and isolated.
    pub async fn run(&self, max_count: Option<usize>) -> FetcherResult<Vec<UserPhoneData>> {
        info!("Fetching users");
        let users = self.fetcher.list_users(max_count).await?;
        info!("Fetched {} users", users.len());

        if let Some(progress) = &self.progress {
            progress.set_length(users.len() as u64);
        }

        try_join_all(users.into_iter().map(|user| {
            let span = info_span!("user", user_id = %user.id);
            async move {
                let result = self.process_user(user).await;
                if let Some(progress) = &self.progress {
                    progress.inc(1);
                }
                result
            }
            .instrument(span)
        }))
        .await
    }

    async fn process_user(&self, user: User) -> FetcherResult<UserPhoneData> {
        info!("Processing user {} ({})", user.display_name(), user.id);

        let phone_numbers = match self.fetcher.phone_numbers_for_user(&user.id).await {
            Ok(numbers) => numbers,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(user_id = %user.id, "Failed to fetch phone numbers, skipping user: {}", e);
                self.failures
                    .add(PhoneNumbersFailure {
                        user_id: user.id.clone(),
                        user_name: user.display_name(),
                        error: e.to_string(),
                    })
                    .await;
                return Ok(UserPhoneData::empty(user));
            }
        };

        if phone_numbers.is_empty() {
            debug!("No phone numbers for user {}", user.id);
            return Ok(UserPhoneData::empty(user));
        }

        let phone_number_ids: Vec<String> = phone_numbers.iter().map(|n| n.id.clone()).collect();
        let ((conversations, calls), messages) = tokio::try_join!(
            self.conversation_branch(&user, &phone_number_ids),
            self.message_branch(&phone_numbers),
        )?;

        Ok(UserPhoneData {
            user,
            phone_numbers,
            conversations,
            calls,
            messages,
        })
    }

    /// Conversations, then calls with transcripts
    async fn conversation_branch(
        &self,
        user: &User,
        phone_number_ids: &[String],
    ) -> FetcherResult<(Vec<Conversation>, Vec<Call>)> {
        let conversations = match self.fetcher.conversations(phone_number_ids).await {
            Ok(conversations) => conversations,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    phone_number_ids = ?phone_number_ids,
                    "Failed to fetch conversations, skipping: {}", e
                );
                self.failures
                    .add(ConversationsFailure {
                        phone_number_ids: phone_number_ids.to_vec(),
                        user_id: user.id.clone(),
                        user_name: user.display_name(),
                        error: e.to_string(),
                    })
                    .await;
                return Ok((Vec::new(), Vec::new()));
            }
        };

        let calls = self.calls_with_transcripts(&conversations).await?;
        Ok((conversations, calls))
    }

    /// Calls of every conversation, de-duplicated by id, then transcripts
    async fn calls_with_transcripts(&self, conversations: &[Conversation]) -> FetcherResult<Vec<Call>> {
        let per_conversation = try_join_all(
            conversations
                .iter()
                .filter(|conversation| {
                    if conversation.participants.is_empty() {
                        debug!("Skipping conversation {}: no participants", conversation.id);
                        return false;
                    }
                    true
                })
                .map(|conversation| self.calls_for_conversation(conversation)),
        )
        .await?;

        let mut seen = HashSet::new();
        let calls: Vec<Call> = per_conversation
            .into_iter()
            .flatten()
            .filter(|call| seen.insert(call.id.clone()))
            .collect();

        try_join_all(calls.into_iter().map(|call| self.attach_transcript(call))).await
    }

    async fn calls_for_conversation(&self, conversation: &Conversation) -> FetcherResult<Vec<Call>> {
        let phone_number_id = conversation.phone_number_id.clone().unwrap_or_default();
        let result = try_join_all(
            conversation
                .participants
                .iter()
                .map(|participant| self.fetcher.calls_for_participant(&phone_number_id, participant)),
        )
        .await;

        match result {
            Ok(lists) => Ok(lists.into_iter().flatten().collect()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    phone_number_id = %phone_number_id,
                    participants = ?conversation.participants,
                    "Failed to fetch calls, skipping: {}", e
                );
                self.failures
                    .add(CallsFailure {
                        phone_number_id: conversation.phone_number_id.clone(),
                        participants: conversation.participants.clone(),
                        conversation_id: conversation.id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Ok(Vec::new())
            }
        }
    }

    /// A missing transcript is not a failure; any other error is recorded and
    /// the call is kept without one.
    async fn attach_transcript(&self, call: Call) -> FetcherResult<Call> {
        match self.fetcher.transcript(&call.id).await {
            Ok(transcript) => Ok(call.with_transcript(transcript)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(call_id = %call.id, "Failed to fetch transcript, skipping: {}", e);
                self.failures
                    .add(TranscriptsFailure {
                        call_id: call.id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Ok(call)
            }
        }
    }

    /// Messages of every phone number
    async fn message_branch(&self, phone_numbers: &[PhoneNumber]) -> FetcherResult<Vec<Message>> {
        let per_number = try_join_all(
            phone_numbers
                .iter()
                .map(|number| self.messages_for_number(number)),
        )
        .await?;
        Ok(per_number.into_iter().flatten().collect())
    }

    async fn messages_for_number(&self, number: &PhoneNumber) -> FetcherResult<Vec<Message>> {
        let phone_number = number.number.clone().unwrap_or_default();
        match self.fetcher.messages(&number.id, &phone_number).await {
            Ok(messages) => Ok(messages),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    phone_number_id = %number.id,
                    phone_number = %phone_number,
                    "Failed to fetch messages, skipping: {}", e
                );
                self.failures
                    .add(MessagesFailure {
                        phone_number_id: number.id.clone(),
                        phone_number,
                        user_id: number.user_id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Ok(Vec::new())
            }
        }
    }
}
