//! Per-user aggregates and the consolidated document

use serde::{Deserialize, Serialize};

use crate::{Call, Conversation, Message, PhoneNumber, User};

/// Everything fetched for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPhoneData {
    /// The user
    pub user: User,
    /// Phone numbers assigned to the user
    pub phone_numbers: Vec<PhoneNumber>,
    /// Conversations across all of the user's numbers
    pub conversations: Vec<Conversation>,
    /// Calls, de-duplicated by id, with transcripts attached where available
    pub calls: Vec<Call>,
    /// Messages across all of the user's numbers
    pub messages: Vec<Message>,
}

impl UserPhoneData {
    /// A user record with empty dependent collections
    pub fn empty(user: User) -> Self {
        Self {
            user,
            ..Default::default()
        }
    }

    /// Calls carrying a transcript
    pub fn transcript_count(&self) -> usize {
        self.calls.iter().filter(|call| call.transcript.is_some()).count()
    }
}

/// The consolidated output document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedPhoneData {
    /// RFC 3339 creation time
    pub generated_at: String,
    /// Number of user records
    pub total_users: usize,
    /// Sum of conversation list lengths
    pub total_conversations: usize,
    /// Sum of call list lengths
    pub total_calls: usize,
    /// Sum of message list lengths
    pub total_messages: usize,
    /// Calls with a transcript attached
    pub total_transcripts: usize,
    /// Per-user records
    pub user_data: Vec<UserPhoneData>,
}

/// Fold per-user aggregates into the consolidated document.
///
/// Totals are summed over the emitted collections, so failed fetches simply
/// contribute nothing.
pub fn consolidate(user_data: Vec<UserPhoneData>, generated_at: impl Into<String>) -> ConsolidatedPhoneData {
    let total_conversations = user_data.iter().map(|u| u.conversations.len()).sum();
    let total_calls = user_data.iter().map(|u| u.calls.len()).sum();
    let total_messages = user_data.iter().map(|u| u.messages.len()).sum();
    let total_transcripts = user_data.iter().map(UserPhoneData::transcript_count).sum();

    ConsolidatedPhoneData {
        generated_at: generated_at.into(),
        total_users: user_data.len(),
        total_conversations,
        total_calls,
        total_messages,
        total_transcripts,
        user_data,
    }
}
