//! Branch-local failure collection
//!
//! Every non-fatal fetch error is turned into a [`FailureRecord`] carrying the
//! parameters needed to retry that fetch on its own. Records are appended to a
//! shared [`FailureAggregator`] from concurrently running branches and read back
//! once all of them have finished.

use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::metrics::record_fetch_failure;

/// Failure categories, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Phone numbers of a user
    PhoneNumbers,
    /// Batched conversations of a user's phone numbers
    Conversations,
    /// Calls of one conversation
    Calls,
    /// Messages of one phone number
    Messages,
    /// Transcript of one call
    Transcripts,
}

impl FailureCategory {
    /// Every category in report order
    pub const ALL: [FailureCategory; 5] = [
        Self::PhoneNumbers,
        Self::Conversations,
        Self::Calls,
        Self::Messages,
        Self::Transcripts,
    ];

    /// Key used in the failure report
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhoneNumbers => "phone_numbers",
            Self::Conversations => "conversations",
            Self::Calls => "calls",
            Self::Messages => "messages",
            Self::Transcripts => "transcripts",
        }
    }

    /// What failed and how to retry it
    pub fn description(&self) -> &'static str {
        match self {
            Self::PhoneNumbers => {
                "Failed to fetch phone numbers for these users. Retry with: phone_numbers_for_user(userId)"
            }
            Self::Conversations => {
                "Failed to fetch conversations. Retry with: conversations(phoneNumberIds)"
            }
            Self::Calls => {
                "Failed to fetch calls. Retry with: calls_for_participant(phoneNumberId, participant) for each participant"
            }
            Self::Messages => {
                "Failed to fetch messages. Retry with: messages(phoneNumberId, phoneNumber)"
            }
            Self::Transcripts => "Failed to fetch transcripts. Retry with: transcript(callId)",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phone number listing failed for a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumbersFailure {
    /// User whose data failed
    pub user_id: String,
    /// Display name of the user
    pub user_name: String,
    /// Stringified error
    pub error: String,
}

/// Batched conversation listing failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsFailure {
    /// Phone number ids of the batched request
    pub phone_number_ids: Vec<String>,
    /// User whose data failed
    pub user_id: String,
    /// Display name of the user
    pub user_name: String,
    /// Stringified error
    pub error: String,
}

/// Call listing failed for a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsFailure {
    /// Phone number id of the conversation
    pub phone_number_id: Option<String>,
    /// Conversation participants
    pub participants: Vec<String>,
    /// Conversation id
    pub conversation_id: String,
    /// Stringified error
    pub error: String,
}

/// Message listing failed for a phone number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesFailure {
    /// Phone number id
    pub phone_number_id: String,
    /// Phone number in E.164 form
    pub phone_number: String,
    /// Owning user
    pub user_id: Option<String>,
    /// Stringified error
    pub error: String,
}

/// Transcript fetch failed for a call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptsFailure {
    /// Call id
    pub call_id: String,
    /// Stringified error
    pub error: String,
}

/// One failed fetch with its retry parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FailureRecord {
    /// Phone numbers of a user
    PhoneNumbers(PhoneNumbersFailure),
    /// Conversations of a user
    Conversations(ConversationsFailure),
    /// Calls of a conversation
    Calls(CallsFailure),
    /// Messages of a phone number
    Messages(MessagesFailure),
    /// Transcript of a call
    Transcripts(TranscriptsFailure),
}

impl FailureRecord {
    /// Category the record is filed under
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::PhoneNumbers(_) => FailureCategory::PhoneNumbers,
            Self::Conversations(_) => FailureCategory::Conversations,
            Self::Calls(_) => FailureCategory::Calls,
            Self::Messages(_) => FailureCategory::Messages,
            Self::Transcripts(_) => FailureCategory::Transcripts,
        }
    }

    /// Stringified error
    pub fn error(&self) -> &str {
        match self {
            Self::PhoneNumbers(r) => &r.error,
            Self::Conversations(r) => &r.error,
            Self::Calls(r) => &r.error,
            Self::Messages(r) => &r.error,
            Self::Transcripts(r) => &r.error,
        }
    }
}

macro_rules! impl_from_failure {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FailureRecord {
                fn from(record: $ty) -> Self {
                    Self::$variant(record)
                }
            }
        )*
    };
}

impl_from_failure!(
    PhoneNumbersFailure => PhoneNumbers,
    ConversationsFailure => Conversations,
    CallsFailure => Calls,
    MessagesFailure => Messages,
    TranscriptsFailure => Transcripts,
);

/// Records grouped by category
pub type FailureSnapshot = BTreeMap<FailureCategory, Vec<FailureRecord>>;

/// Concurrency-safe, append-only failure sink
#[derive(Debug, Default)]
pub struct FailureAggregator {
    records: Mutex<FailureSnapshot>,
}

impl FailureAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record under its category
    pub async fn add(&self, record: impl Into<FailureRecord>) {
        let record = record.into();
        let category = record.category();
        record_fetch_failure(category.as_str());
        self.records
            .lock()
            .await
            .entry(category)
            .or_default()
            .push(record);
    }

    /// Whether anything was recorded
    pub async fn has_failures(&self) -> bool {
        self.records.lock().await.values().any(|list| !list.is_empty())
    }

    /// Number of records in one category
    pub async fn count(&self, category: FailureCategory) -> usize {
        self.records
            .lock()
            .await
            .get(&category)
            .map_or(0, Vec::len)
    }

    /// Copy of everything recorded so far
    pub async fn snapshot(&self) -> FailureSnapshot {
        self.records.lock().await.clone()
    }
}

/// One category in the failure report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSection {
    /// Number of items
    pub count: usize,
    /// What failed and how to retry it
    pub description: &'static str,
    /// Retry parameters of every failure
    pub items: Vec<FailureRecord>,
}

/// The persisted failure report; only non-empty categories appear
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// RFC 3339 creation time
    pub generated_at: String,
    /// Sum over all categories
    pub total_failed: usize,
    #[serde(flatten)]
    /// Non-empty categories
    pub categories: BTreeMap<FailureCategory, FailureSection>,
}

impl FailureReport {
    /// Build the report, or `None` when nothing failed
    pub fn from_snapshot(snapshot: FailureSnapshot, generated_at: impl Into<String>) -> Option<Self> {
        let categories: BTreeMap<_, _> = snapshot
            .into_iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(category, items)| {
                let section = FailureSection {
                    count: items.len(),
                    description: category.description(),
                    items,
                };
                (category, section)
            })
            .collect();

        if categories.is_empty() {
            return None;
        }

        Some(Self {
            generated_at: generated_at.into(),
            total_failed: categories.values().map(|section| section.count).sum(),
            categories,
        })
    }

    /// Count for one category (0 when absent)
    pub fn count(&self, category: FailureCategory) -> usize {
        self.categories.get(&category).map_or(0, |section| section.count)
    }

    /// `phone_numbers=1, calls=2` style breakdown for log lines
    pub fn breakdown(&self) -> String {
        FailureCategory::ALL
            .iter()
            .map(|category| format!("{}={}", category, self.count(*category)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
