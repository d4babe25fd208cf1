//! SessionStore trait: persistence for chat sessions, messages and token usage.
//!
//! Sessions belong to exactly one user; every lookup that takes a
//! `user_id` must refuse sessions owned by someone else.

use crate::error::StoreError;
use crate::message::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,

    /// Short generated title, set after the first message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Token usage of one chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub session_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Aggregated usage for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub records: u64,
}

/// Implementations: SQLite (durable), in-memory (tests and ephemeral runs).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    async fn create_session(&self, user_id: &str) -> std::result::Result<Session, StoreError>;

    /// Fetch a session if it exists and is owned by `user_id`.
    async fn get_session(&self, session_id: &str, user_id: &str) -> std::result::Result<Option<Session>, StoreError>;

    /// All sessions of a user, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> std::result::Result<Vec<Session>, StoreError>;

    /// Delete a session and its messages. Returns false if nothing matched.
    async fn delete_session(&self, session_id: &str, user_id: &str) -> std::result::Result<bool, StoreError>;

    async fn set_title(&self, session_id: &str, title: &str) -> std::result::Result<(), StoreError>;

    /// Append a message and bump the session's `updated_at`.
    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> std::result::Result<StoredMessage, StoreError>;

    /// Messages of a session ordered by creation time, oldest first.
    async fn list_messages(&self, session_id: &str) -> std::result::Result<Vec<StoredMessage>, StoreError>;

    async fn record_usage(&self, record: UsageRecord) -> std::result::Result<(), StoreError>;

    async fn usage_totals(&self, user_id: &str) -> std::result::Result<UsageTotals, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_record_totals_do_not_overflow() {
        let record = UsageRecord {
            user_id: "u1".into(),
            session_id: "s1".into(),
            input_tokens: u32::MAX,
            output_tokens: 1,
            recorded_at: Utc::now(),
        };
        assert_eq!(record.total_tokens(), u64::from(u32::MAX) + 1);
    }
}
