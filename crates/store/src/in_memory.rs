//! In-memory store: useful for testing and ephemeral deployments.

use async_trait::async_trait;
use chrono::Utc;
use repairkit_core::error::StoreError;
use repairkit_core::message::Role;
use repairkit_core::store::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sessions: Vec<Session>,
    messages: Vec<StoredMessage>,
    usage: Vec<UsageRecord>,
}

/// Keeps everything in process memory; lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_session(&self, user_id: &str) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str, user_id: &str) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .cloned())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        // Newest first; later-created sessions win ties.
        sessions.reverse();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|s| !(s.id == session_id && s.user_id == user_id));
        let removed = tables.sessions.len() < before;
        if removed {
            tables.messages.retain(|m| m.session_id != session_id);
        }
        Ok(removed)
    }

    async fn set_title(&self, session_id: &str, title: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        session.title = Some(title.to_string());
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        session.updated_at = now;

        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn record_usage(&self, record: UsageRecord) -> Result<(), StoreError> {
        self.tables.write().await.usage.push(record);
        Ok(())
    }

    async fn usage_totals(&self, user_id: &str) -> Result<UsageTotals, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .usage
            .iter()
            .filter(|r| r.user_id == user_id)
            .fold(UsageTotals::default(), |mut acc, r| {
                acc.input_tokens += u64::from(r.input_tokens);
                acc.output_tokens += u64::from(r.output_tokens);
                acc.total_tokens += r.total_tokens();
                acc.records += 1;
                acc
            }))
    }
}
