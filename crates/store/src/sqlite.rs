//! SQLite session store.
//!
//! Tables:
//! - `chat_sessions`: one row per session, owned by a user
//! - `messages`: chat turns, cascade-deleted with their session
//! - `usage_stats`: input/output token counts per exchange
//!
//! Timestamps are RFC 3339 text. Message order uses the integer rowid so
//! turns written within the same clock tick keep insertion order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use repairkit_core::error::StoreError;
use repairkit_core::message::Role;
use repairkit_core::store::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        if !in_memory {
            if let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
            }
        }

        // Every pooled connection to :memory: would see its own database.
        let max_connections = if in_memory { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {url}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                title       TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT UNIQUE NOT NULL,
                session_id  TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_stats (
                iid            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id        TEXT NOT NULL,
                session_id     TEXT NOT NULL,
                input_tokens   INTEGER NOT NULL,
                output_tokens  INTEGER NOT NULL,
                recorded_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("usage_stats table: {e}")))?;

        for (name, sql) in [
            (
                "sessions user index",
                "CREATE INDEX IF NOT EXISTS idx_sessions_user ON chat_sessions(user_id, updated_at DESC)",
            ),
            (
                "messages session index",
                "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, iid)",
            ),
            (
                "usage user index",
                "CREATE INDEX IF NOT EXISTS idx_usage_user ON usage_stats(user_id)",
            ),
        ] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width UTC timestamps so text ordering matches time ordering.
    fn stamp(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let col = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));
        let created_at: String = row.try_get("created_at").map_err(|e| col("created_at", e))?;
        let updated_at: String = row.try_get("updated_at").map_err(|e| col("updated_at", e))?;

        Ok(Session {
            id: row.try_get("id").map_err(|e| col("id", e))?,
            user_id: row.try_get("user_id").map_err(|e| col("user_id", e))?,
            title: row.try_get("title").map_err(|e| col("title", e))?,
            created_at: Self::parse_time(&created_at),
            updated_at: Self::parse_time(&updated_at),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let col = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));
        let role: String = row.try_get("role").map_err(|e| col("role", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| col("created_at", e))?;

        Ok(StoredMessage {
            id: row.try_get("id").map_err(|e| col("id", e))?,
            session_id: row.try_get("session_id").map_err(|e| col("session_id", e))?,
            role: Role::from_str(&role).map_err(StoreError::QueryFailed)?,
            content: row.try_get("content").map_err(|e| col("content", e))?,
            created_at: Self::parse_time(&created_at),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
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

        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, NULL, ?3, ?3)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(Self::stamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session failed: {e}")))?;

        debug!(session_id = %session.id, user_id, "Created session");
        Ok(session)
    }

    async fn get_session(&self, session_id: &str, user_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?1 AND user_id = ?2")
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET session failed: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST sessions failed: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?1 AND user_id = ?2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE session failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_title(&self, session_id: &str, title: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE chat_sessions SET title = ?1 WHERE id = ?2")
            .bind(title)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE title failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let created_at = Self::stamp(message.created_at);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        let touched = sqlx::query("UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2")
            .bind(&created_at)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE session failed: {e}")))?;
        if touched.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message.id)
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE session_id = ?1 ORDER BY iid ASC")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST messages failed: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn record_usage(&self, record: UsageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO usage_stats (user_id, session_id, input_tokens, output_tokens, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(i64::from(record.input_tokens))
        .bind(i64::from(record.output_tokens))
        .bind(Self::stamp(record.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT usage failed: {e}")))?;

        Ok(())
    }

    async fn usage_totals(&self, user_id: &str) -> Result<UsageTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(input_tokens), 0)  AS input_tokens,
                   COALESCE(SUM(output_tokens), 0) AS output_tokens,
                   COUNT(*)                        AS records
            FROM usage_stats WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SUM usage failed: {e}")))?;

        let input: i64 = row
            .try_get("input_tokens")
            .map_err(|e| StoreError::QueryFailed(format!("input_tokens column: {e}")))?;
        let output: i64 = row
            .try_get("output_tokens")
            .map_err(|e| StoreError::QueryFailed(format!("output_tokens column: {e}")))?;
        let records: i64 = row
            .try_get("records")
            .map_err(|e| StoreError::QueryFailed(format!("records column: {e}")))?;

        let input_tokens = input.max(0) as u64;
        let output_tokens = output.max(0) as u64;
        Ok(UsageTotals {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            records: records.max(0) as u64,
        })
    }
}
