//! Append-only log of answered chat requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub metadata: Value,
}

#[derive(Clone)]
pub struct InteractionLog {
    pool: SqlitePool,
}

impl InteractionLog {
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let log = Self { pool };
        log.init_schema().await?;
        Ok(log)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chatbot_interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                page_url TEXT,
                user_agent TEXT,
                referrer TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_interactions_session ON chatbot_interactions(session_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record(&self, record: &InteractionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO chatbot_interactions
                (session_id, question, answer, page_url, user_agent, referrer, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.session_id)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(&record.page_url)
        .bind(&record.user_agent)
        .bind(&record.referrer)
        .bind(record.metadata.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Writes `record` on a detached task. Failures are logged and never
    /// reach the caller.
    pub fn dispatch(&self, record: InteractionRecord) -> JoinHandle<()> {
        let log = self.clone();
        tokio::spawn(async move {
            if let Err(err) = log.record(&record).await {
                tracing::warn!(
                    "Failed to log interaction for session {}: {}",
                    record.session_id,
                    err
                );
            }
        })
    }
}
