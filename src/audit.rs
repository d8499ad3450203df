use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;

/// Append-only activity trail consumed by the admin screens. The enrollment
/// and quiz services only ever write to it.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, user_id: &str, activity: &str) -> Result<(), AppError>;
}

pub struct SqlAuditSink {
    db: SqlitePool,
}

impl SqlAuditSink {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn record(&self, user_id: &str, activity: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO user_activity_log (user_id, activity, timestamp) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(activity)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

/// Discards everything. Used by tests that exercise the services without
/// caring about the trail.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _user_id: &str, _activity: &str) -> Result<(), AppError> {
        Ok(())
    }
}
