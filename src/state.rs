use std::sync::Arc;

use sqlx::SqlitePool;

use crate::audit::AuditSink;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub audit: Arc<dyn AuditSink>,
    pub config: AppConfig,
}
