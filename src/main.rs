use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lms_backend::api::router;
use lms_backend::audit::SqlAuditSink;
use lms_backend::config::AppConfig;
use lms_backend::db::MIGRATOR;
use lms_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lms_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    MIGRATOR.run(&pool).await?;

    let state = AppState {
        db: pool.clone(),
        audit: Arc::new(SqlAuditSink::new(pool.clone())),
        config: config.clone(),
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
