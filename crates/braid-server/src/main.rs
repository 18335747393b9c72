use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use braid_api::auth::{AppState, AppStateInner};
use braid_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "braid=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("BRAID_DB_PATH").unwrap_or_else(|_| "braid.db".into());
    let host = std::env::var("BRAID_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BRAID_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let session_ttl_days: i64 = std::env::var("BRAID_SESSION_TTL_DAYS")
        .unwrap_or_else(|_| "7".into())
        .parse()?;
    let task_retention_days: i64 = std::env::var("BRAID_TASK_RETENTION_DAYS")
        .unwrap_or_else(|_| "14".into())
        .parse()?;
    let bot_template = std::env::var("BRAID_TASKBOT_TEMPLATE").ok();

    // Init database
    let db = braid_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher,
        session_ttl_days,
        task_retention_days,
        bot_template,
    });

    let app = braid_server::app(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Braid server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
