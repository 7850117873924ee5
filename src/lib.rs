pub mod calendar;
pub mod config;
pub mod db;
pub mod models;
pub mod moderation;
pub mod pricing;
pub mod reminders;
pub mod repo;
pub mod schedule;
pub mod scraping;
pub mod server;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use config::AppConfig;
use db::{DocumentStore, SqliteStore};
use server::AppState;

/// Opens the store, starts the reminder loop and serves HTTP until ctrl-c.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let db_path = config.database_path();
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::connect(&db_path)
            .with_context(|| format!("failed to open store at {}", db_path.display()))?,
    );
    info!(path = %db_path.display(), "document store ready");

    let reminders = tokio::spawn(reminders::run_scheduler(
        Arc::clone(&store),
        config.reminder_interval(),
    ));

    let state = AppState::new(Arc::clone(&store), config).context("failed to build scraper")?;
    let app = server::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("happns listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reminders.abort();
    if let Err(err) = store.dispose() {
        warn!("store did not close cleanly: {err}");
    }
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
