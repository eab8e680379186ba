use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use paisa_core::CategoryTable;
use paisa_extract::{GateConfig, ReviewLog, RuleSet};
use paisa_storage::PersistenceGateway;

mod config;
mod pipeline;
mod routes;

use config::Config;
use pipeline::Pipeline;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let pool = paisa_storage::create_db(&config.database_path).await?;

    let pipeline = Pipeline::new(
        RuleSet::builtin()?,
        GateConfig::builtin(),
        CategoryTable::builtin(),
        ReviewLog::new(&config.review_log),
        PersistenceGateway::new(pool.clone()),
        config.batch_size,
    );

    // Batch-granular cancellation: the flag flips on shutdown and the
    // pipeline finishes its in-flight batch before stopping.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = cancel_tx.send(true);
        }
    });

    let state = AppState {
        pipeline: Arc::new(pipeline),
        pool,
        config: Arc::new(config.clone()),
        cancel: cancel_rx.clone(),
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, "paisa server listening");

    let mut shutdown = cancel_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // Resolves when the cancel flag flips to true.
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
