use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use registrar::chain::CliChain;
use registrar::config::AppConfig;
use registrar::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    // --- SQLite ---
    let pool = ledger::connect(&cfg.database_url)
        .await
        .context("Failed to open ledger database")?;

    ledger::migrate(&pool)
        .await
        .context("Failed to run migrations")?;

    let chain = Arc::new(CliChain::new(cfg.chain_cli.clone()));
    let state = Arc::new(AppState::new(cfg.clone(), pool, chain));

    // RECOVERY: intents left mid-flight by a previous run cannot be resumed safely
    state
        .intents
        .fail_abandoned("process_restart")
        .await
        .context("Intent recovery failed")?;

    let app = registrar::router(state.clone());

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, chain_cli = %cfg.chain_cli, "registrar listening");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("registrar: shutting down");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!(running = state.tasks.len(), "registrar: draining workflows");
    state.drain().await;

    Ok(())
}
