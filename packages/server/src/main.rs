use std::sync::Arc;

use anyhow::Context;
use tracing::{Level, info, warn};

use judge_server::config::AppConfig;
use judge_server::consumers::consume_verdicts;
use judge_server::live::NotificationHub;
use judge_server::pipeline::run_pending_sweep;
use judge_server::state::AppState;
use judge_server::{build_router, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let storage = storage::connect(&config.database)
        .await
        .context("failed to connect to storage")?;
    let channel = mq::connect(&config.mq)
        .await
        .context("failed to connect to message broker")?;

    let state = AppState {
        storage,
        channel: channel.clone(),
        hub: Arc::new(NotificationHub::new()),
        config: config.clone(),
    };

    let mut background = vec![tokio::spawn(consume_verdicts(state.clone()))];
    if config.recovery.enabled {
        background.push(tokio::spawn(run_pending_sweep(state.clone())));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The Redis consumer loop does not observe `close`
    for task in &background {
        task.abort();
    }
    if let Err(e) = channel.close().await {
        warn!(error = %e, "Failed to close message channel");
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
