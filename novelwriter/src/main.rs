// NovelWriter - local-first novel writing assistant
// Entry point: opens the workspace and keeps it flushed until shutdown

use anyhow::Context;
use novelwriter::app::AppState;
use novelwriter::config::{DATA_DIR_ENV, DEFAULT_DATA_DIR};
use novelwriter::services::{lifecycle_channel, LifecycleSignal};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novelwriter=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NovelWriter");

    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let state = AppState::open(&data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;

    let (signals, receiver) = lifecycle_channel();
    let coordinator = state.coordinator.clone();
    let lifecycle = tokio::spawn(async move { coordinator.run(receiver).await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested");
    signals
        .send(LifecycleSignal::BeforeUnload)
        .await
        .context("lifecycle coordinator stopped early")?;
    drop(signals);

    lifecycle.await.context("lifecycle coordinator panicked")?;

    tracing::info!("NovelWriter stopped");
    Ok(())
}
