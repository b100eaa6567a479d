use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use common::storage::FilesystemGuildStore;
use race_engine::monitor::{MonitorSettings, RaceMonitor};
use race_engine::stats::FetchOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use worker::scheduler::run_scheduler;
use worker::{BungieClient, FilePublisher, WorkerAppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerAppConfig::load().context("Failed to load config")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.monitor.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        state_dir = %config.storage.state_dir,
        publish_dir = %config.storage.publish_dir,
        "Race worker starting"
    );

    let stats = Arc::new(BungieClient::new(&config.bungie).context("Failed to create Bungie client")?);
    let store = Arc::new(
        FilesystemGuildStore::new(PathBuf::from(&config.storage.state_dir))
            .await
            .context("Failed to open guild store")?,
    );
    let publisher = Arc::new(FilePublisher::new(PathBuf::from(&config.storage.publish_dir)));

    let settings = MonitorSettings {
        fetch: FetchOptions {
            activity_mode: config.bungie.activity_mode,
            max_pages: config.bungie.max_pages,
        },
        presence_tolerance_secs: config.monitor.presence_tolerance_secs,
        lock_grace_days: config.monitor.lock_grace_days,
    };
    let monitor = Arc::new(RaceMonitor::new(store.clone(), stats, publisher, settings));

    tokio::select! {
        _ = run_scheduler(monitor, store, config.monitor.clone()) => {
            error!("Scheduler stopped unexpectedly");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
