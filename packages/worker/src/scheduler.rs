//! Fixed-interval poll loop across every stored guild.

use std::sync::Arc;
use std::time::Duration;

use common::config::MonitorConfig;
use common::storage::GuildStore;
use futures::future::join_all;
use race_engine::monitor::RaceMonitor;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Counts for one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub guilds: usize,
    pub failed: usize,
}

/// Run one pass for every guild the store knows about.
///
/// Guilds run concurrently; races within a guild are sequential inside
/// the monitor. A failing guild is logged and does not affect the others.
pub async fn run_pass(monitor: &RaceMonitor, store: &dyn GuildStore) -> TickReport {
    let guilds = match store.list_guilds().await {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "Failed to list guilds");
            return TickReport::default();
        }
    };

    let results = join_all(
        guilds
            .iter()
            .map(|&guild| async move { (guild, monitor.check_race_completions(guild).await) }),
    )
    .await;

    let mut report = TickReport {
        guilds: guilds.len(),
        failed: 0,
    };
    for (guild, result) in results {
        if let Err(e) = result {
            report.failed += 1;
            error!(guild_id = guild, error = %e, "Completion check failed");
        }
    }
    report
}

/// Poll forever on `config.interval_secs`.
pub async fn run_scheduler(
    monitor: Arc<RaceMonitor>,
    store: Arc<dyn GuildStore>,
    config: MonitorConfig,
) {
    info!(
        interval_secs = config.interval_secs,
        run_on_start = config.run_on_start,
        "Starting race monitor"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !config.run_on_start {
        // The first tick completes immediately.
        interval.tick().await;
    }

    loop {
        interval.tick().await;
        let report = run_pass(&monitor, store.as_ref()).await;
        info!(guilds = report.guilds, failed = report.failed, "Poll pass complete");
    }
}
