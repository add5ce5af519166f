//! Periodic guarded probing.
//!
//! # Data Flow
//! ```text
//! ticker ──▶ probe::fetch through the coordinator ──▶ log outcome + health
//! settings file change ──▶ ConfigWatcher ──▶ coordinator.apply_settings
//! Ctrl-C / SIGTERM ──▶ coordinator.shutdown ──▶ background tasks drain
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tokio::sync::mpsc;

use crate::commands::probe::{fetch, http_client};
use crate::commands::CommandError;
use crate::config::watcher::ConfigWatcher;
use crate::config::ResilienceSettings;
use crate::lifecycle::wait_for_signal;
use crate::resilience::{ResilienceCoordinator, ResilienceOptions};

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// URL to probe.
    pub url: String,

    /// Seconds between probes.
    #[arg(long, default_value_t = 10)]
    pub interval_secs: u64,

    /// Per-request HTTP client timeout.
    #[arg(long, default_value_t = 10_000)]
    pub request_timeout_ms: u64,
}

pub async fn run(
    args: MonitorArgs,
    settings: ResilienceSettings,
    config_path: Option<PathBuf>,
) -> Result<(), CommandError> {
    let client = http_client(Duration::from_millis(args.request_timeout_ms))?;
    let coordinator = ResilienceCoordinator::new(settings);
    let background = coordinator.spawn_background();

    // The watcher stops when dropped, keep it for the whole loop.
    let (_watcher, _idle_tx, mut updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), None, updates)
        }
        None => {
            let (tx, updates) = mpsc::unbounded_channel();
            (None, Some(tx), updates)
        }
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    let signal = wait_for_signal();
    tokio::pin!(signal);

    tracing::info!(url = %args.url, interval_secs = args.interval_secs, "Monitoring started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = coordinator
                    .execute_resilient_operation(
                        || fetch(&client, &args.url),
                        ResilienceOptions::new(args.url.clone()),
                    )
                    .await;
                let report = coordinator.get_system_resilience_metrics();

                match result {
                    Ok(body) => tracing::info!(
                        url = %args.url,
                        bytes = body.len(),
                        overall_health = report.overall_health,
                        "Probe succeeded"
                    ),
                    Err(e) => tracing::warn!(
                        url = %args.url,
                        kind = ?e.kind(),
                        error = %e,
                        overall_health = report.overall_health,
                        "Probe failed"
                    ),
                }
                if report.is_degraded() {
                    tracing::warn!(
                        overall_health = report.overall_health,
                        open = ?report.open_breakers().collect::<Vec<_>>(),
                        "Resilience degraded"
                    );
                }
                for recommendation in &report.recommendations {
                    tracing::warn!(%recommendation, "Resilience recommendation");
                }
            }
            Some(settings) = updates.recv() => {
                coordinator.apply_settings(settings);
            }
            _ = &mut signal => break,
        }
    }

    coordinator.shutdown();
    for handle in background {
        let _ = handle.await;
    }
    Ok(())
}
