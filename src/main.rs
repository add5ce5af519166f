//! resilience-guard
//!
//! Command-line front end for the resilience layer.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ ResilienceCoordinator ──▶ fallback ──▶ retry ──▶ circuit breaker ──▶ downstream
//!                     │                      │
//!                     │                      └──▶ strategies ──▶ TTL cache
//!                     │
//!                     ├──▶ breaker registry ──▶ health report (JSON)
//!                     └──▶ events ──▶ metrics (Prometheus, optional)
//! ```
//!
//! # Commands
//! - `simulate`: drive a synthetic flaky downstream and print the health report
//! - `probe <url>`: one guarded HTTP GET
//! - `monitor <url>`: probe periodically until Ctrl-C, with settings hot reload
//! - `check-config <path>`: load and validate a settings file

use clap::Parser;

use resilience_guard::commands::{self, Cli};
use resilience_guard::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    logging::init_logging(&settings.observability)?;
    tracing::info!("resilience-guard v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    commands::run(cli, settings).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
