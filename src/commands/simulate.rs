//! Synthetic failure injection.
//!
//! Calls a fake downstream that fails at a configurable rate, then prints a
//! summary of the outcomes and the system health report as JSON.

use std::time::Duration;

use clap::Args;
use serde::Serialize;

use crate::commands::CommandError;
use crate::config::ResilienceSettings;
use crate::health::SystemResilienceReport;
use crate::resilience::{
    fixed_value, ErrorKind, OperationFailure, ResilienceCoordinator, ResilienceError,
    ResilienceOptions,
};

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of guarded calls to make.
    #[arg(long, default_value_t = 20)]
    pub calls: u32,

    /// Probability in [0, 1] that a call fails.
    #[arg(long, default_value_t = 0.3)]
    pub failure_rate: f64,

    /// Upper bound of the simulated downstream latency.
    #[arg(long, default_value_t = 50)]
    pub max_latency_ms: u64,

    /// Breaker name for the simulated operation.
    #[arg(long, default_value = "synthetic")]
    pub operation: String,

    /// Serve this value when everything else fails.
    #[arg(long)]
    pub fallback: Option<u64>,

    /// Seed for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Outcome counts for one simulation run.
#[derive(Debug, Default, Serialize)]
pub struct SimulationSummary {
    pub calls: u32,
    pub succeeded: u32,
    pub circuit_open: u32,
    pub retry_exhausted: u32,
    pub fallback_exhausted: u32,
    pub other_failures: u32,
}

impl SimulationSummary {
    fn record(&mut self, outcome: &Result<u64, ResilienceError>) {
        self.calls += 1;
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(e) => match e.kind() {
                ErrorKind::CircuitOpen => self.circuit_open += 1,
                ErrorKind::RetryExhausted => self.retry_exhausted += 1,
                ErrorKind::FallbackExhausted => self.fallback_exhausted += 1,
                ErrorKind::Timeout | ErrorKind::Operation => self.other_failures += 1,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationOutput {
    summary: SimulationSummary,
    report: SystemResilienceReport,
}

pub async fn run(args: SimulateArgs, settings: ResilienceSettings) -> Result<(), CommandError> {
    let coordinator = ResilienceCoordinator::new(settings);
    let background = coordinator.spawn_background();

    let summary = simulate(&coordinator, &args).await;
    let output = SimulationOutput {
        summary,
        report: coordinator.get_system_resilience_metrics(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    coordinator.shutdown();
    for handle in background {
        let _ = handle.await;
    }
    Ok(())
}

/// Run the configured number of calls against the synthetic downstream.
pub async fn simulate(coordinator: &ResilienceCoordinator, args: &SimulateArgs) -> SimulationSummary {
    let mut rng = match args.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    let failure_rate = args.failure_rate.clamp(0.0, 1.0);
    let mut summary = SimulationSummary::default();

    tracing::info!(calls = args.calls, failure_rate, operation = %args.operation, "Starting simulation");

    for call in 0..args.calls {
        let mut options = ResilienceOptions::new(args.operation.clone());
        if let Some(value) = args.fallback {
            options = options
                .with_fallback(fixed_value(value))
                .with_cache_key(args.operation.clone());
        }

        let outcome = coordinator
            .execute_resilient_operation(
                || {
                    let fail = rng.f64() < failure_rate;
                    let latency = Duration::from_millis(rng.u64(0..=args.max_latency_ms));
                    async move {
                        tokio::time::sleep(latency).await;
                        if fail {
                            Err(OperationFailure::with_status("injected failure", 503))
                        } else {
                            Ok(u64::from(call))
                        }
                    }
                },
                options,
            )
            .await;

        if let Err(e) = &outcome {
            tracing::debug!(call, error = %e, "Simulated call failed");
        }
        summary.record(&outcome);
    }

    summary
}
