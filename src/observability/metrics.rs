//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): guarded calls by breaker, outcome
//! - `resilience_call_duration_seconds` (histogram): latency of successful calls
//! - `resilience_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `resilience_breaker_rejections_total` (counter): fast-failed calls
//! - `resilience_breaker_success_rate` (gauge): last monitored success rate, percent
//! - `resilience_retries_total` (counter): retry attempts scheduled
//! - `resilience_fallback_total` (counter): cascade outcomes by source
//! - `resilience_cache_entries` (gauge): live fallback cache entries
//! - `resilience_overall_health` (gauge): aggregate score 0-100
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is opt-in via settings

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(breaker: &str, outcome: &'static str) {
    counter!("resilience_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_call_duration(breaker: &str, elapsed: Duration) {
    histogram!("resilience_call_duration_seconds", "breaker" => breaker.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("resilience_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_rejection(breaker: &str) {
    counter!("resilience_breaker_rejections_total", "breaker" => breaker.to_string())
        .increment(1);
}

pub fn record_success_rate(breaker: &str, rate: f64) {
    gauge!("resilience_breaker_success_rate", "breaker" => breaker.to_string()).set(rate);
}

pub fn record_retry() {
    counter!("resilience_retries_total").increment(1);
}

pub fn record_fallback(source: &'static str) {
    counter!("resilience_fallback_total", "source" => source).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("resilience_cache_entries").set(entries as f64);
}

pub fn record_overall_health(score: f64) {
    gauge!("resilience_overall_health").set(score);
}
