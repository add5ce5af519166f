//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Calculate exponential backoff delay, optionally with jitter.
///
/// `attempt` is 1-based: the delay before the first retry uses `base`.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base.as_millis() as f64 * multiplier.powi(exponent);
    let capped_ms = if delay_ms.is_finite() {
        delay_ms.min(max.as_millis() as f64) as u64
    } else {
        max.as_millis() as u64
    };

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_ms / 10;
    let jitter_ms = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// Backoff for `attempt` using a retry config.
pub fn backoff_for(config: &RetryConfig, attempt: u32) -> Duration {
    calculate_backoff(
        attempt,
        config.base_delay(),
        config.max_delay(),
        config.backoff_multiplier,
        config.jitter_enabled,
    )
}
