//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, durations > 0, multiplier >= 1)
//! - Check relations between fields (max delay not below base delay)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceSettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use thiserror::Error;

use crate::config::schema::ResilienceSettings;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("retry.backoff_multiplier must be >= 1.0 (got {0})")]
    Multiplier(String),

    #[error("retry.max_delay_ms ({max}) is below retry.base_delay_ms ({base})")]
    DelayRange { base: u64, max: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a full settings tree, collecting every problem.
pub fn validate_config(settings: &ResilienceSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &settings.circuit_breaker;
    let non_zero = [
        ("circuit_breaker.failure_threshold", cb.failure_threshold as u64),
        ("circuit_breaker.success_threshold", cb.success_threshold as u64),
        ("circuit_breaker.call_timeout_ms", cb.call_timeout_ms),
        ("circuit_breaker.reset_timeout_ms", cb.reset_timeout_ms),
        ("circuit_breaker.monitoring_period_ms", cb.monitoring_period_ms),
        ("circuit_breaker.monitor_interval_ms", cb.monitor_interval_ms),
        ("retry.max_attempts", settings.retry.max_attempts as u64),
        ("fallback.timeout_ms", settings.fallback.timeout_ms),
        ("fallback.cache_ttl_ms", settings.fallback.cache_ttl_ms),
        ("cache.max_entries", settings.cache.max_entries as u64),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let multiplier = settings.retry.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        errors.push(ValidationError::Multiplier(multiplier.to_string()));
    }

    if settings.retry.max_delay_ms < settings.retry.base_delay_ms {
        errors.push(ValidationError::DelayRange {
            base: settings.retry.base_delay_ms,
            max: settings.retry.max_delay_ms,
        });
    }

    let obs = &settings.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
