//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resilience layer.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resilience layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Defaults for circuit breakers created without an explicit config.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Default retry policy.
    pub retry: RetryConfig,

    /// Default fallback cascade settings.
    pub fallback: FallbackConfig,

    /// Fallback cache bounds and sweeping.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures (net of success decay) that trip a closed breaker.
    pub failure_threshold: u32,

    /// Successful half-open probes required to close again.
    pub success_threshold: u32,

    /// Per-call deadline in milliseconds.
    pub call_timeout_ms: u64,

    /// Time an open breaker waits before admitting a probe, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Quiet period after which a closed breaker's counters are cleared, in milliseconds.
    pub monitoring_period_ms: u64,

    /// Interval of the background metrics snapshot, in milliseconds.
    pub monitor_interval_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            call_timeout_ms: 30_000,
            reset_timeout_ms: 60_000,
            monitoring_period_ms: 300_000,
            monitor_interval_ms: 30_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,

    /// Add up to 10% random jitter to each delay.
    pub jitter_enabled: bool,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }
}

/// Fallback cascade configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FallbackConfig {
    /// Deadline for the primary attempt (including its retries) in milliseconds.
    pub timeout_ms: u64,

    /// Store successful primary results for last-resort reuse.
    pub caching_enabled: bool,

    /// Lifetime of a cached result in milliseconds.
    pub cache_ttl_ms: u64,
}

impl FallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            caching_enabled: true,
            cache_ttl_ms: 60_000,
        }
    }
}

/// Fallback cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results kept at once.
    pub max_entries: usize,

    /// Interval of the expired-entry sweep in seconds (0 disables the sweeper).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let settings = ResilienceSettings::default();
        assert_eq!(settings.circuit_breaker.failure_threshold, 5);
        assert_eq!(settings.circuit_breaker.success_threshold, 3);
        assert_eq!(settings.circuit_breaker.call_timeout(), Duration::from_secs(30));
        assert_eq!(settings.circuit_breaker.reset_timeout(), Duration::from_secs(60));
        assert_eq!(settings.circuit_breaker.monitoring_period(), Duration::from_secs(300));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay(), Duration::from_secs(1));
        assert_eq!(settings.retry.max_delay(), Duration::from_secs(30));
        assert_eq!(settings.retry.backoff_multiplier, 2.0);
        assert!(settings.retry.jitter_enabled);
        assert_eq!(settings.fallback.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ResilienceSettings = toml::from_str(
            r#"
            [circuit_breaker]
            failure_threshold = 2

            [retry]
            jitter_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.circuit_breaker.failure_threshold, 2);
        assert_eq!(settings.circuit_breaker.success_threshold, 3);
        assert!(!settings.retry.jitter_enabled);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.cache.max_entries, 1_000);
    }
}
