//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failure is worth retrying
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Client errors (4xx) are never retried; the request itself is wrong
//! - Circuit-open rejections are never retried; the breaker decides when to probe
//! - Jittered backoff prevents thundering herd
//! - No per-call state: one policy can serve any number of concurrent operations

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::backoff_for;
use crate::resilience::error::ResilienceError;

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&ResilienceError) -> bool + Send + Sync>;

/// Retry everything except client errors and open circuits.
pub fn default_retry_predicate(error: &ResilienceError) -> bool {
    if error.is_circuit_open() {
        return false;
    }
    !error.is_client_error()
}

/// Backoff settings plus the retry predicate.
#[derive(Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
    predicate: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            predicate: Arc::new(default_retry_predicate),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn single_attempt() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ResilienceError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn should_retry(&self, error: &ResilienceError) -> bool {
        (self.predicate)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run `operation` up to `policy.config.max_attempts` times.
///
/// On failure the last error is returned wrapped in
/// [`ResilienceError::RetryExhausted`], except circuit-open rejections which
/// are returned as they are.
pub async fn execute_with_retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
) -> Result<T, ResilienceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ResilienceError>,
{
    let max_attempts = policy.config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e.into(),
        };

        if attempt >= max_attempts || !policy.should_retry(&error) {
            return Err(exhausted(error, attempt));
        }

        let delay = backoff_for(&policy.config, attempt);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        metrics::record_retry();
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn exhausted(error: ResilienceError, attempts: u32) -> ResilienceError {
    if error.is_circuit_open() {
        return error;
    }
    tracing::debug!(attempts, error = %error, "Giving up");
    ResilienceError::RetryExhausted {
        attempts,
        source: Box::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::error::{ErrorKind, OperationFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_enabled: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();

        let result = execute_with_retry(
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OperationFailure::with_status("unavailable", 503))
                } else {
                    Ok("filled")
                }
            },
            &policy(3),
        )
        .await;

        assert_eq!(result.unwrap(), "filled");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms + 2000ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_double_between_attempts() {
        let stamps = std::sync::Mutex::new(Vec::new());
        let start = Instant::now();

        let result: Result<(), _> = execute_with_retry(
            || {
                stamps.lock().unwrap().push(start.elapsed().as_millis());
                async { Err(OperationFailure::new("connection reset")) }
            },
            &policy(4),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*stamps.lock().unwrap(), vec![0, 1000, 3000, 7000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_never_retried() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = execute_with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OperationFailure::with_status("symbol not found", 404))
            },
            &policy(5),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::RetryExhausted);
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("symbol not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_attempt_fails_without_extra_delay() {
        let start = Instant::now();

        let result: Result<(), _> = execute_with_retry(
            || async { Err(OperationFailure::new("down")) },
            &policy(2),
        )
        .await;

        match result.unwrap_err() {
            ResilienceError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_open_passes_through() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = execute_with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ResilienceError::CircuitOpen {
                    name: "orders".into(),
                    retry_after: Duration::from_secs(10),
                })
            },
            &policy(3),
        )
        .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let calls = &AtomicU32::new(0);
        let never = policy(3).with_predicate(|_| false);

        let result: Result<(), _> = execute_with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OperationFailure::with_status("unavailable", 503))
            },
            &never,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_predicate() {
        assert!(default_retry_predicate(&OperationFailure::new("reset").into()));
        assert!(default_retry_predicate(&OperationFailure::with_status("x", 502).into()));
        assert!(default_retry_predicate(&ResilienceError::Timeout {
            after: Duration::from_secs(1)
        }));
        assert!(!default_retry_predicate(&OperationFailure::with_status("x", 401).into()));
    }
}
