//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from operation errors
//! - A timed-out future is dropped, not awaited; the remote side of the call
//!   may still complete and its result is discarded

use std::future::Future;
use std::time::Duration;

use crate::resilience::error::ResilienceError;

/// Race `future` against `duration`.
pub async fn with_timeout<T, E, Fut>(duration: Duration, future: Fut) -> Result<T, ResilienceError>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<ResilienceError>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ResilienceError::Timeout { after: duration }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::error::OperationFailure;

    #[tokio::test(start_paused = true)]
    async fn test_slow_future_times_out() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, OperationFailure>(())
        })
        .await;

        assert!(matches!(result, Err(ResilienceError::Timeout { after }) if after == Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_passes_through() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            Err(OperationFailure::with_status("boom", 500))
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
    }
}
