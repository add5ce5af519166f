//! Failure types for guarded operations.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Structured failure returned by a guarded operation.
///
/// `status` carries an HTTP-like code when the downstream reported one; the
/// default retry predicate uses it to skip client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl OperationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// True for 4xx codes.
    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(is_client_status)
    }
}

/// Coarse failure category, exposed for callers that branch on the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CircuitOpen,
    Timeout,
    Operation,
    RetryExhausted,
    FallbackExhausted,
}

/// Errors surfaced by the resilience layer.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError {
    /// Breaker is open and its reset deadline has not passed.
    #[error("circuit breaker '{name}' is open, retry in {}ms", .retry_after.as_millis())]
    CircuitOpen { name: String, retry_after: Duration },

    /// The call did not finish within its deadline.
    #[error("operation timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// The operation itself failed.
    #[error(transparent)]
    Operation(#[from] OperationFailure),

    /// Retries exhausted, or the failure was not worth retrying.
    #[error("operation failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ResilienceError>,
    },

    /// Primary, every fallback strategy and the cache all failed.
    #[error("all fallback strategies failed and no cached value is available; primary failure: {primary}")]
    FallbackExhausted {
        #[source]
        primary: Box<ResilienceError>,
    },
}

impl ResilienceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Operation(_) => ErrorKind::Operation,
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Self::FallbackExhausted { .. } => ErrorKind::FallbackExhausted,
        }
    }

    /// Status code of the innermost operation failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Operation(failure) => failure.status,
            Self::RetryExhausted { source, .. } => source.status(),
            Self::FallbackExhausted { primary } => primary.status(),
            Self::CircuitOpen { .. } | Self::Timeout { .. } => None,
        }
    }

    /// True when the innermost operation failure carries a 4xx code.
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(is_client_status)
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

fn is_client_status(status: u16) -> bool {
    (400..=499).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_range() {
        assert!(OperationFailure::with_status("not found", 404).is_client_error());
        assert!(OperationFailure::with_status("bad request", 400).is_client_error());
        assert!(!OperationFailure::with_status("unavailable", 503).is_client_error());
        assert!(!OperationFailure::new("connection reset").is_client_error());
    }

    #[test]
    fn test_status_survives_wrapping() {
        let inner = ResilienceError::from(OperationFailure::with_status("rate limited", 429));
        let retried = ResilienceError::RetryExhausted {
            attempts: 1,
            source: Box::new(inner),
        };
        assert_eq!(retried.status(), Some(429));
        assert_eq!(retried.kind(), ErrorKind::RetryExhausted);

        let exhausted = ResilienceError::FallbackExhausted {
            primary: Box::new(retried),
        };
        assert_eq!(exhausted.status(), Some(429));
        assert!(exhausted.is_client_error());
    }

    #[test]
    fn test_error_display() {
        let err = ResilienceError::Timeout {
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "operation timed out after 250ms");

        let err = ResilienceError::FallbackExhausted {
            primary: Box::new(OperationFailure::new("exchange down").into()),
        };
        assert!(err.to_string().contains("exchange down"));

        let err = ResilienceError::CircuitOpen {
            name: "ticker".into(),
            retry_after: Duration::from_secs(3),
        };
        assert!(err.is_circuit_open());
        assert!(err.to_string().contains("'ticker'"));
    }
}
