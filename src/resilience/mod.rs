//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator.rs: execute_resilient_operation(operation, options)
//!     → fallback.rs (only when strategies are supplied)
//!         → retries.rs (backoff.rs between attempts)
//!             → circuit_breaker.rs (admit, or fail fast when open)
//!                 → timeouts.rs (race the operation against call_timeout)
//!                 → operation
//!         → on failure: strategies in order, then cache.rs
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every guarded call has a deadline
//! - Client errors (4xx) and open circuits are never retried
//! - Circuit breakers are per operation name and shared by every caller
//! - Each layer is usable on its own; the coordinator only composes them

pub mod backoff;
pub mod cache;
pub mod circuit_breaker;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod retries;
pub mod timeouts;

pub use cache::FallbackCache;
pub use circuit_breaker::{BreakerEvent, CircuitBreaker, CircuitBreakerMetrics, CircuitState};
pub use coordinator::{execute_with_resilience, ResilienceCoordinator, ResilienceOptions, SimpleOptions};
pub use error::{ErrorKind, OperationFailure, ResilienceError};
pub use fallback::{fixed_value, strategy, FallbackCascade, FallbackOptions, FallbackStrategy};
pub use retries::{default_retry_predicate, execute_with_retry, RetryPolicy};
