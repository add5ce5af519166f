//! Fault-tolerance layer for calls to unreliable downstream services.
//!
//! Circuit breakers, retries with exponential backoff, and a fallback cascade
//! with a TTL cache, composed per call by a [`ResilienceCoordinator`].

pub mod commands;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ResilienceSettings;
pub use health::SystemResilienceReport;
pub use lifecycle::Shutdown;
pub use resilience::{
    execute_with_resilience, OperationFailure, ResilienceCoordinator, ResilienceError,
    ResilienceOptions, SimpleOptions,
};
