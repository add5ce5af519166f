//! Aggregate resilience health.
//!
//! # Data Flow
//! ```text
//! coordinator registry
//!     → BreakerReport per breaker (name, state, metrics)
//!     → score.rs (overall health, recommendations)
//!     → SystemResilienceReport (serializable, for a status endpoint)
//! ```
//!
//! # Design Decisions
//! - Scoring is a pure function of the breaker snapshots
//! - No registered breakers means nothing is failing: score 100

pub mod report;
pub mod score;

pub use report::{BreakerReport, SystemResilienceReport};
pub use score::{overall_health, recommendations};
