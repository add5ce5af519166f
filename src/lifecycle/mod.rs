//! Lifecycle management.
//!
//! # Responsibilities
//! - Broadcast a shutdown signal to background tasks
//! - Translate OS signals into that shutdown
//!
//! # Design Decisions
//! - Background tasks never outlive an explicit shutdown
//! - Breaker state is in-memory only; nothing is flushed on exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
