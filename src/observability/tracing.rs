//! Span helpers for guarded calls.
//!
//! Every resilient call gets a fresh UUID v4 so log lines from its retries,
//! breaker decisions and fallbacks can be correlated.

use tracing::Span;
use uuid::Uuid;

/// Create the span wrapping one coordinator call.
pub fn call_span(operation: &str) -> (Span, Uuid) {
    let call_id = Uuid::new_v4();
    let span = tracing::info_span!("resilient_call", operation = %operation, call_id = %call_id);
    (span, call_id)
}
