//! Overall health score and recommendations.
//!
//! ```text
//! overall = (0.6 * closed_fraction + 0.4 * avg_success_rate / 100) * 100
//! ```

use crate::health::report::BreakerReport;
use crate::resilience::circuit_breaker::CircuitState;

const CLOSED_WEIGHT: f64 = 0.6;
const SUCCESS_RATE_WEIGHT: f64 = 0.4;

/// Breakers below this success rate (percent) get a recommendation.
pub const SUCCESS_RATE_WARNING_THRESHOLD: f64 = 90.0;

/// Overall scores below this get a generic warning.
pub const HEALTH_WARNING_THRESHOLD: f64 = 80.0;

/// Aggregate score in [0, 100]. An empty registry scores 100.
pub fn overall_health(breakers: &[BreakerReport]) -> f64 {
    if breakers.is_empty() {
        return 100.0;
    }

    let count = breakers.len() as f64;
    let closed = breakers
        .iter()
        .filter(|b| b.state == CircuitState::Closed)
        .count() as f64;
    let avg_success_rate = breakers.iter().map(|b| b.metrics.success_rate).sum::<f64>() / count;

    let score = (CLOSED_WEIGHT * (closed / count) + SUCCESS_RATE_WEIGHT * (avg_success_rate / 100.0)) * 100.0;
    score.clamp(0.0, 100.0)
}

/// Plain-language advice derived from the breaker snapshots.
pub fn recommendations(breakers: &[BreakerReport], overall: f64) -> Vec<String> {
    let mut out = Vec::new();

    for breaker in breakers.iter().filter(|b| b.state == CircuitState::Open) {
        out.push(format!(
            "Circuit breaker '{}' is open; investigate the downstream service",
            breaker.name
        ));
    }

    for breaker in breakers
        .iter()
        .filter(|b| b.metrics.success_rate < SUCCESS_RATE_WARNING_THRESHOLD)
    {
        out.push(format!(
            "'{}' has a low success rate ({:.1}%); consider tuning retries or adding fallbacks",
            breaker.name, breaker.metrics.success_rate
        ));
    }

    if overall < HEALTH_WARNING_THRESHOLD {
        out.push(format!(
            "Overall resilience health is {overall:.1}; review failing dependencies"
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitBreakerMetrics;

    fn breaker(name: &str, state: CircuitState, success_rate: f64) -> BreakerReport {
        BreakerReport {
            name: name.to_string(),
            state,
            metrics: CircuitBreakerMetrics {
                success_count: 0,
                failure_count: 0,
                rejected_count: 0,
                total_requests: 0,
                success_rate,
                average_response_time_ms: 0.0,
                last_failure_time: None,
                last_success_time: None,
            },
        }
    }

    #[test]
    fn test_empty_registry_is_fully_healthy() {
        assert_eq!(overall_health(&[]), 100.0);
        assert!(recommendations(&[], 100.0).is_empty());
    }

    #[test]
    fn test_all_closed_and_successful() {
        let breakers = [
            breaker("ticker", CircuitState::Closed, 100.0),
            breaker("orders", CircuitState::Closed, 100.0),
        ];
        let score = overall_health(&breakers);
        assert!((score - 100.0).abs() < f64::EPSILON);
        assert!(recommendations(&breakers, score).is_empty());
    }

    #[test]
    fn test_weighted_formula() {
        // closed fraction 0.5, average success rate 50%
        let breakers = [
            breaker("ticker", CircuitState::Closed, 100.0),
            breaker("orders", CircuitState::Open, 0.0),
        ];
        let score = overall_health(&breakers);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_recommendations() {
        let breakers = [
            breaker("ticker", CircuitState::Closed, 85.0),
            breaker("orders", CircuitState::Open, 20.0),
        ];
        let score = overall_health(&breakers);
        let advice = recommendations(&breakers, score);

        assert_eq!(advice.len(), 4);
        assert!(advice[0].contains("'orders' is open"));
        assert!(advice.iter().any(|a| a.contains("'ticker' has a low success rate (85.0%)")));
        assert!(advice.iter().any(|a| a.contains("'orders' has a low success rate")));
        assert!(advice.last().unwrap().starts_with("Overall resilience health"));
    }

    #[test]
    fn test_half_open_is_not_counted_as_closed() {
        let breakers = [breaker("ticker", CircuitState::HalfOpen, 100.0)];
        let score = overall_health(&breakers);
        assert!((score - 40.0).abs() < 1e-9);
        // Not open, success rate fine, only the overall warning applies.
        assert_eq!(recommendations(&breakers, score).len(), 1);
    }
}
