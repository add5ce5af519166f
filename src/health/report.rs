//! Serializable health report types.

use serde::Serialize;

use crate::health::score::{overall_health, recommendations, HEALTH_WARNING_THRESHOLD};
use crate::resilience::circuit_breaker::{CircuitBreakerMetrics, CircuitState};

/// Snapshot of one registered breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerReport {
    pub name: String,
    pub state: CircuitState,
    pub metrics: CircuitBreakerMetrics,
}

/// Whole-system view returned by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemResilienceReport {
    pub breakers: Vec<BreakerReport>,
    /// Score in [0, 100].
    pub overall_health: f64,
    pub recommendations: Vec<String>,
}

impl SystemResilienceReport {
    /// Score the given breakers. Breakers are reported sorted by name.
    pub fn from_breakers(mut breakers: Vec<BreakerReport>) -> Self {
        breakers.sort_by(|a, b| a.name.cmp(&b.name));
        let overall_health = overall_health(&breakers);
        let recommendations = recommendations(&breakers, overall_health);
        Self {
            breakers,
            overall_health,
            recommendations,
        }
    }

    pub fn open_breakers(&self) -> impl Iterator<Item = &str> {
        self.breakers
            .iter()
            .filter(|b| b.state == CircuitState::Open)
            .map(|b| b.name.as_str())
    }

    pub fn is_degraded(&self) -> bool {
        self.overall_health < HEALTH_WARNING_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, state: CircuitState) -> BreakerReport {
        BreakerReport {
            name: name.to_string(),
            state,
            metrics: CircuitBreakerMetrics {
                success_count: 0,
                failure_count: 0,
                rejected_count: 0,
                total_requests: 0,
                success_rate: 100.0,
                average_response_time_ms: 0.0,
                last_failure_time: None,
                last_success_time: None,
            },
        }
    }

    #[test]
    fn test_breakers_sorted_by_name() {
        let report = SystemResilienceReport::from_breakers(vec![
            report("ticker", CircuitState::Closed),
            report("balances", CircuitState::Open),
        ]);
        let names: Vec<_> = report.breakers.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["balances", "ticker"]);
        assert_eq!(report.open_breakers().collect::<Vec<_>>(), ["balances"]);
        assert!(report.is_degraded());
        assert!(!SystemResilienceReport::from_breakers(Vec::new()).is_degraded());
    }

    #[test]
    fn test_serializes_to_json() {
        let report = SystemResilienceReport::from_breakers(vec![report("orders", CircuitState::HalfOpen)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["breakers"][0]["state"], "half_open");
        assert_eq!(json["breakers"][0]["metrics"]["success_rate"], 100.0);
        assert!(json["overall_health"].is_number());
    }
}
