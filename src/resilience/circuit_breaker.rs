//! Circuit breaker guarding one named downstream operation.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: probing whether the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first call after the reset deadline
//! Half-Open → Closed: success_threshold probes succeed
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - Per-operation breaker (not global), owned by the coordinator registry
//! - Fail fast in Open state, the operation is never invoked
//! - Successes while Closed decay the failure count by one, so sporadic
//!   failures never accumulate into a trip
//! - Quiet-period healing only clears counters while Closed; Open and
//!   Half-Open recover through the reset deadline and probes instead
//! - State lives behind one mutex; events are published after it is released

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::{ErrorKind, ResilienceError};
use crate::resilience::timeouts::with_timeout;

/// Response-time samples kept for the moving average.
const RESPONSE_TIME_WINDOW: usize = 100;

/// Capacity of a breaker's own event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub total_requests: u64,
    /// Percentage in [0, 100]; 100 before any request.
    pub success_rate: f64,
    /// Mean of the last 100 successful calls, in milliseconds.
    pub average_response_time_ms: f64,
    /// Unix epoch milliseconds.
    pub last_failure_time: Option<u64>,
    /// Unix epoch milliseconds.
    pub last_success_time: Option<u64>,
}

/// Notification published by a breaker.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    StateChanged {
        name: String,
        from: CircuitState,
        to: CircuitState,
    },
    Success {
        name: String,
        elapsed: Duration,
    },
    Failure {
        name: String,
        kind: ErrorKind,
        error: String,
    },
    Rejected {
        name: String,
    },
    Metrics {
        name: String,
        state: CircuitState,
        snapshot: CircuitBreakerMetrics,
    },
}

impl BreakerEvent {
    /// Name of the breaker that published the event.
    pub fn breaker(&self) -> &str {
        match self {
            BreakerEvent::StateChanged { name, .. }
            | BreakerEvent::Success { name, .. }
            | BreakerEvent::Failure { name, .. }
            | BreakerEvent::Rejected { name }
            | BreakerEvent::Metrics { name, .. } => name,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    failure_count: u64,
    success_count: u64,
    rejected_count: u64,
    /// Successful probes since the last entry into Half-Open.
    probe_successes: u32,
    open_until: Option<Instant>,
    last_failure_at: Option<Instant>,
    last_failure_time: Option<u64>,
    last_success_time: Option<u64>,
    response_times: VecDeque<Duration>,
}

impl BreakerState {
    fn clear_counters(&mut self) {
        self.failure_count = 0;
        self.success_count = 0;
        self.rejected_count = 0;
    }
}

type Transition = (CircuitState, CircuitState);

/// A circuit breaker for one named operation.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    events: broadcast::Sender<BreakerEvent>,
}

impl CircuitBreaker {
    /// Create a breaker with its own event channel.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_events(name, config, events)
    }

    /// Create a breaker publishing onto a shared event channel.
    pub fn with_events(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        events: broadcast::Sender<BreakerEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::default()),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Receive this breaker's events.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.events.subscribe()
    }

    /// Current state. Does not perform the Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let st = self.lock();
        let total = st.success_count + st.failure_count;
        let success_rate = if total == 0 {
            100.0
        } else {
            st.success_count as f64 / total as f64 * 100.0
        };
        let average_response_time_ms = if st.response_times.is_empty() {
            0.0
        } else {
            let sum: Duration = st.response_times.iter().sum();
            sum.as_secs_f64() * 1000.0 / st.response_times.len() as f64
        };

        CircuitBreakerMetrics {
            success_count: st.success_count,
            failure_count: st.failure_count,
            rejected_count: st.rejected_count,
            total_requests: total,
            success_rate,
            average_response_time_ms,
            last_failure_time: st.last_failure_time,
            last_success_time: st.last_success_time,
        }
    }

    /// Run `operation` subject to the breaker state and the call timeout.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        self.admit()?;
        self.run_admitted(operation()).await
    }

    /// Decide whether a call may proceed, moving Open → Half-Open once the
    /// reset deadline has passed.
    pub(crate) fn admit(&self) -> Result<(), ResilienceError> {
        let now = Instant::now();
        let outcome = {
            let mut st = self.lock();
            match st.state {
                CircuitState::Closed | CircuitState::HalfOpen => Ok(None),
                CircuitState::Open => match st.open_until {
                    Some(deadline) if now < deadline => {
                        st.rejected_count += 1;
                        Err(deadline - now)
                    }
                    _ => {
                        st.state = CircuitState::HalfOpen;
                        st.probe_successes = 0;
                        st.open_until = None;
                        Ok(Some((CircuitState::Open, CircuitState::HalfOpen)))
                    }
                },
            }
        };

        match outcome {
            Ok(transition) => {
                if let Some(transition) = transition {
                    self.publish_transition(transition);
                }
                Ok(())
            }
            Err(retry_after) => {
                tracing::debug!(breaker = %self.name, retry_after_ms = retry_after.as_millis() as u64, "Call rejected, circuit open");
                metrics::record_rejection(&self.name);
                self.publish(BreakerEvent::Rejected {
                    name: self.name.clone(),
                });
                Err(ResilienceError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after,
                })
            }
        }
    }

    /// Await an already admitted call under the call timeout and record the outcome.
    pub(crate) async fn run_admitted<T, E, Fut>(&self, call: Fut) -> Result<T, ResilienceError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let started = Instant::now();
        match with_timeout(self.config.call_timeout(), call).await {
            Ok(value) => {
                self.on_success(started.elapsed());
                Ok(value)
            }
            Err(error) => {
                self.on_failure(&error);
                Err(error)
            }
        }
    }

    fn on_success(&self, elapsed: Duration) {
        let transition = {
            let mut st = self.lock();
            st.success_count += 1;
            st.last_success_time = Some(epoch_millis());
            if st.response_times.len() == RESPONSE_TIME_WINDOW {
                st.response_times.pop_front();
            }
            st.response_times.push_back(elapsed);

            match st.state {
                CircuitState::HalfOpen => {
                    st.probe_successes += 1;
                    if st.probe_successes >= self.config.success_threshold {
                        st.state = CircuitState::Closed;
                        st.failure_count = 0;
                        st.probe_successes = 0;
                        Some((CircuitState::HalfOpen, CircuitState::Closed))
                    } else {
                        None
                    }
                }
                CircuitState::Closed => {
                    st.failure_count = st.failure_count.saturating_sub(1);
                    None
                }
                CircuitState::Open => None,
            }
        };

        metrics::record_call(&self.name, "success");
        metrics::record_call_duration(&self.name, elapsed);
        self.publish(BreakerEvent::Success {
            name: self.name.clone(),
            elapsed,
        });
        if let Some(transition) = transition {
            self.publish_transition(transition);
        }
    }

    fn on_failure(&self, error: &ResilienceError) {
        let now = Instant::now();
        let (transition, failures) = {
            let mut st = self.lock();
            st.failure_count += 1;
            st.last_failure_at = Some(now);
            st.last_failure_time = Some(epoch_millis());

            let trip = match st.state {
                CircuitState::Closed => {
                    st.failure_count >= u64::from(self.config.failure_threshold)
                }
                CircuitState::HalfOpen => true,
                CircuitState::Open => false,
            };

            let transition = trip.then(|| {
                let from = st.state;
                st.state = CircuitState::Open;
                st.open_until = Some(now + self.config.reset_timeout());
                st.probe_successes = 0;
                (from, CircuitState::Open)
            });
            (transition, st.failure_count)
        };

        tracing::debug!(breaker = %self.name, failures, error = %error, "Call failed");
        let outcome = if matches!(error, ResilienceError::Timeout { .. }) {
            "timeout"
        } else {
            "failure"
        };
        metrics::record_call(&self.name, outcome);
        self.publish(BreakerEvent::Failure {
            name: self.name.clone(),
            kind: error.kind(),
            error: error.to_string(),
        });
        if let Some(transition) = transition {
            self.publish_transition(transition);
        }
    }

    /// Force Closed and clear every counter.
    pub fn reset(&self) {
        let from = {
            let mut st = self.lock();
            let from = st.state;
            *st = BreakerState::default();
            from
        };

        tracing::info!(breaker = %self.name, from = %from, "Circuit breaker reset");
        if from != CircuitState::Closed {
            self.publish_transition((from, CircuitState::Closed));
        }
    }

    /// Spawn the periodic metrics snapshot and quiet-period healing task.
    ///
    /// The task ends on shutdown or once the breaker has been dropped.
    pub fn spawn_monitor(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let breaker = Arc::downgrade(self);
        let period = self.config.monitor_interval();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(breaker) = breaker.upgrade() else { break };
                        breaker.monitor_tick();
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    fn monitor_tick(&self) {
        self.publish(BreakerEvent::Metrics {
            name: self.name.clone(),
            state: self.state(),
            snapshot: self.metrics(),
        });

        let quiet_for = self.config.monitoring_period();
        let healed = {
            let mut st = self.lock();
            let quiet = st
                .last_failure_at
                .map_or(true, |at| at.elapsed() > quiet_for);
            let has_counts = st.failure_count > 0 || st.success_count > 0;
            if st.state == CircuitState::Closed && quiet && has_counts {
                st.clear_counters();
                true
            } else {
                false
            }
        };

        if healed {
            tracing::debug!(breaker = %self.name, "Quiet period elapsed, counters cleared");
        }
    }

    fn publish_transition(&self, (from, to): Transition) {
        match to {
            CircuitState::Open => {
                tracing::warn!(breaker = %self.name, from = %from, to = %to, "Circuit breaker opened")
            }
            _ => tracing::info!(breaker = %self.name, from = %from, to = %to, "Circuit breaker state changed"),
        }
        metrics::record_breaker_state(&self.name, to);
        self.publish(BreakerEvent::StateChanged {
            name: self.name.clone(),
            from,
            to,
        });
    }

    fn publish(&self, event: BreakerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
