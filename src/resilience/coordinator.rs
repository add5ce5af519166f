//! Resilience coordinator.
//!
//! # Responsibilities
//! - Own the breaker registry (one breaker per operation name)
//! - Compose fallback(retry(circuit(operation))) for a single call
//! - Aggregate breaker snapshots into a system health report
//! - Run background tasks (event recorder, cache sweeper) until shutdown
//!
//! # Design Decisions
//! - Constructed explicitly and passed by reference; there is no global instance
//! - Settings live in an `ArcSwap` so a reload changes the defaults for
//!   breakers created afterwards, existing breakers keep their config
//! - The breaker is consulted before the operation is invoked, so an open
//!   circuit never calls into the downstream
//! - Only three failures reach the caller: circuit open, retries exhausted,
//!   fallbacks exhausted

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{CircuitBreakerConfig, FallbackConfig, ResilienceSettings, RetryConfig};
use crate::health::{BreakerReport, SystemResilienceReport};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::observability::tracing::call_span;
use crate::resilience::cache::FallbackCache;
use crate::resilience::circuit_breaker::{BreakerEvent, CircuitBreaker};
use crate::resilience::error::ResilienceError;
use crate::resilience::fallback::{fixed_value, FallbackCascade, FallbackOptions, FallbackStrategy};
use crate::resilience::retries::{execute_with_retry, RetryPolicy};

/// Capacity of the shared breaker event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Per-call composition options.
pub struct ResilienceOptions<T> {
    /// Breaker name, also the default cache key.
    pub name: String,
    /// Used only when the breaker does not exist yet.
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub retry: Option<RetryPolicy>,
    pub retry_enabled: bool,
    pub circuit_breaker_enabled: bool,
    pub fallback_strategies: Vec<FallbackStrategy<T>>,
    pub caching_enabled: Option<bool>,
    pub cache_key: Option<String>,
    pub fallback_timeout: Option<Duration>,
    pub cache_ttl: Option<Duration>,
}

impl<T> ResilienceOptions<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            circuit_breaker: None,
            retry: None,
            retry_enabled: true,
            circuit_breaker_enabled: true,
            fallback_strategies: Vec::new(),
            caching_enabled: None,
            cache_key: None,
            fallback_timeout: None,
            cache_ttl: None,
        }
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_retry_config(self, config: RetryConfig) -> Self {
        self.with_retry(RetryPolicy::new(config))
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_enabled = false;
        self
    }

    pub fn without_circuit_breaker(mut self) -> Self {
        self.circuit_breaker_enabled = false;
        self
    }

    /// Append a fallback strategy; strategies run in the order added.
    pub fn with_fallback(mut self, strategy: FallbackStrategy<T>) -> Self {
        self.fallback_strategies.push(strategy);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = Some(enabled);
        self
    }

    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = Some(timeout);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    fn fallback_options(&self, defaults: &FallbackConfig) -> FallbackOptions<T> {
        let mut options = FallbackOptions::from_config(defaults);
        options.strategies = self.fallback_strategies.clone();
        options.cache_key = self.cache_key.clone();
        if let Some(enabled) = self.caching_enabled {
            options.caching_enabled = enabled;
        }
        if let Some(timeout) = self.fallback_timeout {
            options.timeout = timeout;
        }
        if let Some(ttl) = self.cache_ttl {
            options.cache_ttl = ttl;
        }
        options
    }
}

impl<T> fmt::Debug for ResilienceOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceOptions")
            .field("name", &self.name)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("retry", &self.retry)
            .field("retry_enabled", &self.retry_enabled)
            .field("circuit_breaker_enabled", &self.circuit_breaker_enabled)
            .field("fallback_strategies", &self.fallback_strategies.len())
            .field("caching_enabled", &self.caching_enabled)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

/// Owns the breaker registry, the fallback cache and the background tasks.
pub struct ResilienceCoordinator {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    fallback: FallbackCascade,
    settings: ArcSwap<ResilienceSettings>,
    events: broadcast::Sender<BreakerEvent>,
    shutdown: Shutdown,
}

impl ResilienceCoordinator {
    pub fn new(settings: ResilienceSettings) -> Self {
        let cache = Arc::new(FallbackCache::new(settings.cache.max_entries));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            breakers: DashMap::new(),
            fallback: FallbackCascade::new(cache),
            settings: ArcSwap::from_pointee(settings),
            events,
            shutdown: Shutdown::new(),
        }
    }

    /// Return the breaker registered under `name`, creating it on first use.
    ///
    /// `config` (or the current defaults) only applies on creation. When a
    /// runtime is available and the coordinator has not been shut down, the
    /// breaker's monitor task is started as well.
    pub fn get_or_create_circuit_breaker(
        &self,
        name: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            let config = config.unwrap_or_else(|| self.settings.load().circuit_breaker.clone());
            tracing::info!(
                breaker = %name,
                failure_threshold = config.failure_threshold,
                reset_timeout_ms = config.reset_timeout_ms,
                "Registering circuit breaker"
            );
            let breaker = Arc::new(CircuitBreaker::with_events(name, config, self.events.clone()));
            // Subscribe before checking the flag so a concurrent trigger is never missed.
            let shutdown = self.shutdown.subscribe();
            if !self.shutdown.is_triggered() && tokio::runtime::Handle::try_current().is_ok() {
                breaker.spawn_monitor(shutdown);
            }
            breaker
        });
        Arc::clone(entry.value())
    }

    pub fn circuit_breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Run `operation` through circuit breaker, retry and (when strategies are
    /// given) the fallback cascade.
    pub async fn execute_resilient_operation<T, E, F, Fut>(
        &self,
        operation: F,
        options: ResilienceOptions<T>,
    ) -> Result<T, ResilienceError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let (span, _call_id) = call_span(&options.name);
        self.run(operation, options).instrument(span).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: ResilienceOptions<T>,
    ) -> Result<T, ResilienceError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let settings = self.settings.load_full();
        let breaker = options
            .circuit_breaker_enabled
            .then(|| self.get_or_create_circuit_breaker(&options.name, options.circuit_breaker.clone()));
        let policy = match (&options.retry, options.retry_enabled) {
            (_, false) => RetryPolicy::single_attempt(),
            (Some(policy), true) => policy.clone(),
            (None, true) => RetryPolicy::new(settings.retry.clone()),
        };

        let breaker_ref = breaker.as_deref();
        let attempt = move || {
            let call = match breaker_ref {
                Some(breaker) => breaker.admit().map(|()| operation()),
                None => Ok(operation()),
            };
            async move {
                let call = call?;
                match breaker_ref {
                    Some(breaker) => breaker.run_admitted(call).await,
                    None => call.await.map_err(Into::<ResilienceError>::into),
                }
            }
        };

        if options.fallback_strategies.is_empty() {
            return execute_with_retry(attempt, &policy).await;
        }

        let fallback = options.fallback_options(&settings.fallback);
        self.fallback
            .execute_with_fallback(|| execute_with_retry(attempt, &policy), &fallback)
            .await
    }

    /// Snapshot every registered breaker and score the system.
    pub fn get_system_resilience_metrics(&self) -> SystemResilienceReport {
        let breakers = self
            .breakers
            .iter()
            .map(|entry| {
                let breaker = entry.value();
                BreakerReport {
                    name: breaker.name().to_string(),
                    state: breaker.state(),
                    metrics: breaker.metrics(),
                }
            })
            .collect();

        let report = SystemResilienceReport::from_breakers(breakers);
        metrics::record_overall_health(report.overall_health);
        report
    }

    /// Force every registered breaker Closed with cleared counters.
    pub fn reset_all_circuit_breakers(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        tracing::info!(breakers = self.breakers.len(), "All circuit breakers reset");
    }

    /// Events from every breaker in the registry.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> Arc<ResilienceSettings> {
        self.settings.load_full()
    }

    /// Swap in reloaded settings. Already registered breakers are unaffected.
    pub fn apply_settings(&self, settings: ResilienceSettings) {
        self.settings.store(Arc::new(settings));
        tracing::info!(breakers = self.breakers.len(), "Resilience settings updated");
    }

    pub fn cache(&self) -> &Arc<FallbackCache> {
        self.fallback.cache()
    }

    /// Start the event recorder and, if configured, the cache sweeper.
    ///
    /// Starts nothing once the coordinator has been shut down.
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        if self.shutdown.is_triggered() {
            return Vec::new();
        }

        let mut handles = vec![spawn_event_recorder(self.subscribe(), self.shutdown.subscribe())];

        let sweep_secs = self.settings.load().cache.sweep_interval_secs;
        if sweep_secs > 0 {
            handles.push(
                self.cache()
                    .spawn_sweeper(Duration::from_secs(sweep_secs), self.shutdown.subscribe()),
            );
        }
        handles
    }

    /// Stop breaker monitors and background tasks.
    pub fn shutdown(&self) {
        tracing::info!("Stopping resilience background tasks");
        self.shutdown.trigger();
    }
}

impl Default for ResilienceCoordinator {
    fn default() -> Self {
        Self::new(ResilienceSettings::default())
    }
}

impl fmt::Debug for ResilienceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceCoordinator")
            .field("breakers", &self.breakers.len())
            .field("cache_entries", &self.cache().len())
            .finish_non_exhaustive()
    }
}

fn spawn_event_recorder(
    mut events: broadcast::Receiver<BreakerEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(BreakerEvent::Metrics { name, state, snapshot }) => {
                        metrics::record_breaker_state(&name, state);
                        metrics::record_success_rate(&name, snapshot.success_rate);
                        tracing::debug!(
                            breaker = %name,
                            state = %state,
                            total = snapshot.total_requests,
                            success_rate = snapshot.success_rate,
                            avg_ms = snapshot.average_response_time_ms,
                            "Circuit breaker snapshot"
                        );
                    }
                    Ok(BreakerEvent::StateChanged { name, from, to }) => {
                        tracing::debug!(breaker = %name, from = %from, to = %to, "Recorded state change");
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event recorder lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }
    })
}

/// Options for [`execute_with_resilience`].
#[derive(Debug, Clone)]
pub struct SimpleOptions<T> {
    /// Appended as the last fallback strategy.
    pub fallback_value: Option<T>,
    pub retry_enabled: bool,
    pub circuit_breaker_enabled: bool,
}

impl<T> Default for SimpleOptions<T> {
    fn default() -> Self {
        Self {
            fallback_value: None,
            retry_enabled: true,
            circuit_breaker_enabled: true,
        }
    }
}

impl<T> SimpleOptions<T> {
    pub fn with_fallback_value(mut self, value: T) -> Self {
        self.fallback_value = Some(value);
        self
    }
}

/// Guard a call site with default settings, caching by `name`.
pub async fn execute_with_resilience<T, E, F, Fut>(
    coordinator: &ResilienceCoordinator,
    operation: F,
    name: &str,
    options: SimpleOptions<T>,
) -> Result<T, ResilienceError>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ResilienceError>,
{
    let mut resilience = ResilienceOptions::new(name).with_cache_key(name);
    if !options.retry_enabled {
        resilience = resilience.without_retry();
    }
    if !options.circuit_breaker_enabled {
        resilience = resilience.without_circuit_breaker();
    }
    if let Some(value) = options.fallback_value {
        resilience = resilience.with_fallback(fixed_value(value));
    }

    coordinator.execute_resilient_operation(operation, resilience).await
}
