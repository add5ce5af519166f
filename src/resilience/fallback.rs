//! Fallback cascade.
//!
//! # Data Flow
//! ```text
//! primary (raced against timeout)
//!     → success: store in cache (if enabled + keyed), return
//!     → failure: strategy[0], strategy[1], ... in order, first success wins
//!     → all failed: cached value for the key, if still live
//!     → nothing: FallbackExhausted carrying the primary failure
//! ```
//!
//! # Design Decisions
//! - Strategies run one at a time; a second-choice downstream never gets a stampede
//! - Strategy failures are logged and swallowed, only the primary failure is reported
//! - Cached values are served without any staleness check beyond the TTL

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::FallbackConfig;
use crate::observability::metrics;
use crate::resilience::cache::FallbackCache;
use crate::resilience::error::{OperationFailure, ResilienceError};
use crate::resilience::timeouts::with_timeout;

/// An alternative way of producing a result.
pub type FallbackStrategy<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, OperationFailure>> + Send + Sync>;

/// Wrap an async closure as a fallback strategy.
pub fn strategy<T, F, Fut>(f: F) -> FallbackStrategy<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, OperationFailure>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A strategy that always yields `value`.
pub fn fixed_value<T>(value: T) -> FallbackStrategy<T>
where
    T: Clone + Send + Sync + 'static,
{
    Arc::new(move || {
        let value = value.clone();
        async move { Ok::<T, OperationFailure>(value) }.boxed()
    })
}

/// Per-call fallback settings.
#[derive(Clone)]
pub struct FallbackOptions<T> {
    pub strategies: Vec<FallbackStrategy<T>>,
    pub timeout: Duration,
    pub caching_enabled: bool,
    pub cache_key: Option<String>,
    pub cache_ttl: Duration,
}

impl<T> FallbackOptions<T> {
    pub fn from_config(config: &FallbackConfig) -> Self {
        Self {
            strategies: Vec::new(),
            timeout: config.timeout(),
            caching_enabled: config.caching_enabled,
            cache_key: None,
            cache_ttl: config.cache_ttl(),
        }
    }

    pub fn with_strategy(mut self, strategy: FallbackStrategy<T>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Cache key, only when caching is on.
    fn active_cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref().filter(|_| self.caching_enabled)
    }
}

impl<T> Default for FallbackOptions<T> {
    fn default() -> Self {
        Self::from_config(&FallbackConfig::default())
    }
}

impl<T> fmt::Debug for FallbackOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackOptions")
            .field("strategies", &self.strategies.len())
            .field("timeout", &self.timeout)
            .field("caching_enabled", &self.caching_enabled)
            .field("cache_key", &self.cache_key)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Runs a primary operation with ordered fallbacks and a last-resort cache.
#[derive(Clone)]
pub struct FallbackCascade {
    cache: Arc<FallbackCache>,
}

impl FallbackCascade {
    pub fn new(cache: Arc<FallbackCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<FallbackCache> {
        &self.cache
    }

    pub async fn execute_with_fallback<T, E, F, Fut>(
        &self,
        primary: F,
        options: &FallbackOptions<T>,
    ) -> Result<T, ResilienceError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let primary_error = match with_timeout(options.timeout, primary()).await {
            Ok(value) => {
                if let Some(key) = options.active_cache_key() {
                    self.cache.insert(key, value.clone(), options.cache_ttl);
                }
                metrics::record_fallback("primary");
                return Ok(value);
            }
            Err(error) => error,
        };

        tracing::warn!(error = %primary_error, strategies = options.strategies.len(), "Primary failed, trying fallbacks");

        for (index, strategy) in options.strategies.iter().enumerate() {
            match strategy().await {
                Ok(value) => {
                    tracing::info!(strategy = index, "Fallback strategy succeeded");
                    metrics::record_fallback("strategy");
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(strategy = index, error = %error, "Fallback strategy failed");
                }
            }
        }

        if let Some(key) = options.active_cache_key() {
            if let Some(value) = self.cache.get::<T>(key) {
                tracing::info!(key = %key, "Serving cached result after all fallbacks failed");
                metrics::record_fallback("cache");
                return Ok(value);
            }
        }

        metrics::record_fallback("exhausted");
        Err(ResilienceError::FallbackExhausted {
            primary: Box::new(primary_error),
        })
    }
}
