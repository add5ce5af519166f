//! Fallback result cache.
//!
//! Successful primary results are stored here with a TTL and served as a
//! last resort when the primary and every fallback strategy fail.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::observability::metrics;

/// A cached value and its expiry.
#[derive(Clone)]
pub struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A thread-safe, TTL-bounded and size-bounded cache of heterogeneous values.
pub struct FallbackCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl FallbackCache {
    /// Create a new empty cache holding at most `max_entries` values.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Store `value` under `key` until `ttl` elapses, replacing any previous value.
    pub fn insert<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );
        metrics::record_cache_size(self.entries.len());
    }

    /// Look up a live value. Expired entries are removed on the way.
    ///
    /// A value stored under a different type counts as a miss.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;

        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            metrics::record_cache_size(self.entries.len());
            return None;
        }

        match entry.value.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                tracing::debug!(key = %key, "Cached value has a different type, ignoring");
                None
            }
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_cache_size(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(0);
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn make_room(&self) {
        if self.purge_expired() > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let soonest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().expires_at)
            .map(|e| e.key().clone());
        if let Some(key) = soonest {
            tracing::debug!(key = %key, "Fallback cache full, evicting entry closest to expiry");
            self.entries.remove(&key);
        }
    }

    /// Periodically purge expired entries until shutdown.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = cache.len(), "Swept expired fallback cache entries");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

impl Default for FallbackCache {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_cache_operations() {
        let cache = FallbackCache::new(10);
        assert!(cache.get::<String>("ticker:BTCUSDT").is_none());

        cache.insert("ticker:BTCUSDT", "64000.5".to_string(), TTL);
        assert_eq!(cache.get::<String>("ticker:BTCUSDT").as_deref(), Some("64000.5"));

        // Overwrite
        cache.insert("ticker:BTCUSDT", "64100.0".to_string(), TTL);
        assert_eq!(cache.get::<String>("ticker:BTCUSDT").as_deref(), Some("64100.0"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let cache = FallbackCache::new(10);
        cache.insert("depth", 42u32, TTL);

        time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get::<u32>("depth"), Some(42));

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get::<u32>("depth"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_mismatch_is_a_miss() {
        let cache = FallbackCache::new(10);
        cache.insert("balance", 10.5f64, TTL);
        assert_eq!(cache.get::<String>("balance"), None);
        assert_eq!(cache.get::<f64>("balance"), Some(10.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_closest_to_expiry() {
        let cache = FallbackCache::new(2);
        cache.insert("a", 1u8, Duration::from_secs(10));
        cache.insert("b", 2u8, Duration::from_secs(100));
        cache.insert("c", 3u8, Duration::from_secs(50));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<u8>("a"), None);
        assert_eq!(cache.get::<u8>("b"), Some(2));
        assert_eq!(cache.get::<u8>("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_prefers_purging_expired() {
        let cache = FallbackCache::new(2);
        cache.insert("stale", 1u8, Duration::from_secs(1));
        cache.insert("fresh", 2u8, Duration::from_secs(100));
        time::advance(Duration::from_secs(2)).await;

        cache.insert("new", 3u8, Duration::from_secs(5));
        assert_eq!(cache.get::<u8>("fresh"), Some(2));
        assert_eq!(cache.get::<u8>("new"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_until_shutdown() {
        let cache = Arc::new(FallbackCache::new(10));
        cache.insert("a", 1u8, Duration::from_secs(5));
        cache.insert("b", 2u8, Duration::from_secs(500));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = cache.spawn_sweeper(Duration::from_secs(10), shutdown_rx);

        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.len(), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
