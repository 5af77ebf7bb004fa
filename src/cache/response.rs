//! Response cache for upstream payloads.
//!
//! `ResponseCache` holds the matched sub-items fetched from the sets
//! and dex services: competitive sets for one Pokemon in one format, a
//! resolved sprite, an EV yield. Whole format payloads are never cached,
//! only the sub-item a request actually asked for.
//!
//! # Architecture
//!
//! The cache sits in [`RotomClient`](crate::RotomClient), in front of the
//! retry policy and the concurrency gate. A cache hit bypasses all of
//! them. Hit/miss metrics are emitted per operation; see
//! [`telemetry`](crate::telemetry).
//!
//! The store is the hand-built LRU in `store` rather than
//! an off-the-shelf cache: the contract needs deterministic
//! oldest-first eviction, explicit hit/miss counters, and the ability to
//! dump `{key, value, stored_at}` records to disk and readmit them later.
//!
//! Interior mutability is a single `Mutex`: lookups are pure in-memory
//! work and the lock is never held across an await point.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::telemetry;
use crate::types::{EvYield, SetsData, SpriteInfo};

use super::store::LruStore;

/// Configuration for the response cache.
///
/// ```rust
/// # use rotom::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 200.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 60 seconds.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cached payload: one of the sub-item shapes the gateway serves.
///
/// Tagged for the versioned on-disk snapshot; see `persist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub(crate) enum CachedPayload {
    Sets(SetsData),
    Sprite(SpriteInfo),
    EvYield(EvYield),
}

struct Inner {
    store: LruStore<CachedPayload>,
    hits: u64,
    misses: u64,
}

/// Thread-safe LRU + TTL cache of upstream sub-items, with hit/miss
/// accounting.
pub(crate) struct ResponseCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: LruStore::new(config.max_entries, config.ttl),
                hits: 0,
                misses: 0,
            }),
            ttl: config.ttl,
        }
    }

    /// Look up a live entry, promoting it and recording hit/miss.
    ///
    /// `operation` only labels the metrics; the key alone identifies the
    /// entry.
    pub fn get(&self, operation: &'static str, key: &str) -> Option<CachedPayload> {
        let now = SystemTime::now();
        let mut inner = self.lock();
        match inner.store.get(key, now).cloned() {
            Some(payload) => {
                inner.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation)
                    .increment(1);
                tracing::debug!(key, "cache hit");
                Some(payload)
            }
            None => {
                inner.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }

    /// Insert or replace an entry, evicting the least-recently-used one
    /// if the cache is at capacity.
    pub fn insert(&self, key: String, payload: CachedPayload) {
        let now = SystemTime::now();
        let mut inner = self.lock();
        if let Some(evicted) = inner.store.insert(key, payload, now) {
            tracing::debug!(key = %evicted, "evicted cache entry");
        }
    }

    /// Drop expired entries. Called by the background sweep.
    pub fn remove_expired(&self) -> usize {
        self.lock().store.remove_expired(SystemTime::now())
    }

    /// Clear all entries and zero the hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.store.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// `(size, max_size, hits, misses)` snapshot for diagnostics.
    pub fn stats(&self) -> (usize, usize, u64, u64) {
        let inner = self.lock();
        (
            inner.store.len(),
            inner.store.max_entries(),
            inner.hits,
            inner.misses,
        )
    }

    /// Copy out the entries still within their TTL, for persistence.
    pub fn snapshot(&self) -> Vec<(String, CachedPayload, SystemTime)> {
        let now = SystemTime::now();
        let inner = self.lock();
        inner
            .store
            .iter()
            .filter(|&(_, _, stored_at)| Self::fresh(stored_at, now, self.ttl))
            .map(|(key, value, stored_at)| (key.to_string(), value.clone(), stored_at))
            .collect()
    }

    /// Readmit persisted entries, keeping their original timestamps.
    /// Entries that would already be expired are discarded, not
    /// resurrected. Returns `(admitted, discarded)`.
    pub fn absorb(&self, entries: Vec<(String, CachedPayload, SystemTime)>) -> (usize, usize) {
        let now = SystemTime::now();
        let mut inner = self.lock();
        let mut admitted = 0;
        let mut discarded = 0;
        for (key, payload, stored_at) in entries {
            if Self::fresh(stored_at, now, self.ttl) {
                inner.store.insert_at(key, payload, stored_at);
                admitted += 1;
            } else {
                discarded += 1;
            }
        }
        (admitted, discarded)
    }

    fn fresh(stored_at: SystemTime, now: SystemTime, ttl: Duration) -> bool {
        match now.duration_since(stored_at) {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("response cache lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sets(v: &str) -> CachedPayload {
        CachedPayload::Sets(Arc::new(serde_json::json!({ "moves": [v] })))
    }

    fn test_cache() -> ResponseCache {
        ResponseCache::new(&CacheConfig::new().max_entries(4))
    }

    #[test]
    fn hit_and_miss_counters_track_lookups() {
        let cache = test_cache();
        assert!(cache.get("sets", "gen9ou:garchomp").is_none());
        cache.insert("gen9ou:garchomp".into(), sets("earthquake"));
        assert!(cache.get("sets", "gen9ou:garchomp").is_some());
        assert!(cache.get("sets", "gen9uu:azumarill").is_none());

        let (size, max, hits, misses) = cache.stats();
        assert_eq!(size, 1);
        assert_eq!(max, 4);
        assert_eq!(hits, 1);
        assert_eq!(misses, 2);
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let cache = test_cache();
        cache.insert("ev:garchomp".into(), sets("x"));
        cache.get("ev", "ev:garchomp");
        cache.clear();

        let (size, _, hits, misses) = cache.stats();
        assert_eq!((size, hits, misses), (0, 0, 0));
    }

    #[test]
    fn ttl_expiry_counts_as_miss() {
        let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_millis(10)));
        cache.insert("gen9ou:garchomp".into(), sets("x"));
        std::thread::sleep(Duration::from_millis(30));

        assert!(cache.get("sets", "gen9ou:garchomp").is_none());
        let (size, _, hits, misses) = cache.stats();
        assert_eq!((size, hits, misses), (0, 0, 1));
    }

    #[test]
    fn absorb_discards_already_expired_entries() {
        let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_secs(60)));
        let now = SystemTime::now();
        let stale = now - Duration::from_secs(120);
        let (admitted, discarded) = cache.absorb(vec![
            ("gen9ou:garchomp".into(), sets("a"), now),
            ("gen9uu:azumarill".into(), sets("b"), stale),
        ]);

        assert_eq!((admitted, discarded), (1, 1));
        assert!(cache.get("sets", "gen9ou:garchomp").is_some());
        assert!(cache.get("sets", "gen9uu:azumarill").is_none());
    }

    #[test]
    fn snapshot_skips_expired_entries() {
        let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_millis(10)));
        cache.insert("gen9ou:garchomp".into(), sets("x"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.snapshot().is_empty());
    }
}
