//! The unified, thread-safe TTL cache (C4), grounded on
//! `original_source/core/cache_manager.py::UnifiedCacheManager` and
//! `LayeredCacheManager`. The original is a single-process, lock-protected
//! dict; this keeps the same shape with `tokio::sync::RwLock` standing in
//! for the original's `threading.RLock`, and adds miss coalescing — the
//! original never needed it because Python's GIL already serializes
//! `compute_func` calls, but a multi-threaded Tokio runtime does not.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info};

use crate::categories::CacheCategory;
use crate::entry::CacheEntry;
use crate::stats::CacheStats;

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// A single-type TTL cache keyed by `String`. Safe to share across tasks
/// behind an `Arc`.
pub struct UnifiedCache<V> {
    inner: RwLock<Inner<V>>,
    default_ttl: Duration,
    /// One `watch` sender per key currently being computed, so concurrent
    /// misses on the same key coalesce into a single `compute` call. A
    /// `watch` channel (rather than `Notify::notify_waiters`) is used
    /// because it retains its last value: a waiter that subscribes after
    /// the computer has already finished still observes completion
    /// immediately instead of waiting on a notification that already fired.
    inflight: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl<V: Clone + Send + Sync + 'static> UnifiedCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::default(),
            }),
            default_ttl,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write().await;
        let expired = matches!(inner.entries.get(key), Some(e) if e.is_expired());
        if expired {
            inner.entries.remove(key);
            inner.stats.evictions += 1;
            inner.stats.misses += 1;
            debug!(key, "cache entry expired and evicted");
            return None;
        }
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.hit_count += 1;
                inner.stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.write().await;
        debug!(%key, ttl_secs = ttl.as_secs(), "cache set");
        inner.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Clears everything (`pattern = None`) or every key containing
    /// `pattern` as a substring, matching the original's `in` check.
    pub async fn invalidate(&self, pattern: Option<&str>) -> usize {
        let mut inner = self.inner.write().await;
        match pattern {
            None => {
                let count = inner.entries.len();
                inner.entries.clear();
                if count > 0 {
                    info!(count, "cleared entire cache");
                }
                count
            }
            Some(pattern) => {
                let keys: Vec<String> = inner
                    .entries
                    .keys()
                    .filter(|k| k.contains(pattern))
                    .cloned()
                    .collect();
                for k in &keys {
                    inner.entries.remove(k);
                }
                if !keys.is_empty() {
                    info!(pattern, count = keys.len(), "invalidated cache by pattern");
                }
                keys.len()
            }
        }
    }

    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            inner.entries.remove(k);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "cleaned up expired cache entries");
        }
        expired.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        stats.cache_size = inner.entries.len();
        stats
    }

    /// Get-or-compute with coalescing: concurrent misses on the same key
    /// block behind a single in-flight computation instead of each calling
    /// `compute`. A failed computation releases all waiters, who will each
    /// attempt the computation themselves exactly once more.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        force_refresh: bool,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !force_refresh {
            if let Some(cached) = self.get(key).await {
                return Ok(cached);
            }
        }

        let rx = {
            let mut inflight = self.inflight.lock().await;
            if let Some(tx) = inflight.get(key) {
                Some(tx.subscribe())
            } else {
                let (tx, _rx) = watch::channel(false);
                inflight.insert(key.to_string(), tx);
                None
            }
        };

        if let Some(mut rx) = rx {
            // `borrow()` reflects the sender's current value regardless of
            // when we subscribed, so a computer that finished before we got
            // here is visible immediately without waiting on `changed()`.
            if !*rx.borrow() {
                let _ = rx.changed().await;
            }
            if let Some(cached) = self.get(key).await {
                return Ok(cached);
            }
            // The computation we waited on failed; fall through and become
            // the computer ourselves rather than returning an error that
            // might not reflect our own attempt.
            return self.compute_and_store(key, ttl, compute).await;
        }

        self.compute_and_store(key, ttl, compute).await
    }

    async fn compute_and_store<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let result = compute().await;
        match &result {
            Ok(value) => {
                self.set(key, value.clone(), ttl).await;
                self.inner.write().await.stats.refreshes += 1;
            }
            Err(_) => {}
        }
        {
            let mut inflight = self.inflight.lock().await;
            if let Some(tx) = inflight.remove(key) {
                let _ = tx.send(true);
            }
        }
        result
    }
}

/// Wraps a [`UnifiedCache<serde_json::Value>`] with per-category TTLs and
/// prefixed keys, grounded on `LayeredCacheManager`.
pub struct LayeredCache {
    cache: UnifiedCache<serde_json::Value>,
}

impl LayeredCache {
    pub fn new() -> Self {
        Self {
            cache: UnifiedCache::new(Duration::from_secs(300)),
        }
    }

    pub async fn get(&self, category: CacheCategory, key: &str) -> Option<serde_json::Value> {
        self.cache.get(&category.prefixed_key(key)).await
    }

    pub async fn set(&self, category: CacheCategory, key: &str, value: serde_json::Value) {
        self.cache
            .set(category.prefixed_key(key), value, Some(category.default_ttl()))
            .await;
    }

    /// Like [`Self::set`] but with an explicit TTL overriding the
    /// category's default — used by the fallback chain's own snapshot
    /// entries, which must outlive the read-through cache's TTL to be worth
    /// falling back to.
    pub async fn set_with_ttl(&self, category: CacheCategory, key: &str, value: serde_json::Value, ttl: Duration) {
        self.cache.set(category.prefixed_key(key), value, Some(ttl)).await;
    }

    pub async fn invalidate_category(&self, category: CacheCategory) -> usize {
        self.cache.invalidate(Some(&format!("{}:", category.as_str()))).await
    }

    pub async fn invalidate_all(&self) -> usize {
        self.cache.invalidate(None).await
    }

    pub async fn get_or_compute<F, Fut, E>(
        &self,
        category: CacheCategory,
        key: &str,
        force_refresh: bool,
        compute: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        self.cache
            .get_or_compute(&category.prefixed_key(key), Some(category.default_ttl()), force_refresh, compute)
            .await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.cache.cleanup_expired().await
    }
}

impl Default for LayeredCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn set_then_get_hits_and_bumps_stats() {
        let cache: UnifiedCache<i32> = UnifiedCache::new(StdDuration::from_secs(60));
        cache.set("a", 42, None).await;
        assert_eq!(cache.get("a").await, Some(42));
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn miss_on_unknown_key_bumps_misses() {
        let cache: UnifiedCache<i32> = UnifiedCache::new(StdDuration::from_secs(60));
        assert_eq!(cache.get("missing").await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() {
        let cache: UnifiedCache<i32> = UnifiedCache::new(StdDuration::from_millis(1));
        cache.set("a", 1, None).await;
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(cache.get("a").await, None);
        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn invalidate_by_pattern_matches_substring() {
        let cache: UnifiedCache<i32> = UnifiedCache::new(StdDuration::from_secs(60));
        cache.set("stats:alice", 1, None).await;
        cache.set("stats:bob", 2, None).await;
        cache.set("knowledge:alice", 3, None).await;
        let removed = cache.invalidate(Some("stats:")).await;
        assert_eq!(removed, 2);
        assert_eq!(cache.get("knowledge:alice").await, Some(3));
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_compute_call() {
        let cache = Arc::new(UnifiedCache::<i32>::new(StdDuration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", None, false, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // No artificial delay: exercises coalescing even when a
                            // waiter subscribes after the computer has already
                            // finished, which a `Notify`-based signal would miss.
                            Ok::<i32, std::convert::Infallible>(7)
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "only one caller should have run compute");
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cached_value() {
        let cache: UnifiedCache<i32> = UnifiedCache::new(StdDuration::from_secs(60));
        cache.set("k", 1, None).await;
        let v = cache
            .get_or_compute("k", None, true, || async { Ok::<i32, std::convert::Infallible>(2) })
            .await
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn layered_cache_prefixes_keys_by_category() {
        let cache = LayeredCache::new();
        cache.set(CacheCategory::Statistics, "alice", serde_json::json!({"n": 1})).await;
        cache.set(CacheCategory::KnowledgePoints, "alice", serde_json::json!({"n": 2})).await;

        assert_eq!(cache.get(CacheCategory::Statistics, "alice").await, Some(serde_json::json!({"n": 1})));
        let removed = cache.invalidate_category(CacheCategory::Statistics).await;
        assert_eq!(removed, 1);
        assert_eq!(cache.get(CacheCategory::Statistics, "alice").await, None);
        assert!(cache.get(CacheCategory::KnowledgePoints, "alice").await.is_some());
    }
}
