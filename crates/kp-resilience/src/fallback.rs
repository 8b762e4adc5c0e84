//! The ordered fallback chain (C8), grounded on
//! `original_source/core/fallback_strategies.py::FallbackManager` and its
//! three concrete strategies (`CacheFallback`, `NetworkRetryFallback`,
//! `GracefulDegradationFallback`). The original dispatches strategies over
//! an arbitrary callable and guesses the right default from its name; here
//! the chain is generic over the call site's return type `T`, so "what kind
//! of default" falls out of the type system instead of a name heuristic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kp_cache::{CacheCategory, LayeredCache};
use kp_common::{ErrorCategory, UnifiedError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::defaults::GracefulDefault;
use crate::handler::ErrorHandler;

/// §4.8: base 1s, cap `2^attempt`, 3 attempts, network errors only.
const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// The chain keeps its own last-known-good snapshot under a key distinct
/// from the caller's read-through cache entry, with a TTL long enough to
/// outlive it — otherwise a snapshot write and the read-through entry would
/// alias the same slot and expire together, leaving nothing to fall back to
/// by the time a read-through miss actually happens.
const SNAPSHOT_TTL: Duration = Duration::from_secs(3600);

fn snapshot_key(cache_key: &str) -> String {
    format!("{cache_key}::fallback_snapshot")
}

/// Which link of the chain ultimately produced the result — the Rust
/// equivalent of the original's `_fallback`/`_cache_hit`/`_fallback_strategy`
/// annotations on an ad-hoc dict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    Primary,
    Cache,
    Retry,
    GracefulDegradation,
}

#[derive(Debug, Clone)]
pub struct FallbackResult<T> {
    pub value: T,
    pub source: FallbackSource,
}

/// Holds the shared cache the `CacheFallback` link reads/writes through.
/// Stateless otherwise — the original's per-strategy success-rate counters
/// are left to whatever metrics layer a deployment wires in, since tracking
/// them here would duplicate C4's own `CacheStats`.
pub struct FallbackChain {
    cache: Option<Arc<LayeredCache>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(cache: Arc<LayeredCache>) -> Self {
        Self { cache: Some(cache) }
    }

    /// Runs `operation` once. On failure, `handler.should_fallback` decides
    /// whether the error is even eligible: Validation/Business (and anything
    /// with fallback disabled) propagate straight back to the caller. An
    /// eligible failure walks the rest of the chain: a cached value for
    /// {Database, Network, Concurrency, System}, then bounded retries for
    /// Network only, then a typed graceful default. A successful primary
    /// call refreshes the cache so the next failure has something fresher to
    /// fall back to.
    pub async fn run<T, F, Fut>(
        &self,
        handler: &ErrorHandler,
        cache_category: CacheCategory,
        cache_key: &str,
        mut operation: F,
    ) -> Result<FallbackResult<T>, UnifiedError>
    where
        T: Clone + GracefulDefault + Serialize + DeserializeOwned + Send + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UnifiedError>>,
    {
        let snap_key = snapshot_key(cache_key);

        let err = match operation().await {
            Ok(value) => {
                if let Some(cache) = &self.cache {
                    if let Ok(json) = serde_json::to_value(&value) {
                        cache.set_with_ttl(cache_category, &snap_key, json, SNAPSHOT_TTL).await;
                    }
                }
                return Ok(FallbackResult { value, source: FallbackSource::Primary });
            }
            Err(err) => err,
        };

        handler.log(&err, "fallback_chain");
        if !handler.should_fallback(&err) {
            return Err(err);
        }

        if let Some(cache) = &self.cache {
            if let Some(json) = cache.get(cache_category, &snap_key).await {
                if let Ok(value) = serde_json::from_value::<T>(json) {
                    info!(cache_key, "fallback chain recovered from cache");
                    return Ok(FallbackResult { value, source: FallbackSource::Cache });
                }
            }
        }

        if err.category == ErrorCategory::Network {
            for attempt in 0..MAX_RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
                match operation().await {
                    Ok(value) => {
                        if let Some(cache) = &self.cache {
                            if let Ok(json) = serde_json::to_value(&value) {
                                cache.set_with_ttl(cache_category, &snap_key, json, SNAPSHOT_TTL).await;
                            }
                        }
                        info!(attempt, "fallback chain recovered via retry");
                        return Ok(FallbackResult { value, source: FallbackSource::Retry });
                    }
                    Err(err) => warn!(attempt, code = %err.code, "retry attempt failed"),
                }
            }
        }

        Ok(FallbackResult { value: T::graceful_default(), source: FallbackSource::GracefulDegradation })
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_common::ErrorSeverity;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failure() -> UnifiedError {
        UnifiedError::new("TEST_FAIL", "boom", ErrorCategory::Database, ErrorSeverity::High)
    }

    #[tokio::test]
    async fn successful_primary_call_short_circuits_the_chain() {
        let chain = FallbackChain::new();
        let handler = ErrorHandler::new();
        let result = chain
            .run::<bool, _, _>(&handler, CacheCategory::KnowledgePoints, "k", || async { Ok(true) })
            .await
            .unwrap();
        assert_eq!(result.source, FallbackSource::Primary);
        assert!(result.value);
    }

    #[tokio::test]
    async fn database_failure_falls_back_to_cached_value() {
        let cache = Arc::new(LayeredCache::new());
        cache.set(CacheCategory::KnowledgePoints, &snapshot_key("k"), serde_json::json!(true)).await;
        let chain = FallbackChain::with_cache(cache);
        let handler = ErrorHandler::new();

        let result = chain
            .run::<bool, _, _>(&handler, CacheCategory::KnowledgePoints, "k", || async { Err(failure()) })
            .await
            .unwrap();
        assert_eq!(result.source, FallbackSource::Cache);
        assert!(result.value);
    }

    #[tokio::test]
    async fn successful_primary_call_populates_the_snapshot_for_a_later_failure() {
        let cache = Arc::new(LayeredCache::new());
        let chain = FallbackChain::with_cache(cache);
        let handler = ErrorHandler::new();

        chain.run::<i32, _, _>(&handler, CacheCategory::Statistics, "k", || async { Ok(5) }).await.unwrap();
        let result = chain
            .run::<i32, _, _>(&handler, CacheCategory::Statistics, "k", || async { Err(failure()) })
            .await
            .unwrap();
        assert_eq!(result.source, FallbackSource::Cache);
        assert_eq!(result.value, 5);
    }

    #[tokio::test]
    async fn validation_failure_never_touches_cache_or_retry() {
        let cache = Arc::new(LayeredCache::new());
        cache.set(CacheCategory::KnowledgePoints, &snapshot_key("k"), serde_json::json!(true)).await;
        let chain = FallbackChain::with_cache(cache);
        let handler = ErrorHandler::new();

        let err = chain
            .run::<bool, _, _>(&handler, CacheCategory::KnowledgePoints, "k", || async {
                Err(UnifiedError::new("BAD_INPUT", "bad", ErrorCategory::Validation, ErrorSeverity::Low))
            })
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_retries_then_succeeds() {
        let attempts = Arc::new(AtomicU32::new(0));
        let chain = FallbackChain::new();
        let handler = ErrorHandler::new();
        let attempts_clone = attempts.clone();

        let result = chain
            .run::<i32, _, _>(&handler, CacheCategory::Statistics, "k", move || {
                let attempts = attempts_clone.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(UnifiedError::new("NET", "timeout", ErrorCategory::Network, ErrorSeverity::Medium))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.source, FallbackSource::Retry);
        assert_eq!(result.value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_network_retries_degrade_gracefully() {
        let chain = FallbackChain::new();
        let handler = ErrorHandler::new();
        let result = chain
            .run::<Vec<i32>, _, _>(&handler, CacheCategory::Statistics, "k", || async {
                Err(UnifiedError::new("NET", "timeout", ErrorCategory::Network, ErrorSeverity::Medium))
            })
            .await
            .unwrap();
        assert_eq!(result.source, FallbackSource::GracefulDegradation);
        assert!(result.value.is_empty());
    }
}
