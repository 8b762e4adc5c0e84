//! Cache categories and their per-layer TTLs, grounded on
//! `original_source/core/cache_manager.py::CacheCategories` /
//! `LayeredCacheManager._layer_ttls`.

use std::time::Duration;

/// The five cache categories the knowledge engine partitions keys into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Statistics,
    KnowledgePoints,
    ReviewCandidates,
    SearchResults,
    UserPreferences,
}

impl CacheCategory {
    /// The literal prefix used in `"{category}:{key}"` — matches the
    /// original's string constants exactly so cache keys stay stable across
    /// a rewrite of either side.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheCategory::Statistics => "stats",
            CacheCategory::KnowledgePoints => "knowledge",
            CacheCategory::ReviewCandidates => "review",
            CacheCategory::SearchResults => "search",
            CacheCategory::UserPreferences => "preferences",
        }
    }

    /// Default TTL for this layer, used when a caller doesn't override it.
    pub fn default_ttl(self) -> Duration {
        match self {
            CacheCategory::Statistics => Duration::from_secs(60),
            CacheCategory::KnowledgePoints => Duration::from_secs(300),
            CacheCategory::ReviewCandidates => Duration::from_secs(120),
            CacheCategory::SearchResults => Duration::from_secs(180),
            CacheCategory::UserPreferences => Duration::from_secs(600),
        }
    }

    pub fn prefixed_key(self, key: &str) -> String {
        format!("{}:{}", self.as_str(), key)
    }
}
