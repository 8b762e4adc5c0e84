//! The `Repository` trait (C6), grounded on
//! `original_source/core/database/base.py::BaseRepository` and
//! `original_source/core/database/repositories/knowledge_repository.py`'s
//! method surface.

use async_trait::async_trait;
use kp_model::KnowledgePoint;
use kp_model::{ReviewExample, VersionHistoryEntry};
use kp_taxonomy::category::ErrorCategory;

use crate::error::StoreError;
use crate::filters::KnowledgePointFilter;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RepoStatistics {
    pub knowledge_points: i64,
    pub total_practices: i64,
    pub correct_count: i64,
    pub due_reviews: i64,
    pub mastered: i64,
    pub struggling: i64,
    pub avg_mastery: f64,
    pub categories_count: i64,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<KnowledgePoint>, StoreError>;
    async fn find_all(&self, filters: &KnowledgePointFilter) -> Result<Vec<KnowledgePoint>, StoreError>;
    async fn create(&self, entity: KnowledgePoint) -> Result<KnowledgePoint, StoreError>;
    async fn update(&self, entity: &KnowledgePoint) -> Result<(), StoreError>;
    async fn delete(&self, id: i64, reason: &str) -> Result<bool, StoreError>;
    async fn restore(&self, id: i64) -> Result<bool, StoreError>;
    async fn find_due_for_review(&self, limit: i64) -> Result<Vec<KnowledgePoint>, StoreError>;
    async fn find_by_category(
        &self,
        category: ErrorCategory,
        subtype: Option<&str>,
    ) -> Result<Vec<KnowledgePoint>, StoreError>;
    async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<KnowledgePoint>, StoreError>;
    async fn add_review_example(&self, knowledge_point_id: i64, example: &ReviewExample) -> Result<bool, StoreError>;
    /// Persists one `version_history` entry (I5): append-only, never
    /// rewrites a prior row.
    async fn append_version_history(&self, knowledge_point_id: i64, entry: &VersionHistoryEntry) -> Result<(), StoreError>;
    async fn statistics(&self) -> Result<RepoStatistics, StoreError>;
    /// Irreversible. Only ever called on already soft-deleted rows past
    /// their retention window (C10.permanent_delete_old) — never a
    /// substitute for `delete`.
    async fn purge(&self, ids: &[i64]) -> Result<u64, StoreError>;
    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}
