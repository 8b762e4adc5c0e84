//! Dynamic filter set for `find_all`, grounded on
//! `original_source/core/database/base.py::BaseRepository._build_where_clause`
//! — the original builds a WHERE clause from a loose `**filters` dict; here
//! the filters are a typed struct and the clause is built with
//! `sqlx::QueryBuilder`, which is the idiomatic Rust equivalent of
//! positional-placeholder string assembly.

use kp_taxonomy::category::ErrorCategory;

#[derive(Debug, Clone, Default)]
pub struct KnowledgePointFilter {
    pub category: Option<ErrorCategory>,
    pub subtype: Option<String>,
    /// Defaults to `Some(false)` at the call site per spec.md §4.6; `None`
    /// here means "don't constrain on this column" (`include_deleted`).
    pub is_deleted: Option<bool>,
    pub mastery_min: Option<f64>,
    pub mastery_max: Option<f64>,
}

impl KnowledgePointFilter {
    pub fn active() -> Self {
        Self {
            is_deleted: Some(false),
            ..Default::default()
        }
    }

    pub fn include_deleted(mut self) -> Self {
        self.is_deleted = None;
        self
    }
}
