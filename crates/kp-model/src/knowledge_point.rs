//! The `KnowledgePoint` aggregate root (C2), grounded on
//! `original_source/core/models.py::KnowledgePoint`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kp_taxonomy::category::ErrorCategory;

use crate::scheduler;
use crate::value_objects::{OriginalError, ReviewExample};

/// Fields an `edit()` call may touch — everything else is learning state or
/// lifecycle metadata and is never part of the update map.
pub const EDITABLE_FIELDS: &[&str] = &[
    "key_point",
    "explanation",
    "original_phrase",
    "correction",
    "category",
    "subtype",
    "tags",
    "custom_notes",
];

/// Snapshot of the editable subset, used as both `before` and `after` in a
/// `version_history` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableSnapshot {
    pub key_point: String,
    pub explanation: String,
    pub original_phrase: String,
    pub correction: String,
    pub category: String,
    pub subtype: String,
    pub tags: Vec<String>,
    pub custom_notes: String,
}

/// One append-only entry in `version_history` (I5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub before: EditableSnapshot,
    pub after: EditableSnapshot,
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EditError {
    #[error("unknown field in edit map: {0}")]
    UnknownField(String),
}

/// The aggregate root: a learner's error pattern tracked over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: i64,
    pub key_point: String,
    pub original_phrase: String,
    pub correction: String,
    pub explanation: String,
    pub category: ErrorCategory,
    pub subtype: String,
    pub tags: BTreeSet<String>,
    pub custom_notes: String,

    pub mastery_level: f64,
    pub mistake_count: u32,
    pub correct_count: u32,

    pub next_review: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,

    pub original_error: OriginalError,
    /// Newest first on read (I4/§3 lineage ordering).
    pub review_examples: Vec<ReviewExample>,

    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_reason: Option<String>,
    pub version_history: Vec<VersionHistoryEntry>,
}

impl KnowledgePoint {
    /// Constructs a freshly-born point (C10.add_from_mistake / explicit
    /// create path). `id` is a placeholder until the repository assigns one.
    pub fn new(
        key_point: impl Into<String>,
        original_phrase: impl Into<String>,
        correction: impl Into<String>,
        explanation: impl Into<String>,
        category: ErrorCategory,
        subtype: impl Into<String>,
        original_error: OriginalError,
    ) -> Self {
        let now = Utc::now();
        let mastery_level = 0.0;
        Self {
            id: 0,
            key_point: key_point.into(),
            original_phrase: original_phrase.into(),
            correction: correction.into(),
            explanation: explanation.into(),
            category,
            subtype: subtype.into(),
            tags: BTreeSet::new(),
            custom_notes: String::new(),
            mastery_level,
            mistake_count: 1,
            correct_count: 0,
            next_review: scheduler::compute_next_review(mastery_level, category, now),
            last_seen: now,
            original_error,
            review_examples: Vec::new(),
            created_at: now,
            last_modified: now,
            is_deleted: false,
            deleted_at: None,
            deleted_reason: None,
            version_history: Vec::new(),
        }
    }

    /// I3's dedup key: `"{key_point}|{original_phrase}|{correction}"`.
    pub fn unique_identifier(&self) -> String {
        format!("{}|{}|{}", self.key_point, self.original_phrase, self.correction)
    }

    /// Appends a review example, newest-first, without touching mastery.
    pub fn push_review_example(&mut self, example: ReviewExample) {
        self.review_examples.insert(0, example);
    }

    /// Applies a mastery update (§4.2): clamp (I1), bump the matching
    /// counter, refresh `last_seen`, and recompute `next_review`.
    pub fn update_mastery(&mut self, is_correct: bool) {
        if is_correct {
            self.correct_count += 1;
            self.mastery_level = (self.mastery_level + self.category.mastery_increment()).min(1.0);
        } else {
            self.mistake_count += 1;
            self.mastery_level = (self.mastery_level - self.category.mastery_decrement()).max(0.0);
        }
        self.last_seen = Utc::now();
        self.next_review = scheduler::compute_next_review(self.mastery_level, self.category, self.last_seen);
    }

    fn editable_snapshot(&self) -> EditableSnapshot {
        EditableSnapshot {
            key_point: self.key_point.clone(),
            explanation: self.explanation.clone(),
            original_phrase: self.original_phrase.clone(),
            correction: self.correction.clone(),
            category: self.category.to_string(),
            subtype: self.subtype.clone(),
            tags: self.tags.iter().cloned().collect(),
            custom_notes: self.custom_notes.clone(),
        }
    }

    /// Structured edit (§4.2): rejects unknown fields, snapshots
    /// before/after, and appends one `version_history` entry. A no-op edit
    /// (before == after) still appends an entry, but with `changed_fields`
    /// cleared rather than echoing the (ineffective) update keys.
    pub fn edit(&mut self, updates: &Map<String, Value>) -> Result<VersionHistoryEntry, EditError> {
        for key in updates.keys() {
            if !EDITABLE_FIELDS.contains(&key.as_str()) {
                return Err(EditError::UnknownField(key.clone()));
            }
        }

        let before = self.editable_snapshot();

        if let Some(v) = updates.get("key_point").and_then(Value::as_str) {
            self.key_point = v.to_string();
        }
        if let Some(v) = updates.get("explanation").and_then(Value::as_str) {
            self.explanation = v.to_string();
        }
        if let Some(v) = updates.get("original_phrase").and_then(Value::as_str) {
            self.original_phrase = v.to_string();
        }
        if let Some(v) = updates.get("correction").and_then(Value::as_str) {
            self.correction = v.to_string();
        }
        if let Some(v) = updates.get("category").and_then(Value::as_str) {
            self.category = ErrorCategory::parse_or_other(v);
        }
        if let Some(v) = updates.get("subtype").and_then(Value::as_str) {
            self.subtype = v.to_string();
        }
        if let Some(v) = updates.get("tags").and_then(Value::as_array) {
            self.tags = v.iter().filter_map(|x| x.as_str().map(String::from)).collect();
        }
        if let Some(v) = updates.get("custom_notes").and_then(Value::as_str) {
            self.custom_notes = v.to_string();
        }

        self.last_modified = Utc::now();
        let after = self.editable_snapshot();
        let changed_fields = if before == after {
            Vec::new()
        } else {
            updates.keys().cloned().collect()
        };

        let entry = VersionHistoryEntry {
            timestamp: self.last_modified,
            before,
            after,
            changed_fields,
        };
        self.version_history.push(entry.clone());
        Ok(entry)
    }

    pub fn soft_delete(&mut self, reason: impl Into<String>) {
        let now = Utc::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.deleted_reason = Some(reason.into());
        self.last_modified = now;
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.deleted_reason = None;
        self.last_modified = Utc::now();
    }

    /// I6: practice events attributable to this point — the original error
    /// counts as one mistake, plus every review example.
    pub fn practice_event_count(&self) -> usize {
        1 + self.review_examples.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_point() -> KnowledgePoint {
        KnowledgePoint::new(
            "動詞時態錯誤: go",
            "go",
            "went",
            "昨天的動作應該使用過去式",
            ErrorCategory::Systematic,
            "tense",
            OriginalError::new("我昨天去了圖書館。", "I go to library yesterday.", "I went to the library yesterday."),
        )
    }

    #[test]
    fn new_point_starts_with_one_mistake_and_zero_mastery() {
        let p = sample_point();
        assert_eq!(p.mistake_count, 1);
        assert_eq!(p.correct_count, 0);
        assert_eq!(p.mastery_level, 0.0);
        assert!(p.next_review >= p.last_seen);
    }

    #[test]
    fn unique_identifier_joins_triple_with_pipes() {
        let p = sample_point();
        assert_eq!(p.unique_identifier(), "動詞時態錯誤: go|go|went");
    }

    #[test]
    fn mastery_clamps_to_unit_interval() {
        let mut p = sample_point();
        p.mastery_level = 0.95;
        p.category = ErrorCategory::Isolated;
        p.update_mastery(true);
        assert!(p.mastery_level <= 1.0);

        p.mastery_level = 0.02;
        p.update_mastery(false);
        assert!(p.mastery_level >= 0.0);
    }

    #[test]
    fn correct_review_raises_mastery_and_sets_schedule() {
        let mut p = sample_point();
        p.category = ErrorCategory::Isolated;
        p.mastery_level = 0.20;
        p.update_mastery(true);
        assert!((p.mastery_level - 0.40).abs() < 1e-9);
        assert_eq!(p.correct_count, 1);
        assert!(p.next_review >= p.last_seen);
    }

    #[test]
    fn edit_rejects_unknown_field() {
        let mut p = sample_point();
        let mut updates = Map::new();
        updates.insert("mastery_level".to_string(), Value::from(0.9));
        let err = p.edit(&updates).unwrap_err();
        assert!(matches!(err, EditError::UnknownField(f) if f == "mastery_level"));
    }

    #[test]
    fn edit_appends_one_history_entry_with_changed_fields() {
        let mut p = sample_point();
        let mut updates = Map::new();
        updates.insert("custom_notes".to_string(), Value::from("remember this one"));
        let entry = p.edit(&updates).unwrap();
        assert_eq!(p.version_history.len(), 1);
        assert_eq!(entry.changed_fields, vec!["custom_notes".to_string()]);
        assert_eq!(p.custom_notes, "remember this one");
    }

    #[test]
    fn noop_edit_clears_changed_fields_but_still_records_history() {
        let mut p = sample_point();
        let mut updates = Map::new();
        updates.insert("key_point".to_string(), Value::from(p.key_point.clone()));
        let entry = p.edit(&updates).unwrap();
        assert!(entry.changed_fields.is_empty());
        assert_eq!(p.version_history.len(), 1);
    }

    #[test]
    fn soft_delete_then_restore_round_trips_content() {
        let mut p = sample_point();
        let original = p.clone();
        p.soft_delete("duplicate entry");
        assert!(p.is_deleted);
        assert!(p.deleted_at.is_some());
        p.restore();
        assert!(!p.is_deleted);
        assert!(p.deleted_at.is_none());
        assert_eq!(p.key_point, original.key_point);
        assert_eq!(p.mastery_level, original.mastery_level);
        assert_eq!(p.version_history.len(), 0, "soft_delete/restore don't touch edit history");
    }

    #[test]
    fn practice_event_count_includes_original_error() {
        let mut p = sample_point();
        assert_eq!(p.practice_event_count(), 1);
        p.push_review_example(ReviewExample::new("她很聰明。", "She is very smart.", "She is very smart.", true));
        assert_eq!(p.practice_event_count(), 2);
    }

    #[test]
    fn review_examples_are_newest_first() {
        let mut p = sample_point();
        p.push_review_example(ReviewExample::new("a", "a", "a", true));
        p.push_review_example(ReviewExample::new("b", "b", "b", true));
        assert_eq!(p.review_examples[0].chinese_sentence, "b");
        assert_eq!(p.review_examples[1].chinese_sentence, "a");
    }
}
