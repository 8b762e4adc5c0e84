//! `PracticeRecord` extraction and normalisation, grounded on
//! `original_source/core/statistics_utils.py::PracticeRecord` /
//! `extract_json_practice_records` / `normalize_practice_records`. This
//! extractor is the normative definition of what counts as a practice
//! (spec.md §4.7) — no other source may contribute, so JSON-mode and
//! database-mode deployments of the original always agreed, and this one
//! always will too.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kp_model::KnowledgePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    OriginalError,
    ReviewExample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeRecord {
    pub chinese_sentence: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub timestamp: DateTime<Utc>,
    pub is_correct: bool,
    pub kind: RecordKind,
}

/// Every point contributes exactly one original-error record (I6 — always
/// a mistake) plus one record per review example, correctness preserved.
pub fn extract(points: &[KnowledgePoint]) -> Vec<PracticeRecord> {
    let mut records = Vec::with_capacity(points.len() * 2);
    for point in points {
        records.push(PracticeRecord {
            chinese_sentence: point.original_error.chinese_sentence.clone(),
            user_answer: point.original_error.user_answer.clone(),
            correct_answer: point.original_error.correct_answer.clone(),
            timestamp: point.original_error.timestamp,
            is_correct: false,
            kind: RecordKind::OriginalError,
        });
        for example in &point.review_examples {
            records.push(PracticeRecord {
                chinese_sentence: example.chinese_sentence.clone(),
                user_answer: example.user_answer.clone(),
                correct_answer: example.correct_answer.clone(),
                timestamp: example.timestamp,
                is_correct: example.is_correct,
                kind: RecordKind::ReviewExample,
            });
        }
    }
    records
}

/// Drops duplicates keyed by `(chinese_sentence, user_answer, timestamp,
/// kind)` and sorts ascending by timestamp.
pub fn normalize(records: Vec<PracticeRecord>) -> Vec<PracticeRecord> {
    let mut seen = BTreeSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        let key = (
            record.chinese_sentence.clone(),
            record.user_answer.clone(),
            record.timestamp,
            record.kind == RecordKind::OriginalError,
        );
        if seen.insert(key) {
            unique.push(record);
        }
    }
    unique.sort_by_key(|r| r.timestamp);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_model::{OriginalError, ReviewExample};
    use kp_taxonomy::category::ErrorCategory;

    fn sample_point() -> KnowledgePoint {
        KnowledgePoint::new(
            "時態錯誤: go",
            "go",
            "went",
            "過去式",
            ErrorCategory::Isolated,
            "tense",
            OriginalError::new("昨天我去圖書館", "I go to library", "I went to the library"),
        )
    }

    #[test]
    fn extract_yields_one_original_error_plus_each_review_example() {
        let mut point = sample_point();
        point.review_examples.push(ReviewExample {
            chinese_sentence: "我去學校".to_string(),
            user_answer: "I go to school".to_string(),
            correct_answer: "I went to school".to_string(),
            is_correct: true,
            timestamp: Utc::now(),
        });

        let records = extract(std::slice::from_ref(&point));
        assert_eq!(records.len(), 2);
        assert!(!records[0].is_correct);
        assert_eq!(records[0].kind, RecordKind::OriginalError);
        assert!(records[1].is_correct);
        assert_eq!(records[1].kind, RecordKind::ReviewExample);
    }

    #[test]
    fn normalize_drops_exact_duplicates_and_sorts_by_time() {
        let point = sample_point();
        let mut records = extract(std::slice::from_ref(&point));
        records.push(records[0].clone());

        let normalized = normalize(records);
        assert_eq!(normalized.len(), 1);
    }
}
