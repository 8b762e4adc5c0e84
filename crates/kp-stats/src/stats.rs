//! The canonical statistics shape (C7), grounded on
//! `original_source/core/statistics_utils.py::calculate_practice_statistics`.
//! Every surface (CLI, API, report) consumes this one shape so that counts
//! never diverge by call site.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kp_model::{scheduler, KnowledgePoint};
use kp_taxonomy::category::ErrorCategory;
use serde::{Deserialize, Serialize};

use crate::record::PracticeRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MasteryBuckets {
    pub beginner: usize,
    pub intermediate: usize,
    pub advanced: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeStatistics {
    pub total_practices: usize,
    pub correct_count: usize,
    pub mistake_count: usize,
    pub accuracy: f64,
    pub knowledge_points: usize,
    pub avg_mastery: f64,
    /// Fixed iteration order (Systematic, Isolated, Enhancement, Other);
    /// zero-count categories are omitted, matching the original's dict
    /// build-up.
    pub category_distribution: Vec<(String, usize)>,
    pub subtype_distribution: BTreeMap<String, usize>,
    pub due_reviews: usize,
    pub points_by_mastery: MasteryBuckets,
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// `points` must already be the active set (soft-deleted points excluded by
/// the caller, per I4); `records` is the output of
/// [`crate::record::normalize`].
pub fn compute(points: &[KnowledgePoint], records: &[PracticeRecord], now: DateTime<Utc>) -> PracticeStatistics {
    let total_practices = records.len();
    let correct_count = records.iter().filter(|r| r.is_correct).count();
    let mistake_count = total_practices - correct_count;
    let accuracy = if total_practices > 0 { correct_count as f64 / total_practices as f64 } else { 0.0 };

    let knowledge_points = points.len();
    let avg_mastery = if knowledge_points > 0 {
        round6(points.iter().map(|p| p.mastery_level).sum::<f64>() / knowledge_points as f64)
    } else {
        0.0
    };

    let mut category_counts = [0usize; 4];
    for point in points {
        if let Some(idx) = ErrorCategory::DISPLAY_ORDER.iter().position(|c| *c == point.category) {
            category_counts[idx] += 1;
        }
    }
    let category_distribution = ErrorCategory::DISPLAY_ORDER
        .iter()
        .zip(category_counts)
        .filter(|(_, count)| *count > 0)
        .map(|(category, count)| (category.display_label().to_string(), count))
        .collect();

    let mut subtype_distribution = BTreeMap::new();
    for point in points {
        *subtype_distribution.entry(point.subtype.clone()).or_insert(0) += 1;
    }

    let due_reviews = points.iter().filter(|p| scheduler::is_due_for_review(p, now)).count();

    let mut points_by_mastery = MasteryBuckets::default();
    for point in points {
        if point.mastery_level < 0.3 {
            points_by_mastery.beginner += 1;
        } else if point.mastery_level < 0.7 {
            points_by_mastery.intermediate += 1;
        } else {
            points_by_mastery.advanced += 1;
        }
    }

    PracticeStatistics {
        total_practices,
        correct_count,
        mistake_count,
        accuracy,
        knowledge_points,
        avg_mastery,
        category_distribution,
        subtype_distribution,
        due_reviews,
        points_by_mastery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use kp_model::OriginalError;

    fn point(category: ErrorCategory, subtype: &str, mastery: f64) -> KnowledgePoint {
        let mut p = KnowledgePoint::new(
            "測試", "a", "b", "c", category, subtype,
            OriginalError::new("s", "a", "b"),
        );
        p.mastery_level = mastery;
        p
    }

    #[test]
    fn empty_input_yields_zeroed_shape() {
        let stats = compute(&[], &[], Utc::now());
        assert_eq!(stats.total_practices, 0);
        assert_eq!(stats.accuracy, 0.0);
        assert_eq!(stats.avg_mastery, 0.0);
        assert!(stats.category_distribution.is_empty());
    }

    #[test]
    fn category_distribution_follows_fixed_order_and_omits_zero_counts() {
        let points = vec![
            point(ErrorCategory::Other, "x", 0.5),
            point(ErrorCategory::Systematic, "y", 0.5),
            point(ErrorCategory::Systematic, "y", 0.5),
        ];
        let stats = compute(&points, &[], Utc::now());
        assert_eq!(
            stats.category_distribution,
            vec![
                (ErrorCategory::Systematic.display_label().to_string(), 2),
                (ErrorCategory::Other.display_label().to_string(), 1),
            ]
        );
    }

    #[test]
    fn mastery_buckets_partition_by_threshold() {
        let points = vec![
            point(ErrorCategory::Isolated, "x", 0.1),
            point(ErrorCategory::Isolated, "x", 0.5),
            point(ErrorCategory::Isolated, "x", 0.9),
        ];
        let stats = compute(&points, &[], Utc::now());
        assert_eq!(stats.points_by_mastery, MasteryBuckets { beginner: 1, intermediate: 1, advanced: 1 });
    }

    #[test]
    fn accuracy_matches_extracted_records() {
        let mut p = point(ErrorCategory::Isolated, "x", 0.5);
        p.review_examples.push(kp_model::ReviewExample {
            chinese_sentence: "s2".into(),
            user_answer: "a2".into(),
            correct_answer: "b2".into(),
            is_correct: true,
            timestamp: Utc::now(),
        });
        let records = record::normalize(record::extract(&[p.clone()]));
        let stats = compute(&[p], &records, Utc::now());
        assert_eq!(stats.total_practices, 2);
        assert_eq!(stats.correct_count, 1);
        assert_eq!(stats.accuracy, 0.5);
    }
}
