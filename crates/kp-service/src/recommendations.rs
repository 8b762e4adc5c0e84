//! Learning recommendations (§4.10.get_recommendations), grounded on
//! `original_source/core/services/async_knowledge_service.py
//! ::_generate_recommendation` for the shape of a recommendation, extended
//! with the scoring curve this repo's open-question decision #4 settled on
//! (no `original_source` precedent implements per-subtype scoring).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use kp_model::KnowledgePoint;
use kp_resilience::GracefulDefault;
use kp_taxonomy::category::ErrorCategory;
use serde::{Deserialize, Serialize};

const MAX_MESSAGES: usize = 3;
const MAX_FOCUS_CATEGORIES: usize = 2;
const MAX_PRIORITY_POINTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub messages: Vec<String>,
    pub focus_categories: Vec<ErrorCategory>,
    pub difficulty_level: u8,
    pub priority_point_ids: Vec<i64>,
}

/// The chain's last-resort default when even the active-points read that
/// recommendations are built from can't be recovered from cache or retry —
/// an explicit "nothing to recommend yet" rather than `build(&[], now)`'s
/// fixed `difficulty_level`, since a degraded response shouldn't assert a
/// difficulty we have no data to support.
impl GracefulDefault for Recommendations {
    fn graceful_default() -> Self {
        Self {
            messages: vec!["目前無法取得學習建議，請稍後再試".to_string()],
            focus_categories: Vec::new(),
            difficulty_level: 0,
            priority_point_ids: Vec::new(),
        }
    }
}

struct Bucket {
    category: ErrorCategory,
    subtype: String,
    mastery_sum: f64,
    count: usize,
    most_recent_mistake: DateTime<Utc>,
}

/// Days-since-mistake to weight: 1.0 at <=7 days, 0.0 at >=30 days, linear
/// between (decision #4).
fn recency_weight(days_since: f64) -> f64 {
    if days_since <= 7.0 {
        1.0
    } else if days_since >= 30.0 {
        0.0
    } else {
        1.0 - (days_since - 7.0) / (30.0 - 7.0)
    }
}

fn most_recent_mistake(point: &KnowledgePoint) -> DateTime<Utc> {
    point
        .review_examples
        .iter()
        .filter(|e| !e.is_correct)
        .map(|e| e.timestamp)
        .fold(point.original_error.timestamp, |acc, ts| acc.max(ts))
}

fn difficulty_level(avg_mastery: f64) -> u8 {
    if avg_mastery < 0.3 {
        1
    } else if avg_mastery < 0.6 {
        2
    } else {
        3
    }
}

pub fn build(active_points: &[KnowledgePoint], now: DateTime<Utc>) -> Recommendations {
    if active_points.is_empty() {
        return Recommendations {
            messages: vec!["尚無足夠的學習資料，開始練習後就能獲得個人化建議".to_string()],
            focus_categories: Vec::new(),
            difficulty_level: 2,
            priority_point_ids: Vec::new(),
        };
    }

    let global_avg_mastery =
        active_points.iter().map(|p| p.mastery_level).sum::<f64>() / active_points.len() as f64;

    let mut buckets: HashMap<(ErrorCategory, String), Bucket> = HashMap::new();
    for p in active_points {
        let entry = buckets.entry((p.category, p.subtype.clone())).or_insert_with(|| Bucket {
            category: p.category,
            subtype: p.subtype.clone(),
            mastery_sum: 0.0,
            count: 0,
            most_recent_mistake: p.created_at,
        });
        entry.mastery_sum += p.mastery_level;
        entry.count += 1;
        entry.most_recent_mistake = entry.most_recent_mistake.max(most_recent_mistake(p));
    }

    let mut scored: Vec<(f64, &Bucket)> = buckets
        .values()
        .map(|b| {
            let avg_mastery = b.mastery_sum / b.count as f64;
            let days_since = (now - b.most_recent_mistake).num_seconds() as f64 / 86_400.0;
            let score = (1.0 - avg_mastery) * 0.6 + recency_weight(days_since.max(0.0)) * 0.4;
            (score, b)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let messages: Vec<String> = scored
        .iter()
        .take(MAX_MESSAGES)
        .map(|(_, b)| {
            format!(
                "近期建議加強「{}」（{} 類型，共 {} 個知識點，平均掌握度 {:.0}%）",
                b.subtype,
                b.category.display_label(),
                b.count,
                (b.mastery_sum / b.count as f64) * 100.0
            )
        })
        .collect();

    let mut focus_categories = Vec::new();
    for (_, b) in &scored {
        if !focus_categories.contains(&b.category) {
            focus_categories.push(b.category);
        }
        if focus_categories.len() >= MAX_FOCUS_CATEGORIES {
            break;
        }
    }

    let priority_point_ids = select_priority_points(active_points, now);

    Recommendations {
        messages,
        focus_categories,
        difficulty_level: difficulty_level(global_avg_mastery),
        priority_point_ids,
    }
}

/// Overdue first, then low-mastery systematic points, then any other
/// low-mastery point, each pass skipping ids already selected (§4.10 step
/// 4).
fn select_priority_points(active_points: &[KnowledgePoint], now: DateTime<Utc>) -> Vec<i64> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    let mut overdue: Vec<&KnowledgePoint> = active_points.iter().filter(|p| p.next_review <= now).collect();
    overdue.sort_by(|a, b| a.next_review.cmp(&b.next_review));
    for p in overdue {
        if out.len() >= MAX_PRIORITY_POINTS {
            return out;
        }
        if seen.insert(p.id) {
            out.push(p.id);
        }
    }

    let mut low_systematic: Vec<&KnowledgePoint> =
        active_points.iter().filter(|p| p.category == ErrorCategory::Systematic && p.mastery_level < 0.3).collect();
    low_systematic.sort_by(|a, b| a.mastery_level.partial_cmp(&b.mastery_level).unwrap_or(std::cmp::Ordering::Equal));
    for p in low_systematic {
        if out.len() >= MAX_PRIORITY_POINTS {
            return out;
        }
        if seen.insert(p.id) {
            out.push(p.id);
        }
    }

    let mut low_other: Vec<&KnowledgePoint> = active_points.iter().filter(|p| p.mastery_level < 0.3).collect();
    low_other.sort_by(|a, b| a.mastery_level.partial_cmp(&b.mastery_level).unwrap_or(std::cmp::Ordering::Equal));
    for p in low_other {
        if out.len() >= MAX_PRIORITY_POINTS {
            return out;
        }
        if seen.insert(p.id) {
            out.push(p.id);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_model::OriginalError;

    fn point(id: i64, category: ErrorCategory, subtype: &str, mastery: f64) -> KnowledgePoint {
        let mut p = KnowledgePoint::new(
            format!("point {id}"),
            "phrase",
            "correction",
            "explanation",
            category,
            subtype,
            OriginalError::new("sentence", "wrong", "right"),
        );
        p.id = id;
        p.mastery_level = mastery;
        p
    }

    #[test]
    fn empty_input_yields_a_generic_message_and_no_priority_points() {
        let rec = build(&[], Utc::now());
        assert_eq!(rec.messages.len(), 1);
        assert!(rec.priority_point_ids.is_empty());
    }

    #[test]
    fn difficulty_tracks_global_average_mastery() {
        let points = vec![point(1, ErrorCategory::Isolated, "x", 0.1), point(2, ErrorCategory::Isolated, "x", 0.1)];
        let rec = build(&points, Utc::now());
        assert_eq!(rec.difficulty_level, 1);
    }

    #[test]
    fn overdue_points_are_prioritised_before_low_mastery_points() {
        let now = Utc::now();
        let mut overdue = point(1, ErrorCategory::Isolated, "x", 0.8);
        overdue.next_review = now - chrono::Duration::days(1);
        let low_mastery = point(2, ErrorCategory::Systematic, "y", 0.1);

        let rec = build(&[overdue, low_mastery], now);
        assert_eq!(rec.priority_point_ids[0], 1);
        assert!(rec.priority_point_ids.contains(&2));
    }

    #[test]
    fn priority_points_never_exceed_the_cap() {
        let now = Utc::now();
        let points: Vec<KnowledgePoint> = (0..20)
            .map(|i| {
                let mut p = point(i, ErrorCategory::Isolated, "x", 0.1);
                p.next_review = now - chrono::Duration::days(1);
                p
            })
            .collect();
        let rec = build(&points, now);
        assert_eq!(rec.priority_point_ids.len(), MAX_PRIORITY_POINTS);
    }

    #[test]
    fn focus_categories_are_deduplicated_and_capped() {
        let points = vec![
            point(1, ErrorCategory::Isolated, "x", 0.1),
            point(2, ErrorCategory::Isolated, "y", 0.2),
            point(3, ErrorCategory::Enhancement, "z", 0.1),
            point(4, ErrorCategory::Other, "w", 0.1),
        ];
        let rec = build(&points, Utc::now());
        assert!(rec.focus_categories.len() <= MAX_FOCUS_CATEGORIES);
        let unique: BTreeSet<_> = rec.focus_categories.iter().collect();
        assert_eq!(unique.len(), rec.focus_categories.len());
    }
}
