//! `OriginalError` and `ReviewExample` (§3), grounded on
//! `original_source/core/models.py`'s two eponymous dataclasses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single practice event that caused a knowledge point to be born.
/// Exactly one per point — see I6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalError {
    pub chinese_sentence: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub timestamp: DateTime<Utc>,
}

impl OriginalError {
    pub fn new(
        chinese_sentence: impl Into<String>,
        user_answer: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            chinese_sentence: chinese_sentence.into(),
            user_answer: user_answer.into(),
            correct_answer: correct_answer.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A later practice event against an existing point, correct or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewExample {
    pub chinese_sentence: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

impl ReviewExample {
    pub fn new(
        chinese_sentence: impl Into<String>,
        user_answer: impl Into<String>,
        correct_answer: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            chinese_sentence: chinese_sentence.into(),
            user_answer: user_answer.into(),
            correct_answer: correct_answer.into(),
            is_correct,
            timestamp: Utc::now(),
        }
    }
}
