//! The shape a grading provider hands back (§6's "AI grading provider"
//! external-collaborator contract). The service only consumes this; it
//! never calls a provider itself.

use kp_taxonomy::category::{ErrorCategory, Severity};

/// Whether this attempt is a brand new mistake or a review of a point
/// already known, grounded on `original_source/core/database/adapter.py`'s
/// `practice_mode` parameter (`"new"` / `"review"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeMode {
    New,
    Review,
}

/// One entry of `grading.error_analysis`.
#[derive(Debug, Clone)]
pub struct ErrorAnalysisItem {
    pub key_point_summary: String,
    pub original_phrase: String,
    pub correction: String,
    pub explanation: String,
    pub severity: Severity,
    /// When the provider already committed to a category, that category is
    /// trusted as-is and only the subtype is still derived by C1's
    /// `classify` — matches `_process_error_async`'s `"category" in error`
    /// branch.
    pub category: Option<ErrorCategory>,
}

/// The grading result for one practice attempt.
#[derive(Debug, Clone)]
pub struct Grading {
    pub is_generally_correct: bool,
    pub overall_suggestion: String,
    pub error_analysis: Vec<ErrorAnalysisItem>,
}

impl ErrorAnalysisItem {
    /// `"<summary>: <original_phrase>"` when a phrase was flagged, else the
    /// bare summary (§4.10 step 2).
    pub fn specific_key_point(&self) -> String {
        if self.original_phrase.is_empty() {
            self.key_point_summary.clone()
        } else {
            format!("{}: {}", self.key_point_summary, self.original_phrase)
        }
    }
}
