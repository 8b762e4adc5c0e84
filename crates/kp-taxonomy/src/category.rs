//! The four top-level error categories (C1), grounded on
//! `original_source/core/error_types.py::ErrorCategory`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity declared by the grading provider for a single error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Major,
    Minor,
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "minor" => Severity::Minor,
            _ => Severity::Major,
        })
    }
}

/// The four macro error categories a knowledge point is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Systematic,
    Isolated,
    Enhancement,
    Other,
}

impl ErrorCategory {
    /// Fixed iteration order used everywhere a category distribution is
    /// reported (statistics, display) — `original_source/core/
    /// statistics_utils.py`'s `category_order` literal.
    pub const DISPLAY_ORDER: [ErrorCategory; 4] = [
        ErrorCategory::Systematic,
        ErrorCategory::Isolated,
        ErrorCategory::Enhancement,
        ErrorCategory::Other,
    ];

    /// Learning priority, 1 highest, 4 lowest.
    pub fn priority(&self) -> u8 {
        match self {
            ErrorCategory::Systematic => 1,
            ErrorCategory::Isolated => 2,
            ErrorCategory::Other => 3,
            ErrorCategory::Enhancement => 4,
        }
    }

    /// Multiplier applied to the scheduler's base review interval (§4.3).
    pub fn review_multiplier(&self) -> f64 {
        match self {
            ErrorCategory::Systematic => 0.8,
            ErrorCategory::Isolated => 1.0,
            ErrorCategory::Other => 1.0,
            ErrorCategory::Enhancement => 1.5,
        }
    }

    /// Mastery gain on a correct review (§3 `mastery_increment`).
    pub fn mastery_increment(&self) -> f64 {
        match self {
            ErrorCategory::Systematic => 0.25,
            ErrorCategory::Isolated => 0.20,
            ErrorCategory::Enhancement => 0.15,
            ErrorCategory::Other => 0.15,
        }
    }

    /// Mastery loss on a mistake (§3 `mastery_decrement`).
    pub fn mastery_decrement(&self) -> f64 {
        match self {
            ErrorCategory::Systematic => 0.15,
            ErrorCategory::Isolated => 0.10,
            ErrorCategory::Enhancement => 0.10,
            ErrorCategory::Other => 0.10,
        }
    }

    /// Chinese display label, for rendering only.
    pub fn display_label(&self) -> &'static str {
        match self {
            ErrorCategory::Systematic => "系統性錯誤",
            ErrorCategory::Isolated => "單一性錯誤",
            ErrorCategory::Enhancement => "可以更好",
            ErrorCategory::Other => "其他錯誤",
        }
    }

    /// Lossless-for-valid-input parse, defaulting to `Other` for anything
    /// unrecognised — mirrors `ErrorCategory.from_string`'s tolerant lookup.
    pub fn parse_or_other(value: &str) -> Self {
        value.parse().unwrap_or(ErrorCategory::Other)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Systematic => "systematic",
            ErrorCategory::Isolated => "isolated",
            ErrorCategory::Enhancement => "enhancement",
            ErrorCategory::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognised error category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for ErrorCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "systematic" => Ok(ErrorCategory::Systematic),
            "isolated" => Ok(ErrorCategory::Isolated),
            "enhancement" => Ok(ErrorCategory::Enhancement),
            "other" => Ok(ErrorCategory::Other),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_match_spec_table() {
        assert_eq!(ErrorCategory::Systematic.priority(), 1);
        assert_eq!(ErrorCategory::Isolated.priority(), 2);
        assert_eq!(ErrorCategory::Other.priority(), 3);
        assert_eq!(ErrorCategory::Enhancement.priority(), 4);
    }

    #[test]
    fn unknown_string_parses_to_other() {
        assert_eq!(ErrorCategory::parse_or_other("bogus"), ErrorCategory::Other);
    }

    #[test]
    fn display_order_is_fixed() {
        assert_eq!(
            ErrorCategory::DISPLAY_ORDER,
            [
                ErrorCategory::Systematic,
                ErrorCategory::Isolated,
                ErrorCategory::Enhancement,
                ErrorCategory::Other,
            ]
        );
    }
}
