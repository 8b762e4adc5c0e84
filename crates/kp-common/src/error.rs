//! The unified error shape every public operation ultimately fails with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category driving fallback eligibility (C9 taxonomy, distinct from the
/// grading `ErrorCategory` in `kp-taxonomy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Database,
    Validation,
    FileIO,
    Network,
    Concurrency,
    Business,
    System,
    Unknown,
}

impl ErrorCategory {
    /// Categories the default fallback chain ever considers (§4.8).
    /// Validation and Business are excluded: they surface directly.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Database
                | ErrorCategory::Network
                | ErrorCategory::Concurrency
                | ErrorCategory::System
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Database => "database",
            ErrorCategory::Validation => "validation",
            ErrorCategory::FileIO => "file_io",
            ErrorCategory::Network => "network",
            ErrorCategory::Concurrency => "concurrency",
            ErrorCategory::Business => "business",
            ErrorCategory::System => "system",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Severity governs log level only (§4.9) — never fallback eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// The `tracing` level this severity is logged at.
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Low => tracing::Level::INFO,
            ErrorSeverity::Medium => tracing::Level::WARN,
            ErrorSeverity::High => tracing::Level::ERROR,
            ErrorSeverity::Critical => tracing::Level::ERROR,
        }
    }
}

/// The shape every public method fails with, per §4.9/§7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedError {
    pub message: String,
    pub code: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub details: serde_json::Value,
    pub user_message: String,
    pub recovery_suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl UnifiedError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
        severity: ErrorSeverity,
    ) -> Self {
        let message = message.into();
        Self {
            user_message: default_user_message(category),
            recovery_suggestions: default_recovery_suggestions(category),
            message,
            code: code.into(),
            category,
            severity,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for UnifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)
    }
}

impl std::error::Error for UnifiedError {}

fn default_user_message(category: ErrorCategory) -> String {
    match category {
        ErrorCategory::Database => "We're having trouble reaching storage. Please try again shortly.".to_string(),
        ErrorCategory::Validation => "Some of the submitted data was invalid.".to_string(),
        ErrorCategory::FileIO => "A required file could not be read or written.".to_string(),
        ErrorCategory::Network => "A network request did not complete in time.".to_string(),
        ErrorCategory::Concurrency => "The system is busy handling another update to this data.".to_string(),
        ErrorCategory::Business => "That action isn't allowed right now.".to_string(),
        ErrorCategory::System => "An internal error occurred.".to_string(),
        ErrorCategory::Unknown => "An unexpected error occurred.".to_string(),
    }
}

fn default_recovery_suggestions(category: ErrorCategory) -> Vec<String> {
    match category {
        ErrorCategory::Database => vec!["Retry the request".to_string(), "Check storage connectivity".to_string()],
        ErrorCategory::Validation => vec!["Review the submitted fields and resubmit".to_string()],
        ErrorCategory::FileIO => vec!["Verify the file path and permissions".to_string()],
        ErrorCategory::Network => vec!["Retry the request".to_string(), "Check network connectivity".to_string()],
        ErrorCategory::Concurrency => vec!["Retry the request after a short delay".to_string()],
        ErrorCategory::Business => vec!["Review the current limits or state before retrying".to_string()],
        ErrorCategory::System => vec!["Contact support if the problem persists".to_string()],
        ErrorCategory::Unknown => vec!["Retry the request".to_string()],
    }
}

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, UnifiedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_business_never_fallback_eligible() {
        assert!(!ErrorCategory::Validation.is_fallback_eligible());
        assert!(!ErrorCategory::Business.is_fallback_eligible());
    }

    #[test]
    fn database_network_concurrency_system_are_fallback_eligible() {
        assert!(ErrorCategory::Database.is_fallback_eligible());
        assert!(ErrorCategory::Network.is_fallback_eligible());
        assert!(ErrorCategory::Concurrency.is_fallback_eligible());
        assert!(ErrorCategory::System.is_fallback_eligible());
    }

    #[test]
    fn critical_and_high_log_at_error_level() {
        assert_eq!(ErrorSeverity::Critical.as_tracing_level(), tracing::Level::ERROR);
        assert_eq!(ErrorSeverity::High.as_tracing_level(), tracing::Level::ERROR);
        assert_eq!(ErrorSeverity::Low.as_tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn display_includes_code_and_category() {
        let err = UnifiedError::new("db.timeout", "pool exhausted", ErrorCategory::Database, ErrorSeverity::High);
        let rendered = err.to_string();
        assert!(rendered.contains("db.timeout"));
        assert!(rendered.contains("database"));
        assert!(rendered.contains("pool exhausted"));
    }
}
