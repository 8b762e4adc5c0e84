//! The central error handler (C9), grounded on
//! `original_source/core/error_handler.py::ErrorHandler`. The original's
//! job of *converting* a raw exception into a `UnifiedError` is done at the
//! edge by each crate's own `From<XError> for UnifiedError` impl (kp-store's
//! `StoreError`, kp-model's `EditError`, ...); what is left here is the
//! cross-cutting part: severity-keyed logging and the should-fallback gate.

use std::sync::atomic::{AtomicBool, Ordering};

use kp_common::{ErrorSeverity, UnifiedError};
use tracing::{error, info, warn};

/// §4.9: decides whether an error should be routed through
/// [`crate::fallback::FallbackChain`] before surfacing to the caller.
pub struct ErrorHandler {
    fallback_enabled: AtomicBool,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self { fallback_enabled: AtomicBool::new(true) }
    }

    pub fn enable_fallback(&self) {
        self.fallback_enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable_fallback(&self) {
        self.fallback_enabled.store(false, Ordering::Relaxed);
    }

    /// Logs `error` at the tracing level its severity maps to (§4.9) and
    /// returns it unchanged, so this can sit inline in a `?`-chain:
    /// `repo.find_by_id(id).await.map_err(UnifiedError::from).inspect_err(|e| handler.log(e, "find_by_id"))`.
    pub fn log(&self, error: &UnifiedError, operation: &str) {
        match error.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(code = %error.code, category = %error.category, operation, "{}", error.message)
            }
            ErrorSeverity::Medium => {
                warn!(code = %error.code, category = %error.category, operation, "{}", error.message)
            }
            ErrorSeverity::Low => {
                info!(code = %error.code, category = %error.category, operation, "{}", error.message)
            }
        }
    }

    /// Only {Database, Network, Concurrency, System} at {Medium, High}
    /// severity are worth falling back on — Validation/Business surface
    /// directly, and Critical indicates the fallback path itself can't be
    /// trusted.
    pub fn should_fallback(&self, error: &UnifiedError) -> bool {
        self.fallback_enabled.load(Ordering::Relaxed)
            && error.category.is_fallback_eligible()
            && matches!(error.severity, ErrorSeverity::Medium | ErrorSeverity::High)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_common::ErrorCategory;

    #[test]
    fn critical_database_error_does_not_fall_back() {
        let handler = ErrorHandler::new();
        let err = UnifiedError::new("OOM", "out of memory", ErrorCategory::Database, ErrorSeverity::Critical);
        assert!(!handler.should_fallback(&err));
    }

    #[test]
    fn validation_error_never_falls_back_even_at_high_severity() {
        let handler = ErrorHandler::new();
        let err = UnifiedError::new("BAD_INPUT", "bad", ErrorCategory::Validation, ErrorSeverity::High);
        assert!(!handler.should_fallback(&err));
    }

    #[test]
    fn medium_severity_network_error_falls_back() {
        let handler = ErrorHandler::new();
        let err = UnifiedError::new("TIMEOUT", "timed out", ErrorCategory::Network, ErrorSeverity::Medium);
        assert!(handler.should_fallback(&err));
    }

    #[test]
    fn disabling_fallback_overrides_category_and_severity() {
        let handler = ErrorHandler::new();
        handler.disable_fallback();
        let err = UnifiedError::new("TIMEOUT", "timed out", ErrorCategory::Network, ErrorSeverity::Medium);
        assert!(!handler.should_fallback(&err));
    }
}
