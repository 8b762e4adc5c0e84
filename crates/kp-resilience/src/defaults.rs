//! Typed safe defaults for the last link of the fallback chain, grounded on
//! `original_source/core/fallback_strategies.py::GracefulDegradationFallback
//! ._get_safe_default`. The original guesses a default by pattern-matching
//! the failed function's name (`"points" in method_name`, `"add" in
//! method_name`, ...); a typed call site makes that guess unnecessary —
//! the return type already says what kind of thing was being asked for.

pub trait GracefulDefault {
    fn graceful_default() -> Self;
}

impl<T> GracefulDefault for Vec<T> {
    fn graceful_default() -> Self {
        Vec::new()
    }
}

impl<T> GracefulDefault for Option<T> {
    fn graceful_default() -> Self {
        None
    }
}

impl GracefulDefault for bool {
    fn graceful_default() -> Self {
        false
    }
}

impl GracefulDefault for i32 {
    fn graceful_default() -> Self {
        0
    }
}

impl GracefulDefault for kp_stats::PracticeStatistics {
    fn graceful_default() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_and_lookup_and_mutation_defaults_match_spec_shapes() {
        assert_eq!(Vec::<i32>::graceful_default(), Vec::<i32>::new());
        assert_eq!(Option::<i32>::graceful_default(), None);
        assert!(!bool::graceful_default());
    }

    #[test]
    fn statistics_default_is_zero_filled() {
        let stats = kp_stats::PracticeStatistics::graceful_default();
        assert_eq!(stats.total_practices, 0);
        assert_eq!(stats.avg_mastery, 0.0);
    }
}
