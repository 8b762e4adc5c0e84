//! The daily-limit governor (C11), grounded on
//! `original_source/core/database/database_manager.py`'s
//! `get_user_settings`/`update_user_settings`/`increment_daily_stats`/
//! `check_daily_limit`. The original checks the limit and increments the
//! counter as two separate cached calls, which a burst of concurrent
//! mistakes can race past the bound; `record_and_check` closes that gap by
//! doing both under one row lock (§5's linearisability guarantee).

use std::sync::Arc;

use chrono::NaiveDate;
use kp_cache::{CacheCategory, LayeredCache};
use kp_common::{ErrorCategory as ErrCat, ErrorSeverity, UnifiedError};
use kp_taxonomy::category::ErrorCategory;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

const MIN_DAILY_LIMIT: i32 = 1;
const MAX_DAILY_LIMIT: i32 = 50;
const DEFAULT_DAILY_LIMIT: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub daily_limit: i32,
    pub limit_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self { daily_limit: DEFAULT_DAILY_LIMIT, limit_enabled: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub isolated: i64,
    pub enhancement: i64,
}

/// §4.11's `check`/`record_and_check` return shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitStatus {
    pub can_add: bool,
    pub limit_enabled: bool,
    pub daily_limit: i32,
    pub used_count: i64,
    pub remaining: i64,
    pub breakdown: DailyBreakdown,
    pub status: String,
}

/// Only these two top-level categories are ever gated; everything else
/// (Systematic, Other) is always admitted — matches the original's
/// `error_type not in {"isolated", "enhancement"}` fast path, and the fact
/// that `daily_knowledge_stats` only carries columns for these two.
fn is_limited(category: ErrorCategory) -> bool {
    matches!(category, ErrorCategory::Isolated | ErrorCategory::Enhancement)
}

fn not_limited_status() -> LimitStatus {
    LimitStatus {
        can_add: true,
        limit_enabled: false,
        daily_limit: DEFAULT_DAILY_LIMIT,
        used_count: 0,
        remaining: DEFAULT_DAILY_LIMIT as i64,
        breakdown: DailyBreakdown::default(),
        status: "not_limited".to_string(),
    }
}

fn db_error(context: &str, err: sqlx::Error) -> UnifiedError {
    UnifiedError::new("DAILY_LIMIT_DB_ERROR", format!("{context}: {err}"), ErrCat::Database, ErrorSeverity::Medium)
}

fn invalid_limit(value: i32) -> UnifiedError {
    UnifiedError::new(
        "DAILY_LIMIT_OUT_OF_RANGE",
        format!("daily_limit must be between {MIN_DAILY_LIMIT} and {MAX_DAILY_LIMIT}, got {value}"),
        ErrCat::Validation,
        ErrorSeverity::Low,
    )
}

pub struct DailyLimitGovernor {
    pool: PgPool,
    cache: Arc<LayeredCache>,
}

impl DailyLimitGovernor {
    pub fn new(pool: PgPool, cache: Arc<LayeredCache>) -> Self {
        Self { pool, cache }
    }

    /// Cached 30 minutes (§4.11's "Settings-load policy").
    pub async fn get_user_settings(&self, user: &str) -> Result<UserSettings, UnifiedError> {
        let key = format!("settings:{user}");
        if let Some(cached) = self.cache.get(CacheCategory::UserPreferences, &key).await {
            if let Ok(settings) = serde_json::from_value(cached) {
                return Ok(settings);
            }
        }

        let row = sqlx::query(
            "SELECT daily_limit, limit_enabled FROM user_settings WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading user settings", e))?;

        let settings = match row {
            Some(row) => UserSettings {
                daily_limit: row.try_get::<i32, _>("daily_limit").map_err(|e| db_error("reading daily_limit", e))?,
                limit_enabled: row.try_get::<bool, _>("limit_enabled").map_err(|e| db_error("reading limit_enabled", e))?,
            },
            None => UserSettings::default(),
        };

        if let Ok(json) = serde_json::to_value(settings) {
            self.cache.set(CacheCategory::UserPreferences, &key, json).await;
        }
        Ok(settings)
    }

    /// Validates the 1..=50 range (I from §3's `UserSettings`), upserts,
    /// and invalidates both the settings cache and today's `limit_status`
    /// cache entries for every category, since a changed limit changes the
    /// answer to `check` immediately.
    pub async fn update_user_settings(
        &self,
        user: &str,
        daily_limit: Option<i32>,
        limit_enabled: Option<bool>,
    ) -> Result<UserSettings, UnifiedError> {
        if let Some(limit) = daily_limit {
            if !(MIN_DAILY_LIMIT..=MAX_DAILY_LIMIT).contains(&limit) {
                return Err(invalid_limit(limit));
            }
        }

        let current = self.get_user_settings(user).await?;
        let next = UserSettings {
            daily_limit: daily_limit.unwrap_or(current.daily_limit),
            limit_enabled: limit_enabled.unwrap_or(current.limit_enabled),
        };

        sqlx::query(
            "INSERT INTO user_settings (user_id, daily_limit, limit_enabled, updated_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (user_id) DO UPDATE SET
                 daily_limit = EXCLUDED.daily_limit,
                 limit_enabled = EXCLUDED.limit_enabled,
                 updated_at = now()",
        )
        .bind(user)
        .bind(next.daily_limit)
        .bind(next.limit_enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("updating user settings", e))?;

        self.invalidate_today_limit_cache(user).await;
        Ok(next)
    }

    /// Read-only status check, cached 60s per (user, day) (§4.11). Never
    /// mutates `daily_knowledge_stats`.
    pub async fn check(&self, user: &str, category: ErrorCategory, today: NaiveDate) -> Result<LimitStatus, UnifiedError> {
        if !is_limited(category) {
            return Ok(not_limited_status());
        }

        let key = Self::limit_cache_key(user, today);
        if let Some(cached) = self.cache.get(CacheCategory::UserPreferences, &key).await {
            if let Ok(status) = serde_json::from_value(cached) {
                return Ok(status);
            }
        }

        let settings = self.get_user_settings(user).await?;
        let breakdown = self.fetch_breakdown(user, today).await?;
        let status = build_status(&settings, breakdown);

        if let Ok(json) = serde_json::to_value(&status) {
            self.cache.set(CacheCategory::UserPreferences, &key, json).await;
        }
        Ok(status)
    }

    /// Increments the counter for `category` and re-evaluates admission in
    /// one transaction — the row lock `SELECT ... FOR UPDATE` takes on
    /// `daily_knowledge_stats` serialises concurrent callers for the same
    /// (user, day), which is what makes this linearisable (§5).
    pub async fn record_and_check(&self, user: &str, category: ErrorCategory) -> Result<LimitStatus, UnifiedError> {
        if !is_limited(category) {
            return Ok(not_limited_status());
        }

        let settings = self.get_user_settings(user).await?;
        let today = chrono::Utc::now().date_naive();

        let mut tx = self.pool.begin().await.map_err(|e| db_error("starting daily-limit transaction", e))?;

        let locked_row = sqlx::query(
            "SELECT isolated_count, enhancement_count FROM daily_knowledge_stats
             WHERE user_id = $1 AND stat_date = $2 FOR UPDATE",
        )
        .bind(user)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("locking daily stats row", e))?;

        let current = match locked_row {
            Some(row) => (
                row.try_get::<i64, _>("isolated_count").map_err(|e| db_error("reading isolated_count", e))?,
                row.try_get::<i64, _>("enhancement_count").map_err(|e| db_error("reading enhancement_count", e))?,
            ),
            None => (0i64, 0i64),
        };

        let used_before = current.0 + current.1;
        if settings.limit_enabled && used_before >= settings.daily_limit as i64 {
            tx.rollback().await.map_err(|e| db_error("rolling back denied daily-limit transaction", e))?;
            let breakdown = DailyBreakdown { isolated: current.0, enhancement: current.1 };
            let status = build_status(&settings, breakdown);
            self.cache.set(CacheCategory::UserPreferences, &Self::limit_cache_key(user, today), serde_json::to_value(&status).unwrap()).await;
            return Ok(status);
        }

        let (isolated_inc, enhancement_inc) = match category {
            ErrorCategory::Isolated => (1i64, 0i64),
            ErrorCategory::Enhancement => (0i64, 1i64),
            _ => unreachable!("is_limited already filtered to Isolated/Enhancement"),
        };

        sqlx::query(
            "INSERT INTO daily_knowledge_stats (user_id, stat_date, isolated_count, enhancement_count, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (user_id, stat_date) DO UPDATE SET
                 isolated_count = daily_knowledge_stats.isolated_count + EXCLUDED.isolated_count,
                 enhancement_count = daily_knowledge_stats.enhancement_count + EXCLUDED.enhancement_count,
                 updated_at = now()",
        )
        .bind(user)
        .bind(today)
        .bind(isolated_inc)
        .bind(enhancement_inc)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("incrementing daily stats", e))?;

        tx.commit().await.map_err(|e| db_error("committing daily-limit transaction", e))?;

        let breakdown = DailyBreakdown {
            isolated: current.0 + isolated_inc,
            enhancement: current.1 + enhancement_inc,
        };
        let status = build_status(&settings, breakdown);
        self.invalidate_today_limit_cache(user).await;
        Ok(status)
    }

    async fn fetch_breakdown(&self, user: &str, today: NaiveDate) -> Result<DailyBreakdown, UnifiedError> {
        let row = sqlx::query(
            "SELECT isolated_count, enhancement_count FROM daily_knowledge_stats
             WHERE user_id = $1 AND stat_date = $2",
        )
        .bind(user)
        .bind(today)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("reading daily stats", e))?;

        Ok(match row {
            Some(row) => DailyBreakdown {
                isolated: row.try_get("isolated_count").map_err(|e| db_error("reading isolated_count", e))?,
                enhancement: row.try_get("enhancement_count").map_err(|e| db_error("reading enhancement_count", e))?,
            },
            None => DailyBreakdown::default(),
        })
    }

    /// Settings and `limit_status` both live under `UserPreferences`, so a
    /// single category flush covers both without needing the exact key.
    async fn invalidate_today_limit_cache(&self, _user: &str) {
        self.cache.invalidate_category(CacheCategory::UserPreferences).await;
    }

    fn limit_cache_key(user: &str, today: NaiveDate) -> String {
        format!("limit_status:{user}:{today}")
    }
}

fn build_status(settings: &UserSettings, breakdown: DailyBreakdown) -> LimitStatus {
    if !settings.limit_enabled {
        return LimitStatus {
            can_add: true,
            limit_enabled: false,
            daily_limit: settings.daily_limit,
            used_count: 0,
            remaining: settings.daily_limit as i64,
            breakdown,
            status: "disabled".to_string(),
        };
    }

    let used_count = breakdown.isolated + breakdown.enhancement;
    let can_add = used_count < settings.daily_limit as i64;
    LimitStatus {
        can_add,
        limit_enabled: true,
        daily_limit: settings.daily_limit,
        used_count,
        remaining: (settings.daily_limit as i64 - used_count).max(0),
        breakdown,
        status: if can_add { "normal".to_string() } else { "limit_reached".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_limited_category_short_circuits_without_touching_settings() {
        let status = not_limited_status();
        assert!(status.can_add);
        assert_eq!(status.status, "not_limited");
    }

    #[test]
    fn disabled_limit_always_admits_regardless_of_usage() {
        let settings = UserSettings { daily_limit: 1, limit_enabled: false };
        let status = build_status(&settings, DailyBreakdown { isolated: 99, enhancement: 99 });
        assert!(status.can_add);
        assert_eq!(status.status, "disabled");
    }

    #[test]
    fn enabled_limit_denies_once_used_count_reaches_bound() {
        let settings = UserSettings { daily_limit: 2, limit_enabled: true };
        let status = build_status(&settings, DailyBreakdown { isolated: 1, enhancement: 1 });
        assert!(!status.can_add);
        assert_eq!(status.status, "limit_reached");
        assert_eq!(status.remaining, 0);
    }

    #[test]
    fn enabled_limit_admits_below_bound_and_reports_remaining() {
        let settings = UserSettings { daily_limit: 5, limit_enabled: true };
        let status = build_status(&settings, DailyBreakdown { isolated: 1, enhancement: 1 });
        assert!(status.can_add);
        assert_eq!(status.remaining, 3);
    }

    #[test]
    fn default_user_settings_match_spec_defaults() {
        let settings = UserSettings::default();
        assert_eq!(settings.daily_limit, 15);
        assert!(!settings.limit_enabled);
    }
}
