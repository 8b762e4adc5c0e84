//! Environment-sourced configuration (§6 EXTERNAL INTERFACES).
//!
//! Mirrors the original's `DatabaseSettings` (`.env` loaded once via
//! `dotenvy`, then read with `std::env::var`), adapted to Rust's
//! `Result`-based error handling instead of raising on first use.

use std::env;
use std::time::Duration;

use crate::error::{ErrorCategory, ErrorSeverity, UnifiedError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Pool settings for the relational store (C5).
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub database_url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub pool_timeout: Duration,
}

/// Logging settings (ambient stack, SPEC_FULL §3.1).
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub dir: String,
    pub format: LogFormat,
    pub to_console: bool,
    pub to_file: bool,
    pub rotate_daily: bool,
    pub max_bytes: u64,
    pub backup_count: u32,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads settings from the process environment, after attempting to
    /// load a `.env` file (a missing file is not an error, matching the
    /// original's tolerant `load_dotenv()` call).
    pub fn from_env() -> Result<Self, UnifiedError> {
        let _ = dotenvy::dotenv();

        let env = match env_var_or("ENV", "development").as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        let database_url = env::var("DATABASE_URL").map_err(|_| {
            UnifiedError::new(
                "config.missing_database_url",
                "DATABASE_URL is required",
                ErrorCategory::Validation,
                ErrorSeverity::Low,
            )
        })?;

        let database = DatabaseSettings {
            database_url,
            pool_min_size: env_parse_or("DB_POOL_MIN_SIZE", 5)?,
            pool_max_size: env_parse_or("DB_POOL_MAX_SIZE", 20)?,
            pool_timeout: Duration::from_secs(env_parse_or("DB_POOL_TIMEOUT", 10)?),
        };

        let production = env == Environment::Production;
        let log = LogSettings {
            level: env_var_or("LOG_LEVEL", if production { "warn" } else { "info" }),
            dir: env_var_or("LOG_DIR", "./logs"),
            format: match env_var_or(
                "LOG_FORMAT",
                if production { "json" } else { "text" },
            )
            .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
            to_console: env_bool_or("LOG_TO_CONSOLE", true),
            to_file: env_bool_or("LOG_TO_FILE", production),
            rotate_daily: env_bool_or("LOG_ROTATE_DAILY", true),
            max_bytes: env_parse_or("LOG_MAX_BYTES", 10 * 1024 * 1024)?,
            backup_count: env_parse_or("LOG_BACKUP_COUNT", 5)?,
        };

        Ok(Self { env, database, log })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool_or(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, UnifiedError> {
    match env::var(key) {
        Ok(v) => v.parse::<T>().map_err(|_| {
            UnifiedError::new(
                "config.invalid_value",
                format!("{key} could not be parsed"),
                ErrorCategory::Validation,
                ErrorSeverity::Low,
            )
        }),
        Err(_) => Ok(default),
    }
}
