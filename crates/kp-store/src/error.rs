//! Store-level error taxonomy, grounded on
//! `original_source/core/database/exceptions.py`.

use kp_common::{ErrorCategory, ErrorSeverity, UnifiedError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate knowledge point: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("database operation timed out: {0}")]
    Timeout(String),
    #[error("pool is shutting down, no new acquires are accepted")]
    ShuttingDown,
    #[error("database operation failed: {0}")]
    Generic(#[from] sqlx::Error),
}

/// Classifies a raw `sqlx::Error` the way `classify_database_error` does for
/// `asyncpg` exceptions, folding the not-found case in as well since sqlx
/// surfaces "no rows" the same way callers need to distinguish it.
pub fn classify(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::RowNotFound => StoreError::NotFound("no matching row".to_string()),
        sqlx::Error::PoolTimedOut => StoreError::Timeout("pool acquire timed out".to_string()),
        sqlx::Error::Io(_) => StoreError::ConnectionLost(error.to_string()),
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                StoreError::UniqueViolation(db_err.message().to_string())
            } else if db_err.is_foreign_key_violation() {
                StoreError::ForeignKeyViolation(db_err.message().to_string())
            } else {
                StoreError::Generic(error)
            }
        }
        _ => StoreError::Generic(error),
    }
}

impl From<StoreError> for UnifiedError {
    fn from(err: StoreError) -> Self {
        let (category, severity, code) = match &err {
            StoreError::UniqueViolation(_) => (ErrorCategory::Validation, ErrorSeverity::Low, "DUPLICATE_KNOWLEDGE_POINT"),
            StoreError::ForeignKeyViolation(_) => (ErrorCategory::Database, ErrorSeverity::Medium, "FOREIGN_KEY_VIOLATION"),
            StoreError::NotFound(_) => (ErrorCategory::Business, ErrorSeverity::Low, "NOT_FOUND"),
            StoreError::ConnectionLost(_) => (ErrorCategory::Database, ErrorSeverity::High, "CONNECTION_LOST"),
            StoreError::Timeout(_) => (ErrorCategory::Network, ErrorSeverity::Medium, "DB_TIMEOUT"),
            StoreError::ShuttingDown => (ErrorCategory::System, ErrorSeverity::High, "POOL_SHUTTING_DOWN"),
            StoreError::Generic(_) => (ErrorCategory::Database, ErrorSeverity::High, "DB_ERROR"),
        };
        UnifiedError::new(code, err.to_string(), category, severity)
    }
}
