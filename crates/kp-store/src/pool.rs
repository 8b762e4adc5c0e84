//! Connection pool lifecycle (C5), grounded on
//! `original_source/core/database/connection.py::DatabaseConnection` for the
//! state transitions, and on `crates/mcp-common/src/circuit_breaker.rs`'s
//! `Arc<RwLock<State>>` shape for the Rust-side concurrency idiom — the
//! original reaches for a `threading.Lock` + `weakref` singleton, which
//! doesn't translate; an explicit state enum serialised by an async lock
//! does the same job.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use kp_common::DatabaseSettings;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolLifecycle {
    Uninitialised,
    Connecting,
    Connected,
    Disconnected,
    ShuttingDown,
    Closed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub pool_size: u32,
    pub idle: u32,
    pub test_query_ok: bool,
}

struct Inner {
    lifecycle: PoolLifecycle,
    pool: Option<PgPool>,
}

/// Process-wide singleton owning the one async pool to Postgres. `connect`
/// is idempotent under concurrent callers because the whole check-then-set
/// sequence runs under a single write-lock critical section.
pub struct Pool {
    settings: DatabaseSettings,
    inner: RwLock<Inner>,
}

impl Pool {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            inner: RwLock::new(Inner {
                lifecycle: PoolLifecycle::Uninitialised,
                pool: None,
            }),
        }
    }

    pub async fn lifecycle(&self) -> PoolLifecycle {
        self.inner.read().await.lifecycle.clone()
    }

    /// Idempotent: if already connected, returns the existing pool without
    /// re-dialing.
    pub async fn connect(&self) -> Result<PgPool, StoreError> {
        {
            let inner = self.inner.read().await;
            if let (PoolLifecycle::Connected, Some(pool)) = (&inner.lifecycle, &inner.pool) {
                return Ok(pool.clone());
            }
            if inner.lifecycle == PoolLifecycle::ShuttingDown || inner.lifecycle == PoolLifecycle::Closed {
                return Err(StoreError::ShuttingDown);
            }
        }

        let mut inner = self.inner.write().await;
        if let (PoolLifecycle::Connected, Some(pool)) = (&inner.lifecycle, &inner.pool) {
            return Ok(pool.clone());
        }
        if inner.lifecycle == PoolLifecycle::ShuttingDown || inner.lifecycle == PoolLifecycle::Closed {
            return Err(StoreError::ShuttingDown);
        }

        inner.lifecycle = PoolLifecycle::Connecting;
        info!("establishing database connection pool");

        let result = PgPoolOptions::new()
            .min_connections(self.settings.pool_min_size)
            .max_connections(self.settings.pool_max_size)
            .acquire_timeout(self.settings.pool_timeout)
            .idle_timeout(Some(Duration::from_secs(300)))
            .connect(&self.settings.database_url)
            .await;

        match result {
            Ok(pool) => {
                if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
                    error!(error = %e, "post-connect health probe failed");
                    inner.lifecycle = PoolLifecycle::Disconnected;
                    return Err(crate::error::classify(e));
                }
                info!(
                    min = self.settings.pool_min_size,
                    max = self.settings.pool_max_size,
                    "database connection pool established"
                );
                inner.pool = Some(pool.clone());
                inner.lifecycle = PoolLifecycle::Connected;
                Ok(pool)
            }
            Err(e) => {
                error!(error = %e, "failed to establish connection pool");
                inner.lifecycle = PoolLifecycle::Disconnected;
                Err(crate::error::classify(e))
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.lifecycle == PoolLifecycle::Connected
    }

    /// Graceful close with a bounded wait; force-closes past the configured
    /// timeout rather than hanging the caller forever.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.write().await;
        inner.lifecycle = PoolLifecycle::ShuttingDown;
        if let Some(pool) = inner.pool.take() {
            match tokio::time::timeout(self.settings.pool_timeout, pool.close()).await {
                Ok(()) => info!("database connection pool closed"),
                Err(_) => warn!("pool close timed out, force-terminating connections"),
            }
        }
        inner.lifecycle = PoolLifecycle::Closed;
    }

    pub async fn health_check(&self) -> HealthStatus {
        let inner = self.inner.read().await;
        let Some(pool) = &inner.pool else {
            return HealthStatus {
                status: "disconnected".to_string(),
                pool_size: 0,
                idle: 0,
                test_query_ok: false,
            };
        };

        let probe = tokio::time::timeout(self.settings.pool_timeout, sqlx::query("SELECT 1").execute(pool));
        match probe.await {
            Ok(Ok(_)) => HealthStatus {
                status: "healthy".to_string(),
                pool_size: pool.size(),
                idle: pool.num_idle() as u32,
                test_query_ok: true,
            },
            Ok(Err(e)) => {
                warn!(error = %e, "health check query failed");
                HealthStatus {
                    status: "unhealthy".to_string(),
                    pool_size: pool.size(),
                    idle: pool.num_idle() as u32,
                    test_query_ok: false,
                }
            }
            Err(_) => HealthStatus {
                status: "timeout".to_string(),
                pool_size: pool.size(),
                idle: pool.num_idle() as u32,
                test_query_ok: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> DatabaseSettings {
        DatabaseSettings {
            database_url: "postgres://localhost/does-not-exist".to_string(),
            pool_min_size: 1,
            pool_max_size: 2,
            pool_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn starts_uninitialised() {
        let pool = Pool::new(test_settings());
        assert_eq!(pool.lifecycle().await, PoolLifecycle::Uninitialised);
        assert!(!pool.is_connected().await);
    }

    #[tokio::test]
    async fn failed_connect_leaves_pool_disconnected_not_connected() {
        let pool = Pool::new(test_settings());
        let result = pool.connect().await;
        assert!(result.is_err());
        assert_eq!(pool.lifecycle().await, PoolLifecycle::Disconnected);
    }

    #[tokio::test]
    async fn health_check_on_disconnected_pool_reports_disconnected() {
        let pool = Pool::new(test_settings());
        let status = pool.health_check().await;
        assert_eq!(status.status, "disconnected");
        assert!(!status.test_query_ok);
    }

    #[tokio::test]
    async fn disconnect_transitions_through_shutting_down_to_closed() {
        let pool = Pool::new(test_settings());
        pool.disconnect().await;
        assert_eq!(pool.lifecycle().await, PoolLifecycle::Closed);
    }

    #[tokio::test]
    async fn connect_after_shutdown_fails_fast() {
        let pool = Pool::new(test_settings());
        pool.disconnect().await;
        let result = pool.connect().await;
        assert!(matches!(result, Err(StoreError::ShuttingDown)));
    }
}
