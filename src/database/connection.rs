//! Connection pool management for SQL Server.
//!
//! deadpool owns the physical connections. Each checkout runs a `SELECT 1`
//! probe, so a connection dropped by the server is discarded and replaced
//! transparently. A background reaper closes connections that have been idle
//! longer than the configured timeout while keeping `MIN_POOL` of them warm.

use super::auth::{create_connection, RawConnection};
use crate::config::DatabaseConfig;
use crate::constants::MIN_REAPER_INTERVAL;
use crate::error::ServerError;
use deadpool::managed::{self, Metrics, PoolError, RecycleResult};
use deadpool::Runtime;
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for the connection pool.
pub type ConnectionPool = managed::Pool<ConnectionManager>;

/// Type alias for a pooled connection.
pub type PooledConn = managed::Object<ConnectionManager>;

/// deadpool manager that opens tiberius connections.
#[derive(Debug)]
pub struct ConnectionManager {
    config: DatabaseConfig,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = RawConnection;
    type Error = ServerError;

    async fn create(&self) -> Result<RawConnection, ServerError> {
        create_connection(&self.config).await
    }

    async fn recycle(&self, conn: &mut RawConnection, _: &Metrics) -> RecycleResult<ServerError> {
        conn.simple_query("SELECT 1")
            .await
            .map_err(ServerError::from)?
            .into_first_result()
            .await
            .map_err(ServerError::from)?;
        Ok(())
    }
}

/// Create a connection pool from configuration.
///
/// Opens `max(MIN_POOL, 1)` connections before returning, so a bad host or
/// login surfaces here instead of on the first query.
pub async fn create_pool(config: &DatabaseConfig) -> Result<ConnectionPool, ServerError> {
    info!(
        "Creating connection pool for {} (min: {}, max: {})",
        config.address(),
        config.pool.min_connections,
        config.pool.max_connections
    );

    let timeout = config.pool.connection_timeout;
    let pool = ConnectionPool::builder(ConnectionManager::new(config.clone()))
        .max_size(config.pool.max_connections)
        .wait_timeout(Some(timeout))
        .create_timeout(Some(timeout))
        .recycle_timeout(Some(timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| ServerError::internal(format!("Failed to build connection pool: {}", e)))?;

    // Hold the connections simultaneously so the pool really grows to the warm size
    let warm_size = config.pool.min_connections.max(1);
    let mut warm = Vec::with_capacity(warm_size);
    for _ in 0..warm_size {
        warm.push(pool.get().await.map_err(pool_error)?);
    }
    debug!("Opened {} initial connection(s)", warm.len());
    drop(warm);

    spawn_idle_reaper(
        pool.clone(),
        config.pool.idle_timeout,
        config.pool.min_connections,
    );

    info!("Connection pool created successfully");
    Ok(pool)
}

/// Close idle connections beyond the warm minimum until the pool is closed.
fn spawn_idle_reaper(pool: ConnectionPool, idle_timeout: Duration, min_connections: usize) {
    let interval = (idle_timeout / 2).max(MIN_REAPER_INTERVAL);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if pool.is_closed() {
                break;
            }

            let mut removable = pool.status().size.saturating_sub(min_connections);
            let reaped = pool.retain(|_, metrics| {
                if removable > 0 && metrics.last_used() > idle_timeout {
                    removable -= 1;
                    false
                } else {
                    true
                }
            });
            if !reaped.removed.is_empty() {
                debug!("Closed {} idle connection(s)", reaped.removed.len());
            }
        }
        debug!("Idle reaper stopped");
    });
}

/// Translate a pool checkout failure into a `ServerError`.
pub fn pool_error(e: PoolError<ServerError>) -> ServerError {
    match e {
        PoolError::Backend(inner) => inner,
        PoolError::Timeout(kind) => ServerError::timeout(format!(
            "Timed out waiting for a database connection ({:?})",
            kind
        )),
        PoolError::Closed => ServerError::NotConnected,
        other => ServerError::connection(other.to_string()),
    }
}

/// Get pool health status.
pub fn pool_status(pool: &ConnectionPool) -> PoolStatus {
    let status = pool.status();
    PoolStatus {
        total_connections: status.size,
        available_connections: status.available,
        waiting_requests: status.waiting,
        max_connections: status.max_size,
    }
}

/// Pool status information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Total number of connections in the pool.
    pub total_connections: usize,
    /// Number of connections available for checkout.
    pub available_connections: usize,
    /// Number of callers waiting for a connection.
    pub waiting_requests: usize,
    /// Maximum allowed connections.
    pub max_connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::unreachable_config;

    #[tokio::test]
    async fn test_create_pool_fails_fast_on_unreachable_host() {
        let err = create_pool(&unreachable_config()).await.unwrap_err();
        assert!(
            matches!(err, ServerError::Connection { .. } | ServerError::Timeout(_)),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_pool_error_mapping() {
        let err = pool_error(PoolError::Backend(ServerError::auth("Login failed")));
        assert!(matches!(err, ServerError::Authentication(_)));

        let err = pool_error(PoolError::Closed);
        assert!(matches!(err, ServerError::NotConnected));

        let err = pool_error(PoolError::Timeout(managed::TimeoutType::Wait));
        assert!(matches!(err, ServerError::Timeout(_)));
    }
}
