//! Lifecycle of the shared database client.
//!
//! One [`DatabaseClient`] exists per process. It owns at most one connection
//! pool. `connect` creates it once, `execute_query` creates it on demand, and
//! `disconnect` closes and forgets it. Any number of tool calls may run
//! queries concurrently against the same pool.

use super::connection::{create_pool, pool_error, pool_status, ConnectionPool, PoolStatus};
use super::query::{execute_on, QueryRequest, QueryResult};
use crate::config::DatabaseConfig;
use crate::error::ServerError;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Something that can run a diagnostic query and hand back every row.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute the request and materialize the result set.
    async fn run(&self, request: &QueryRequest) -> Result<QueryResult, ServerError>;
}

/// Process-wide SQL Server client.
pub struct DatabaseClient {
    config: DatabaseConfig,
    pool: RwLock<Option<ConnectionPool>>,
    // Serializes pool creation so concurrent connects open a single pool
    connect_lock: Mutex<()>,
}

impl DatabaseClient {
    /// Create a disconnected client. No network activity happens here.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            connect_lock: Mutex::new(()),
        }
    }

    /// Connection settings this client was built with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open the pool if it is not already open.
    ///
    /// Calling this on a connected client is a no-op. On failure the client
    /// stays disconnected and the error carries the driver's message.
    pub async fn connect(&self) -> Result<(), ServerError> {
        let _guard = self.connect_lock.lock().await;
        if self.is_connected() {
            debug!("Already connected to {}", self.config.address());
            return Ok(());
        }

        let pool = create_pool(&self.config).await?;
        *self.pool.write() = Some(pool);
        info!(
            "Connected to database {} on {}",
            self.config.database,
            self.config.address()
        );
        Ok(())
    }

    /// Whether an open pool is held.
    pub fn is_connected(&self) -> bool {
        self.pool
            .read()
            .as_ref()
            .is_some_and(|pool| !pool.is_closed())
    }

    /// Return the open pool, or [`ServerError::NotConnected`].
    pub fn ensure_connected(&self) -> Result<ConnectionPool, ServerError> {
        self.pool
            .read()
            .as_ref()
            .filter(|pool| !pool.is_closed())
            .cloned()
            .ok_or(ServerError::NotConnected)
    }

    /// Execute a request, connecting first if needed.
    pub async fn execute_query(&self, request: &QueryRequest) -> Result<QueryResult, ServerError> {
        let pool = match self.ensure_connected() {
            Ok(pool) => pool,
            Err(ServerError::NotConnected) => {
                debug!("No open pool, connecting before query");
                self.connect().await?;
                self.ensure_connected()?
            }
            Err(e) => return Err(e),
        };

        let mut conn = pool.get().await.map_err(pool_error)?;
        execute_on(&mut conn, request).await
    }

    /// Close the pool. Returns whether a pool was open.
    ///
    /// Safe to call at any time, including repeatedly. Connections checked
    /// out by in-flight queries are dropped when those queries finish.
    pub fn disconnect(&self) -> bool {
        match self.pool.write().take() {
            Some(pool) => {
                pool.close();
                info!("Disconnected from {}", self.config.address());
                true
            }
            None => false,
        }
    }

    /// Pool statistics, if connected.
    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.pool.read().as_ref().map(pool_status)
    }
}

#[async_trait]
impl QueryRunner for DatabaseClient {
    async fn run(&self, request: &QueryRequest) -> Result<QueryResult, ServerError> {
        self.execute_query(request).await
    }
}

impl Drop for DatabaseClient {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get_mut().take() {
            pool.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::unreachable_config;

    #[test]
    fn test_new_client_is_disconnected() {
        let client = DatabaseClient::new(unreachable_config());
        assert!(!client.is_connected());
        assert!(client.pool_status().is_none());
        assert!(matches!(
            client.ensure_connected(),
            Err(ServerError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_when_disconnected_is_noop() {
        let client = DatabaseClient::new(unreachable_config());
        assert!(!client.disconnect());
        assert!(!client.disconnect());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_client_disconnected() {
        let client = DatabaseClient::new(unreachable_config());
        let err = client.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Connection { .. } | ServerError::Timeout(_)
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_query_against_unreachable_server_fails() {
        let client = DatabaseClient::new(unreachable_config());
        let err = client
            .execute_query(&QueryRequest::new("SELECT 1;"))
            .await
            .unwrap_err();
        assert!(!err.to_string().is_empty());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_not_connected_message() {
        assert_eq!(
            ServerError::NotConnected.to_string(),
            "Database connection is not established."
        );
    }
}
