//! Raw SQL Server connections.
//!
//! Builds the tiberius configuration from [`DatabaseConfig`] and performs the
//! TCP connect plus TDS login handshake. Pooling lives in `connection`.

use crate::config::DatabaseConfig;
use crate::error::ServerError;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Create a tiberius Config from DatabaseConfig, including SQL authentication.
pub fn create_config(db_config: &DatabaseConfig) -> Config {
    let mut config = Config::new();

    config.host(&db_config.host);
    config.port(db_config.port);
    config.database(&db_config.database);

    if db_config.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }

    // Trust server certificate if requested
    if db_config.trust_server_certificate {
        config.trust_cert();
    }

    config.application_name(&db_config.application_name);
    config.authentication(AuthMethod::sql_server(&db_config.user, &db_config.password));

    config
}

/// Create a raw connection to SQL Server.
///
/// The whole TCP connect and login handshake is bounded by the pool's
/// connection timeout.
pub async fn create_connection(db_config: &DatabaseConfig) -> Result<RawConnection, ServerError> {
    let timeout = db_config.pool.connection_timeout;
    let address = db_config.address();

    tokio::time::timeout(timeout, connect_and_login(db_config))
        .await
        .map_err(|_| {
            ServerError::timeout(format!(
                "Connecting to {} did not complete within {} seconds",
                address,
                timeout.as_secs()
            ))
        })?
}

async fn connect_and_login(db_config: &DatabaseConfig) -> Result<RawConnection, ServerError> {
    let config = create_config(db_config);
    let address = db_config.address();
    debug!("Creating connection to {}", address);

    let tcp = TcpStream::connect(&address).await.map_err(|e| {
        ServerError::connection_with_source(format!("Failed to connect to {}: {}", address, e), e)
    })?;

    tcp.set_nodelay(true).map_err(|e| {
        ServerError::connection_with_source(format!("Failed to set TCP_NODELAY: {}", e), e)
    })?;

    // Login failures keep their semantic mapping; anything else is a connection fault
    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| match ServerError::from(e) {
            ServerError::QueryExecution { message, .. } => {
                ServerError::connection(format!("Failed to connect to SQL Server: {}", message))
            }
            other => other,
        })?;

    debug!("Connection established to {}", address);
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::unreachable_config;

    #[test]
    fn test_create_config() {
        let db_config = unreachable_config();
        let config = create_config(&db_config);
        assert_eq!(config.get_addr(), "127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let err = create_connection(&unreachable_config()).await.unwrap_err();
        assert!(
            matches!(err, ServerError::Connection { .. } | ServerError::Timeout(_)),
            "unexpected error: {err:?}"
        );
    }
}
