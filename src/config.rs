//! Configuration management for the MSSQL DBA MCP Server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.
//! Everything is validated up front so a bad deployment fails at startup rather than on
//! the first tool call.

use crate::constants::{
    DEFAULT_APPLICATION_NAME, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MAX_MISSING_INDEXES, DEFAULT_MIN_CONNECTIONS, DEFAULT_PORT, DEFAULT_SCHEMA,
};
use crate::error::ServerError;
use crate::security::validate_identifier;
use crate::tools::OutputFormat;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Diagnostic query configuration
    pub diagnostics: DiagnosticsConfig,
}

/// Database connection configuration.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Database the diagnostics run against
    pub database: String,

    /// SQL login
    pub user: String,

    /// SQL password
    pub password: String,

    /// Connection pool configuration
    pub pool: PoolConfig,

    /// Require TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Application name sent to SQL Server
    pub application_name: String,
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections opened eagerly when the pool is created
    pub min_connections: usize,

    /// Maximum pool size
    pub max_connections: usize,

    /// How long to wait for a connection to be created or checked out
    pub connection_timeout: Duration,

    /// Idle connections older than this are closed
    pub idle_timeout: Duration,
}

/// Settings that shape the diagnostic queries and their output.
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Schema inspected by schema-scoped diagnostics
    pub schema: String,

    /// Missing index recommendations reported per table
    pub max_missing_indexes: i64,

    /// How tool payloads are rendered
    pub output_format: OutputFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `DB_USER` / `DB_PASSWORD`: SQL Server login
    /// - `DB_HOST`: SQL Server hostname
    /// - `DB_NAME`: Database to diagnose
    ///
    /// # Optional Environment Variables
    ///
    /// - `DB_PORT`: SQL Server port (default: 1433)
    /// - `ENCRYPT`: Require TLS (default: false)
    /// - `TRUST_SERVER_CERTIFICATE`: Trust self-signed certs (default: false)
    /// - `MAX_POOL` / `MIN_POOL`: Pool bounds (default: 10 / 0)
    /// - `IDLE`: Idle timeout in milliseconds (default: 30000)
    /// - `CONNECT_TIMEOUT`: Connection timeout in seconds (default: 15)
    /// - `DB_SCHEMA`: Schema for schema-scoped diagnostics (default: dbo)
    /// - `MAX_MISSING_INDEXES`: Recommendations per table (default: 5)
    /// - `OUTPUT_FORMAT`: `json`, `table` or `csv` (default: json)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ServerError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    ServerError::config(format!("{} environment variable is required", key))
                })
        };

        let user = required("DB_USER")?;
        let password = required("DB_PASSWORD")?;
        let host = required("DB_HOST")?;
        let database = required("DB_NAME")?;

        let port = parse_var(&lookup, "DB_PORT", DEFAULT_PORT)?;

        let encrypt = lookup("ENCRYPT").map(|v| parse_bool(&v)).unwrap_or(false);
        let trust_server_certificate = lookup("TRUST_SERVER_CERTIFICATE")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let max_connections: usize = parse_var(&lookup, "MAX_POOL", DEFAULT_MAX_CONNECTIONS)?;
        let min_connections: usize = parse_var(&lookup, "MIN_POOL", DEFAULT_MIN_CONNECTIONS)?;
        let idle_ms: u64 = parse_var(&lookup, "IDLE", DEFAULT_IDLE_TIMEOUT_MS)?;
        let connect_secs: u64 =
            parse_var(&lookup, "CONNECT_TIMEOUT", DEFAULT_CONNECTION_TIMEOUT_SECS)?;

        if max_connections == 0 {
            return Err(ServerError::config("MAX_POOL must be at least 1"));
        }
        if min_connections > max_connections {
            return Err(ServerError::config(format!(
                "MIN_POOL ({}) must not exceed MAX_POOL ({})",
                min_connections, max_connections
            )));
        }
        if connect_secs == 0 {
            return Err(ServerError::config("CONNECT_TIMEOUT must be at least 1 second"));
        }

        let schema = lookup("DB_SCHEMA")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        validate_identifier(&schema)
            .map_err(|e| ServerError::config(format!("DB_SCHEMA is invalid: {}", e)))?;

        let max_missing_indexes: i64 =
            parse_var(&lookup, "MAX_MISSING_INDEXES", DEFAULT_MAX_MISSING_INDEXES)?;
        if max_missing_indexes < 1 {
            return Err(ServerError::config("MAX_MISSING_INDEXES must be at least 1"));
        }

        let output_format = match lookup("OUTPUT_FORMAT") {
            Some(v) => OutputFormat::from_str(&v).map_err(ServerError::config)?,
            None => OutputFormat::default(),
        };

        Ok(Self {
            database: DatabaseConfig {
                host,
                port,
                database,
                user,
                password,
                pool: PoolConfig {
                    min_connections,
                    max_connections,
                    connection_timeout: Duration::from_secs(connect_secs),
                    idle_timeout: Duration::from_millis(idle_ms),
                },
                encrypt,
                trust_server_certificate,
                application_name: DEFAULT_APPLICATION_NAME.to_string(),
            },
            diagnostics: DiagnosticsConfig {
                schema,
                max_missing_indexes,
                output_format,
            },
        })
    }
}

/// Interpret `true`/`1` (any case) as true.
fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true") || value.trim() == "1"
}

/// Parse an optional numeric variable, rejecting values that do not parse.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ServerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            ServerError::config(format!(
                "{} must be a non-negative integer, got '{}'",
                key, raw
            ))
        }),
        _ => Ok(default),
    }
}

impl DatabaseConfig {
    /// `host:port` for logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("pool", &self.pool)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            max_missing_indexes: DEFAULT_MAX_MISSING_INDEXES,
            output_format: OutputFormat::default(),
        }
    }
}
