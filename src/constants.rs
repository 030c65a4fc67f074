//! Centralized constants for the MSSQL DBA MCP Server.
//!
//! Defaults for every environment setting live here, together with the
//! fixed strings the agent-facing contract depends on.

use std::time::Duration;

// =============================================================================
// Server Identity
// =============================================================================

/// Name the server reports during the MCP handshake.
pub const SERVER_NAME: &str = "mssql-dba";

/// Human-readable server title.
pub const SERVER_TITLE: &str = "MSSQL DBA MCP Server";

/// Application name sent to SQL Server in the login packet.
pub const DEFAULT_APPLICATION_NAME: &str = "mssql-dba-mcp";

// =============================================================================
// Connection Constants
// =============================================================================

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u16 = 1433;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 15;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

// =============================================================================
// Connection Pool Constants
// =============================================================================

/// Default minimum connections in pool.
pub const DEFAULT_MIN_CONNECTIONS: usize = 0;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default connection idle timeout in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Default connection idle timeout as Duration.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS);

/// Lower bound on how often the idle reaper wakes up.
pub const MIN_REAPER_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Diagnostic Query Constants
// =============================================================================

/// Default schema for schema-scoped diagnostics.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Default number of missing index recommendations reported per table.
pub const DEFAULT_MAX_MISSING_INDEXES: i64 = 5;

/// Maximum length of a SQL Server identifier (sysname).
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Returned by table-scoped tools when called with an empty table list.
pub const NO_TABLE_NAMES_PROVIDED: &str = "No table names provided.";

// =============================================================================
// Shutdown Constants
// =============================================================================

/// Default time allowed for closing the pool on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Default shutdown timeout as Duration.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

// =============================================================================
// Logging Constants
// =============================================================================

/// Maximum SQL length included in debug logs.
pub const MAX_LOGGED_SQL_LENGTH: usize = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_durations() {
        assert_eq!(DEFAULT_CONNECTION_TIMEOUT, Duration::from_secs(15));
        assert_eq!(DEFAULT_IDLE_TIMEOUT, Duration::from_millis(30_000));
        assert_eq!(DEFAULT_SHUTDOWN_TIMEOUT, Duration::from_secs(10));
    }

    #[test]
    fn test_pool_bounds() {
        assert!(DEFAULT_MIN_CONNECTIONS <= DEFAULT_MAX_CONNECTIONS);
        assert!(DEFAULT_MAX_CONNECTIONS >= 1);
    }
}
