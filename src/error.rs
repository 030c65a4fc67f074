//! Error types for the MSSQL DBA MCP Server.
//!
//! This module defines semantic error types with SQL Server error code mapping
//! so tool payloads carry a readable message instead of a raw driver error.

pub use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Domain-specific errors for the MSSQL DBA MCP Server.
///
/// Named `ServerError` to avoid collision with the protocol-level `McpError`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to establish or keep a database connection.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A pool was required but none exists.
    #[error("Database connection is not established.")]
    NotConnected,

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Database not found
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Object not found (table, view, DMV, etc.)
    #[error("{object_type} not found: {name}")]
    ObjectNotFound { object_type: String, name: String },

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The server rejected the statement.
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        sql_error_code: Option<u32>,
    },

    /// Timed out waiting for a connection.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Caller-supplied input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an object not found error.
    pub fn object_not_found(object_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object_type: object_type.into(),
            name: name.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a query execution error carrying the SQL Server error number.
    pub fn query_error_with_code(msg: impl Into<String>, code: u32) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: Some(code),
        }
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is transient and may succeed on a later call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::NotConnected | Self::Timeout(_) => true,
            Self::QueryExecution {
                sql_error_code: Some(code),
                ..
            } => is_transient_sql_error(*code),
            _ => false,
        }
    }

    /// The text shown to the caller after a tool's error prefix.
    ///
    /// Errors raised by SQL Server carry the server's message verbatim;
    /// everything else uses the display form.
    pub fn detail(&self) -> String {
        match self {
            Self::QueryExecution { message, .. }
            | Self::DatabaseNotFound(message)
            | Self::PermissionDenied(message)
            | Self::ObjectNotFound { name: message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check the DB_* environment variables"),
            Self::Connection { .. } | Self::NotConnected => {
                Some("Check DB_HOST, DB_PORT, and network connectivity")
            }
            Self::Authentication(_) => Some("Verify DB_USER and DB_PASSWORD are correct"),
            Self::DatabaseNotFound(_) => Some("Check DB_NAME and ensure the database exists"),
            Self::ObjectNotFound { .. } => Some("Check the object name and schema"),
            Self::PermissionDenied(_) => {
                Some("Grant VIEW SERVER STATE and VIEW DATABASE STATE to the login")
            }
            Self::Timeout(_) => Some("Raise CONNECT_TIMEOUT or MAX_POOL"),
            Self::Validation(_) => {
                Some("Table names may contain only letters, digits, and underscores")
            }
            _ => None,
        }
    }
}

/// Map SQL Server error codes to semantic ServerError types.
pub fn from_sql_error(code: u32, message: &str) -> ServerError {
    match code {
        // Authentication errors
        18456 => ServerError::auth(format!("Login failed: {}", message)),

        // Database errors
        4060 => ServerError::DatabaseNotFound(message.to_string()),

        // Object not found errors
        208 => ServerError::object_not_found("Object", message),

        // Permission errors (DMVs need VIEW SERVER STATE)
        229 | 230 | 297 | 300 => ServerError::permission_denied(message),

        // Connection errors
        53 => ServerError::connection("Server not found or not accessible"),

        // Default: the server's own message
        _ => ServerError::query_error_with_code(message, code),
    }
}

/// Check if a SQL Server error code indicates a transient error.
fn is_transient_sql_error(code: u32) -> bool {
    matches!(
        code,
        1205    // Deadlock
        | 10053 // Connection forcibly closed
        | 10054 // Connection reset
        | 10060 // Connection timed out
        | 40197 // Azure: service error
        | 40501 // Azure: service busy
        | 40613 // Azure: database unavailable
        | 49918 // Azure: not enough resources
        | 49919 // Azure: too many requests
        | 49920 // Azure: too busy
    )
}

/// Convert ServerError to rmcp's error type for protocol responses.
///
/// Tools report failures in their text payload instead. This conversion is
/// for protocol-level failures such as an unknown prompt.
impl From<ServerError> for McpError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Validation(msg) => McpError::invalid_params(msg, None),
            ServerError::ObjectNotFound { object_type, name } => {
                McpError::invalid_params(format!("{} not found: {}", object_type, name), None)
            }
            other => McpError::internal_error(other.to_string(), None),
        }
    }
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match e {
            Error::Server(token) => from_sql_error(token.code(), token.message()),
            Error::Io { kind, message } => match kind {
                std::io::ErrorKind::TimedOut => ServerError::timeout(message),
                _ => ServerError::connection(format!("IO error: {}", message)),
            },
            Error::Tls(message) => ServerError::connection(format!("TLS error: {}", message)),
            Error::Routing { host, port } => ServerError::connection(format!(
                "Server requested a redirect to {}:{}, which is not supported",
                host, port
            )),
            Error::Protocol(message) => {
                ServerError::connection(format!("Protocol error: {}", message))
            }
            other => ServerError::query_error(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionRefused => {
                ServerError::connection_with_source("Connection refused", e)
            }
            ErrorKind::TimedOut => ServerError::timeout(e.to_string()),
            _ => ServerError::connection_with_source(format!("IO error: {}", e), e),
        }
    }
}
