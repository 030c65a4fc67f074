//! Database connectivity and query execution.

mod auth;
mod client;
mod connection;
mod query;
pub mod types;

pub use client::{DatabaseClient, QueryRunner};
pub use connection::{ConnectionPool, PoolStatus};
pub use query::{truncate_for_log, ColumnInfo, QueryRequest, QueryResult, ResultRow, SqlParam};
pub use types::SqlValue;
