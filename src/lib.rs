//! # MSSQL DBA MCP Server
//!
//! A Model Context Protocol (MCP) server that gives an LLM agent read-only
//! diagnostic insight into a Microsoft SQL Server database.
//!
//! This crate provides:
//! - **Tools**: server properties, collation checks, table workload analysis,
//!   index health and missing index recommendations
//! - **Prompts**: guided query and index optimization workflows
//!
//! ## Architecture
//!
//! Tool calls flow through the [`dispatcher`], which asks the [`diagnostics`]
//! catalog for SQL, runs it on the shared [`database::DatabaseClient`], and
//! turns rows, empty results and failures alike into text.

pub mod config;
pub mod constants;
pub mod database;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod prompts;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod tools;

pub use config::Config;
pub use error::{McpError, ServerError};
pub use server::DbaMcpServer;
