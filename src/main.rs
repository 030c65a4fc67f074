//! MSSQL DBA MCP Server entry point.
//!
//! Starts the server on stdio for Claude Desktop, Cursor and other MCP
//! clients. Signals trigger a graceful shutdown that closes the pool.

use anyhow::Result;
use mssql_dba_mcp::constants::DEFAULT_SHUTDOWN_TIMEOUT;
use mssql_dba_mcp::database::DatabaseClient;
use mssql_dba_mcp::shutdown::{install_signal_handlers, ShutdownController};
use mssql_dba_mcp::{Config, DbaMcpServer};
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    std::panic::set_hook(Box::new(|info| {
        error!("[PANIC] {}", info);
        eprintln!("[PANIC] {}", info);
    }));

    info!(
        "MSSQL DBA MCP Server v{} starting (transport: stdio)",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.database);

    let client = Arc::new(DatabaseClient::new(config.database.clone()));

    // Tool calls reconnect on demand, so a failure here is not fatal
    if let Err(e) = client.connect().await {
        warn!("Initial database connection failed, will retry on first tool call: {}", e);
    }

    let shutdown_controller = Arc::new(ShutdownController::with_timeout(DEFAULT_SHUTDOWN_TIMEOUT));
    install_signal_handlers(shutdown_controller.clone());

    let server = DbaMcpServer::new(config, client.clone());
    let metrics = server.metrics().clone();

    let service = server.serve(rmcp::transport::stdio()).await?;
    info!("Server initialized. Ready to accept requests...");

    let mut shutdown_signal = shutdown_controller.signal();
    let signalled = tokio::select! {
        quit_reason = service.waiting() => {
            match quit_reason {
                Ok(reason) => info!("Service stopped: {:?}", reason),
                Err(e) => warn!("Service error: {}", e),
            }
            false
        }
        _ = shutdown_signal.recv() => {
            info!("Shutdown signal received");
            true
        }
    };

    shutdown_controller.graceful_shutdown(&client, &metrics).await;

    if signalled {
        // The stdin reader may still be blocked; exit instead of waiting on it
        std::process::exit(0);
    }

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,mssql_dba_mcp=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
