//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::database::QueryRunner;
use crate::dispatcher::Dispatcher;
use crate::telemetry::{ServerMetrics, SharedMetrics};
use rmcp::handler::server::tool::ToolRouter;
use std::sync::Arc;

/// The MSSQL DBA MCP Server instance.
///
/// Cloned per request by rmcp; everything inside is shared through `Arc`.
/// The query runner is injected so the server can be exercised without a
/// live SQL Server.
#[derive(Clone)]
pub struct DbaMcpServer {
    /// Configuration.
    pub(crate) config: Arc<Config>,

    /// Executes diagnostics and formats their output.
    pub(crate) dispatcher: Arc<Dispatcher>,

    /// Server metrics for telemetry.
    pub(crate) metrics: SharedMetrics,

    /// Tool router for dispatching tool calls.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl DbaMcpServer {
    /// Create a server that runs its queries through `runner`.
    pub fn new(config: Config, runner: Arc<dyn QueryRunner>) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            runner,
            config.diagnostics.clone(),
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            dispatcher,
            metrics,
            tool_router: crate::tools::create_tool_router(),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Get a reference to the dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
