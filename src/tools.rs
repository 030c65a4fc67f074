//! MCP tools for SQL Server diagnostics.
//!
//! Table-level:
//! - `get-tables-info`: workload, size and index summary for named tables
//! - `get-tables-index-health`: usage, fragmentation and maintenance scripts
//! - `get-tables-missing-indexes`: ranked missing index recommendations
//!
//! Server and database level:
//! - `get-server-info`: version, edition and instance properties
//! - `get-db-collation`: collation of the current database
//! - `get-collation-mismatches`: columns whose collation differs from the database
//! - `get-active-tables-info`: workload summary for every table with recorded activity
//!
//! Each tool hands its arguments to the [`Dispatcher`](crate::dispatcher::Dispatcher)
//! and returns a single text block.

mod inputs;

pub use inputs::*;

use crate::diagnostics::{DiagnosticQuery, QueryArgs};
use crate::error::McpError;
use crate::server::DbaMcpServer;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{tool, tool_router};

#[tool_router]
impl DbaMcpServer {
    // =========================================================================
    // Table-level Tools
    // =========================================================================

    #[tool(
        name = "get-tables-info",
        description = "Get the metadata about specified tables"
    )]
    async fn get_tables_info(
        &self,
        Parameters(input): Parameters<TableNamesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(DiagnosticQuery::TablesInfo, QueryArgs::tables(input.table_names))
            .await
    }

    #[tool(
        name = "get-tables-index-health",
        description = "Assess index health for specified tables"
    )]
    async fn get_tables_index_health(
        &self,
        Parameters(input): Parameters<TableNamesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(
            DiagnosticQuery::TablesIndexHealth,
            QueryArgs::tables(input.table_names),
        )
        .await
    }

    #[tool(
        name = "get-tables-missing-indexes",
        description = "Identify missing indexes for specified tables"
    )]
    async fn get_tables_missing_indexes(
        &self,
        Parameters(input): Parameters<TableNamesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(
            DiagnosticQuery::TablesMissingIndexes,
            QueryArgs::tables(input.table_names),
        )
        .await
    }

    // =========================================================================
    // Server-level Tools
    // =========================================================================

    #[tool(
        name = "get-server-info",
        description = "Retrieve information about the SQL Server instance such as version, current update level, edition, and licensing details"
    )]
    async fn get_server_info(&self) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(DiagnosticQuery::ServerInfo, QueryArgs::none())
            .await
    }

    // =========================================================================
    // Database-level Tools
    // =========================================================================

    #[tool(
        name = "get-db-collation",
        description = "Retrieve the collation setting for the current database"
    )]
    async fn get_db_collation(&self) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(DiagnosticQuery::DatabaseCollation, QueryArgs::none())
            .await
    }

    #[tool(
        name = "get-collation-mismatches",
        description = "Retrieve the columns with collation settings that differ from the database default"
    )]
    async fn get_collation_mismatches(&self) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(DiagnosticQuery::CollationMismatches, QueryArgs::none())
            .await
    }

    #[tool(
        name = "get-active-tables-info",
        description = "Summarize workload, size, primary key and index health for every table with recorded read or write activity"
    )]
    async fn get_active_tables_info(&self) -> Result<CallToolResult, McpError> {
        self.run_diagnostic(DiagnosticQuery::ActiveTablesInfo, QueryArgs::none())
            .await
    }
}

impl DbaMcpServer {
    /// Dispatch a diagnostic. Failures are reported as error text, never as protocol errors.
    async fn run_diagnostic(
        &self,
        query: DiagnosticQuery,
        args: QueryArgs,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.dispatch(query, args).await.into())
    }
}

/// Build the router holding every diagnostic tool.
pub(crate) fn create_tool_router() -> ToolRouter<DbaMcpServer> {
    DbaMcpServer::tool_router()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_registers_every_diagnostic() {
        let router = create_tool_router();
        let mut names: Vec<String> = router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();

        let mut expected: Vec<String> = DiagnosticQuery::ALL
            .iter()
            .map(|q| q.tool_name().to_string())
            .collect();
        expected.sort();

        assert_eq!(names, expected);
    }

    #[test]
    fn test_table_tools_require_table_names() {
        let router = create_tool_router();
        for tool in router.list_all() {
            let requires_tables = DiagnosticQuery::from_tool_name(&tool.name)
                .map(|q| q.kind() == crate::diagnostics::QueryKind::TableList)
                .unwrap_or(false);
            let has_property = tool
                .input_schema
                .get("properties")
                .and_then(|p| p.get("tableNames"))
                .is_some();
            assert_eq!(requires_tables, has_property, "{}", tool.name);
        }
    }
}
