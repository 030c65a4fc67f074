//! ServerHandler implementation for the MSSQL DBA MCP Server.
//!
//! This module implements the rmcp `ServerHandler` trait which defines how
//! the server responds to MCP protocol requests.

use crate::constants::{SERVER_NAME, SERVER_TITLE};
use crate::diagnostics::{DiagnosticQuery, QueryKind};
use crate::prompts::{build_prompt_list, get_prompt};
use crate::server::DbaMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    GetPromptRequestParam, GetPromptResult, Implementation, ListPromptsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool_handler, ErrorData};
use std::collections::HashMap;
use tracing::{debug, info};

/// The `#[tool_handler]` macro generates `list_tools` and `call_tool`.
#[tool_handler]
impl ServerHandler for DbaMcpServer {
    /// Server identification - called during initialization handshake.
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,

            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),

            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some(SERVER_TITLE.to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },

            instructions: Some(build_instructions(self)),
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        Ok(ListPromptsResult {
            prompts: build_prompt_list(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        debug!("Prompt requested: {}", request.name);

        let arguments = request.arguments.map(prompt_arguments);
        get_prompt(&request.name, arguments.as_ref())
            .map_err(|e| ErrorData::invalid_params(e, None))
    }
}

/// Flatten JSON prompt arguments to strings; non-string values keep their JSON text.
fn prompt_arguments(map: serde_json::Map<String, serde_json::Value>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

/// Build server instructions describing the available tools.
fn build_instructions(server: &DbaMcpServer) -> String {
    let settings = server.dispatcher.settings();
    let mut instructions = String::new();

    instructions.push_str("# MSSQL DBA MCP Server\n\n");
    instructions.push_str(&format!(
        "Read-only diagnostics for the `{}` database on `{}`.\n\n",
        server.config.database.database,
        server.config.database.address()
    ));

    instructions.push_str("## Table-level tools (take `tableNames`)\n");
    for query in DiagnosticQuery::ALL {
        if query.kind() == QueryKind::TableList {
            instructions.push_str(&format!("- `{}`\n", query.tool_name()));
        }
    }

    instructions.push_str("\n## Server and database tools\n");
    for query in DiagnosticQuery::ALL {
        if query.kind() == QueryKind::Fixed {
            instructions.push_str(&format!("- `{}`\n", query.tool_name()));
        }
    }

    instructions.push_str(&format!(
        "\nCollation mismatches are reported for schema `{}`. Results are returned as {}.\n",
        settings.schema, settings.output_format
    ));
    instructions.push_str(
        "Table names must be plain identifiers (letters, digits, underscores) without schema prefix.\n",
    );

    instructions
}
