//! Diagnostic query catalog.
//!
//! Every tool maps to exactly one [`DiagnosticQuery`]. A catalog entry knows
//! its SQL, the bindings it needs, the text returned when the query yields no
//! rows, and the prefix used when it fails. Table-scoped entries splice the
//! validated table names into the SQL through a `{{table_filter}}` placeholder.

use crate::config::DiagnosticsConfig;
use crate::constants::NO_TABLE_NAMES_PROVIDED;
use crate::database::QueryRequest;
use crate::error::ServerError;
use crate::security::{sql_in_list, validate_table_names};

const SERVER_INFO_SQL: &str = include_str!("diagnostics/sql/server_info.sql");
const DB_COLLATION_SQL: &str = include_str!("diagnostics/sql/db_collation.sql");
const COLLATION_MISMATCHES_SQL: &str = include_str!("diagnostics/sql/collation_mismatches.sql");
const TABLE_WORKLOAD_SQL: &str = include_str!("diagnostics/sql/table_workload.sql");
const INDEX_HEALTH_SQL: &str = include_str!("diagnostics/sql/index_health.sql");
const MISSING_INDEXES_SQL: &str = include_str!("diagnostics/sql/missing_indexes.sql");

const TABLE_FILTER_PLACEHOLDER: &str = "{{table_filter}}";
const ACTIVE_TABLES_FILTER: &str = "activityLevelFriendly <> 'No Activity'";

/// How a diagnostic is parameterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Same SQL on every call.
    Fixed,
    /// Scoped to a caller-supplied list of table names.
    TableList,
}

/// The diagnostics exposed as tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticQuery {
    ServerInfo,
    DatabaseCollation,
    CollationMismatches,
    ActiveTablesInfo,
    TablesInfo,
    TablesIndexHealth,
    TablesMissingIndexes,
}

/// Arguments supplied with a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs {
    /// Table names, for table-scoped diagnostics.
    pub table_names: Vec<String>,
}

impl QueryArgs {
    /// Arguments for a diagnostic that takes none.
    pub fn none() -> Self {
        Self::default()
    }

    /// Arguments carrying a table list.
    pub fn tables(table_names: Vec<String>) -> Self {
        Self { table_names }
    }
}

/// What the dispatcher should do with a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedQuery {
    /// Run this request.
    Execute(QueryRequest),
    /// Answer immediately with this text; no database round trip.
    Respond(String),
}

impl DiagnosticQuery {
    /// Every catalog entry, in the order tools are advertised.
    pub const ALL: [DiagnosticQuery; 7] = [
        DiagnosticQuery::TablesInfo,
        DiagnosticQuery::TablesIndexHealth,
        DiagnosticQuery::TablesMissingIndexes,
        DiagnosticQuery::ServerInfo,
        DiagnosticQuery::DatabaseCollation,
        DiagnosticQuery::CollationMismatches,
        DiagnosticQuery::ActiveTablesInfo,
    ];

    /// Name of the tool backed by this diagnostic.
    pub fn tool_name(self) -> &'static str {
        match self {
            DiagnosticQuery::ServerInfo => "get-server-info",
            DiagnosticQuery::DatabaseCollation => "get-db-collation",
            DiagnosticQuery::CollationMismatches => "get-collation-mismatches",
            DiagnosticQuery::ActiveTablesInfo => "get-active-tables-info",
            DiagnosticQuery::TablesInfo => "get-tables-info",
            DiagnosticQuery::TablesIndexHealth => "get-tables-index-health",
            DiagnosticQuery::TablesMissingIndexes => "get-tables-missing-indexes",
        }
    }

    /// Look up a diagnostic by tool name.
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|query| query.tool_name() == name)
    }

    pub fn kind(self) -> QueryKind {
        match self {
            DiagnosticQuery::TablesInfo
            | DiagnosticQuery::TablesIndexHealth
            | DiagnosticQuery::TablesMissingIndexes => QueryKind::TableList,
            _ => QueryKind::Fixed,
        }
    }

    /// Prefix of the text returned when the diagnostic fails.
    pub fn error_prefix(self) -> &'static str {
        match self {
            DiagnosticQuery::ServerInfo => "Error retrieving server info",
            DiagnosticQuery::DatabaseCollation => "Error retrieving database collation",
            DiagnosticQuery::CollationMismatches => "Error retrieving collation mismatches",
            DiagnosticQuery::ActiveTablesInfo => "Error retrieving active tables info",
            DiagnosticQuery::TablesInfo => "Error retrieving tables info",
            DiagnosticQuery::TablesIndexHealth => "Error retrieving index health",
            DiagnosticQuery::TablesMissingIndexes => "Error retrieving missing indexes",
        }
    }

    /// Text returned when the query succeeds with zero rows.
    pub fn empty_sentinel(self) -> &'static str {
        match self {
            DiagnosticQuery::ServerInfo => "No server information found.",
            DiagnosticQuery::DatabaseCollation => "No collation information found.",
            DiagnosticQuery::CollationMismatches => "No collation mismatches found.",
            DiagnosticQuery::ActiveTablesInfo => "No active tables found in the schema.",
            DiagnosticQuery::TablesInfo => "No table information found for the specified tables.",
            DiagnosticQuery::TablesIndexHealth => "No indices found with the specified tables.",
            DiagnosticQuery::TablesMissingIndexes => {
                "No missing index recommendations found for the specified tables. \
                 State to the user that everything is fine."
            }
        }
    }

    /// Turn a tool call into either a query to run or an immediate answer.
    ///
    /// Table-scoped diagnostics answer without touching the database when the
    /// list is empty or any name fails validation.
    pub fn prepare(
        self,
        args: &QueryArgs,
        settings: &DiagnosticsConfig,
    ) -> Result<PreparedQuery, ServerError> {
        let request = match self {
            DiagnosticQuery::ServerInfo => QueryRequest::new(SERVER_INFO_SQL),
            DiagnosticQuery::DatabaseCollation => QueryRequest::new(DB_COLLATION_SQL),
            DiagnosticQuery::CollationMismatches => QueryRequest::new(COLLATION_MISMATCHES_SQL)
                .bind("schemaName", settings.schema.as_str()),
            DiagnosticQuery::ActiveTablesInfo => QueryRequest::new(
                TABLE_WORKLOAD_SQL.replace(TABLE_FILTER_PLACEHOLDER, ACTIVE_TABLES_FILTER),
            ),
            DiagnosticQuery::TablesInfo
            | DiagnosticQuery::TablesIndexHealth
            | DiagnosticQuery::TablesMissingIndexes => {
                let filter = match table_filter(&args.table_names) {
                    Ok(filter) => filter,
                    Err(answer) => return Ok(PreparedQuery::Respond(answer)),
                };
                let template = match self {
                    DiagnosticQuery::TablesInfo => TABLE_WORKLOAD_SQL,
                    DiagnosticQuery::TablesIndexHealth => INDEX_HEALTH_SQL,
                    _ => MISSING_INDEXES_SQL,
                };
                let request =
                    QueryRequest::new(template.replace(TABLE_FILTER_PLACEHOLDER, &filter));
                if self == DiagnosticQuery::TablesMissingIndexes {
                    request.bind("maxIndexesPerTable", settings.max_missing_indexes)
                } else {
                    request
                }
            }
        };

        Ok(PreparedQuery::Execute(request))
    }
}

/// Build `tableName IN (...)` from caller input, or the text to answer with instead.
fn table_filter(table_names: &[String]) -> Result<String, String> {
    if table_names.is_empty() {
        return Err(NO_TABLE_NAMES_PROVIDED.to_string());
    }

    let names = validate_table_names(table_names).map_err(|e| match e {
        ServerError::Validation(reason) => format!("Invalid table name: {}", reason),
        other => other.to_string(),
    })?;
    Ok(format!("tableName IN ({})", sql_in_list(&names)))
}
