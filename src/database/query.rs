//! Query requests, execution and result handling.

use crate::database::auth::RawConnection;
use crate::database::types::{self, SqlValue};
use crate::error::ServerError;
use crate::security::validate_identifier;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::time::Instant;
use tiberius::{ColumnData, QueryItem, QueryStream, ToSql};
use tracing::debug;

/// A scalar bound to a named query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl SqlParam {
    /// T-SQL type used to declare the named variable.
    pub fn declared_type(&self) -> &'static str {
        match self {
            SqlParam::Bool(_) => "BIT",
            SqlParam::Int(_) => "BIGINT",
            SqlParam::Float(_) => "FLOAT",
            SqlParam::Text(_) | SqlParam::Null => "NVARCHAR(MAX)",
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlParam::Bool(v) => ColumnData::Bit(Some(*v)),
            SqlParam::Int(v) => ColumnData::I64(Some(*v)),
            SqlParam::Float(v) => ColumnData::F64(Some(*v)),
            SqlParam::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            SqlParam::Null => ColumnData::String(None),
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

/// SQL text plus named parameter bindings.
///
/// The SQL refers to parameters as `@name`. At execution each one is declared
/// as a local variable initialised from a positional RPC parameter, so values
/// never become part of the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    sql: String,
    params: Vec<(String, SqlParam)>,
}

impl QueryRequest {
    /// Create a request without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind a value to `@name`. Binding the same name twice replaces the value.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlParam>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.params.push((name, value)),
        }
        self
    }

    /// The statement text as written, without parameter declarations.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters in binding order.
    pub fn params(&self) -> &[(String, SqlParam)] {
        &self.params
    }

    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&SqlParam> {
        self.params
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Statement text sent to the server: one `DECLARE` per parameter, then the SQL.
    pub fn render(&self) -> Result<String, ServerError> {
        let mut rendered = String::with_capacity(self.sql.len() + self.params.len() * 48);
        for (idx, (name, value)) in self.params.iter().enumerate() {
            let name = validate_identifier(name)
                .map_err(|e| ServerError::internal(format!("Invalid parameter name: {}", e)))?;
            // Writing to a String cannot fail
            let _ = writeln!(
                rendered,
                "DECLARE @{} {} = @P{};",
                name,
                value.declared_type(),
                idx + 1
            );
        }
        rendered.push_str(&self.sql);
        Ok(rendered)
    }
}

/// A single row of query results, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    values: Vec<(String, SqlValue)>,
}

impl ResultRow {
    /// Create a new result row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Append a value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.push((column.into(), value));
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Information about a result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// SQL type name.
    pub sql_type: String,
}

/// Result of a query execution, fully materialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in order.
    pub columns: Vec<ColumnInfo>,

    /// Result rows.
    pub rows: Vec<ResultRow>,

    /// Execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create an empty query result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the query returned no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Format rows as a pretty-printed JSON array of objects.
    pub fn to_json_pretty(&self) -> Result<String, ServerError> {
        serde_json::to_string_pretty(&self.rows)
            .map_err(|e| ServerError::internal(format!("Failed to serialize rows: {}", e)))
    }

    /// Format the result as a markdown table.
    pub fn to_markdown_table(&self) -> String {
        if self.columns.is_empty() {
            return "No results returned.".to_string();
        }

        let mut output = String::new();

        // Header row
        let headers: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        output.push_str("| ");
        output.push_str(&headers.join(" | "));
        output.push_str(" |\n");

        // Separator row
        output.push_str("| ");
        output.push_str(
            &headers
                .iter()
                .map(|h| "-".repeat(h.len().max(3)))
                .collect::<Vec<_>>()
                .join(" | "),
        );
        output.push_str(" |\n");

        // Data rows
        for row in &self.rows {
            output.push_str("| ");
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|col| {
                    row.get(&col.name)
                        .map(|v| v.to_string().replace('|', "\\|").replace('\n', " "))
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect();
            output.push_str(&values.join(" | "));
            output.push_str(" |\n");
        }

        output.push_str(&format!("\n_{} row(s)_", self.rows.len()));
        output
    }

    /// Format the result as CSV.
    pub fn to_csv(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut output = String::new();

        let headers: Vec<String> = self.columns.iter().map(|c| csv_field(&c.name)).collect();
        output.push_str(&headers.join(","));
        output.push('\n');

        for row in &self.rows {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|col| {
                    let value = row
                        .get(&col.name)
                        .filter(|v| !v.is_null())
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    csv_field(&value)
                })
                .collect();
            output.push_str(&values.join(","));
            output.push('\n');
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Execute a request on a checked-out connection and materialize every row.
pub async fn execute_on(
    conn: &mut RawConnection,
    request: &QueryRequest,
) -> Result<QueryResult, ServerError> {
    let start = Instant::now();
    let sql = request.render()?;

    debug!(
        "Executing query ({} params): {}",
        request.params().len(),
        truncate_for_log(request.sql(), crate::constants::MAX_LOGGED_SQL_LENGTH)
    );

    let bound: Vec<&dyn ToSql> = request
        .params()
        .iter()
        .map(|(_, value)| value as &dyn ToSql)
        .collect();

    let stream = conn.query(sql, &bound).await?;
    let result = process_stream(stream, start).await?;

    debug!(
        "Query completed: {} rows in {} ms",
        result.rows.len(),
        result.execution_time_ms
    );

    Ok(result)
}

/// Process a query stream into a QueryResult.
async fn process_stream(
    mut stream: QueryStream<'_>,
    start: Instant,
) -> Result<QueryResult, ServerError> {
    use futures_util::stream::TryStreamExt;

    let mut columns: Vec<ColumnInfo> = Vec::new();
    let mut rows: Vec<ResultRow> = Vec::new();

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                columns = meta
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo {
                        name: col.name().to_string(),
                        sql_type: types::type_name(col).to_string(),
                    })
                    .collect();
            }
            QueryItem::Row(row) => {
                let mut result_row = ResultRow::new();
                for (idx, col) in columns.iter().enumerate() {
                    result_row.insert(col.name.clone(), types::decode_column(&row, idx));
                }
                rows.push(result_row);
            }
        }
    }

    Ok(QueryResult {
        columns,
        rows,
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Truncate a string for logging purposes, respecting char boundaries.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...", &s[..cut]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn sample_result() -> QueryResult {
        let columns = vec![
            ColumnInfo {
                name: "Table".to_string(),
                sql_type: "NVARCHAR".to_string(),
            },
            ColumnInfo {
                name: "Urgency".to_string(),
                sql_type: "VARCHAR".to_string(),
            },
        ];

        let mut row1 = ResultRow::new();
        row1.insert("Table", SqlValue::from("Orders"));
        row1.insert("Urgency", SqlValue::from("HIGH"));

        let mut row2 = ResultRow::new();
        row2.insert("Table", SqlValue::from("Customers"));
        row2.insert("Urgency", SqlValue::Null);

        QueryResult {
            columns,
            rows: vec![row1, row2],
            execution_time_ms: 5,
        }
    }

    #[test]
    fn test_result_row_lookup() {
        let mut row = ResultRow::new();
        row.insert("id", SqlValue::Int(1));
        row.insert("name", SqlValue::from("test"));

        assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
        assert!(row.get("missing").is_none());
        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_json_preserves_column_order() {
        let mut row = ResultRow::new();
        row.insert("Zeta", SqlValue::Int(1));
        row.insert("Alpha", SqlValue::Int(2));
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Zeta":1,"Alpha":2}"#);
    }

    #[test]
    fn test_json_pretty_output() {
        let json = sample_result().to_json_pretty().unwrap();
        let expected = "[\n  {\n    \"Table\": \"Orders\",\n    \"Urgency\": \"HIGH\"\n  },\n  {\n    \"Table\": \"Customers\",\n    \"Urgency\": null\n  }\n]";
        assert_eq!(json, expected);
    }

    #[test]
    fn test_markdown_table() {
        let md = sample_result().to_markdown_table();
        assert!(md.contains("| Table | Urgency |"));
        assert!(md.contains("| Orders | HIGH |"));
        assert!(md.contains("| Customers | NULL |"));
        assert!(md.ends_with("_2 row(s)_"));
    }

    #[test]
    fn test_csv_output() {
        let mut result = sample_result();
        result.rows[0] = {
            let mut row = ResultRow::new();
            row.insert("Table", SqlValue::from("value, with comma"));
            row.insert("Urgency", SqlValue::from("LOW"));
            row
        };
        let csv = result.to_csv();
        assert!(csv.starts_with("Table,Urgency\n"));
        assert!(csv.contains("\"value, with comma\",LOW"));
        assert!(csv.contains("Customers,\n"));
    }

    #[test]
    fn test_render_declares_named_parameters() {
        let request = QueryRequest::new("SELECT 1 WHERE s.name = @schemaName AND n <= @maxRows;")
            .bind("schemaName", "dbo")
            .bind("maxRows", 5_i64);
        let rendered = assert_ok!(request.render());
        assert_eq!(
            rendered,
            "DECLARE @schemaName NVARCHAR(MAX) = @P1;\n\
             DECLARE @maxRows BIGINT = @P2;\n\
             SELECT 1 WHERE s.name = @schemaName AND n <= @maxRows;"
        );
        assert!(!rendered.contains("'dbo'"));
    }

    #[test]
    fn test_bind_replaces_existing_value() {
        let request = QueryRequest::new("SELECT @x;").bind("x", 1_i64).bind("x", 2_i64);
        assert_eq!(request.params().len(), 1);
        assert_eq!(request.param("x"), Some(&SqlParam::Int(2)));
    }

    #[test]
    fn test_render_rejects_bad_parameter_name() {
        let request = QueryRequest::new("SELECT 1;").bind("x; DROP", 1_i64);
        assert_err!(request.render());
    }

    #[test]
    fn test_render_without_parameters_is_verbatim() {
        let request = QueryRequest::new("SELECT 1;");
        assert_eq!(assert_ok!(request.render()), "SELECT 1;");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("this is a long string", 10), "this is a ...");
        assert_eq!(truncate_for_log("ééééé", 2), "éé...");
    }
}
