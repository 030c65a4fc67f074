//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for diagnostic results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array of row objects (default).
    #[default]
    Json,
    /// Markdown table format.
    Table,
    /// CSV format.
    Csv,
}

impl OutputFormat {
    /// Get the format name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "table" | "markdown" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!(
                "Invalid output format '{}'. Valid formats: json, table, csv",
                s
            )),
        }
    }
}

/// Input for the table-scoped diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableNamesInput {
    /// Names of the tables to inspect, without schema prefix.
    pub table_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TABLE".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("markdown".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
        assert_eq!(OutputFormat::Table.to_string(), "table");
    }

    #[test]
    fn test_table_names_input_uses_camel_case() {
        let input: TableNamesInput =
            serde_json::from_str(r#"{"tableNames": ["Orders", "Customers"]}"#).unwrap();
        assert_eq!(input.table_names, vec!["Orders", "Customers"]);

        let input: TableNamesInput = serde_json::from_str(r#"{"tableNames": []}"#).unwrap();
        assert!(input.table_names.is_empty());

        assert!(serde_json::from_str::<TableNamesInput>("{}").is_err());
    }

    #[test]
    fn test_table_names_schema() {
        let schema = schemars::schema_for!(TableNamesInput);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["properties"]["tableNames"]["type"], "array");
        assert_eq!(json["properties"]["tableNames"]["items"]["type"], "string");
        assert_eq!(json["required"][0], "tableNames");
    }
}
