//! MCP prompts for guided optimization workflows.
//!
//! Prompts are instruction templates. They never touch the database; the
//! agent is told to gather context through this server's tools.

use rmcp::model::{
    GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageContent,
    PromptMessageRole,
};
use std::collections::HashMap;

const OPTIMIZE_QUERY_TEXT: &str = include_str!("prompts/optimize_query.md");
const OPTIMIZE_INDEXES_TEXT: &str = include_str!("prompts/optimize_indexes.md");

const TABLE_NAMES_PLACEHOLDER: &str = "{{tableNames}}";

/// Create a prompt argument helper.
fn prompt_arg(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

/// Create a prompt helper.
fn prompt(name: &str, title: &str, description: &str, arguments: Vec<PromptArgument>) -> Prompt {
    Prompt {
        name: name.to_string(),
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        arguments: Some(arguments),
        icons: None,
        meta: None,
    }
}

fn optimize_indexes_prompt(name: &str) -> Prompt {
    prompt(
        name,
        "Optimize Indexes",
        "Optimize indexes on specified tables.",
        vec![prompt_arg(
            "tableNames",
            "Tables whose indexes should be reviewed, e.g. \"Orders, Customers\"",
            true,
        )],
    )
}

/// Build the list of available prompts.
pub fn build_prompt_list() -> Vec<Prompt> {
    vec![
        prompt(
            "optimize-query",
            "Optimize Query",
            "Optimize SQL queries for better performance",
            vec![prompt_arg("query", "The SQL query to optimize", false)],
        ),
        optimize_indexes_prompt("optimize-indexes"),
        optimize_indexes_prompt("optimize-indices"),
    ]
}

/// Get a specific prompt with arguments filled in.
pub fn get_prompt(
    name: &str,
    arguments: Option<&HashMap<String, String>>,
) -> Result<GetPromptResult, String> {
    let args = arguments.cloned().unwrap_or_default();

    match name {
        "optimize-query" => Ok(get_optimize_query_prompt(&args)),
        "optimize-indexes" | "optimize-indices" => Ok(get_optimize_indexes_prompt(&args)),
        _ => Err(format!("Unknown prompt: {}", name)),
    }
}

fn user_message(description: &str, text: String) -> GetPromptResult {
    GetPromptResult {
        description: Some(description.to_string()),
        messages: vec![PromptMessage {
            role: PromptMessageRole::User,
            content: PromptMessageContent::text(text),
        }],
    }
}

fn get_optimize_query_prompt(args: &HashMap<String, String>) -> GetPromptResult {
    let mut text = OPTIMIZE_QUERY_TEXT.to_string();

    if let Some(query) = args.get("query").filter(|q| !q.trim().is_empty()) {
        text.push_str(&format!("\n## Query\n\n```sql\n{}\n```\n", query.trim_end()));
    }

    user_message("Optimize SQL queries for better performance", text)
}

fn get_optimize_indexes_prompt(args: &HashMap<String, String>) -> GetPromptResult {
    // A missing list is left empty; the instructions tell the agent to ask for tables
    let table_names = args.get("tableNames").map(String::as_str).unwrap_or("");
    let text = OPTIMIZE_INDEXES_TEXT.replace(TABLE_NAMES_PLACEHOLDER, table_names);

    user_message("Optimize indexes on specified tables.", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SERVER_NAME;

    fn text_of(result: &GetPromptResult) -> &str {
        match &result.messages[0].content {
            PromptMessageContent::Text { text } => text,
            other => panic!("unexpected content: {other:?}"),
        }
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prompt_list() {
        let prompts = build_prompt_list();
        let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["optimize-query", "optimize-indexes", "optimize-indices"]);
        assert_eq!(prompts[0].title.as_deref(), Some("Optimize Query"));
        assert_eq!(prompts[1].title.as_deref(), Some("Optimize Indexes"));
    }

    #[test]
    fn test_optimize_indexes_interpolates_tables() {
        let arguments = args(&[("tableNames", "Orders, Customers")]);
        let result = get_prompt("optimize-indexes", Some(&arguments)).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, PromptMessageRole::User);

        let text = text_of(&result);
        assert!(text.starts_with(
            "Fetch the information about existing and missing indexes for these tables: Orders, Customers, using only tools from the “mssql-dba” MCP server."
        ));
        assert!(text.contains("index_optimizations.sql"));
        assert!(!text.contains(TABLE_NAMES_PLACEHOLDER));
    }

    #[test]
    fn test_optimize_indices_alias() {
        let a = get_prompt("optimize-indexes", Some(&args(&[("tableNames", "Orders")]))).unwrap();
        let b = get_prompt("optimize-indices", Some(&args(&[("tableNames", "Orders")]))).unwrap();
        assert_eq!(text_of(&a), text_of(&b));
    }

    #[test]
    fn test_optimize_indexes_without_tables() {
        let result = get_prompt("optimize-indexes", None).unwrap();
        let text = text_of(&result);
        assert!(text.starts_with(
            "Fetch the information about existing and missing indexes for these tables: , using"
        ));
        assert!(text.contains("at least one table is necessary"));
    }

    #[test]
    fn test_optimize_query_text() {
        let result = get_prompt("optimize-query", None).unwrap();
        let text = text_of(&result);
        assert!(text.starts_with("You will be provided with an MSSQL query."));
        assert!(text.contains("“mssql-dba” MCP server"));
        assert!(text.contains("{QUERY FILE NAME}_rollback_script.sql"));
        assert!(!text.contains("```sql"));
    }

    #[test]
    fn test_optimize_query_appends_query() {
        let result = get_prompt(
            "optimize-query",
            Some(&args(&[("query", "SELECT * FROM Orders WHERE CustomerId = 42")])),
        )
        .unwrap();
        let text = text_of(&result);
        assert!(text.starts_with(OPTIMIZE_QUERY_TEXT));
        assert!(text.ends_with("```sql\nSELECT * FROM Orders WHERE CustomerId = 42\n```\n"));
    }

    #[test]
    fn test_unknown_prompt() {
        let err = get_prompt("drop-everything", None).unwrap_err();
        assert_eq!(err, "Unknown prompt: drop-everything");
    }

    #[test]
    fn test_prompts_reference_this_server() {
        let quoted = format!("“{}”", SERVER_NAME);
        assert!(OPTIMIZE_QUERY_TEXT.contains(&quoted));
        assert!(OPTIMIZE_INDEXES_TEXT.contains(&quoted));
    }
}
