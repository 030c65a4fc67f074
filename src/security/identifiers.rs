//! SQL Server identifier validation.
//!
//! Table names supplied by the agent are embedded into an `IN (...)` list
//! rather than bound as parameters, so they pass through a strict allow-list
//! first: an ASCII letter or underscore followed by ASCII letters, digits or
//! underscores, at most 128 characters. Anything else is rejected before any
//! SQL is built.

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Validate a single identifier, returning it without surrounding whitespace.
///
/// # Examples
///
/// ```
/// use mssql_dba_mcp::security::validate_identifier;
///
/// assert_eq!(validate_identifier(" Orders ").unwrap(), "Orders");
/// assert!(validate_identifier("Orders; DROP TABLE Orders").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<&str, ServerError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(ServerError::validation("Identifier cannot be empty"));
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::validation(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if !IDENTIFIER_PATTERN.is_match(trimmed) {
        return Err(ServerError::validation(format!(
            "'{}' is not a valid table name; only letters, digits and underscores are allowed",
            trimmed.escape_debug()
        )));
    }

    Ok(trimmed)
}

/// Validate every table name, dropping exact duplicates while keeping first-seen order.
///
/// Names differing only in case are kept apart; whether they match the same
/// table is up to the database collation.
pub fn validate_table_names(names: &[String]) -> Result<Vec<&str>, ServerError> {
    let mut validated: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        let name = validate_identifier(name)?;
        if !validated.iter().any(|seen| *seen == name) {
            validated.push(name);
        }
    }
    Ok(validated)
}

/// Render validated identifiers as the body of an `IN (...)` clause.
///
/// Callers must pass names returned by [`validate_identifier`]; quotes are
/// impossible in that alphabet, so no escaping is required.
pub fn sql_in_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("N'{}'", name))
        .collect::<Vec<_>>()
        .join(", ")
}
