//! Input sanitization for the one place caller text reaches SQL text.

mod identifiers;

pub use identifiers::{sql_in_list, validate_identifier, validate_table_names};
