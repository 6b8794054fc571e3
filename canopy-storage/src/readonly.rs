//! Readonly enforcement, independent of the permission gateway.

use crate::dialect::parse_statements;
use crate::{StorageError, StorageResult};
use sqlparser::ast::Statement;

/// Fails unless every statement in `sql` is a plain query.
///
/// Text that does not parse is refused: it cannot be shown to be read-only.
pub fn ensure_read_only(sql: &str) -> StorageResult<()> {
    let statements = parse_statements(sql).map_err(|e| {
        StorageError::ReadOnlyViolation(format!("statement could not be verified: {e}"))
    })?;
    for statement in &statements {
        if !matches!(statement, Statement::Query(_)) {
            let rendered = statement.to_string();
            let keyword = rendered.split_whitespace().next().unwrap_or_default();
            return Err(StorageError::ReadOnlyViolation(format!(
                "{} statement is not a query",
                keyword.to_ascii_uppercase()
            )));
        }
    }
    Ok(())
}

/// True when `sql` parses as a single query and should return rows.
pub(crate) fn returns_rows(sql: &str) -> bool {
    matches!(
        parse_statements(sql).as_deref(),
        Ok([Statement::Query(_)])
    )
}
