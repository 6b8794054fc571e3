//! The per-schema record of applied migrations.

use canopy_manifest::Migration;
use canopy_storage::ScriptStatement;
use canopy_types::{PrivateSchema, Timestamp};
use serde_json::json;

/// Name of the ledger table inside each private schema.
pub const LEDGER_TABLE: &str = "_migrations";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: u32,
    pub name: String,
    pub applied_at: Option<Timestamp>,
}

pub(crate) fn create_schema_sql(schema: &PrivateSchema) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

/// No column default on `applied_at`: defaults computed by functions cannot
/// be resolved while a WAL is replayed after a crash.
pub(crate) fn create_ledger_sql(schema: &PrivateSchema) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{LEDGER_TABLE} (\
         version INTEGER PRIMARY KEY, \
         name VARCHAR NOT NULL, \
         applied_at TIMESTAMP)"
    )
}

pub(crate) fn current_version_sql(schema: &PrivateSchema) -> String {
    format!("SELECT COALESCE(MAX(version), 0) AS current_version FROM {schema}.{LEDGER_TABLE}")
}

pub(crate) fn entries_sql(schema: &PrivateSchema) -> String {
    format!(
        "SELECT version, name, CAST(epoch_ms(applied_at) AS BIGINT) AS applied_ms \
         FROM {schema}.{LEDGER_TABLE} ORDER BY version"
    )
}

pub(crate) fn record_statement(
    schema: &PrivateSchema,
    migration: &Migration,
    applied_at: Timestamp,
) -> ScriptStatement {
    ScriptStatement::with_params(
        format!(
            "INSERT INTO {schema}.{LEDGER_TABLE} (version, name, applied_at) \
             VALUES (?, ?, CAST(? AS TIMESTAMP))"
        ),
        vec![
            json!(migration.version),
            json!(migration.name),
            json!(applied_at.to_sql_literal()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_types::ExtensionId;

    #[test]
    fn ledger_has_no_default_timestamp() {
        let schema = PrivateSchema::for_extension(&ExtensionId::parse("goals").unwrap());
        let sql = create_ledger_sql(&schema);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS plugin_goals._migrations"));
        assert!(!sql.to_ascii_uppercase().contains("DEFAULT"));
    }

    #[test]
    fn record_binds_caller_timestamp() {
        let schema = PrivateSchema::for_extension(&ExtensionId::parse("goals").unwrap());
        let ts = Timestamp::from_millis(86_400_000).unwrap();
        let stmt = record_statement(&schema, &Migration::new(3, "add_index", ""), ts);
        assert_eq!(stmt.params[0], json!(3));
        assert_eq!(stmt.params[1], json!("add_index"));
        assert_eq!(stmt.params[2], json!("1970-01-02 00:00:00.000"));
    }
}
