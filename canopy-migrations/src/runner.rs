//! Applying pending migrations.

use crate::ledger::{
    create_ledger_sql, create_schema_sql, current_version_sql, entries_sql, record_statement,
};
use crate::{LedgerEntry, MigrationError, MigrationResult};
use canopy_manifest::Migration;
use canopy_storage::{ExecuteOptions, QueryExecutor, ScriptStatement, split_statements};
use canopy_types::{Clock, ExtensionId, PrivateSchema, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ledger version before the run.
    pub previous_version: u32,
    /// Ledger version after the run.
    pub current_version: u32,
    /// Versions applied by this run, ascending.
    pub applied: Vec<u32>,
}

/// Orders migrations by version and rejects duplicates.
pub fn plan_migrations(migrations: &[Migration]) -> MigrationResult<Vec<&Migration>> {
    let mut seen: HashMap<u32, &str> = HashMap::with_capacity(migrations.len());
    for migration in migrations {
        if migration.version == 0 {
            return Err(MigrationError::InvalidVersion(migration.name.clone()));
        }
        if let Some(first) = seen.insert(migration.version, &migration.name) {
            return Err(MigrationError::DuplicateVersion {
                version: migration.version,
                first: first.to_string(),
                second: migration.name.clone(),
            });
        }
    }
    let mut ordered: Vec<&Migration> = migrations.iter().collect();
    ordered.sort_by_key(|m| m.version);
    Ok(ordered)
}

/// Runs migrations through any [`QueryExecutor`]; the host hands it the
/// extension's permission-scoped handle.
pub struct MigrationRunner<'a> {
    executor: &'a dyn QueryExecutor,
    clock: &'a dyn Clock,
}

impl<'a> MigrationRunner<'a> {
    #[must_use]
    pub fn new(executor: &'a dyn QueryExecutor, clock: &'a dyn Clock) -> Self {
        Self { executor, clock }
    }

    /// Applies every migration newer than the ledger's current version.
    ///
    /// Safe to call on every startup. Each migration's statements and its
    /// ledger row commit together; a failure stops the run and leaves
    /// earlier migrations of the same run committed.
    pub async fn run(
        &self,
        extension_id: &ExtensionId,
        schema: &PrivateSchema,
        migrations: &[Migration],
    ) -> MigrationResult<MigrationReport> {
        if migrations.is_empty() {
            return Ok(MigrationReport::default());
        }
        let ordered = plan_migrations(migrations)?;

        self.ensure_ledger(schema).await?;
        let previous_version = self.current_version(schema).await?;
        let mut report = MigrationReport {
            previous_version,
            current_version: previous_version,
            applied: Vec::new(),
        };

        for migration in ordered.into_iter().filter(|m| m.version > previous_version) {
            let mut statements: Vec<ScriptStatement> = split_statements(&migration.up_script)
                .into_iter()
                .map(ScriptStatement::new)
                .collect();
            statements.push(record_statement(schema, migration, self.clock.now()));

            if let Err(source) = self
                .executor
                .execute_script(&statements, &ExecuteOptions::write())
                .await
            {
                error!(
                    extension_id = %extension_id,
                    version = migration.version,
                    name = %migration.name,
                    error = %source,
                    "Migration failed"
                );
                return Err(MigrationError::Failed {
                    version: migration.version,
                    name: migration.name.clone(),
                    source,
                });
            }

            info!(
                extension_id = %extension_id,
                version = migration.version,
                name = %migration.name,
                "Applied migration"
            );
            report.applied.push(migration.version);
            report.current_version = migration.version;
        }

        self.executor
            .checkpoint()
            .await
            .map_err(MigrationError::Checkpoint)?;

        debug!(
            extension_id = %extension_id,
            from = report.previous_version,
            to = report.current_version,
            "Migrations complete"
        );
        Ok(report)
    }

    /// Highest applied version, 0 when the ledger is empty.
    pub async fn current_version(&self, schema: &PrivateSchema) -> MigrationResult<u32> {
        let result = self
            .executor
            .execute(&current_version_sql(schema), &[], &ExecuteOptions::read())
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(result
            .first_value("current_version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0))
    }

    /// Every ledger row, ascending by version.
    pub async fn applied(&self, schema: &PrivateSchema) -> MigrationResult<Vec<LedgerEntry>> {
        let result = self
            .executor
            .execute(&entries_sql(schema), &[], &ExecuteOptions::read())
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                let version = u32::try_from(row.first()?.as_u64()?).ok()?;
                let name = row.get(1)?.as_str()?.to_string();
                let applied_at = row
                    .get(2)
                    .and_then(Value::as_i64)
                    .and_then(|ms| Timestamp::from_millis(ms).ok());
                Some(LedgerEntry {
                    version,
                    name,
                    applied_at,
                })
            })
            .collect())
    }

    async fn ensure_ledger(&self, schema: &PrivateSchema) -> MigrationResult<()> {
        self.executor
            .execute_script(
                &[
                    ScriptStatement::new(create_schema_sql(schema)),
                    ScriptStatement::new(create_ledger_sql(schema)),
                ],
                &ExecuteOptions::write(),
            )
            .await
            .map_err(MigrationError::Ledger)
    }
}
