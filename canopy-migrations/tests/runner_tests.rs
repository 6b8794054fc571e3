use async_trait::async_trait;
use canopy_gateway::ScopedQueryHandle;
use canopy_manifest::Migration;
use canopy_migrations::{MigrationError, MigrationRunner, plan_migrations};
use canopy_storage::{
    DuckDbExecutor, ExecuteOptions, QueryExecutor, QueryResult, ScriptStatement, StorageError,
    StorageResult,
};
use canopy_types::{ExtensionId, FixedClock, PermissionContext, PrivateSchema, Timestamp};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

// =============================================================================
// HELPERS
// =============================================================================

fn goals_id() -> ExtensionId {
    ExtensionId::parse("goals").unwrap()
}

fn schema() -> PrivateSchema {
    PrivateSchema::explicit("plugin_x").unwrap()
}

fn clock() -> FixedClock {
    FixedClock(Timestamp::from_millis(1_700_000_000_000).unwrap())
}

fn handle(db: &Arc<DuckDbExecutor>) -> ScopedQueryHandle {
    let ctx = PermissionContext::new(goals_id(), schema(), vec![], vec![]);
    ScopedQueryHandle::new(ctx, db.clone())
}

fn three_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            3,
            "seed",
            "INSERT INTO plugin_x.goals VALUES (1, 'emergency fund', 1000);",
        ),
        Migration::new(
            1,
            "init",
            "CREATE TABLE plugin_x.goals (id INTEGER PRIMARY KEY, title VARCHAR);",
        ),
        Migration::new(
            2,
            "add_target",
            "ALTER TABLE plugin_x.goals ADD COLUMN target DOUBLE;\n\
             -- keep lookups fast\n\
             CREATE INDEX goals_title ON plugin_x.goals (title);",
        ),
    ]
}

async fn scalar(db: &DuckDbExecutor, sql: &str) -> Value {
    db.execute(sql, &[], &ExecuteOptions::read())
        .await
        .unwrap()
        .rows
        .first()
        .and_then(|r| r.first().cloned())
        .unwrap_or(Value::Null)
}

/// Records every statement and answers the version query with a fixed value.
#[derive(Default)]
struct RecordingExecutor {
    log: Mutex<Vec<String>>,
    current_version: u32,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(
        &self,
        sql: &str,
        _params: &[Value],
        _options: &ExecuteOptions,
    ) -> StorageResult<QueryResult> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(QueryResult {
            columns: vec!["current_version".into()],
            rows: vec![vec![json!(self.current_version)]],
            row_count: 1,
        })
    }

    async fn execute_script(
        &self,
        statements: &[ScriptStatement],
        _options: &ExecuteOptions,
    ) -> StorageResult<()> {
        for s in statements {
            if self.fail_on.as_deref().is_some_and(|f| s.sql.contains(f)) {
                return Err(StorageError::InvalidData(format!("boom: {}", s.sql)));
            }
        }
        let mut log = self.log.lock().unwrap();
        log.extend(statements.iter().map(|s| s.sql.clone()));
        Ok(())
    }

    async fn checkpoint(&self) -> StorageResult<()> {
        self.log.lock().unwrap().push("CHECKPOINT".into());
        Ok(())
    }
}

// =============================================================================
// AGAINST DUCKDB
// =============================================================================

#[tokio::test]
async fn applies_in_version_order_and_records_ledger() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    let report = runner
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap();
    assert_eq!(report.previous_version, 0);
    assert_eq!(report.current_version, 3);
    assert_eq!(report.applied, vec![1, 2, 3]);

    assert_eq!(
        scalar(&db, "SELECT target FROM plugin_x.goals").await,
        json!(1000.0)
    );
    let entries = runner.applied(&schema()).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["init", "add_target", "seed"]);
    assert_eq!(entries[0].applied_at, Some(clock.0));
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    runner
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap();
    let again = runner
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap();

    assert_eq!(again.previous_version, 3);
    assert_eq!(again.current_version, 3);
    assert!(again.applied.is_empty());
    assert_eq!(
        scalar(&db, "SELECT COUNT(*) FROM plugin_x._migrations").await,
        json!(3)
    );
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM plugin_x.goals").await, json!(1));
}

#[tokio::test]
async fn new_versions_apply_on_top() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    let mut migrations = three_migrations();
    migrations.retain(|m| m.version == 1);
    runner.run(&goals_id(), &schema(), &migrations).await.unwrap();

    let report = runner
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap();
    assert_eq!(report.previous_version, 1);
    assert_eq!(report.applied, vec![2, 3]);
}

#[tokio::test]
async fn failure_stops_run_and_keeps_earlier_migrations() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    let migrations = vec![
        Migration::new(1, "init", "CREATE TABLE plugin_x.goals (id INTEGER)"),
        Migration::new(
            2,
            "broken",
            "CREATE TABLE plugin_x.partial (id INTEGER); INSERT INTO plugin_x.nope VALUES (1)",
        ),
        Migration::new(3, "never", "CREATE TABLE plugin_x.later (id INTEGER)"),
    ];
    let err = runner
        .run(&goals_id(), &schema(), &migrations)
        .await
        .unwrap_err();
    assert_eq!(err.failed_migration(), Some((2, "broken")));

    assert_eq!(runner.current_version(&schema()).await.unwrap(), 1);
    assert_eq!(
        scalar(
            &db,
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'plugin_x' AND table_name IN ('partial', 'later')"
        )
        .await,
        json!(0)
    );
}

#[tokio::test]
async fn migration_touching_foreign_table_is_denied() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    db.execute("CREATE TABLE accounts (id INTEGER)", &[], &ExecuteOptions::write())
        .await
        .unwrap();
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    let err = runner
        .run(
            &goals_id(),
            &schema(),
            &[Migration::new(1, "evil", "DROP TABLE accounts")],
        )
        .await
        .unwrap_err();
    match err {
        MigrationError::Failed { source, .. } => assert!(source.is_permission_denied()),
        other => panic!("unexpected: {other}"),
    }
    assert_eq!(
        scalar(&db, "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'accounts'")
            .await,
        json!(1)
    );
}

#[tokio::test]
async fn duplicate_versions_execute_nothing() {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = handle(&db);
    let clock = clock();
    let runner = MigrationRunner::new(&handle, &clock);

    let err = runner
        .run(
            &goals_id(),
            &schema(),
            &[
                Migration::new(1, "a", "CREATE TABLE plugin_x.a (id INTEGER)"),
                Migration::new(1, "b", "CREATE TABLE plugin_x.b (id INTEGER)"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::DuplicateVersion { version: 1, .. }));
    assert_eq!(
        scalar(
            &db,
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = 'plugin_x'"
        )
        .await,
        json!(0)
    );
}

// =============================================================================
// AGAINST A RECORDING EXECUTOR
// =============================================================================

#[tokio::test]
async fn empty_migration_list_touches_nothing() {
    let exec = RecordingExecutor::default();
    let clock = clock();
    let report = MigrationRunner::new(&exec, &clock)
        .run(&goals_id(), &schema(), &[])
        .await
        .unwrap();
    assert_eq!(report.applied, Vec::<u32>::new());
    assert!(exec.log().is_empty());
}

#[tokio::test]
async fn statement_order_is_schema_ledger_version_migrations_checkpoint() {
    let exec = RecordingExecutor {
        current_version: 1,
        ..Default::default()
    };
    let clock = clock();
    MigrationRunner::new(&exec, &clock)
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap();

    let log = exec.log();
    assert!(log[0].starts_with("CREATE SCHEMA IF NOT EXISTS plugin_x"));
    assert!(log[1].starts_with("CREATE TABLE IF NOT EXISTS plugin_x._migrations"));
    assert!(log[2].starts_with("SELECT COALESCE(MAX(version), 0)"));
    assert!(log[3].starts_with("ALTER TABLE plugin_x.goals"));
    assert!(log[4].starts_with("-- keep lookups fast"));
    assert!(log[5].starts_with("INSERT INTO plugin_x._migrations"));
    assert!(log[6].starts_with("INSERT INTO plugin_x.goals"));
    assert!(log[7].starts_with("INSERT INTO plugin_x._migrations"));
    assert_eq!(log[8], "CHECKPOINT");
    assert_eq!(log.len(), 9);
}

#[tokio::test]
async fn failure_skips_checkpoint_and_later_versions() {
    let exec = RecordingExecutor {
        fail_on: Some("ALTER TABLE".into()),
        ..Default::default()
    };
    let clock = clock();
    let err = MigrationRunner::new(&exec, &clock)
        .run(&goals_id(), &schema(), &three_migrations())
        .await
        .unwrap_err();
    assert_eq!(err.failed_migration(), Some((2, "add_target")));
    let log = exec.log();
    assert!(!log.iter().any(|s| s == "CHECKPOINT"));
    assert!(!log.iter().any(|s| s.contains("emergency fund")));
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// Whatever the input order, the plan is strictly ascending.
    #[test]
    fn plan_is_ascending(versions in prop::collection::hash_set(1u32..500, 0..20)) {
        let mut migrations: Vec<Migration> = versions
            .iter()
            .map(|v| Migration::new(*v, format!("m{v}"), ""))
            .collect();
        migrations.reverse();
        let planned = plan_migrations(&migrations).unwrap();
        prop_assert_eq!(planned.len(), versions.len());
        prop_assert!(planned.windows(2).all(|w| w[0].version < w[1].version));
    }

    /// Any repeated version is rejected.
    #[test]
    fn plan_rejects_any_duplicate(
        versions in prop::collection::vec(1u32..50, 1..10),
        pick in any::<prop::sample::Index>(),
    ) {
        let dup = versions[pick.index(versions.len())];
        let mut migrations: Vec<Migration> = versions
            .iter()
            .enumerate()
            .map(|(i, v)| Migration::new(*v, format!("m{i}"), ""))
            .collect();
        migrations.push(Migration::new(dup, "dup", ""));
        let is_duplicate = matches!(
            plan_migrations(&migrations),
            Err(MigrationError::DuplicateVersion { .. })
        );
        prop_assert!(is_duplicate);
    }
}
