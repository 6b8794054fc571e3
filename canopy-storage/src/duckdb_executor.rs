//! [`QueryExecutor`] backed by a single DuckDB connection.

use crate::readonly::{ensure_read_only, returns_rows};
use crate::script::split_statements;
use crate::value::{to_db_value, to_json_value};
use crate::{
    ExecuteOptions, QueryExecutor, QueryResult, ScriptStatement, StorageError, StorageResult,
};
use async_trait::async_trait;
use duckdb::{Connection, params_from_iter};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Executes statements on the blocking pool against one shared connection.
#[derive(Clone)]
pub struct DuckDbExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbExecutor {
    /// Opens (or creates) the database at `path`, recovering from a stale WAL.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = crate::open_duckdb_with_wal_recovery(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn run_statement(conn: &Connection, sql: &str, params: &[Value]) -> StorageResult<QueryResult> {
    let bound: Vec<duckdb::types::Value> = params.iter().map(to_db_value).collect();
    let mut stmt = conn.prepare(sql)?;

    if !returns_rows(sql) {
        let changed = stmt.execute(params_from_iter(bound.iter()))?;
        return Ok(QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: changed,
        });
    }

    let mut rows = stmt.query(params_from_iter(bound.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let width = row.as_ref().column_count();
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(to_json_value(row.get::<_, duckdb::types::Value>(i)?));
        }
        out.push(cells);
    }
    let columns = rows
        .as_ref()
        .map(|s| s.column_names())
        .unwrap_or_default();

    Ok(QueryResult {
        columns,
        row_count: out.len(),
        rows: out,
    })
}

#[async_trait]
impl QueryExecutor for DuckDbExecutor {
    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        options: &ExecuteOptions,
    ) -> StorageResult<QueryResult> {
        if options.readonly {
            ensure_read_only(sql)?;
        }
        let statements = split_statements(sql);
        if statements.len() > 1 && !params.is_empty() {
            return Err(StorageError::InvalidData(
                "parameters cannot be bound to a multi-statement script".into(),
            ));
        }
        debug!(
            caller = options.caller(),
            statements = statements.len(),
            readonly = options.readonly,
            "Executing SQL"
        );

        let params = params.to_vec();
        self.with_conn(move |conn| {
            let mut last = QueryResult::default();
            for sql in &statements {
                last = run_statement(conn, sql, &params)?;
            }
            Ok(last)
        })
        .await
    }

    async fn execute_script(
        &self,
        statements: &[ScriptStatement],
        options: &ExecuteOptions,
    ) -> StorageResult<()> {
        if options.readonly {
            for statement in statements {
                ensure_read_only(&statement.sql)?;
            }
        }
        debug!(
            caller = options.caller(),
            statements = statements.len(),
            "Executing script in one transaction"
        );

        let statements = statements.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for statement in &statements {
                run_statement(&tx, &statement.sql, &statement.params)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn checkpoint(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch("CHECKPOINT")?;
            Ok(())
        })
        .await
    }
}
