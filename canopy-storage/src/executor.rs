//! The execution seam between extensions and the database.

use crate::StorageResult;
use async_trait::async_trait;
use canopy_types::PermissionContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options accompanying every call.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Refuse anything that is not a query.
    pub readonly: bool,
    /// Who the statement runs for, when it runs for an extension.
    pub permission_context: Option<PermissionContext>,
}

impl ExecuteOptions {
    #[must_use]
    pub fn read() -> Self {
        Self {
            readonly: true,
            permission_context: None,
        }
    }

    #[must_use]
    pub fn write() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context(mut self, context: PermissionContext) -> Self {
        self.permission_context = Some(context);
        self
    }

    /// Extension id for log fields, `"host"` when unscoped.
    #[must_use]
    pub fn caller(&self) -> &str {
        self.permission_context
            .as_ref()
            .map_or("host", |c| c.extension_id.as_str())
    }
}

/// Rows returned by a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows returned for queries, rows changed for everything else.
    pub row_count: usize,
}

impl QueryResult {
    /// Value of `column` in the first row.
    #[must_use]
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.first().and_then(|r| r.get(idx))
    }
}

/// One statement of a script together with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl ScriptStatement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Runs SQL against the shared database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `sql` with positional parameters.
    ///
    /// `sql` may hold several statements when `params` is empty; the result
    /// of the last one is returned.
    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        options: &ExecuteOptions,
    ) -> StorageResult<QueryResult>;

    /// Executes every statement in one transaction. Either all of them
    /// commit or none do.
    async fn execute_script(
        &self,
        statements: &[ScriptStatement],
        options: &ExecuteOptions,
    ) -> StorageResult<()>;

    /// Flushes the write-ahead log into the main database file.
    async fn checkpoint(&self) -> StorageResult<()>;
}
