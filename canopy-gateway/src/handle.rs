//! Query handles bound to one extension's permissions.

use crate::{AccessMode, Decision, validate};
use async_trait::async_trait;
use canopy_storage::{
    ExecuteOptions, QueryExecutor, QueryResult, ScriptStatement, StorageError, StorageResult,
};
use canopy_types::PermissionContext;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The only database access an extension ever receives.
///
/// Every call is validated against the bound [`PermissionContext`] before
/// it reaches the inner executor; a denial surfaces as
/// [`StorageError::PermissionDenied`]. The handle also implements
/// [`QueryExecutor`], so anything that runs SQL for an extension (the
/// migration runner included) can be pointed at it.
#[derive(Clone)]
pub struct ScopedQueryHandle {
    context: Arc<PermissionContext>,
    inner: Arc<dyn QueryExecutor>,
}

impl ScopedQueryHandle {
    #[must_use]
    pub fn new(context: PermissionContext, inner: Arc<dyn QueryExecutor>) -> Self {
        Self {
            context: Arc::new(context),
            inner,
        }
    }

    #[must_use]
    pub fn context(&self) -> &PermissionContext {
        &self.context
    }

    /// Runs the gateway check without executing anything.
    pub fn check(&self, sql: &str, mode: AccessMode) -> StorageResult<()> {
        match validate(&self.context, sql, mode) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(
                    extension_id = %self.context.extension_id,
                    mode = %mode,
                    reason = %reason,
                    "Query denied"
                );
                Err(StorageError::PermissionDenied {
                    extension_id: self.context.extension_id.to_string(),
                    reason: reason.to_string(),
                })
            }
        }
    }

    /// Runs a read-only query.
    pub async fn read(&self, sql: &str, params: &[Value]) -> StorageResult<QueryResult> {
        self.execute(sql, params, &ExecuteOptions::read()).await
    }

    /// Runs a statement that may write.
    pub async fn write(&self, sql: &str, params: &[Value]) -> StorageResult<QueryResult> {
        self.execute(sql, params, &ExecuteOptions::write()).await
    }

    fn scoped_options(&self, options: &ExecuteOptions) -> ExecuteOptions {
        ExecuteOptions {
            readonly: options.readonly,
            permission_context: Some(PermissionContext::clone(&self.context)),
        }
    }
}

fn mode_for(options: &ExecuteOptions) -> AccessMode {
    if options.readonly {
        AccessMode::Read
    } else {
        AccessMode::Write
    }
}

#[async_trait]
impl QueryExecutor for ScopedQueryHandle {
    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        options: &ExecuteOptions,
    ) -> StorageResult<QueryResult> {
        self.check(sql, mode_for(options))?;
        self.inner
            .execute(sql, params, &self.scoped_options(options))
            .await
    }

    async fn execute_script(
        &self,
        statements: &[ScriptStatement],
        options: &ExecuteOptions,
    ) -> StorageResult<()> {
        let mode = mode_for(options);
        for statement in statements {
            self.check(&statement.sql, mode)?;
        }
        self.inner
            .execute_script(statements, &self.scoped_options(options))
            .await
    }

    async fn checkpoint(&self) -> StorageResult<()> {
        self.inner.checkpoint().await
    }
}

impl fmt::Debug for ScopedQueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedQueryHandle")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
