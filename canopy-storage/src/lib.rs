//! DuckDB execution layer.
//!
//! Everything an extension reads or writes goes through a [`QueryExecutor`].
//! The production implementation, [`DuckDbExecutor`], owns a single
//! connection to the shared database and runs statements on the blocking
//! pool so callers stay cooperative.
//!
//! The executor enforces `readonly` on its own by parsing each statement;
//! it does not rely on the permission gateway for that.

mod dialect;
mod duckdb_executor;
mod error;
mod executor;
mod readonly;
mod script;
mod value;

pub use dialect::parse_statements;
pub use duckdb_executor::DuckDbExecutor;
pub use error::{StorageError, StorageResult};
pub use executor::{ExecuteOptions, QueryExecutor, QueryResult, ScriptStatement};
pub use readonly::ensure_read_only;
pub use script::split_statements;

use canopy_types::Timestamp;
use std::path::{Path, PathBuf};
use tracing::error;

/// Open a DuckDB connection, setting aside a WAL that prevents opening.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is renamed to `<wal>.<millis>.bak` and the open is retried once.
/// Transactions that only reached that WAL are missing from the reopened
/// database, migrations and ledger rows included; the renamed file is kept
/// for manual recovery.
pub fn open_duckdb_with_wal_recovery(path: &Path) -> StorageResult<duckdb::Connection> {
    match duckdb::Connection::open(path) {
        Ok(conn) => Ok(conn),
        Err(first_err) => {
            let wal_path = wal_path(path);
            if !wal_path.exists() {
                return Err(first_err.into());
            }
            match set_aside_wal(&wal_path) {
                Ok(moved) => {
                    error!(
                        wal = %wal_path.display(),
                        moved_to = %moved.display(),
                        error = %first_err,
                        "DuckDB open failed; WAL set aside, uncheckpointed writes are not in the database"
                    );
                    duckdb::Connection::open(path).map_err(Into::into)
                }
                Err(e) => {
                    error!(wal = %wal_path.display(), error = %e, "Could not set aside WAL");
                    Err(first_err.into())
                }
            }
        }
    }
}

fn wal_path(db_path: &Path) -> PathBuf {
    db_path.with_extension(
        db_path
            .extension()
            .map(|ext| format!("{}.wal", ext.to_string_lossy()))
            .unwrap_or_else(|| "wal".to_string()),
    )
}

/// Renames the WAL out of DuckDB's way and returns where it went.
fn set_aside_wal(wal_path: &Path) -> std::io::Result<PathBuf> {
    let mut name = wal_path.as_os_str().to_owned();
    name.push(format!(".{}.bak", Timestamp::now().as_millis()));
    let moved = PathBuf::from(name);
    std::fs::rename(wal_path, &moved)?;
    Ok(moved)
}
