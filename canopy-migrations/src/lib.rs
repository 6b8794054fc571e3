//! Migration runner.
//!
//! Brings an extension's private schema up to the newest version declared
//! in its manifest. The ledger table `<schema>._migrations` records every
//! applied version; its maximum is the schema's current version.

mod error;
mod ledger;
mod runner;

pub use error::{MigrationError, MigrationResult};
pub use ledger::{LEDGER_TABLE, LedgerEntry};
pub use runner::{MigrationReport, MigrationRunner, plan_migrations};
