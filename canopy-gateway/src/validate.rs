//! The allow-list check.

use crate::extract::{WriteTarget, extract};
use crate::{AccessMode, Decision, DenialReason, TableRef};
use canopy_storage::parse_statements;
use canopy_types::PermissionContext;

/// Decides whether `sql` may run for the extension described by `ctx`.
///
/// Every statement in `sql` must pass. Inside the private schema everything
/// is allowed. Outside it, each written table must match `allowed_writes`
/// and each read table must match `allowed_reads`. In [`AccessMode::Read`]
/// any write at all is refused.
///
/// Never blocks and never touches the database.
pub fn validate(ctx: &PermissionContext, sql: &str, mode: AccessMode) -> Decision {
    match check(ctx, sql, mode) {
        Ok(()) => Decision::Allow,
        Err(reason) => Decision::Deny(reason),
    }
}

fn check(ctx: &PermissionContext, sql: &str, mode: AccessMode) -> Result<(), DenialReason> {
    let statements = parse_statements(sql)
        .map_err(|e| DenialReason::Unparseable(e.to_string()))?;

    for statement in &statements {
        let access = extract(statement)?;
        for target in &access.writes {
            if mode == AccessMode::Read {
                return Err(DenialReason::WriteInReadMode(target_name(target)));
            }
            check_write(ctx, target)?;
        }
        for table in &access.reads {
            check_read(ctx, table)?;
        }
    }
    Ok(())
}

fn target_name(target: &WriteTarget) -> String {
    match target {
        WriteTarget::Table(table) => table.to_string(),
        WriteTarget::Schema(schema) => schema.clone(),
    }
}

fn check_write(ctx: &PermissionContext, target: &WriteTarget) -> Result<(), DenialReason> {
    match target {
        WriteTarget::Schema(schema) => {
            if ctx.private_schema.matches(schema) {
                Ok(())
            } else {
                Err(DenialReason::ForeignSchema(schema.clone()))
            }
        }
        WriteTarget::Table(table) => {
            if table.is_in(&ctx.private_schema)
                || ctx.allowed_writes.iter().any(|g| table.matches_grant(g))
            {
                Ok(())
            } else {
                Err(DenialReason::WriteNotPermitted(table.to_string()))
            }
        }
    }
}

fn check_read(ctx: &PermissionContext, table: &TableRef) -> Result<(), DenialReason> {
    if table.is_in(&ctx.private_schema) || ctx.allowed_reads.iter().any(|g| table.matches_grant(g))
    {
        Ok(())
    } else {
        Err(DenialReason::ReadNotPermitted(table.to_string()))
    }
}
