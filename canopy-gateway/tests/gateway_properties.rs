//! Property tests for the allow-list rules.

use canopy_gateway::{AccessMode, validate};
use canopy_types::{ExtensionId, PermissionContext, PrivateSchema};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn table_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_filter("not a keyword", |s| {
        !matches!(
            s.as_str(),
            "select" | "from" | "where" | "table" | "set" | "values" | "as" | "on" | "in" | "by"
                | "or" | "and" | "not" | "is" | "to" | "all" | "end" | "case" | "when" | "then"
                | "else" | "join" | "left" | "right" | "full" | "inner" | "outer" | "cross"
                | "union" | "except" | "intersect" | "order" | "group" | "having" | "limit"
                | "offset" | "with" | "into" | "null" | "true" | "false" | "default" | "natural"
                | "using" | "window" | "qualify" | "asc" | "desc" | "do" | "if" | "of" | "at"
                | "for" | "only" | "some" | "any" | "like" | "between" | "exists" | "range"
                | "unnest" | "generate_series" | "returning" | "lateral" | "distinct" | "create"
                | "index" | "key" | "primary" | "references" | "check" | "unique" | "cast"
        )
    })
}

fn extension_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,10}"
}

fn grants() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(table_name(), 0..4)
}

fn context(id: &str, reads: Vec<String>, writes: Vec<String>) -> PermissionContext {
    let id = ExtensionId::parse(id).unwrap();
    let schema = PrivateSchema::for_extension(&id);
    PermissionContext::new(id, schema, reads, writes)
}

fn write_statements(target: &str) -> Vec<String> {
    vec![
        format!("INSERT INTO {target} VALUES (1)"),
        format!("UPDATE {target} SET v = 1"),
        format!("DELETE FROM {target}"),
        format!("CREATE TABLE {target} (v INTEGER)"),
        format!("DROP TABLE {target}"),
        format!("ALTER TABLE {target} ADD COLUMN w INTEGER"),
    ]
}

proptest! {
    /// Writes inside the private schema are allowed whatever the allow-lists say.
    #[test]
    fn own_schema_writes_always_allowed(
        id in extension_id(),
        table in table_name(),
        reads in grants(),
        writes in grants(),
    ) {
        let ctx = context(&id, reads, writes);
        let target = format!("{}.{}", ctx.private_schema, table);
        for sql in write_statements(&target) {
            prop_assert!(validate(&ctx, &sql, AccessMode::Write).is_allowed(), "{}", sql);
        }
    }

    /// Reads of tables outside both the allow-list and the private schema are denied.
    #[test]
    fn reads_outside_allow_list_denied(
        id in extension_id(),
        table in table_name(),
        reads in grants(),
    ) {
        prop_assume!(!reads.contains(&table));
        let ctx = context(&id, reads, Vec::new());
        let sql = format!("SELECT * FROM {table}");
        prop_assert!(!validate(&ctx, &sql, AccessMode::Read).is_allowed());
        let qualified = format!("SELECT * FROM main.{table}");
        prop_assert!(!validate(&ctx, &qualified, AccessMode::Read).is_allowed());
    }

    /// Writes outside the write allow-list and the private schema are denied,
    /// even when the table is readable.
    #[test]
    fn writes_outside_allow_list_denied(
        id in extension_id(),
        table in table_name(),
        writes in grants(),
    ) {
        prop_assume!(!writes.contains(&table));
        let ctx = context(&id, vec![table.clone()], writes);
        for sql in write_statements(&table) {
            prop_assert!(!validate(&ctx, &sql, AccessMode::Write).is_allowed(), "{}", sql);
        }
    }

    /// Granted reads pass regardless of the case they are written in.
    #[test]
    fn granted_reads_allowed_in_any_case(
        id in extension_id(),
        table in table_name(),
    ) {
        let ctx = context(&id, vec![table.clone()], Vec::new());
        let sql = format!("SELECT * FROM {}", table.to_uppercase());
        prop_assert!(validate(&ctx, &sql, AccessMode::Read).is_allowed());
    }
}
