//! Structural extraction of the tables a statement touches.
//!
//! Write targets come from the statement itself. Reads are collected by
//! walking the whole AST with a [`Visitor`], so every relation in every
//! subquery, join, set operation and expression is seen. CTE names are
//! resolved with proper scoping: a CTE body only sees the CTEs declared
//! before it (all of them under `WITH RECURSIVE`), and a CTE never hides a
//! schema-qualified name.

use crate::{DenialReason, TableRef};
use sqlparser::ast::{
    FromTable, ObjectName, ObjectType, Query, SchemaName, SetExpr, Statement, TableFactor,
    TableObject, Visit, Visitor,
};
use std::collections::HashSet;
use std::ops::ControlFlow;

/// Table functions that only generate values.
const GENERATOR_FUNCTIONS: &[&str] = &["range", "generate_series", "unnest"];

/// Something a statement writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteTarget {
    Table(TableRef),
    Schema(String),
}

/// Everything one statement touches.
#[derive(Debug, Default)]
pub(crate) struct StatementAccess {
    pub writes: Vec<WriteTarget>,
    pub reads: Vec<TableRef>,
}

pub(crate) fn extract(statement: &Statement) -> Result<StatementAccess, DenialReason> {
    let mut collector = Collector::default();
    collect_write_targets(statement, &mut collector)?;
    if let ControlFlow::Break(reason) = statement.visit(&mut collector) {
        return Err(reason);
    }
    Ok(StatementAccess {
        writes: collector.writes,
        reads: collector.reads,
    })
}

fn collect_write_targets(
    statement: &Statement,
    collector: &mut Collector,
) -> Result<(), DenialReason> {
    match statement {
        Statement::Query(_) => {}

        Statement::Insert(insert) => match &insert.table {
            TableObject::TableName(name) => collector.write_table(name)?,
            TableObject::TableFunction(func) => {
                return Err(DenialReason::TableFunction(func.name.to_string()));
            }
        },

        Statement::Update(update) => match &update.table.relation {
            TableFactor::Table { name, args: None, .. } => collector.write_table(name)?,
            other => {
                return Err(DenialReason::UnsupportedTableExpression(other.to_string()));
            }
        },

        Statement::Delete(delete) => {
            if !delete.tables.is_empty() {
                return Err(DenialReason::UnsupportedStatement("multi-table DELETE".into()));
            }
            let targets = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
            };
            for twj in targets {
                match &twj.relation {
                    TableFactor::Table { name, args: None, .. } => collector.write_table(name)?,
                    other => {
                        return Err(DenialReason::UnsupportedTableExpression(other.to_string()));
                    }
                }
            }
        }

        Statement::CreateTable(create_table) => collector.write_table(&create_table.name)?,

        Statement::AlterTable(alter_table) => collector.write_table(&alter_table.name)?,

        Statement::CreateIndex(create_index) => collector.write_table(&create_index.table_name)?,

        Statement::Drop {
            object_type, names, ..
        } => {
            for name in names {
                if matches!(object_type, ObjectType::Schema) {
                    collector.write_schema(name)?;
                } else {
                    collector.write_table(name)?;
                }
            }
        }

        Statement::CreateSchema { schema_name, .. } => match schema_name {
            SchemaName::Simple(name) | SchemaName::NamedAuthorization(name, _) => {
                collector.write_schema(name)?;
            }
            SchemaName::UnnamedAuthorization(ident) => {
                return Err(DenialReason::ForeignSchema(ident.value.clone()));
            }
        },

        other => return Err(DenialReason::UnsupportedStatement(statement_keyword(other))),
    }
    Ok(())
}

/// Leading keyword of a statement, for messages.
pub(crate) fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
}

/// `TABLE name` shorthand names a relation without an `ObjectName`.
fn uses_table_shorthand(body: &SetExpr) -> bool {
    match body {
        SetExpr::Table(_) => true,
        SetExpr::SetOperation { left, right, .. } => {
            uses_table_shorthand(left) || uses_table_shorthand(right)
        }
        _ => false,
    }
}

/// CTE visibility for one query level.
struct Scope {
    /// Names visible to whatever encloses this query's `WITH`.
    outer: HashSet<String>,
    /// Names visible to this query's body.
    visible: HashSet<String>,
    /// Declared CTEs in order, with the address of each body.
    ctes: Vec<(String, *const Query)>,
    recursive: bool,
}

#[derive(Default)]
struct Collector {
    scopes: Vec<Scope>,
    /// Names already accounted for as write targets.
    write_names: Vec<*const ObjectName>,
    /// Names of permitted generator functions in FROM.
    generator_names: Vec<*const ObjectName>,
    seen_statement: bool,
    writes: Vec<WriteTarget>,
    reads: Vec<TableRef>,
}

impl Collector {
    fn write_table(&mut self, name: &ObjectName) -> Result<(), DenialReason> {
        self.write_names.push(name);
        self.writes
            .push(WriteTarget::Table(TableRef::from_object_name(name)?));
        Ok(())
    }

    fn write_schema(&mut self, name: &ObjectName) -> Result<(), DenialReason> {
        self.write_names.push(name);
        let schema = TableRef::from_object_name(name)?;
        if schema.schema.is_some() {
            return Err(DenialReason::UnrecognizedReference(name.to_string()));
        }
        self.writes.push(WriteTarget::Schema(schema.table));
        Ok(())
    }

    fn is_cte(&self, table: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.visible.contains(table))
    }

    /// CTE names a query inherits from its enclosing scope.
    fn inherited_names(&self, query: &Query) -> HashSet<String> {
        let Some(parent) = self.scopes.last() else {
            return HashSet::new();
        };
        match parent
            .ctes
            .iter()
            .position(|(_, body)| std::ptr::eq(*body, query))
        {
            Some(idx) => {
                let upto = if parent.recursive {
                    parent.ctes.len()
                } else {
                    idx
                };
                let mut names = parent.outer.clone();
                names.extend(parent.ctes[..upto].iter().map(|(n, _)| n.clone()));
                names
            }
            None => parent.visible.clone(),
        }
    }
}

impl Visitor for Collector {
    type Break = DenialReason;

    fn pre_visit_statement(&mut self, _statement: &Statement) -> ControlFlow<Self::Break> {
        if self.seen_statement {
            return ControlFlow::Break(DenialReason::NestedStatement);
        }
        self.seen_statement = true;
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if uses_table_shorthand(&query.body) {
            return ControlFlow::Break(DenialReason::UnsupportedStatement("TABLE".into()));
        }
        let outer = self.inherited_names(query);
        let (ctes, recursive) = match &query.with {
            Some(with) => (
                with.cte_tables
                    .iter()
                    .map(|cte| {
                        (
                            cte.alias.name.value.to_ascii_lowercase(),
                            &*cte.query as *const Query,
                        )
                    })
                    .collect::<Vec<_>>(),
                with.recursive,
            ),
            None => (Vec::new(), false),
        };
        let mut visible = outer.clone();
        visible.extend(ctes.iter().map(|(n, _)| n.clone()));
        self.scopes.push(Scope {
            outer,
            visible,
            ctes,
            recursive,
        });
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.scopes.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        match factor {
            TableFactor::Table {
                name,
                args: Some(_),
                ..
            } => {
                let lowered = name.to_string().to_ascii_lowercase();
                if GENERATOR_FUNCTIONS.contains(&lowered.as_str()) {
                    self.generator_names.push(name);
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(DenialReason::TableFunction(name.to_string()))
                }
            }
            TableFactor::Table { .. }
            | TableFactor::Derived { .. }
            | TableFactor::NestedJoin { .. }
            | TableFactor::UNNEST { .. } => ControlFlow::Continue(()),
            other => ControlFlow::Break(DenialReason::UnsupportedTableExpression(
                other.to_string(),
            )),
        }
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let seen = |names: &[*const ObjectName]| {
            names.iter().any(|n| std::ptr::eq(*n, relation))
        };
        if seen(&self.write_names) || seen(&self.generator_names) {
            return ControlFlow::Continue(());
        }
        let table = match TableRef::from_object_name(relation) {
            Ok(table) => table,
            Err(reason) => return ControlFlow::Break(reason),
        };
        if table.schema.is_none() && self.is_cte(&table.table) {
            return ControlFlow::Continue(());
        }
        self.reads.push(table);
        ControlFlow::Continue(())
    }
}
