//! Resolved table references and allow-list matching.

use crate::DenialReason;
use canopy_types::{DEFAULT_SCHEMA, PrivateSchema, WILDCARD_GRANT};
use sqlparser::ast::ObjectName;
use std::fmt;

/// A table named by a statement, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// `None` for an unqualified name, which resolves to `main`.
    pub schema: Option<String>,
    pub table: String,
}

fn is_safe_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TableRef {
    /// Resolves a parsed name. Anything but `table` or `schema.table` made of
    /// plain identifier characters is refused.
    pub(crate) fn from_object_name(name: &ObjectName) -> Result<Self, DenialReason> {
        let unrecognized = || DenialReason::UnrecognizedReference(name.to_string());
        let mut parts = Vec::with_capacity(name.0.len());
        for part in &name.0 {
            let ident = part.as_ident().ok_or_else(unrecognized)?;
            if ident.quote_style == Some('\'') || !is_safe_ident(&ident.value) {
                return Err(unrecognized());
            }
            parts.push(ident.value.to_ascii_lowercase());
        }
        match parts.as_mut_slice() {
            [table] => Ok(Self {
                schema: None,
                table: std::mem::take(table),
            }),
            [schema, table] => Ok(Self {
                schema: Some(std::mem::take(schema)),
                table: std::mem::take(table),
            }),
            _ => Err(unrecognized()),
        }
    }

    /// Schema the reference resolves to.
    #[must_use]
    pub fn effective_schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    #[must_use]
    pub fn is_in(&self, schema: &PrivateSchema) -> bool {
        self.schema.as_deref().is_some_and(|s| schema.matches(s))
    }

    /// Whether an allow-list entry covers this table.
    ///
    /// `"*"` covers everything outside extension-private schemas. `table`
    /// and `main.table` are equivalent.
    #[must_use]
    pub fn matches_grant(&self, grant: &str) -> bool {
        if grant == WILDCARD_GRANT {
            return !PrivateSchema::is_reserved(self.effective_schema());
        }
        let grant = grant.to_ascii_lowercase();
        let (schema, table) = grant
            .split_once('.')
            .unwrap_or((DEFAULT_SCHEMA, grant.as_str()));
        self.table == table && self.effective_schema() == schema
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}
