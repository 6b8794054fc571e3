//! Gateway verdicts.

use std::fmt;
use thiserror::Error;

/// Whether the caller asked to read or to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenialReason {
    #[error("SQL parse error: {0}")]
    Unparseable(String),

    #[error("{0} statements are not permitted")]
    UnsupportedStatement(String),

    #[error("data-modifying statements nested inside a query are not permitted")]
    NestedStatement,

    #[error("table function '{0}' is not permitted")]
    TableFunction(String),

    #[error("table expression '{0}' is not permitted")]
    UnsupportedTableExpression(String),

    #[error("unrecognized table reference '{0}'")]
    UnrecognizedReference(String),

    #[error("cannot write to '{0}' from a read-only query")]
    WriteInReadMode(String),

    #[error("cannot read from '{0}': not in the declared read permissions")]
    ReadNotPermitted(String),

    #[error("cannot write to '{0}': not in the declared write permissions")]
    WriteNotPermitted(String),

    #[error("schema '{0}' is not this extension's private schema")]
    ForeignSchema(String),
}

/// Outcome of [`validate`](crate::validate).
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialReason),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}
