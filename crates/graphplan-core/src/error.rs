//! Core error types.

use thiserror::Error;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Metadata or request shape is invalid. Raised at plan-build time.
    Configuration,
    /// The request shape is valid but not supported by the planner.
    Unsupported,
    /// Rows returned by the executor cannot be assembled into a graph.
    DataInconsistency,
    /// The executor or a typed conversion failed.
    Execution,
}

/// Planner, materializer and executor errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The type is not registered with the metadata.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// A property does not exist on the type it was resolved against.
    #[error("illegal column '{property}' on type '{type_name}'")]
    IllegalColumn { property: String, type_name: String },

    /// No join keys could be resolved for a navigation.
    #[error("cannot resolve join for navigation '{path}' on type '{parent}'")]
    UnresolvedJoin { parent: String, path: String },

    /// Two nodes have no consistent key pairing.
    #[error("mismatched nodes cannot be joined: '{left}' and '{right}'")]
    MismatchedNodes { left: String, right: String },

    /// A non-rollup group-by item must reference exactly one column.
    #[error("group-by item must reference exactly one column, got {columns}")]
    InvalidGroupBy { columns: usize },

    /// An aggregate over several properties has no alias.
    #[error("aggregate over [{properties}] requires an alias")]
    MissingAggregateAlias { properties: String },

    /// No aggregate function was given and the property declares no default.
    #[error("no aggregate function for '{property}' on type '{type_name}'")]
    MissingAggregateKind { property: String, type_name: String },

    /// An expand path is nested deeper than the configured budget.
    #[error("path '{path}' exceeds maximum depth {max_depth}")]
    ExpandTooDeep { path: String, max_depth: usize },

    /// More expand branches than the configured budget.
    #[error("{count} expansions exceed the maximum of {max_branches}")]
    ExpandTooWide { count: usize, max_branches: usize },

    /// Type descriptors are inconsistent.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Planner configuration could not be read.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The request shape is not supported.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Returned rows do not fit the plan's node hierarchy.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// The executor failed.
    #[error("executor error: {0}")]
    Executor(String),

    /// A record could not be converted into the requested type.
    #[error("materialization error: {0}")]
    Materialize(String),

    /// Request IR error.
    #[error("request error: {0}")]
    Proto(#[from] graphplan_proto::Error),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownType(_)
            | Error::IllegalColumn { .. }
            | Error::UnresolvedJoin { .. }
            | Error::MismatchedNodes { .. }
            | Error::InvalidGroupBy { .. }
            | Error::MissingAggregateAlias { .. }
            | Error::MissingAggregateKind { .. }
            | Error::ExpandTooDeep { .. }
            | Error::ExpandTooWide { .. }
            | Error::InvalidMetadata(_)
            | Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::DataInconsistency(_) => ErrorKind::DataInconsistency,
            Error::Executor(_) | Error::Materialize(_) | Error::Proto(_) => ErrorKind::Execution,
        }
    }

    pub(crate) fn illegal_column(property: impl Into<String>, type_name: impl Into<String>) -> Self {
        Error::IllegalColumn {
            property: property.into(),
            type_name: type_name.into(),
        }
    }
}
