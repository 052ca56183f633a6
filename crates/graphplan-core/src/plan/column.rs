//! Plan columns.

use std::fmt;

use graphplan_proto::{AggregateKind, Value};

use super::source::SourceId;
use crate::metadata::{ScalarType, TypeColumn};
use crate::path::NodeId;

/// A reference to a column exposed by a source.
///
/// `name` is the storage column for table sources and the inner alias for
/// select and union sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Owning source.
    pub source: SourceId,
    /// Name within the source.
    pub name: String,
}

impl ColumnRef {
    /// Create a reference.
    pub fn new(source: SourceId, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.name)
    }
}

/// How a column value is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    /// Read `name` from `source`.
    Field,
    /// A typed NULL placeholder.
    Null,
    /// A constant value.
    Constant(Value),
    /// An aggregate over other columns; no arguments means all rows.
    Aggregate {
        kind: AggregateKind,
        args: Vec<ColumnRef>,
    },
}

/// An output column of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Storage-side name (see [`ColumnRef`]).
    pub name: String,
    /// Output alias, unique within the plan.
    pub alias: String,
    /// Owning source.
    pub source: SourceId,
    /// Path node the value belongs to.
    pub node: NodeId,
    /// Logical member name on the node's type.
    pub member: String,
    /// Scalar type, when known.
    pub scalar: Option<ScalarType>,
    /// Part of the node type's key.
    pub is_key: bool,
    /// Type declaring the member.
    pub declaring_type: String,
    /// Column accepts nulls.
    pub nullable: bool,
    /// Declared size.
    pub size: Option<u32>,
    /// Backend-computed.
    pub computed: bool,
    /// Added by the planner rather than requested.
    pub system: bool,
    /// Carries the concrete type of polymorphic rows.
    pub discriminator: bool,
    /// Value expression.
    pub expr: ColumnExpr,
}

impl Column {
    /// A field column for a type member.
    pub fn field(
        source: SourceId,
        name: impl Into<String>,
        alias: impl Into<String>,
        node: NodeId,
        column: &TypeColumn,
    ) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            source,
            node,
            member: column.member.name.clone(),
            scalar: column.scalar(),
            is_key: column.member.key,
            declaring_type: column.declaring_type.clone(),
            nullable: column.member.nullable,
            size: column.member.size,
            computed: column.member.computed,
            system: false,
            discriminator: false,
            expr: ColumnExpr::Field,
        }
    }

    /// A column with no backing member, such as an aggregate or constant.
    pub fn computed(
        source: SourceId,
        name: impl Into<String>,
        alias: impl Into<String>,
        node: NodeId,
        expr: ColumnExpr,
    ) -> Self {
        let alias = alias.into();
        Self {
            name: name.into(),
            member: alias.clone(),
            alias,
            source,
            node,
            scalar: None,
            is_key: false,
            declaring_type: String::new(),
            nullable: true,
            size: None,
            computed: true,
            system: false,
            discriminator: false,
            expr,
        }
    }

    /// Mark as a planner-added column.
    pub fn into_system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Reference to the value this column reads.
    pub fn reference(&self) -> ColumnRef {
        ColumnRef::new(self.source, self.name.clone())
    }

    /// Check if this column computes an aggregate.
    pub fn is_aggregate(&self) -> bool {
        matches!(self.expr, ColumnExpr::Aggregate { .. })
    }
}
