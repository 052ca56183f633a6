//! Joins between sources.

use serde::{Deserialize, Serialize};

use super::column::ColumnRef;
use super::predicate::Predicate;
use super::source::{Source, SourceId};

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Matching rows only.
    Inner,
    /// All rows of the left side.
    Left,
    /// All rows of the right side.
    Right,
    /// All rows of both sides (full outer join).
    Merge,
}

impl JoinType {
    /// Keyword used when rendering plans.
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Merge => "FULL JOIN",
        }
    }
}

/// An equi-join of `target` onto the sources before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Parent-side source.
    pub source: SourceId,
    /// Joined source.
    pub target: Source,
    /// Join type.
    pub join_type: JoinType,
    /// (parent-side, target-side) equality pairs.
    pub statements: Vec<(ColumnRef, ColumnRef)>,
    /// Additional condition on the joined rows.
    pub filter: Option<Predicate>,
    /// Link table this join passes through, for many-to-many navigations.
    pub intermediate: Option<String>,
}

impl Join {
    /// Create a join.
    pub fn new(
        source: SourceId,
        target: Source,
        join_type: JoinType,
        statements: Vec<(ColumnRef, ColumnRef)>,
    ) -> Self {
        Self {
            source,
            target,
            join_type,
            statements,
            filter: None,
            intermediate: None,
        }
    }

    /// Add a condition on the joined rows.
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Record the link table this join passes through.
    pub fn with_intermediate(mut self, table: impl Into<String>) -> Self {
        self.intermediate = Some(table.into());
        self
    }
}
