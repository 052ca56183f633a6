//! Relational sources.

use std::fmt;

use super::query::QueryPlan;
use crate::path::NodeId;

/// Identifier of a source, unique within one executable plan and the
/// plans nested in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Alias used when rendering the source.
    pub fn alias(self) -> String {
        format!("t{}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Allocates [`SourceId`]s for one plan build.
#[derive(Debug, Default)]
pub struct SourceIds {
    next: u32,
}

impl SourceIds {
    /// Start allocating from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> SourceId {
        let id = SourceId(self.next);
        self.next += 1;
        id
    }
}

/// What a source reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// A storage table.
    Table { table: String },
    /// A nested plan.
    Select(Box<QueryPlan>),
    /// Several plans with identical alias lists, concatenated.
    Union(Vec<QueryPlan>),
    /// Backend-specific text, passed through verbatim.
    Script(String),
}

/// One relational origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Source id.
    pub id: SourceId,
    /// Payload.
    pub kind: SourceKind,
    /// Path node whose elements this source yields, if any.
    pub node: Option<NodeId>,
}

impl Source {
    /// A table source.
    pub fn table(id: SourceId, table: impl Into<String>, node: Option<NodeId>) -> Self {
        Self {
            id,
            kind: SourceKind::Table {
                table: table.into(),
            },
            node,
        }
    }

    /// A nested plan source.
    pub fn select(id: SourceId, plan: QueryPlan, node: Option<NodeId>) -> Self {
        Self {
            id,
            kind: SourceKind::Select(Box::new(plan)),
            node,
        }
    }

    /// A union source.
    pub fn union(id: SourceId, selects: Vec<QueryPlan>, node: Option<NodeId>) -> Self {
        Self {
            id,
            kind: SourceKind::Union(selects),
            node,
        }
    }

    /// Check if columns of this source are addressed by storage column
    /// name rather than by member name.
    pub fn is_table(&self) -> bool {
        matches!(self.kind, SourceKind::Table { .. })
    }

    /// Check if this is a union source.
    pub fn is_union(&self) -> bool {
        matches!(self.kind, SourceKind::Union(_))
    }
}
