//! The query plan.

use std::sync::Arc;
use std::time::Duration;

use graphplan_proto::OrderDirection;

use super::column::{Column, ColumnRef};
use super::join::Join;
use super::predicate::Predicate;
use super::source::{Source, SourceId, SourceKind};
use crate::path::{NodeId, PathTree};

/// What an ordering item sorts by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// A source column.
    Column(ColumnRef),
    /// An output alias (used by aggregate plans).
    Alias(String),
}

/// One ordering item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    /// Sort key.
    pub key: OrderKey,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderItem {
    /// Order by a source column.
    pub fn column(column: ColumnRef, direction: OrderDirection) -> Self {
        Self {
            key: OrderKey::Column(column),
            direction,
        }
    }

    /// Order by an output alias.
    pub fn alias(alias: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            key: OrderKey::Alias(alias.into()),
            direction,
        }
    }
}

/// One group-by clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    /// Grouped columns.
    pub columns: Vec<ColumnRef>,
    /// Produce subtotal rows for every prefix of `columns`.
    pub rollup: bool,
}

/// A flat relational query.
///
/// When branch splitting is in effect the plan itself only describes the
/// result shape: the executable work lives in `seed` and `secondary`, and
/// `path` correlates them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Main source.
    pub source: Source,
    /// Requested columns.
    pub columns: Vec<Column>,
    /// Planner-added columns (keys, discriminators, join columns).
    pub system_columns: Vec<Column>,
    /// Joins in execution order.
    pub joins: Vec<Join>,
    /// Row filter.
    pub filter: Option<Predicate>,
    /// Group-by clauses.
    pub group_by: Vec<GroupBy>,
    /// Ordering.
    pub order_by: Vec<OrderItem>,
    /// Native row limit.
    pub top: Option<u64>,
    /// Native row offset.
    pub skip: Option<u64>,
    /// Drop duplicate output rows.
    pub distinct: bool,
    /// Per-branch plans, correlated to `seed` through `path`.
    pub secondary: Vec<QueryPlan>,
    /// Filtered, ordered and paged root rows.
    pub seed: Option<Box<QueryPlan>>,
    /// Distinct root keys of the seed.
    pub path: Option<Box<QueryPlan>>,
    /// Total count of matching root rows.
    pub count: Option<Box<QueryPlan>>,
    /// Rows are groups rather than entities.
    pub is_aggregate_query: bool,
    /// Path tree the columns refer to. Set on top-level plans only.
    pub tree: Option<Arc<PathTree>>,
    /// Opaque executor timeout.
    pub timeout: Option<Duration>,
}

impl QueryPlan {
    /// Create an empty plan over a source.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            columns: Vec::new(),
            system_columns: Vec::new(),
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            top: None,
            skip: None,
            distinct: false,
            secondary: Vec::new(),
            seed: None,
            path: None,
            count: None,
            is_aggregate_query: false,
            tree: None,
            timeout: None,
        }
    }

    /// Requested columns followed by system columns.
    pub fn all_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().chain(self.system_columns.iter())
    }

    /// Output aliases in row order.
    pub fn output_aliases(&self) -> Vec<String> {
        self.all_columns().map(|c| c.alias.clone()).collect()
    }

    /// Find an output column by alias.
    pub fn column_by_alias(&self, alias: &str) -> Option<&Column> {
        self.all_columns().find(|c| c.alias == alias)
    }

    /// Check if an output alias is taken.
    pub fn has_alias(&self, alias: &str) -> bool {
        self.column_by_alias(alias).is_some()
    }

    /// Check if branch splitting is in effect.
    pub fn is_split(&self) -> bool {
        self.seed.is_some()
    }

    /// Plans an executor must run to answer this plan, in order.
    pub fn executable_plans(&self) -> Vec<&QueryPlan> {
        match &self.seed {
            Some(seed) => std::iter::once(seed.as_ref())
                .chain(self.secondary.iter())
                .collect(),
            None => vec![self],
        }
    }

    /// Output columns belonging to a path node.
    pub fn node_columns(&self, node: NodeId) -> impl Iterator<Item = &Column> {
        self.all_columns().filter(move |c| c.node == node)
    }

    /// Source ids of the main source and every joined source.
    pub fn source_ids(&self) -> Vec<SourceId> {
        std::iter::once(self.source.id)
            .chain(self.joins.iter().map(|j| j.target.id))
            .collect()
    }

    /// Find the main or a joined source by id.
    pub fn find_source(&self, id: SourceId) -> Option<&Source> {
        if self.source.id == id {
            return Some(&self.source);
        }
        self.joins.iter().map(|j| &j.target).find(|s| s.id == id)
    }

    /// Union selects of the main source, if it is a union.
    pub fn union_selects(&self) -> Option<&[QueryPlan]> {
        match &self.source.kind {
            SourceKind::Union(selects) => Some(selects),
            _ => None,
        }
    }
}
