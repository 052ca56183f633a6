//! Hierarchical query request IR.
//!
//! A [`QueryRequest`] is the already-parsed form of a request such as
//! `/Orders?$filter=Lines/any(l: l/Sku eq 'X')&$expand=Lines,Notes&$top=10`.
//! Expansions are a flat list with path-based nesting (`"Lines"`,
//! `"Lines/Product"`), like select and filter paths.

use std::time::Duration;

use crate::filter::{FilterExpr, PATH_SEPARATOR};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Property path to order by.
    pub property: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    /// Count of rows (or of non-null values when a property is given).
    Count,
    /// Count of distinct non-null values.
    CountDistinct,
    /// Sum of numeric values.
    Sum,
    /// Average of numeric values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Backend-defined function over one or more properties.
    Custom(String),
}

impl AggregateKind {
    /// Function name used when rendering plans.
    pub fn name(&self) -> &str {
        match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::CountDistinct => "COUNT_DISTINCT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
            AggregateKind::Custom(name) => name,
        }
    }
}

/// One `aggregate(...)` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Aggregate function; `None` uses the property's declared default.
    pub kind: Option<AggregateKind>,
    /// Property paths the aggregate ranges over (empty for `COUNT(*)`).
    pub properties: Vec<String>,
    /// Output alias. Required when more than one property is aggregated.
    pub alias: Option<String>,
}

impl AggregateSpec {
    /// Aggregate a single property with an explicit function.
    pub fn new(kind: AggregateKind, property: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            properties: vec![property.into()],
            alias: None,
        }
    }

    /// `COUNT(*)`.
    pub fn count() -> Self {
        Self {
            kind: Some(AggregateKind::Count),
            properties: vec![],
            alias: None,
        }
    }

    /// Aggregate a single property with its declared default function.
    pub fn default_for(property: impl Into<String>) -> Self {
        Self {
            kind: None,
            properties: vec![property.into()],
            alias: None,
        }
    }

    /// Aggregate several properties with one function.
    pub fn multi(kind: AggregateKind, properties: Vec<String>) -> Self {
        Self {
            kind: Some(kind),
            properties,
            alias: None,
        }
    }

    /// Set the output alias (`with ... as Alias`).
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// One `groupby(...)` item.
///
/// A plain item groups by exactly one property; a rollup item lists the
/// properties of a `rollup(...)` hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupBySpec {
    /// Property paths.
    pub properties: Vec<String>,
    /// Whether this item is a rollup.
    pub rollup: bool,
}

impl GroupBySpec {
    /// Group by one property.
    pub fn property(property: impl Into<String>) -> Self {
        Self {
            properties: vec![property.into()],
            rollup: false,
        }
    }

    /// Rollup over a property hierarchy.
    pub fn rollup(properties: Vec<String>) -> Self {
        Self {
            properties,
            rollup: true,
        }
    }
}

/// An expanded navigation path, optionally with its own paging.
///
/// The `path` uses `/` for nested navigations:
/// - `"Lines"` - expand lines of the root entity
/// - `"Lines/Product"` - expand the product of each line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandSpec {
    /// Navigation path from the root type.
    pub path: String,
    /// Properties to select from the expanded entity (empty = all).
    pub select: Vec<String>,
    /// Optional filter for the expanded entities.
    pub filter: Option<FilterExpr>,
    /// Ordering for the expanded entities.
    pub order_by: Vec<OrderSpec>,
    /// Maximum entities per parent.
    pub top: Option<u64>,
    /// Entities to skip per parent.
    pub skip: Option<u64>,
}

impl ExpandSpec {
    /// Create a new expansion for a navigation path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: vec![],
            filter: None,
            order_by: vec![],
            top: None,
            skip: None,
        }
    }

    /// Set the properties to select.
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    /// Set a filter for this expansion.
    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add ordering for this expansion.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Limit entities per parent.
    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    /// Skip entities per parent.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Get the navigation name (last segment of the path).
    pub fn navigation_name(&self) -> &str {
        self.path.rsplit(PATH_SEPARATOR).next().unwrap_or(&self.path)
    }

    /// Get the parent path (all segments except the last).
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent)
    }

    /// Check if this is a top-level expansion.
    pub fn is_top_level(&self) -> bool {
        !self.path.contains(PATH_SEPARATOR)
    }

    /// Get the depth of this expansion (number of separators + 1).
    pub fn depth(&self) -> usize {
        self.path.matches(PATH_SEPARATOR).count() + 1
    }

    /// Whether this expansion carries its own paging clause.
    pub fn has_paging(&self) -> bool {
        self.top.is_some() || self.skip.is_some()
    }
}

/// A key predicate on an ancestor segment of a navigation URL.
///
/// For `/Customers(5)/Orders(1)/Lines` queried with root type `OrderLine`,
/// the scope is `[Order via "Lines" with Id=1, Customer via "Orders" with Id=5]`,
/// nearest ancestor first. `navigation` is the member on the ancestor type
/// that leads to the previous (child) segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorKey {
    /// The ancestor's entity type.
    pub ancestor_type: String,
    /// Navigation member on the ancestor leading towards the root.
    pub navigation: String,
    /// Key member values identifying the ancestor.
    pub keys: Vec<(String, Value)>,
}

impl AncestorKey {
    /// Create an ancestor key predicate.
    pub fn new(
        ancestor_type: impl Into<String>,
        navigation: impl Into<String>,
        keys: Vec<(String, Value)>,
    ) -> Self {
        Self {
            ancestor_type: ancestor_type.into(),
            navigation: navigation.into(),
            keys,
        }
    }
}

/// A hierarchical query request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The root entity type to query.
    pub root_type: String,
    /// Property paths to select (empty = all non-navigation members).
    pub select: Vec<String>,
    /// Navigation expansions.
    pub expand: Vec<ExpandSpec>,
    /// Optional filter on the root entity.
    pub filter: Option<FilterExpr>,
    /// Ordering specification.
    pub order_by: Vec<OrderSpec>,
    /// Group-by items.
    pub group_by: Vec<GroupBySpec>,
    /// Aggregates.
    pub aggregates: Vec<AggregateSpec>,
    /// Maximum root entities to return.
    pub top: Option<u64>,
    /// Root entities to skip.
    pub skip: Option<u64>,
    /// Whether the total count of matching root entities is requested.
    pub count: bool,
    /// Ancestor key predicates, nearest ancestor first.
    pub scope: Vec<AncestorKey>,
    /// Opaque timeout handed through to the executor.
    pub timeout: Option<Duration>,
}

impl QueryRequest {
    /// Create a new request for an entity type.
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            root_type: root_type.into(),
            select: vec![],
            expand: vec![],
            filter: None,
            order_by: vec![],
            group_by: vec![],
            aggregates: vec![],
            top: None,
            skip: None,
            count: false,
            scope: vec![],
            timeout: None,
        }
    }

    /// Set the properties to select.
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    /// Add a property to select.
    pub fn select(mut self, property: impl Into<String>) -> Self {
        self.select.push(property.into());
        self
    }

    /// Add an expansion.
    pub fn expand(mut self, expand: ExpandSpec) -> Self {
        self.expand.push(expand);
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add ordering.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Add a group-by item.
    pub fn group_by(mut self, group: GroupBySpec) -> Self {
        self.group_by.push(group);
        self
    }

    /// Add an aggregate.
    pub fn aggregate(mut self, aggregate: AggregateSpec) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Limit root entities.
    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    /// Skip root entities.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Request the total count.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Add an ancestor key predicate.
    pub fn within(mut self, ancestor: AncestorKey) -> Self {
        self.scope.push(ancestor);
        self
    }

    /// Set the executor timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether this request groups or aggregates.
    pub fn is_aggregate(&self) -> bool {
        !self.aggregates.is_empty() || !self.group_by.is_empty()
    }

    /// Whether paging was requested on the root.
    pub fn has_paging(&self) -> bool {
        self.top.is_some() || self.skip.is_some()
    }
}
