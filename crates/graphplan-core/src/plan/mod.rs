//! The relational plan model.
//!
//! A [`QueryPlan`] is a portable description of flat relational work:
//! sources (tables, nested selects, unions), joins, columns, filters,
//! groupings, ordering and paging. Executors render and run it; the
//! materializer uses its column-to-node mapping to rebuild object graphs.

mod column;
mod explain;
mod join;
mod predicate;
mod query;
mod source;

pub use column::{Column, ColumnExpr, ColumnRef};
pub use join::{Join, JoinType};
pub use predicate::{Predicate, Scalar};
pub use query::{GroupBy, OrderItem, OrderKey, QueryPlan};
pub use source::{Source, SourceId, SourceIds, SourceKind};
