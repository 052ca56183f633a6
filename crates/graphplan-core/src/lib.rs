//! graphplan core - query planning and result materialization.
//!
//! This crate turns hierarchical entity requests into flat relational
//! plans and rebuilds object graphs from the rows a backend returns:
//!
//! - [`metadata`] - Entity types, members, keys, inheritance and join keys
//! - [`path`] - Navigation path trees aligned from request references
//! - [`plan`] - The portable relational plan model
//! - [`builder`] - Request to plan translation, including branch splitting
//!   and paging emulation
//! - [`exec`] - The executor collaborator and an in-memory executor
//! - [`materialize`] - Flat rows back to record trees

pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod materialize;
pub mod metadata;
pub mod path;
pub mod plan;

pub use builder::{Capabilities, PlanBuilder};
pub use config::{ExpandBudget, PlannerConfig, SplitMode};
pub use error::{Error, ErrorKind};
pub use exec::{BackendTarget, Executor, MemoryExecutor, ShardSet};
pub use materialize::{Navigation, Record, ResultMaterializer};
pub use metadata::{
    JoinKeys, JoinOverride, LinkTable, MemberDef, MemberKind, ScalarType, TypeColumn, TypeDescriptor,
    TypeMetadata,
};
pub use path::{NodeId, PathNode, PathTree};
pub use plan::{
    Column, ColumnExpr, ColumnRef, GroupBy, Join, JoinType, OrderItem, OrderKey, Predicate, QueryPlan,
    Scalar, Source, SourceId, SourceIds, SourceKind,
};

/// Re-export request types.
pub use graphplan_proto as proto;
