//! The executor collaborator.
//!
//! An [`Executor`] renders a [`QueryPlan`] for its backend, runs it and
//! returns flat rows keyed by output alias. The planner asks it two
//! questions up front: how a `COUNT(*)` column is spelled, and whether
//! `top`/`skip` must be emulated with key joins.
//!
//! [`MemoryExecutor`] evaluates plans over in-memory tables. It backs the
//! tests and doubles as a template for real backends.

mod compare;
mod memory;

use std::time::Duration;

use graphplan_proto::RowSet;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::plan::QueryPlan;

pub use compare::{compare_values, like_match, values_equal};
pub use memory::MemoryExecutor;

/// Backend a plan is sent to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendTarget {
    /// Backend name, e.g. a connection or data source id.
    pub name: String,
    /// Query dialect the backend speaks.
    pub dialect: String,
}

impl BackendTarget {
    /// Create a target.
    pub fn new(name: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dialect: dialect.into(),
        }
    }
}

/// Physical shards a plan fans out to. Empty means the default shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardSet {
    pub shards: Vec<String>,
}

impl ShardSet {
    /// A single shard.
    pub fn single(shard: impl Into<String>) -> Self {
        Self {
            shards: vec![shard.into()],
        }
    }
}

/// Runs flat plans against a backend.
///
/// The seed and secondary plans of a split plan are independent queries;
/// callers may run them in any order or in parallel.
pub trait Executor: Send + Sync {
    /// Run one executable plan. `timeout` is passed through untouched.
    fn run_plan(
        &self,
        plan: &QueryPlan,
        target: &BackendTarget,
        shards: &ShardSet,
        timeout: Option<Duration>,
    ) -> Result<RowSet, Error>;

    /// Storage expression of a count-all aggregate column.
    fn count_expression(&self) -> String {
        "COUNT(*)".to_string()
    }

    /// Whether root paging must be emulated with key joins.
    fn use_join_for_skip(&self) -> bool {
        false
    }
}
