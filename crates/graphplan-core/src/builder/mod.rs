//! Plan construction.
//!
//! [`PlanBuilder::build`] turns a [`QueryRequest`] into a [`QueryPlan`] in
//! two phases. Alignment walks every path the request references (expand,
//! scope, filter, select, order, group-by, aggregate) into a [`PathTree`].
//! Emission then derives sources, joins, columns, filters and paging from
//! the tree. Expand branches that would multiply each other in one flat
//! join are split into a seed plan plus one secondary plan per branch.

mod aggregate;
mod align;
mod emit;
mod filter;
mod paging;
pub mod projection;
mod union;

use std::sync::Arc;

use graphplan_proto::{AggregateKind, OrderSpec, QueryRequest, Value};
use tracing::{debug, instrument};

use crate::config::PlannerConfig;
use crate::error::Error;
use crate::exec::Executor;
use crate::metadata::{ScalarType, TypeMetadata};
use crate::path::{NodeId, PathTree};
use crate::plan::{Column, ColumnExpr, QueryPlan, Source, SourceIds};

use emit::Emit;
use projection::fix_sub_selects;

/// Backend capabilities the planner adapts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Emulate top/skip with self-joins instead of native paging.
    pub use_join_for_skip: bool,
    /// Storage expression of the total-count aggregate.
    pub count_expression: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            use_join_for_skip: false,
            count_expression: "COUNT(*)".to_string(),
        }
    }
}

impl Capabilities {
    /// Read the capabilities an executor reports.
    pub fn of<E: Executor + ?Sized>(executor: &E) -> Self {
        Self {
            use_join_for_skip: executor.use_join_for_skip(),
            count_expression: executor.count_expression(),
        }
    }
}

/// Builds query plans against a metadata registry.
///
/// A builder is cheap and holds no per-request state; every call to
/// [`PlanBuilder::build`] works on its own path tree.
pub struct PlanBuilder<'a> {
    metadata: &'a TypeMetadata,
    config: PlannerConfig,
    capabilities: Capabilities,
}

impl<'a> PlanBuilder<'a> {
    /// Create a builder with the default configuration and capabilities.
    pub fn new(metadata: &'a TypeMetadata) -> Self {
        Self {
            metadata,
            config: PlannerConfig::default(),
            capabilities: Capabilities::default(),
        }
    }

    /// Use a planner configuration.
    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Adapt plans to backend capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build the plan for a request.
    ///
    /// Every configuration error (unknown members, unresolvable joins,
    /// malformed group-by or aggregate clauses) is reported here, before
    /// anything is executed.
    #[instrument(skip(self, request), fields(root = %request.root_type))]
    pub fn build(&self, request: &QueryRequest) -> Result<QueryPlan, Error> {
        let mut ctx = PlanContext::new(self.metadata, &self.config, &self.capabilities, request)?;
        ctx.align_request()?;

        let mut plan = if request.is_aggregate() {
            ctx.aggregate_plan()?
        } else if ctx.should_split() {
            ctx.split_plan()?
        } else {
            ctx.flat_plan()?
        };

        plan.timeout = request.timeout;
        debug!(
            nodes = ctx.tree.len(),
            joins = plan.joins.len(),
            secondary = plan.secondary.len(),
            aggregate = plan.is_aggregate_query,
            "plan built"
        );
        plan.tree = Some(Arc::new(ctx.tree));
        Ok(plan)
    }
}

/// Per-request build state.
pub(crate) struct PlanContext<'a> {
    metadata: &'a TypeMetadata,
    config: &'a PlannerConfig,
    capabilities: &'a Capabilities,
    request: &'a QueryRequest,
    tree: PathTree,
    ids: SourceIds,
    /// Root ordering, explicit or synthesized from the root keys.
    order_by: Vec<OrderSpec>,
    /// Reverse nodes of the ancestor scope with their key values.
    scope_nodes: Vec<(NodeId, Vec<(String, Value)>)>,
}

impl<'a> PlanContext<'a> {
    fn new(
        metadata: &'a TypeMetadata,
        config: &'a PlannerConfig,
        capabilities: &'a Capabilities,
        request: &'a QueryRequest,
    ) -> Result<Self, Error> {
        metadata.descriptor(&request.root_type)?;
        Ok(Self {
            metadata,
            config,
            capabilities,
            request,
            tree: PathTree::new(request.root_type.clone(), config.budget.max_depth),
            ids: SourceIds::new(),
            order_by: request.order_by.clone(),
            scope_nodes: Vec::new(),
        })
    }

    fn root_type(&self) -> &'a str {
        &self.request.root_type
    }

    /// One plan joining every expanded and filtered node inline.
    fn flat_plan(&mut self) -> Result<QueryPlan, Error> {
        let (mut plan, bindings) = self.emit_plan(Emit::Flat)?;
        self.apply_filters(&mut plan, &bindings)?;
        plan.order_by = self.root_order(&bindings)?;

        let core = self.filtered_core(&plan);
        if self.request.count {
            plan.count = Some(Box::new(self.count_plan(core.clone())));
        }
        self.apply_paging(&mut plan, &core)?;
        Ok(plan)
    }

    /// `SELECT COUNT(*)` over the distinct root keys of a filtered core.
    fn count_plan(&mut self, core: QueryPlan) -> QueryPlan {
        let mut inner = core;
        inner.distinct = !inner.system_columns.is_empty();
        fix_sub_selects(&mut inner, &mut self.ids);

        let id = self.ids.next_id();
        let mut plan = QueryPlan::new(Source::select(id, inner, None));
        let mut count = Column::computed(
            id,
            self.capabilities.count_expression.clone(),
            self.config.count_alias.clone(),
            NodeId::ROOT,
            ColumnExpr::Aggregate {
                kind: AggregateKind::Count,
                args: Vec::new(),
            },
        );
        count.scalar = Some(ScalarType::Int64);
        count.nullable = false;
        plan.columns.push(count);
        plan.is_aggregate_query = true;
        plan
    }
}
