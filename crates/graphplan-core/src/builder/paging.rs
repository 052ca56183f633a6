//! Root paging.
//!
//! Native `top`/`skip` limit result rows, which is only right when every
//! root row appears once. When a collection join fans the root out, or
//! the backend cannot page natively, paging is emulated: a copy of the
//! filtered core selecting the first `skip + top` root keys is inner
//! joined, and a copy selecting the first `skip` keys is left joined and
//! excluded with an `IS NULL` test. Copies carry only the filter and scope
//! joins, with the join types of the paged plan.

use tracing::debug;

use super::projection::{fix_sub_selects, join_owners};
use super::PlanContext;
use crate::error::Error;
use crate::path::NodeId;
use crate::plan::{
    Column, ColumnExpr, ColumnRef, Join, JoinType, OrderItem, OrderKey, Predicate, QueryPlan, Source, SourceId,
};

impl PlanContext<'_> {
    /// The part of a plan that decides which root rows match: its source,
    /// the joins of filtered and scope nodes, the filter and the root keys.
    pub(crate) fn filtered_core(&self, plan: &QueryPlan) -> QueryPlan {
        let mut core = QueryPlan::new(plan.source.clone());
        let owners = join_owners(&plan.joins);
        core.joins = plan
            .joins
            .iter()
            .zip(owners)
            .filter(|(_, owner)| {
                owner.is_some_and(|node| {
                    let node = self.tree.node(node);
                    node.filtered || node.reverse
                })
            })
            .map(|(join, _)| join.clone())
            .collect();
        core.filter = plan.filter.clone();
        core.system_columns = plan
            .node_columns(NodeId::ROOT)
            .filter(|c| c.is_key)
            .map(|c| c.clone().into_system())
            .collect();
        core
    }

    /// Apply the request's root paging to `plan`, natively or through
    /// copies of `core`.
    pub(crate) fn apply_paging(&mut self, plan: &mut QueryPlan, core: &QueryPlan) -> Result<(), Error> {
        let (top, skip) = (self.request.top, self.request.skip);
        if top.is_none() && skip.is_none() {
            return Ok(());
        }

        let fans_out = join_owners(&plan.joins)
            .into_iter()
            .flatten()
            .any(|node| self.tree.node(node).is_collection);
        if !fans_out && !self.capabilities.use_join_for_skip {
            plan.top = top;
            plan.skip = skip;
            return Ok(());
        }

        let keys: Vec<Column> = plan
            .node_columns(NodeId::ROOT)
            .filter(|c| c.is_key)
            .cloned()
            .collect();
        if keys.is_empty() {
            return Err(Error::Unsupported(format!(
                "paging type '{}' without key members",
                self.root_type()
            )));
        }

        let order = plan.order_by.clone();
        let skip = skip.unwrap_or(0);
        if let Some(top) = top {
            let copy = self.paging_copy(core, &order, skip.saturating_add(top));
            self.attach_copy(plan, copy, &keys, JoinType::Inner);
        }
        if skip > 0 {
            let copy = self.paging_copy(core, &order, skip);
            let id = self.attach_copy(plan, copy, &keys, JoinType::Left);
            let skipped = Predicate::is_null(ColumnRef::new(id, keys[0].alias.clone()));
            plan.filter = Predicate::all(plan.filter.take().into_iter().chain([skipped]).collect());
        }
        debug!(?top, skip, fans_out, "paging emulated with key joins");
        Ok(())
    }

    /// Distinct root keys of `core` in `order`, limited to `limit` rows.
    fn paging_copy(&mut self, core: &QueryPlan, order: &[OrderItem], limit: u64) -> QueryPlan {
        let mut copy = core.clone();
        for (idx, item) in order.iter().enumerate() {
            if let OrderKey::Column(column) = &item.key {
                let mut sort = Column::computed(
                    column.source,
                    column.name.clone(),
                    format!("$order{}", idx),
                    NodeId::ROOT,
                    ColumnExpr::Field,
                )
                .into_system();
                sort.computed = false;
                copy.system_columns.push(sort);
            }
        }
        copy.order_by = order.to_vec();
        copy.distinct = true;
        copy.top = Some(limit);
        // Copied joins keep their types so the copy matches the same roots.
        fix_sub_selects(&mut copy, &mut self.ids);
        copy
    }

    fn attach_copy(&mut self, plan: &mut QueryPlan, copy: QueryPlan, keys: &[Column], join_type: JoinType) -> SourceId {
        let id = self.ids.next_id();
        let statements = keys
            .iter()
            .map(|k| (k.reference(), ColumnRef::new(id, k.alias.clone())))
            .collect();
        plan.joins.push(Join::new(
            plan.source.id,
            Source::select(id, copy, None),
            join_type,
            statements,
        ));
        id
    }
}
