//! Branch splitting and projection helpers.
//!
//! Expanding several collections from the root in one flat join would
//! multiply them against each other. Instead the root rows are fetched
//! once by a seed plan; a path plan selects the distinct root keys of the
//! seed, and every collection branch gets a secondary plan that joins its
//! chain of navigations onto the path plan.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::emit::{Bindings, Bound, Emit};
use super::PlanContext;
use crate::config::SplitMode;
use crate::error::Error;
use crate::path::NodeId;
use crate::plan::{
    Column, ColumnExpr, Join, JoinType, OrderItem, OrderKey, Predicate, QueryPlan, Scalar, Source,
    SourceId, SourceIds, SourceKind,
};

/// Output columns of a plan that belong to `node`.
pub fn locate_columns(plan: &QueryPlan, node: NodeId) -> Vec<&Column> {
    plan.node_columns(node).collect()
}

/// `SELECT DISTINCT columns FROM (seed)`, with the seed copied under
/// fresh source ids.
pub fn create_path_plan(ids: &mut SourceIds, seed: &QueryPlan, columns: &[&Column]) -> QueryPlan {
    let mut inner = seed.clone();
    fix_sub_selects(&mut inner, ids);
    let id = ids.next_id();
    let mut plan = QueryPlan::new(Source::select(id, inner, Some(NodeId::ROOT)));
    plan.columns = align_to_path(id, &[], columns);
    plan.distinct = true;
    plan
}

/// Rebind seed columns onto a path source, reading them by alias.
///
/// Columns whose alias `projection_columns` already covers are skipped.
pub fn align_to_path(
    path_source: SourceId,
    projection_columns: &[Column],
    seed_columns: &[&Column],
) -> Vec<Column> {
    seed_columns
        .iter()
        .filter(|c| !projection_columns.iter().any(|p| p.alias == c.alias))
        .map(|c| {
            let mut column = (*c).clone();
            column.name = c.alias.clone();
            column.source = path_source;
            column.expr = ColumnExpr::Field;
            column.system = true;
            column
        })
        .collect()
}

/// Node each join belongs to. Link-table joins belong to the node of the
/// join that follows them.
pub(crate) fn join_owners(joins: &[Join]) -> Vec<Option<NodeId>> {
    joins
        .iter()
        .enumerate()
        .map(|(idx, join)| match (join.target.node, &join.intermediate) {
            (Some(node), _) => Some(node),
            (None, Some(_)) => joins.get(idx + 1).and_then(|next| next.target.node),
            (None, None) => None,
        })
        .collect()
}

/// Make every join a left join, except those reaching a node in `inner`.
pub fn reconfigure_joins(plan: &mut QueryPlan, inner: &[NodeId]) {
    let owners = join_owners(&plan.joins);
    for (join, owner) in plan.joins.iter_mut().zip(owners) {
        join.join_type = match owner {
            Some(node) if inner.contains(&node) => JoinType::Inner,
            _ => JoinType::Left,
        };
    }
}

/// Give every source defined in `plan` and its nested selects, unions and
/// subqueries a fresh id from `ids`, rewriting all references.
///
/// References to sources defined outside `plan` are left alone, so a
/// correlated subquery can be renumbered without losing its correlation.
/// Split sections (`seed`, `path`, `secondary`, `count`) are not visited.
pub fn fix_sub_selects(plan: &mut QueryPlan, ids: &mut SourceIds) {
    let mut mapping: HashMap<SourceId, SourceId> = HashMap::new();
    visit_plans(plan, &mut |p| {
        for id in p.source_ids() {
            mapping.entry(id).or_insert_with(|| ids.next_id());
        }
    });
    visit_plans(plan, &mut |p| remap_plan(p, &mapping));
    trace!(sources = mapping.len(), "sources renumbered");
}

fn visit_plans(root: &mut QueryPlan, visit: &mut impl FnMut(&mut QueryPlan)) {
    let mut stack: Vec<&mut QueryPlan> = vec![root];
    while let Some(plan) = stack.pop() {
        visit(plan);
        let QueryPlan {
            source,
            joins,
            filter,
            ..
        } = plan;
        push_source_plans(&mut stack, &mut source.kind);
        for join in joins.iter_mut() {
            push_source_plans(&mut stack, &mut join.target.kind);
            if let Some(filter) = join.filter.as_mut() {
                push_predicate_plans(&mut stack, filter);
            }
        }
        if let Some(filter) = filter.as_mut() {
            push_predicate_plans(&mut stack, filter);
        }
    }
}

fn push_source_plans<'a>(stack: &mut Vec<&'a mut QueryPlan>, kind: &'a mut SourceKind) {
    match kind {
        SourceKind::Select(plan) => stack.push(plan.as_mut()),
        SourceKind::Union(selects) => stack.extend(selects.iter_mut()),
        SourceKind::Table { .. } | SourceKind::Script(_) => {}
    }
}

fn push_predicate_plans<'a>(stack: &mut Vec<&'a mut QueryPlan>, predicate: &'a mut Predicate) {
    let mut pending = vec![predicate];
    while let Some(predicate) = pending.pop() {
        match predicate {
            Predicate::And(terms) | Predicate::Or(terms) => pending.extend(terms.iter_mut()),
            Predicate::Not(inner) => pending.push(inner.as_mut()),
            Predicate::Exists { subquery, .. } => stack.push(subquery.as_mut()),
            Predicate::Compare { .. } | Predicate::In { .. } | Predicate::IsNull { .. } => {}
        }
    }
}

fn remap_id(id: &mut SourceId, mapping: &HashMap<SourceId, SourceId>) {
    if let Some(mapped) = mapping.get(id) {
        *id = *mapped;
    }
}

fn remap_column(column: &mut Column, mapping: &HashMap<SourceId, SourceId>) {
    remap_id(&mut column.source, mapping);
    if let ColumnExpr::Aggregate { args, .. } = &mut column.expr {
        for arg in args {
            remap_id(&mut arg.source, mapping);
        }
    }
}

fn remap_scalar(scalar: &mut Scalar, mapping: &HashMap<SourceId, SourceId>) {
    if let Scalar::Column(column) = scalar {
        remap_id(&mut column.source, mapping);
    }
}

/// Remap the column references of a predicate. Subqueries are visited as
/// plans of their own.
fn remap_predicate(predicate: &mut Predicate, mapping: &HashMap<SourceId, SourceId>) {
    let mut pending = vec![predicate];
    while let Some(predicate) = pending.pop() {
        match predicate {
            Predicate::Compare { left, right, .. } => {
                remap_scalar(left, mapping);
                remap_scalar(right, mapping);
            }
            Predicate::In { operand, .. } | Predicate::IsNull { operand, .. } => {
                remap_scalar(operand, mapping)
            }
            Predicate::And(terms) | Predicate::Or(terms) => pending.extend(terms.iter_mut()),
            Predicate::Not(inner) => pending.push(inner.as_mut()),
            Predicate::Exists { .. } => {}
        }
    }
}

fn remap_plan(plan: &mut QueryPlan, mapping: &HashMap<SourceId, SourceId>) {
    remap_id(&mut plan.source.id, mapping);
    for column in plan.columns.iter_mut().chain(plan.system_columns.iter_mut()) {
        remap_column(column, mapping);
    }
    for join in &mut plan.joins {
        remap_id(&mut join.source, mapping);
        remap_id(&mut join.target.id, mapping);
        for (left, right) in &mut join.statements {
            remap_id(&mut left.source, mapping);
            remap_id(&mut right.source, mapping);
        }
        if let Some(filter) = join.filter.as_mut() {
            remap_predicate(filter, mapping);
        }
    }
    if let Some(filter) = plan.filter.as_mut() {
        remap_predicate(filter, mapping);
    }
    for group in &mut plan.group_by {
        for column in &mut group.columns {
            remap_id(&mut column.source, mapping);
        }
    }
    for item in &mut plan.order_by {
        if let OrderKey::Column(column) = &mut item.key {
            remap_id(&mut column.source, mapping);
        }
    }
}

impl PlanContext<'_> {
    /// Expanded collection navigations hanging off the root through
    /// single-valued steps only.
    pub(crate) fn branches(&self) -> Vec<NodeId> {
        self.tree
            .nodes()
            .iter()
            .filter(|n| {
                !n.is_root()
                    && n.expanded
                    && n.is_collection
                    && !n.reverse
                    && self.tree.is_inline(n.id)
                    && self
                        .tree
                        .ancestors(n.id)
                        .iter()
                        .all(|a| !self.tree.node(*a).is_collection)
            })
            .map(|n| n.id)
            .collect()
    }

    pub(crate) fn should_split(&self) -> bool {
        let branches = self.branches().len();
        match self.config.split_mode {
            SplitMode::MultiBranch => branches >= 2,
            SplitMode::AnyExpand => branches >= 1,
            SplitMode::Never => false,
        }
    }

    /// Steps from the root (exclusive) down to `node` (inclusive).
    fn chain_to(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = self.tree.ancestors(node);
        chain.pop();
        chain.reverse();
        chain.push(node);
        chain
    }

    pub(crate) fn split_plan(&mut self) -> Result<QueryPlan, Error> {
        let root_type = self.root_type();
        if self.metadata.is_polymorphic(root_type) {
            return Err(Error::Unsupported(format!(
                "splitting expand branches of polymorphic type '{}'",
                root_type
            )));
        }

        let branches = self.branches();
        let (mut seed, bindings) = self.emit_plan(Emit::Seed)?;
        let root_bound = bindings
            .get(&NodeId::ROOT)
            .copied()
            .ok_or_else(|| Error::illegal_column("", root_type))?;

        // Parent-side members every branch joins on.
        let mut needed: Vec<String> = Vec::new();
        for &branch in &branches {
            let first = self.chain_to(branch)[0];
            for member in self.edge_keys(first)?.parent_members() {
                if !needed.iter().any(|m| m == member) {
                    needed.push(member.to_string());
                }
            }
        }
        for member in &needed {
            self.project_member(&mut seed, NodeId::ROOT, root_bound, member)?;
        }

        self.apply_filters(&mut seed, &bindings)?;
        seed.order_by = self.root_order(&bindings)?;
        let core = self.filtered_core(&seed);
        let count = if self.request.count {
            Some(Box::new(self.count_plan(core.clone())))
        } else {
            None
        };
        self.apply_paging(&mut seed, &core)?;

        let path_columns: Vec<Column> = locate_columns(&seed, NodeId::ROOT)
            .into_iter()
            .filter(|c| c.is_key || needed.contains(&c.member))
            .cloned()
            .collect();
        let path = create_path_plan(&mut self.ids, &seed, &path_columns.iter().collect::<Vec<_>>());
        let keys: Vec<&Column> = path_columns.iter().filter(|c| c.is_key).collect();

        let mut secondary = Vec::with_capacity(branches.len());
        for &branch in &branches {
            secondary.push(self.secondary_plan(branch, &path, &keys)?);
        }
        debug!(branches = secondary.len(), "expand branches split into secondary plans");

        let mut plan = QueryPlan::new(seed.source.clone());
        plan.columns = seed.columns.clone();
        plan.seed = Some(Box::new(seed));
        plan.path = Some(Box::new(path));
        plan.secondary = secondary;
        plan.count = count;
        Ok(plan)
    }

    /// Plan for one branch: the path plan joined down the branch's chain.
    fn secondary_plan(&mut self, branch: NodeId, path: &QueryPlan, keys: &[&Column]) -> Result<QueryPlan, Error> {
        let path_id = self.ids.next_id();
        let path_bound = Bound {
            source: path_id,
            table: false,
        };
        let mut plan = QueryPlan::new(Source::select(path_id, path.clone(), Some(NodeId::ROOT)));
        plan.system_columns = align_to_path(path_id, &[], keys);

        let mut bindings = Bindings::new();
        bindings.insert(NodeId::ROOT, path_bound);

        let chain = self.chain_to(branch);
        let mut parent = path_bound;
        for &node in &chain {
            let (source, bound) = self.bind_node(node)?;
            plan.joins
                .extend(self.connect(node, parent, source, bound, JoinType::Inner)?);
            self.project_node(&mut plan, node, bound, node != branch)?;
            bindings.insert(node, bound);
            parent = bound;
        }

        let subtree: Vec<NodeId> = self
            .tree
            .nodes()
            .iter()
            .filter(|n| {
                n.expanded
                    && !n.reverse
                    && self.tree.is_inline(n.id)
                    && self.tree.ancestors(n.id).contains(&branch)
            })
            .map(|n| n.id)
            .collect();
        for node in subtree {
            let Some(parent) = self
                .tree
                .node(node)
                .parent
                .and_then(|p| bindings.get(&p).copied())
            else {
                continue;
            };
            let (source, bound) = self.bind_node(node)?;
            let mut joins = self.connect(node, parent, source, bound, JoinType::Left)?;
            if let Some(filter) = self.tree.node(node).filter.clone() {
                let predicate = self.translate_expand_filter(node, bound, &filter)?;
                if let Some(last) = joins.last_mut() {
                    last.filter = Some(predicate);
                }
            }
            self.project_node(&mut plan, node, bound, false)?;
            plan.joins.extend(joins);
            bindings.insert(node, bound);
        }
        reconfigure_joins(&mut plan, &chain);

        let branch_bound = bindings
            .get(&branch)
            .copied()
            .ok_or_else(|| Error::illegal_column(self.tree.full_path(branch), self.root_type()))?;
        if let Some(filter) = self.tree.node(branch).filter.clone() {
            plan.filter = Some(self.translate_expand_filter(branch, branch_bound, &filter)?);
        }
        for order in &self.tree.node(branch).order_by {
            let column = self.column_ref(branch, branch_bound, &order.property)?;
            plan.order_by.push(OrderItem::column(column, order.direction));
        }

        trace!(branch = %self.tree.full_path(branch), joins = plan.joins.len(), "secondary plan built");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MemberDef, ScalarType, TypeColumn};
    use crate::plan::ColumnRef;
    use pretty_assertions::assert_eq;

    fn id_column(source: SourceId, node: NodeId) -> Column {
        let column = TypeColumn {
            member: MemberDef::scalar("Id", ScalarType::Int32).with_key(),
            declaring_type: "Order".to_string(),
            table: "Orders".to_string(),
        };
        Column::field(source, "Id", "Id", node, &column)
    }

    #[test]
    fn test_fix_sub_selects_keeps_references_consistent() {
        let mut ids = SourceIds::new();
        let orders = ids.next_id();
        let lines = ids.next_id();
        let inner_id = ids.next_id();

        let mut subquery = QueryPlan::new(Source::table(inner_id, "Notes", None));
        subquery.filter = Some(Predicate::columns_eq(
            ColumnRef::new(orders, "Id"),
            ColumnRef::new(inner_id, "OrderId"),
        ));

        let mut plan = QueryPlan::new(Source::table(orders, "Orders", Some(NodeId::ROOT)));
        plan.columns.push(id_column(orders, NodeId::ROOT));
        plan.joins.push(Join::new(
            orders,
            Source::table(lines, "OrderLines", None),
            JoinType::Left,
            vec![(ColumnRef::new(orders, "Id"), ColumnRef::new(lines, "OrderId"))],
        ));
        plan.filter = Some(Predicate::Exists {
            subquery: Box::new(subquery),
            negated: false,
        });

        fix_sub_selects(&mut plan, &mut ids);

        let new_orders = plan.source.id;
        let new_lines = plan.joins[0].target.id;
        assert_ne!(new_orders, orders);
        assert_ne!(new_lines, lines);
        assert_eq!(plan.columns[0].source, new_orders);
        assert_eq!(plan.joins[0].source, new_orders);
        assert_eq!(plan.joins[0].statements[0].0.source, new_orders);
        assert_eq!(plan.joins[0].statements[0].1.source, new_lines);

        match plan.filter.as_ref().unwrap() {
            Predicate::Exists { subquery, .. } => {
                let new_inner = subquery.source.id;
                assert_ne!(new_inner, inner_id);
                assert_eq!(
                    subquery.filter,
                    Some(Predicate::columns_eq(
                        ColumnRef::new(new_orders, "Id"),
                        ColumnRef::new(new_inner, "OrderId"),
                    ))
                );
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_fix_sub_selects_leaves_outer_references() {
        let mut ids = SourceIds::new();
        let outer = ids.next_id();
        let inner = ids.next_id();
        let mut plan = QueryPlan::new(Source::table(inner, "Notes", None));
        plan.filter = Some(Predicate::columns_eq(
            ColumnRef::new(outer, "Id"),
            ColumnRef::new(inner, "OrderId"),
        ));

        fix_sub_selects(&mut plan, &mut ids);

        let expected = Predicate::columns_eq(
            ColumnRef::new(outer, "Id"),
            ColumnRef::new(plan.source.id, "OrderId"),
        );
        assert_eq!(plan.filter, Some(expected));
    }

    #[test]
    fn test_reconfigure_joins_follows_link_tables() {
        let mut ids = SourceIds::new();
        let root = ids.next_id();
        let link = ids.next_id();
        let tags = ids.next_id();
        let tag_node = NodeId::ROOT;

        let mut plan = QueryPlan::new(Source::table(root, "Orders", Some(NodeId::ROOT)));
        plan.joins.push(
            Join::new(root, Source::table(link, "OrderTags", None), JoinType::Left, vec![])
                .with_intermediate("OrderTags"),
        );
        plan.joins.push(
            Join::new(link, Source::table(tags, "Tags", Some(tag_node)), JoinType::Left, vec![])
                .with_intermediate("OrderTags"),
        );

        reconfigure_joins(&mut plan, &[tag_node]);
        assert_eq!(plan.joins[0].join_type, JoinType::Inner);
        assert_eq!(plan.joins[1].join_type, JoinType::Inner);

        reconfigure_joins(&mut plan, &[]);
        assert_eq!(plan.joins[0].join_type, JoinType::Left);
        assert_eq!(plan.joins[1].join_type, JoinType::Left);
    }

    #[test]
    fn test_path_plan_reads_seed_by_alias() {
        let mut ids = SourceIds::new();
        let orders = ids.next_id();
        let mut seed = QueryPlan::new(Source::table(orders, "Orders", Some(NodeId::ROOT)));
        seed.columns.push(id_column(orders, NodeId::ROOT));
        seed.top = Some(10);

        let columns = locate_columns(&seed, NodeId::ROOT);
        let path = create_path_plan(&mut ids, &seed, &columns);

        assert!(path.distinct);
        assert_eq!(path.output_aliases(), vec!["Id"]);
        assert_eq!(path.columns[0].source, path.source.id);
        assert!(path.columns[0].system);
        match &path.source.kind {
            SourceKind::Select(inner) => {
                assert_eq!(inner.top, Some(10));
                assert_ne!(inner.source.id, orders);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }
}
