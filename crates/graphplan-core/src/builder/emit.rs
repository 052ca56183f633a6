//! Sources, joins and columns for aligned path nodes.

use std::collections::HashMap;

use graphplan_proto::filter::split_member;
use tracing::trace;

use super::PlanContext;
use crate::error::Error;
use crate::metadata::{JoinKeys, ScalarType, TypeColumn};
use crate::path::{NodeId, PathNode};
use crate::plan::{
    Column, ColumnExpr, ColumnRef, Join, JoinType, OrderItem, Predicate, QueryPlan, Source, SourceId,
};

/// Where a node's rows live in the plan under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bound {
    pub source: SourceId,
    /// Columns are addressed by storage name rather than member name.
    pub table: bool,
}

pub(crate) type Bindings = HashMap<NodeId, Bound>;

/// Which nodes a plan joins inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emit {
    /// Every expanded and filtered node.
    Flat,
    /// Filtered nodes plus expansions outside collection branches.
    Seed,
    /// Filtered nodes only; nothing is projected.
    Aggregate,
}

/// Name of a member column within a bound source.
pub(crate) fn storage_name(bound: Bound, column: &TypeColumn) -> String {
    if bound.table {
        column.member.column.clone()
    } else {
        column.member.name.clone()
    }
}

impl PlanContext<'_> {
    /// Scalar columns visible on a type, including subtype columns of a
    /// polymorphic type.
    pub(crate) fn type_columns(&self, type_name: &str) -> Result<Vec<TypeColumn>, Error> {
        if self.metadata.is_polymorphic(type_name) {
            self.metadata.union_columns(type_name)
        } else {
            Ok(self.metadata.columns(type_name)?.as_ref().clone())
        }
    }

    pub(crate) fn member_column(&self, node: NodeId, member: &str) -> Result<TypeColumn, Error> {
        let type_name = &self.tree.node(node).element_type;
        self.type_columns(type_name)?
            .into_iter()
            .find(|c| c.name() == member)
            .ok_or_else(|| Error::illegal_column(member, type_name.clone()))
    }

    pub(crate) fn column_ref(&self, node: NodeId, bound: Bound, member: &str) -> Result<ColumnRef, Error> {
        let column = self.member_column(node, member)?;
        Ok(ColumnRef::new(bound.source, storage_name(bound, &column)))
    }

    /// Join keys along the edge from a node's parent to the node, parent
    /// members first.
    pub(crate) fn edge_keys(&self, node: NodeId) -> Result<JoinKeys, Error> {
        let child = self.tree.node(node);
        let parent = child
            .parent
            .ok_or_else(|| Error::illegal_column(child.path.clone(), child.element_type.clone()))?;
        if child.reverse {
            Ok(self
                .metadata
                .resolve_join(&child.element_type, &child.path)?
                .reversed())
        } else {
            self.metadata
                .resolve_join(&self.tree.node(parent).element_type, &child.path)
        }
    }

    /// Create a fresh source for a node.
    pub(crate) fn bind_node(&mut self, node: NodeId) -> Result<(Source, Bound), Error> {
        let element_type = self.tree.node(node).element_type.clone();
        let source = self.type_source(&element_type, Some(node))?;
        let bound = Bound {
            source: source.id,
            table: source.is_table(),
        };
        Ok((source, bound))
    }

    /// Joins attaching `child` to the already bound parent of `node`.
    ///
    /// A navigation through a link table takes two joins: parent to link
    /// table, then link table to child.
    pub(crate) fn connect(
        &mut self,
        node: NodeId,
        parent: Bound,
        child: Source,
        child_bound: Bound,
        join_type: JoinType,
    ) -> Result<Vec<Join>, Error> {
        let keys = self.edge_keys(node)?;
        let target = self.tree.node(node);
        let parent_node = target.parent.unwrap_or(NodeId::ROOT);

        match &keys.link {
            None => {
                if keys.pairs.is_empty() {
                    return Err(Error::UnresolvedJoin {
                        parent: self.tree.node(parent_node).element_type.clone(),
                        path: target.path.clone(),
                    });
                }
                let statements = keys
                    .pairs
                    .iter()
                    .map(|(p, c)| {
                        Ok((
                            self.column_ref(parent_node, parent, p)?,
                            self.column_ref(node, child_bound, c)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok(vec![Join::new(parent.source, child, join_type, statements)])
            }
            Some(link) => {
                let link_id = self.ids.next_id();
                let to_link = link
                    .source_pairs
                    .iter()
                    .map(|(p, l)| Ok((self.column_ref(parent_node, parent, p)?, ColumnRef::new(link_id, l))))
                    .collect::<Result<Vec<_>, Error>>()?;
                let to_child = link
                    .target_pairs
                    .iter()
                    .map(|(l, c)| Ok((ColumnRef::new(link_id, l), self.column_ref(node, child_bound, c)?)))
                    .collect::<Result<Vec<_>, Error>>()?;
                let link_source = Source::table(link_id, link.table.clone(), None);
                Ok(vec![
                    Join::new(parent.source, link_source, join_type, to_link)
                        .with_intermediate(link.table.clone()),
                    Join::new(link_id, child, join_type, to_child).with_intermediate(link.table.clone()),
                ])
            }
        }
    }

    /// A subquery over a fresh source for `node`, plus the predicate that
    /// correlates it with the node's parent bound at `outer`.
    pub(crate) fn correlate(
        &mut self,
        node: NodeId,
        outer: Bound,
    ) -> Result<(QueryPlan, Bound, Option<Predicate>), Error> {
        let keys = self.edge_keys(node)?;
        let parent_node = self.tree.node(node).parent.unwrap_or(NodeId::ROOT);
        let (source, bound) = self.bind_node(node)?;

        match &keys.link {
            None => {
                let terms = keys
                    .pairs
                    .iter()
                    .map(|(p, c)| {
                        Ok(Predicate::columns_eq(
                            self.column_ref(parent_node, outer, p)?,
                            self.column_ref(node, bound, c)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok((QueryPlan::new(source), bound, Predicate::all(terms)))
            }
            Some(link) => {
                let link_id = self.ids.next_id();
                let mut plan = QueryPlan::new(Source::table(link_id, link.table.clone(), None));
                let to_child = link
                    .target_pairs
                    .iter()
                    .map(|(l, c)| Ok((ColumnRef::new(link_id, l), self.column_ref(node, bound, c)?)))
                    .collect::<Result<Vec<_>, Error>>()?;
                plan.joins.push(
                    Join::new(link_id, source, JoinType::Inner, to_child)
                        .with_intermediate(link.table.clone()),
                );
                let terms = link
                    .source_pairs
                    .iter()
                    .map(|(p, l)| {
                        Ok(Predicate::columns_eq(
                            self.column_ref(parent_node, outer, p)?,
                            ColumnRef::new(link_id, l),
                        ))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok((plan, bound, Predicate::all(terms)))
            }
        }
    }

    /// Check if the node sits in a collection branch: it or one of its
    /// ancestors yields many rows per parent.
    pub(crate) fn in_branch(&self, node: &PathNode) -> bool {
        node.is_collection
            || self
                .tree
                .ancestors(node.id)
                .iter()
                .any(|a| self.tree.node(*a).is_collection)
    }

    /// Join type for a node and whether the node is projected.
    fn join_for(&self, node: &PathNode, emit: Emit) -> Option<(JoinType, bool)> {
        if node.reverse {
            return Some((JoinType::Inner, false));
        }
        let projected = match emit {
            Emit::Flat => node.expanded,
            Emit::Seed => node.expanded && !self.in_branch(node),
            Emit::Aggregate => false,
        };
        if projected {
            Some((JoinType::Left, true))
        } else if node.filtered {
            Some((self.config.default_join, false))
        } else {
            None
        }
    }

    /// Emit the root source plus every inline node selected by `emit`.
    pub(crate) fn emit_plan(&mut self, emit: Emit) -> Result<(QueryPlan, Bindings), Error> {
        let (root_source, root_bound) = self.bind_node(NodeId::ROOT)?;
        let mut plan = QueryPlan::new(root_source);
        let mut bindings = Bindings::new();
        bindings.insert(NodeId::ROOT, root_bound);
        if emit != Emit::Aggregate {
            self.project_node(&mut plan, NodeId::ROOT, root_bound, false)?;
        }

        let candidates: Vec<(NodeId, JoinType, bool)> = self
            .tree
            .nodes()
            .iter()
            .skip(1)
            .filter(|n| self.tree.is_inline(n.id))
            .filter_map(|n| {
                self.join_for(n, emit)
                    .map(|(join_type, projected)| (n.id, join_type, projected))
            })
            .collect();

        for (node, join_type, projected) in candidates {
            let Some(parent_bound) = self
                .tree
                .node(node)
                .parent
                .and_then(|p| bindings.get(&p).copied())
            else {
                continue;
            };
            let (source, bound) = self.bind_node(node)?;
            let mut joins = self.connect(node, parent_bound, source, bound, join_type)?;
            if projected {
                if let Some(filter) = self.tree.node(node).filter.clone() {
                    let predicate = self.translate_expand_filter(node, bound, &filter)?;
                    if let Some(last) = joins.last_mut() {
                        last.filter = Some(predicate);
                    }
                }
                self.project_node(&mut plan, node, bound, false)?;
            }
            trace!(path = %self.tree.full_path(node), join = ?join_type, projected, "node joined");
            plan.joins.extend(joins);
            bindings.insert(node, bound);
        }
        Ok((plan, bindings))
    }

    fn alias(&self, node: NodeId, member: &str) -> String {
        let prefix = self.tree.full_path(node);
        if prefix.is_empty() {
            member.to_string()
        } else {
            format!("{}/{}", prefix, member)
        }
    }

    /// Add a node's columns to a plan.
    ///
    /// Keys are always present, as system columns when not requested. With
    /// `keys_only` nothing else is projected. Polymorphic nodes also get a
    /// discriminator column.
    pub(crate) fn project_node(
        &self,
        plan: &mut QueryPlan,
        node: NodeId,
        bound: Bound,
        keys_only: bool,
    ) -> Result<(), Error> {
        let target = self.tree.node(node);
        for column in self.type_columns(&target.element_type)? {
            let requested = !keys_only
                && (target.select.is_empty() || target.select.iter().any(|s| s == column.name()));
            if !requested && !column.member.key {
                continue;
            }
            let alias = self.alias(node, column.name());
            if plan.has_alias(&alias) {
                continue;
            }
            let projected = Column::field(bound.source, storage_name(bound, &column), alias, node, &column);
            if requested && !column.member.system {
                plan.columns.push(projected);
            } else {
                plan.system_columns.push(projected.into_system());
            }
        }

        if self.metadata.is_polymorphic(&target.element_type) {
            let alias = self.alias(node, &self.config.discriminator_alias);
            if !plan.has_alias(&alias) {
                let mut column = Column::computed(
                    bound.source,
                    self.config.discriminator_alias.clone(),
                    alias,
                    node,
                    ColumnExpr::Field,
                )
                .into_system();
                column.member = self.config.discriminator_alias.clone();
                column.scalar = Some(ScalarType::String);
                column.nullable = false;
                column.computed = false;
                column.discriminator = true;
                column.declaring_type = target.element_type.clone();
                plan.system_columns.push(column);
            }
        }
        Ok(())
    }

    /// Add one member of a node as a system column.
    pub(crate) fn project_member(
        &self,
        plan: &mut QueryPlan,
        node: NodeId,
        bound: Bound,
        member: &str,
    ) -> Result<(), Error> {
        let alias = self.alias(node, member);
        if plan.has_alias(&alias) {
            return Ok(());
        }
        let column = self.member_column(node, member)?;
        plan.system_columns.push(
            Column::field(bound.source, storage_name(bound, &column), alias, node, &column).into_system(),
        );
        Ok(())
    }

    /// AND the request filter and the ancestor scope keys into the plan's
    /// filter.
    pub(crate) fn apply_filters(&mut self, plan: &mut QueryPlan, bindings: &Bindings) -> Result<(), Error> {
        let mut terms = Vec::new();
        if let Some(filter) = &self.request.filter {
            terms.push(self.translate_filter(filter, NodeId::ROOT, bindings)?);
        }
        for (node, keys) in &self.scope_nodes {
            let bound = bindings.get(node).copied().ok_or_else(|| Error::UnresolvedJoin {
                parent: self.root_type().to_string(),
                path: self.tree.full_path(*node),
            })?;
            for (key, value) in keys {
                terms.push(Predicate::column_eq(self.column_ref(*node, bound, key)?, value.clone()));
            }
        }
        plan.filter = Predicate::all(terms);
        Ok(())
    }

    /// Root ordering as plan order items.
    pub(crate) fn root_order(&self, bindings: &Bindings) -> Result<Vec<OrderItem>, Error> {
        let mut items = Vec::with_capacity(self.order_by.len());
        for order in &self.order_by {
            let (node, member) = self.resolve_property(NodeId::ROOT, &order.property)?;
            let bound = bindings.get(&node).copied().ok_or_else(|| Error::UnresolvedJoin {
                parent: self.root_type().to_string(),
                path: order.property.clone(),
            })?;
            items.push(OrderItem::column(self.column_ref(node, bound, member)?, order.direction));
        }
        Ok(items)
    }

    /// Node and member a property path refers to.
    pub(crate) fn resolve_property<'p>(
        &self,
        base: NodeId,
        path: &'p str,
    ) -> Result<(NodeId, &'p str), Error> {
        let (prefix, member) = split_member(path);
        let node = self.tree.lookup(base, prefix).ok_or_else(|| {
            Error::illegal_column(path, self.tree.node(base).element_type.clone())
        })?;
        self.check_scalar(node, member)?;
        Ok((node, member))
    }
}
