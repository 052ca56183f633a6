//! Request alignment into the path tree.

use graphplan_proto::filter::split_member;
use graphplan_proto::{ExpandSpec, FilterExpr, OrderSpec};
use tracing::trace;

use super::PlanContext;
use crate::error::Error;
use crate::path::NodeId;

impl PlanContext<'_> {
    /// Align every path the request references.
    ///
    /// Expansions go first so that later filter and select paths find
    /// their nodes already expanded.
    pub(crate) fn align_request(&mut self) -> Result<(), Error> {
        let request = self.request;
        if request.is_aggregate() {
            if !request.expand.is_empty() {
                return Err(Error::Unsupported(
                    "expand combined with group-by or aggregates".to_string(),
                ));
            }
            if request.count {
                return Err(Error::Unsupported(
                    "count combined with group-by or aggregates".to_string(),
                ));
            }
        }

        let max_branches = self.config.budget.max_branches;
        if request.expand.len() > max_branches {
            return Err(Error::ExpandTooWide {
                count: request.expand.len(),
                max_branches,
            });
        }
        for spec in &request.expand {
            self.align_expand(spec)?;
        }

        self.align_scope()?;

        if let Some(filter) = &request.filter {
            self.align_filter(filter, NodeId::ROOT, true)?;
        }

        if request.is_aggregate() {
            for group in &request.group_by {
                for property in &group.properties {
                    self.align_property(property)?;
                }
            }
            for aggregate in &request.aggregates {
                for property in &aggregate.properties {
                    self.align_property(property)?;
                }
            }
            // Aggregate ordering refers to output aliases, resolved at emission.
            return Ok(());
        }

        self.align_select()?;

        for order in &request.order_by {
            self.align_property(&order.property)?;
        }
        if self.order_by.is_empty() && request.has_paging() {
            let keys = self.metadata.keys(self.root_type())?;
            trace!(keys = ?keys, "ordering paged request by root keys");
            self.order_by = keys.into_iter().map(OrderSpec::asc).collect();
        }
        Ok(())
    }

    fn align_expand(&mut self, spec: &ExpandSpec) -> Result<(), Error> {
        let node = self.tree.align(self.metadata, NodeId::ROOT, &spec.path)?;
        if node == NodeId::ROOT {
            return Err(Error::illegal_column(spec.path.clone(), self.root_type()));
        }
        self.tree.mark_expanded(node);

        for member in &spec.select {
            self.check_scalar(node, member)?;
        }
        for order in &spec.order_by {
            if !split_member(&order.property).0.is_empty() {
                return Err(Error::Unsupported(format!(
                    "ordering expansion '{}' by navigation path '{}'",
                    spec.path, order.property
                )));
            }
            self.check_scalar(node, &order.property)?;
        }
        if let Some(filter) = &spec.filter {
            self.align_filter(filter, node, false)?;
        }

        let target = self.tree.node_mut(node);
        target.select = spec.select.clone();
        target.filter = spec.filter.clone();
        target.order_by = spec.order_by.clone();
        target.top = spec.top;
        target.skip = spec.skip;
        trace!(path = %spec.path, "expansion aligned");
        Ok(())
    }

    /// Chain reverse steps from the root up through the ancestor scope.
    fn align_scope(&mut self) -> Result<(), Error> {
        let mut current = NodeId::ROOT;
        for ancestor in &self.request.scope {
            let node = self.tree.align_reverse(
                self.metadata,
                current,
                &ancestor.ancestor_type,
                &ancestor.navigation,
            )?;
            self.tree.mark_filtered(node);
            for (key, _) in &ancestor.keys {
                self.check_scalar(node, key)?;
            }
            self.scope_nodes.push((node, ancestor.keys.clone()));
            current = node;
        }
        Ok(())
    }

    /// Align filter paths relative to `base`.
    ///
    /// Inline leaves are marked filtered so they get joined; everything
    /// under an `any`/`all` lambda is reached through a subquery instead.
    pub(crate) fn align_filter(
        &mut self,
        expr: &FilterExpr,
        base: NodeId,
        inline: bool,
    ) -> Result<(), Error> {
        let mut stack = vec![(expr, base, inline)];
        while let Some((expr, base, inline)) = stack.pop() {
            match expr {
                FilterExpr::Compare { left, right, .. } => {
                    for operand in [left, right] {
                        if let Some(path) = operand.as_property() {
                            self.align_leaf(base, path, inline)?;
                        }
                    }
                }
                FilterExpr::In { operand, .. } | FilterExpr::IsNull { operand, .. } => {
                    if let Some(path) = operand.as_property() {
                        self.align_leaf(base, path, inline)?;
                    }
                }
                FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                    stack.extend(exprs.iter().map(|e| (e, base, inline)));
                }
                FilterExpr::Not(inner) => stack.push((inner.as_ref(), base, inline)),
                FilterExpr::Any { path, predicate } => {
                    let target = self.align_lambda(base, path)?;
                    if let Some(predicate) = predicate {
                        stack.push((predicate.as_ref(), target, false));
                    }
                }
                FilterExpr::All { path, predicate } => {
                    let target = self.align_lambda(base, path)?;
                    stack.push((predicate.as_ref(), target, false));
                }
            }
        }
        Ok(())
    }

    fn align_lambda(&mut self, base: NodeId, path: &str) -> Result<NodeId, Error> {
        if path.is_empty() {
            let type_name = self.tree.node(base).element_type.clone();
            return Err(Error::illegal_column(path, type_name));
        }
        self.tree.align_subselect(self.metadata, base, path)
    }

    fn align_leaf(&mut self, base: NodeId, path: &str, inline: bool) -> Result<(), Error> {
        let (prefix, member) = split_member(path);
        let node = if inline {
            let node = self.tree.align(self.metadata, base, prefix)?;
            self.tree.mark_filtered(node);
            node
        } else {
            self.tree.align_subselect(self.metadata, base, prefix)?
        };
        self.check_scalar(node, member)
    }

    /// Align a root-relative property path for inline joining.
    fn align_property(&mut self, path: &str) -> Result<NodeId, Error> {
        let (prefix, member) = split_member(path);
        let node = self.tree.align(self.metadata, NodeId::ROOT, prefix)?;
        self.tree.mark_filtered(node);
        self.check_scalar(node, member)?;
        Ok(node)
    }

    /// Root members are selected directly; a navigation-prefixed member
    /// expands its navigation and selects the member there.
    fn align_select(&mut self) -> Result<(), Error> {
        let mut root_select = Vec::new();
        for path in &self.request.select {
            let (prefix, member) = split_member(path);
            if prefix.is_empty() {
                self.check_scalar(NodeId::ROOT, member)?;
                root_select.push(member.to_string());
                continue;
            }

            let node = self.tree.align(self.metadata, NodeId::ROOT, prefix)?;
            self.check_scalar(node, member)?;
            let selects_all = {
                let node = self.tree.node(node);
                node.expanded && node.select.is_empty()
            };
            self.tree.mark_expanded(node);
            if !selects_all {
                let select = &mut self.tree.node_mut(node).select;
                if !select.iter().any(|s| s == member) {
                    select.push(member.to_string());
                }
            }
        }
        self.tree.node_mut(NodeId::ROOT).select = root_select;
        Ok(())
    }

    /// Check that `member` is a scalar member of the node's type hierarchy.
    pub(crate) fn check_scalar(&self, node: NodeId, member: &str) -> Result<(), Error> {
        let type_name = &self.tree.node(node).element_type;
        match self.metadata.member_in_hierarchy(type_name, member) {
            Some((_, found)) if !found.is_navigation() => Ok(()),
            _ => Err(Error::illegal_column(member, type_name.clone())),
        }
    }
}
