//! Navigation path trees.
//!
//! A [`PathTree`] mirrors the navigation structure of one request: the root
//! type plus every navigation reached by expand, filter, order, group-by,
//! aggregate and scope references. Nodes live in an arena and refer to
//! their parent by [`NodeId`].

use graphplan_proto::filter::segments;
use graphplan_proto::{FilterExpr, OrderSpec};
use tracing::trace;

use crate::error::Error;
use crate::metadata::TypeMetadata;

/// Index of a node in its [`PathTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One navigation step of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    /// Arena id.
    pub id: NodeId,
    /// Type of the elements reached by this step.
    pub element_type: String,
    /// Navigation member name, empty for the root.
    pub path: String,
    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in discovery order.
    pub children: Vec<NodeId>,
    /// Step yields many elements per parent.
    pub is_collection: bool,
    /// Queried only through correlated subqueries, never joined inline.
    pub is_sub_select: bool,
    /// Step navigates from a child back to one of its ancestors.
    pub reverse: bool,
    /// Position id: parent id plus child ordinal, `"0"` for the root.
    pub component_id: String,
    /// Number of steps from the root.
    pub depth: usize,
    /// Projected into the result graph.
    pub expanded: bool,
    /// Referenced by filter, order, scope, group-by or aggregate paths.
    pub filtered: bool,
    /// Members selected on this node (empty = all).
    pub select: Vec<String>,
    /// Per-branch filter.
    pub filter: Option<FilterExpr>,
    /// Per-branch ordering.
    pub order_by: Vec<OrderSpec>,
    /// Per-parent limit.
    pub top: Option<u64>,
    /// Per-parent offset.
    pub skip: Option<u64>,
}

impl PathNode {
    fn new(id: NodeId, element_type: String, path: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            element_type,
            path,
            parent,
            children: Vec::new(),
            is_collection: false,
            is_sub_select: false,
            reverse: false,
            component_id: String::from("0"),
            depth: 0,
            expanded: false,
            filtered: false,
            select: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            top: None,
            skip: None,
        }
    }

    /// Check if this is the root node.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Check if per-parent paging or ordering applies to this node.
    pub fn has_paging(&self) -> bool {
        self.top.is_some() || self.skip.is_some()
    }
}

/// Arena-backed tree of [`PathNode`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTree {
    nodes: Vec<PathNode>,
    max_depth: usize,
}

impl PathTree {
    /// Create a tree holding only the root node.
    pub fn new(root_type: impl Into<String>, max_depth: usize) -> Self {
        let mut root = PathNode::new(NodeId::ROOT, root_type.into(), String::new(), None);
        root.expanded = true;
        Self {
            nodes: vec![root],
            max_depth,
        }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> &PathNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PathNode {
        &mut self.nodes[id.0]
    }

    /// All nodes; parents always precede their children.
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Find a direct child by step name and direction.
    pub fn child(&self, parent: NodeId, step: &str, reverse: bool) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|c| {
                let node = &self.nodes[c.0];
                node.path == step && node.reverse == reverse
            })
    }

    /// Find the node reached by a forward path without creating anything.
    pub fn lookup(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let mut current = from;
        for step in segments(path) {
            current = self.child(current, step, false)?;
        }
        Some(current)
    }

    /// Align a forward path for inline joining.
    ///
    /// Walks the path one step at a time, creating missing nodes. Nodes
    /// along the path lose their subselect flag. An empty path aligns to
    /// `from` itself.
    pub fn align(&mut self, metadata: &TypeMetadata, from: NodeId, path: &str) -> Result<NodeId, Error> {
        self.align_with(metadata, from, path, false)
    }

    /// Align a forward path that is only reached through a correlated
    /// subquery. Created nodes are flagged subselect; existing nodes keep
    /// their flag.
    pub fn align_subselect(
        &mut self,
        metadata: &TypeMetadata,
        from: NodeId,
        path: &str,
    ) -> Result<NodeId, Error> {
        self.align_with(metadata, from, path, true)
    }

    fn align_with(
        &mut self,
        metadata: &TypeMetadata,
        from: NodeId,
        path: &str,
        sub_select: bool,
    ) -> Result<NodeId, Error> {
        let mut current = from;
        for step in segments(path) {
            current = match self.child(current, step, false) {
                Some(existing) => {
                    if !sub_select {
                        self.nodes[existing.0].is_sub_select = false;
                    }
                    existing
                }
                None => {
                    let parent_type = self.nodes[current.0].element_type.clone();
                    let (_, member) = metadata
                        .member_in_hierarchy(&parent_type, step)
                        .ok_or_else(|| Error::illegal_column(step, &parent_type))?;
                    let (target, collection) = member
                        .navigation_target()
                        .ok_or_else(|| Error::illegal_column(step, &parent_type))?;
                    let id = self.push_child(current, target.to_string(), step, false)?;
                    let node = &mut self.nodes[id.0];
                    node.is_collection = collection;
                    node.is_sub_select = sub_select;
                    id
                }
            };
        }
        Ok(current)
    }

    /// Align a step from `from` back to an ancestor of type `target_type`
    /// that reaches `from`'s type through its `navigation` member.
    pub fn align_reverse(
        &mut self,
        metadata: &TypeMetadata,
        from: NodeId,
        target_type: &str,
        navigation: &str,
    ) -> Result<NodeId, Error> {
        if let Some(existing) = self.child(from, navigation, true) {
            if self.nodes[existing.0].element_type == target_type {
                return Ok(existing);
            }
        }

        let from_type = self.nodes[from.0].element_type.clone();
        metadata.descriptor(target_type)?;
        let (_, member) = metadata
            .member_in_hierarchy(target_type, navigation)
            .ok_or_else(|| Error::illegal_column(navigation, target_type))?;
        let (nav_target, collection) = member
            .navigation_target()
            .ok_or_else(|| Error::illegal_column(navigation, target_type))?;
        if !metadata.is_assignable(&from_type, nav_target) && !metadata.is_assignable(nav_target, &from_type) {
            return Err(Error::MismatchedNodes {
                left: target_type.to_string(),
                right: from_type,
            });
        }

        let id = self.push_child(from, target_type.to_string(), navigation, true)?;
        let node = &mut self.nodes[id.0];
        node.reverse = true;
        node.is_collection = !collection;
        Ok(id)
    }

    fn push_child(
        &mut self,
        parent: NodeId,
        element_type: String,
        step: &str,
        reverse: bool,
    ) -> Result<NodeId, Error> {
        let depth = self.nodes[parent.0].depth + 1;
        if depth > self.max_depth {
            let mut path = self.full_path(parent);
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(step);
            return Err(Error::ExpandTooDeep {
                path,
                max_depth: self.max_depth,
            });
        }

        let id = NodeId(self.nodes.len());
        let parent_node = &self.nodes[parent.0];
        let mut node = PathNode::new(id, element_type, step.to_string(), Some(parent));
        node.component_id = format!("{}.{}", parent_node.component_id, parent_node.children.len());
        node.depth = depth;
        node.reverse = reverse;

        trace!(
            step,
            component_id = %node.component_id,
            element_type = %node.element_type,
            "path node created"
        );
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Mark a node and its ancestors as part of the result graph.
    pub fn mark_expanded(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &mut self.nodes[node_id.0];
            node.expanded = true;
            current = node.parent;
        }
    }

    /// Mark a node and its ancestors as referenced by predicates.
    pub fn mark_filtered(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &mut self.nodes[node_id.0];
            node.filtered = true;
            current = node.parent;
        }
    }

    /// Ancestors of a node, nearest first, excluding the node itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes[id.0].parent;
        while let Some(node_id) = current {
            result.push(node_id);
            current = self.nodes[node_id.0].parent;
        }
        result
    }

    /// Check if the node and all its ancestors are joined inline.
    pub fn is_inline(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if node.is_sub_select {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Slash-separated path from the root. Reverse steps are prefixed `^`.
    pub fn full_path(&self, id: NodeId) -> String {
        let mut steps = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if !node.is_root() {
                if node.reverse {
                    steps.push(format!("^{}", node.path));
                } else {
                    steps.push(node.path.clone());
                }
            }
            current = node.parent;
        }
        steps.reverse();
        steps.join("/")
    }

    /// Find a node by component id.
    pub fn by_component_id(&self, component_id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.component_id == component_id)
            .map(|n| n.id)
    }
}

/// Component id of the parent, obtained by stripping the last segment.
pub fn parent_component_id(component_id: &str) -> Option<&str> {
    component_id.rsplit_once('.').map(|(parent, _)| parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MemberDef, ScalarType, TypeDescriptor};

    fn metadata() -> TypeMetadata {
        TypeMetadata::init(vec![
            TypeDescriptor::new("Customer")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::collection("Orders", "Order")),
            TypeDescriptor::new("Order")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(
                    MemberDef::scalar("CustomerId", ScalarType::Int32).with_foreign_key("Customer"),
                )
                .with_member(MemberDef::navigation("Customer", "Customer"))
                .with_member(MemberDef::collection("Lines", "OrderLine")),
            TypeDescriptor::new("OrderLine")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::scalar("OrderId", ScalarType::Int32).with_foreign_key("Order"))
                .with_member(MemberDef::scalar("Sku", ScalarType::String))
                .with_member(MemberDef::navigation("Order", "Order")),
        ])
        .unwrap()
    }

    #[test]
    fn test_align_is_idempotent() {
        let meta = metadata();
        let mut tree = PathTree::new("Customer", 5);

        let first = tree.align(&meta, tree.root(), "Orders/Lines").unwrap();
        let len = tree.len();
        let second = tree.align(&meta, tree.root(), "Orders/Lines").unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.len(), len);
        assert_eq!(tree.node(tree.root()).children.len(), 1);
    }

    #[test]
    fn test_empty_path_aligns_to_self() {
        let meta = metadata();
        let mut tree = PathTree::new("Order", 5);
        assert_eq!(tree.align(&meta, tree.root(), "").unwrap(), tree.root());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_component_ids_follow_position() {
        let meta = metadata();
        let mut tree = PathTree::new("Order", 5);
        let customer = tree.align(&meta, tree.root(), "Customer").unwrap();
        let lines = tree.align(&meta, tree.root(), "Lines").unwrap();
        let back = tree.align(&meta, lines, "Order").unwrap();

        assert_eq!(tree.node(tree.root()).component_id, "0");
        assert_eq!(tree.node(customer).component_id, "0.0");
        assert_eq!(tree.node(lines).component_id, "0.1");
        assert_eq!(tree.node(back).component_id, "0.1.0");
        assert_eq!(parent_component_id("0.1.0"), Some("0.1"));
        assert_eq!(parent_component_id("0"), None);
        assert_eq!(tree.by_component_id("0.1"), Some(lines));
    }

    #[test]
    fn test_collection_flag_and_full_path() {
        let meta = metadata();
        let mut tree = PathTree::new("Customer", 5);
        let lines = tree.align(&meta, tree.root(), "Orders/Lines").unwrap();
        let node = tree.node(lines);

        assert!(node.is_collection);
        assert_eq!(node.element_type, "OrderLine");
        assert_eq!(node.depth, 2);
        assert_eq!(tree.full_path(lines), "Orders/Lines");
        assert_eq!(tree.lookup(tree.root(), "Orders/Lines"), Some(lines));
        assert_eq!(tree.lookup(tree.root(), "Orders/Missing"), None);
    }

    #[test]
    fn test_scalar_member_is_illegal_step() {
        let meta = metadata();
        let mut tree = PathTree::new("Order", 5);
        let err = tree.align(&meta, tree.root(), "Id/Foo").unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalColumn { ref property, ref type_name } if property == "Id" && type_name == "Order"
        ));
    }

    #[test]
    fn test_depth_budget() {
        let meta = metadata();
        let mut tree = PathTree::new("Customer", 1);
        let err = tree.align(&meta, tree.root(), "Orders/Lines").unwrap_err();
        assert!(matches!(err, Error::ExpandTooDeep { ref path, max_depth: 1 } if path == "Orders/Lines"));
    }

    #[test]
    fn test_inline_align_clears_subselect() {
        let meta = metadata();
        let mut tree = PathTree::new("Order", 5);
        let lines = tree.align_subselect(&meta, tree.root(), "Lines").unwrap();
        assert!(tree.node(lines).is_sub_select);
        assert!(!tree.is_inline(lines));

        // Subselect alignment leaves inline nodes alone.
        let again = tree.align_subselect(&meta, tree.root(), "Lines").unwrap();
        assert!(tree.node(again).is_sub_select);

        tree.align(&meta, tree.root(), "Lines").unwrap();
        assert!(!tree.node(lines).is_sub_select);
        assert!(tree.is_inline(lines));
    }

    #[test]
    fn test_align_reverse() {
        let meta = metadata();
        let mut tree = PathTree::new("OrderLine", 5);
        let order = tree.align_reverse(&meta, tree.root(), "Order", "Lines").unwrap();
        let customer = tree.align_reverse(&meta, order, "Customer", "Orders").unwrap();

        assert!(tree.node(order).reverse);
        assert!(!tree.node(order).is_collection);
        assert_eq!(tree.node(customer).element_type, "Customer");
        assert_eq!(tree.full_path(customer), "^Lines/^Orders");
        assert_eq!(
            tree.align_reverse(&meta, tree.root(), "Order", "Lines").unwrap(),
            order
        );

        // A forward step of the same name is a different node.
        assert_ne!(tree.child(tree.root(), "Lines", false), Some(order));
    }

    #[test]
    fn test_align_reverse_type_mismatch() {
        let meta = metadata();
        let mut tree = PathTree::new("Customer", 5);
        let err = tree.align_reverse(&meta, tree.root(), "Order", "Lines").unwrap_err();
        assert!(matches!(err, Error::MismatchedNodes { .. }));
    }

    #[test]
    fn test_mark_propagates_to_ancestors() {
        let meta = metadata();
        let mut tree = PathTree::new("Customer", 5);
        let lines = tree.align(&meta, tree.root(), "Orders/Lines").unwrap();
        let orders = tree.lookup(tree.root(), "Orders").unwrap();

        tree.mark_filtered(lines);
        assert!(tree.node(orders).filtered);
        assert!(!tree.node(orders).expanded);

        tree.mark_expanded(orders);
        assert!(tree.node(orders).expanded);
        assert!(!tree.node(lines).expanded);
        assert_eq!(tree.ancestors(lines), vec![orders, tree.root()]);
    }
}
