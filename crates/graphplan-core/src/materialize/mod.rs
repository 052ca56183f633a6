//! Result materialization.
//!
//! Flat rows are cut into buckets, one per path node, using the plan's
//! column-to-node mapping. Buckets with the same node and identity fold
//! into one record, so a parent repeated by a one-to-many join comes out
//! once with all of its children. Records are linked to the record of
//! their parent node in the same row and navigations are filled bottom-up,
//! applying each expansion's ordering and paging per parent.
//!
//! A split plan is materialized from the rows of its seed and secondary
//! plans together; root records of both agree on identity through the
//! root key columns.

mod record;

use std::collections::{HashMap, HashSet};

use graphplan_proto::{OrderDirection, RowSet, Value};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::error::Error;
use crate::exec::compare_values;
use crate::metadata::TypeMetadata;
use crate::path::{NodeId, PathTree};
use crate::plan::{Column, ColumnExpr, QueryPlan};

pub use record::{Navigation, Record};

/// Columns of one node within a row set, as (row index, column) pairs.
struct NodeLayout<'p> {
    node: NodeId,
    columns: Vec<(usize, &'p Column)>,
}

struct Entry {
    node: NodeId,
    record: Record,
}

/// Rebuilds record trees from executor rows.
pub struct ResultMaterializer<'a> {
    metadata: &'a TypeMetadata,
}

impl<'a> ResultMaterializer<'a> {
    pub fn new(metadata: &'a TypeMetadata) -> Self {
        Self { metadata }
    }

    /// Materialize the rows of a plan's executable plans, given in the
    /// order of [`QueryPlan::executable_plans`]. Returns the root records.
    #[instrument(skip_all, fields(row_sets = row_sets.len()))]
    pub fn materialize(&self, plan: &QueryPlan, row_sets: &[RowSet]) -> Result<Vec<Record>, Error> {
        let plans = plan.executable_plans();
        if plans.len() != row_sets.len() {
            return Err(Error::Materialize(format!(
                "expected {} row sets, got {}",
                plans.len(),
                row_sets.len()
            )));
        }
        let tree = plan
            .tree
            .as_deref()
            .ok_or_else(|| Error::Materialize("plan carries no path tree".to_string()))?;

        if plan.is_aggregate_query {
            return self.flat_records(plan, tree, &row_sets[0]);
        }

        let mut state = Buckets::new(self.metadata, tree);
        for (part, rows) in plans.into_iter().zip(row_sets) {
            let layout = layout(part, rows)?;
            for row in &rows.rows {
                state.add_row(&layout, row)?;
            }
            trace!(rows = rows.len(), buckets = state.entries.len(), "row set bucketed");
        }
        let records = state.assemble()?;
        debug!(records = records.len(), "records materialized");
        Ok(records)
    }

    /// Materialize and convert every root record into `T`.
    pub fn materialize_as<T: DeserializeOwned>(
        &self,
        plan: &QueryPlan,
        row_sets: &[RowSet],
    ) -> Result<Vec<T>, Error> {
        self.materialize(plan, row_sets)?
            .iter()
            .map(Record::deserialize_into)
            .collect()
    }

    /// Aggregate rows: one flat record per row. Root member columns land in
    /// `fields`, group columns through navigations and aggregates in
    /// `dynamic` under their alias.
    fn flat_records(&self, plan: &QueryPlan, tree: &PathTree, rows: &RowSet) -> Result<Vec<Record>, Error> {
        let root_type = &tree.node(NodeId::ROOT).element_type;
        let layout = layout(plan, rows)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows.rows {
            let mut record = Record::new(root_type.clone());
            for part in &layout {
                for (idx, column) in &part.columns {
                    let value = row[*idx].clone();
                    let is_member = part.node == NodeId::ROOT
                        && column.expr == ColumnExpr::Field
                        && self.metadata.member(root_type, &column.member).is_some();
                    if is_member {
                        record.fields.push((column.member.clone(), value));
                    } else {
                        record.dynamic.push((column.alias.clone(), value));
                    }
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}

/// Group a plan's columns by node, parents before children.
fn layout<'p>(plan: &'p QueryPlan, rows: &RowSet) -> Result<Vec<NodeLayout<'p>>, Error> {
    // Executors fill `rows` directly, so widths are checked here.
    if let Some(row) = rows.rows.iter().find(|row| row.len() != rows.columns.len()) {
        return Err(graphplan_proto::Error::InvalidRow {
            expected: rows.columns.len(),
            actual: row.len(),
        }
        .into());
    }
    let mut layout: Vec<NodeLayout<'p>> = Vec::new();
    for column in plan.all_columns() {
        let idx = rows.index_of(&column.alias).ok_or_else(|| {
            Error::Materialize(format!("row set has no column '{}'", column.alias))
        })?;
        match layout.iter_mut().find(|l| l.node == column.node) {
            Some(part) => part.columns.push((idx, column)),
            None => layout.push(NodeLayout {
                node: column.node,
                columns: vec![(idx, column)],
            }),
        }
    }
    layout.sort_by_key(|l| l.node);
    Ok(layout)
}

struct Buckets<'a> {
    metadata: &'a TypeMetadata,
    tree: &'a PathTree,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
    /// Children per (parent entry, child node), in first-seen order.
    links: HashMap<(usize, NodeId), Vec<usize>>,
    seen_links: HashSet<(usize, usize)>,
}

impl<'a> Buckets<'a> {
    fn new(metadata: &'a TypeMetadata, tree: &'a PathTree) -> Self {
        Self {
            metadata,
            tree,
            entries: Vec::new(),
            index: HashMap::new(),
            roots: Vec::new(),
            links: HashMap::new(),
            seen_links: HashSet::new(),
        }
    }

    fn add_row(&mut self, layout: &[NodeLayout<'_>], row: &[Value]) -> Result<(), Error> {
        let mut in_row: HashMap<NodeId, usize> = HashMap::new();
        for part in layout {
            let values: Vec<(&Column, &Value)> = part.columns.iter().map(|(idx, c)| (*c, &row[*idx])).collect();
            // Unmatched left join.
            if values.iter().all(|(_, v)| v.is_null()) {
                continue;
            }

            let node = self.tree.node(part.node);
            let key = format!("{}|{}", node.component_id, identity(&values));
            let entry = match self.index.get(&key) {
                Some(&entry) => {
                    merge_fields(&mut self.entries[entry].record, &values, self.metadata);
                    entry
                }
                None => {
                    let record = self.new_record(part.node, &values)?;
                    let entry = self.entries.len();
                    self.entries.push(Entry {
                        node: part.node,
                        record,
                    });
                    self.index.insert(key, entry);
                    if part.node == NodeId::ROOT {
                        self.roots.push(entry);
                    }
                    entry
                }
            };

            if let Some(parent) = node.parent {
                let parent_entry = in_row.get(&parent).copied().ok_or_else(|| {
                    Error::DataInconsistency(format!(
                        "row for '{}' has no parent '{}' row",
                        self.tree.full_path(part.node),
                        self.tree.full_path(parent)
                    ))
                })?;
                if self.seen_links.insert((parent_entry, entry)) {
                    self.links.entry((parent_entry, part.node)).or_default().push(entry);
                }
            }
            in_row.insert(part.node, entry);
        }
        Ok(())
    }

    fn new_record(&self, node: NodeId, values: &[(&Column, &Value)]) -> Result<Record, Error> {
        let element_type = &self.tree.node(node).element_type;
        let type_name = self.concrete_type(element_type, values)?;
        let descriptor = self.metadata.descriptor(type_name)?;

        let mut record = Record::new(type_name);
        for (column, value) in values {
            if column.discriminator {
                continue;
            }
            match self.metadata.member(type_name, &column.member) {
                Some((_, member)) if !member.is_navigation() => {
                    if !record.has_field(&column.member) {
                        record.fields.push((column.member.clone(), (*value).clone()));
                    }
                }
                _ if descriptor.open && !column.system && !value.is_null() => {
                    record.dynamic.push((column.member.clone(), (*value).clone()));
                }
                _ => {}
            }
        }
        for child in &self.tree.node(node).children {
            let child = self.tree.node(*child);
            if child.expanded && !child.reverse && !child.is_sub_select {
                record.set_navigation(&child.path, Navigation::empty(child.is_collection));
            }
        }
        Ok(record)
    }

    /// Concrete type of a row, read from its discriminator when the node's
    /// type has subtypes.
    fn concrete_type<'t>(&'t self, element_type: &'t str, values: &[(&Column, &Value)]) -> Result<&'t str, Error> {
        let descriptor = self.metadata.descriptor(element_type)?;
        let tag = values
            .iter()
            .find(|(c, _)| c.discriminator)
            .and_then(|(_, v)| v.as_str());
        match tag {
            Some(tag) => self.metadata.concrete_type_for(element_type, tag).ok_or_else(|| {
                Error::DataInconsistency(format!(
                    "discriminator '{}' names no subtype of '{}'",
                    tag, element_type
                ))
            }),
            None if descriptor.is_abstract => Err(Error::DataInconsistency(format!(
                "row of abstract type '{}' carries no discriminator",
                element_type
            ))),
            None => Ok(element_type),
        }
    }

    /// Fill navigations bottom-up and return the root records.
    fn assemble(mut self) -> Result<Vec<Record>, Error> {
        let mut by_node: Vec<(usize, NodeId)> = self.links.keys().copied().collect();
        by_node.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (parent, child_node) in by_node {
            let node = self.tree.node(child_node);
            let children = self.links.get(&(parent, child_node)).cloned().unwrap_or_default();
            let mut records: Vec<Record> = children.iter().map(|&c| self.entries[c].record.clone()).collect();

            for order in node.order_by.iter().rev() {
                records.sort_by(|a, b| {
                    let x = a.get(&order.property).unwrap_or(&Value::Null);
                    let y = b.get(&order.property).unwrap_or(&Value::Null);
                    match order.direction {
                        OrderDirection::Asc => compare_values(x, y),
                        OrderDirection::Desc => compare_values(y, x),
                    }
                });
            }
            let skip = node.skip.map_or(0, |s| s as usize);
            let top = node.top.map_or(usize::MAX, |t| t as usize);
            let records: Vec<Record> = records.into_iter().skip(skip).take(top).collect();

            let navigation = if node.is_collection {
                Navigation::Many(records)
            } else {
                if records.len() > 1 {
                    return Err(Error::DataInconsistency(format!(
                        "scalar navigation '{}' matched {} rows",
                        self.tree.full_path(child_node),
                        records.len()
                    )));
                }
                Navigation::One(records.into_iter().next().map(Box::new))
            };
            self.entries[parent].record.set_navigation(&node.path, navigation);
        }

        let roots = std::mem::take(&mut self.roots);
        Ok(roots
            .into_iter()
            .map(|idx| std::mem::take(&mut self.entries[idx].record))
            .collect())
    }
}

/// Identity of a bucket: its key values when all are present, otherwise
/// every value.
fn identity(values: &[(&Column, &Value)]) -> String {
    let keys: Vec<&Value> = values
        .iter()
        .filter(|(c, _)| c.is_key)
        .map(|(_, v)| *v)
        .collect();
    let chosen: Vec<&Value> = if !keys.is_empty() && keys.iter().all(|v| !v.is_null()) {
        keys
    } else {
        values.iter().map(|(_, v)| *v).collect()
    };
    chosen
        .iter()
        .map(|v| v.key_fragment())
        .collect::<Vec<_>>()
        .join("|")
}

/// Add member values a record does not carry yet, such as the full
/// columns of a row first seen through its keys.
fn merge_fields(record: &mut Record, values: &[(&Column, &Value)], metadata: &TypeMetadata) {
    for (column, value) in values {
        if column.discriminator || record.has_field(&column.member) {
            continue;
        }
        if let Some((_, member)) = metadata.member(&record.type_name, &column.member) {
            if !member.is_navigation() {
                record.fields.push((column.member.clone(), (*value).clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::shop;
    use crate::builder::PlanBuilder;
    use graphplan_proto::{ExpandSpec, OrderSpec, QueryRequest};
    use pretty_assertions::assert_eq;

    fn rows(plan: &QueryPlan, data: Vec<Vec<(&str, Value)>>) -> RowSet {
        let columns = plan.output_aliases();
        let mut set = RowSet::new(columns.clone());
        for row in data {
            let values = columns
                .iter()
                .map(|c| {
                    row.iter()
                        .find(|(name, _)| name == c)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null)
                })
                .collect();
            set.push(values).unwrap();
        }
        set
    }

    #[test]
    fn test_short_row_is_rejected() {
        let metadata = shop();
        let plan = PlanBuilder::new(&metadata).build(&QueryRequest::new("Order")).unwrap();
        let set = RowSet {
            columns: plan.output_aliases(),
            rows: vec![vec![Value::from(1)]],
        };

        let err = ResultMaterializer::new(&metadata).materialize(&plan, &[set]).unwrap_err();
        assert!(matches!(
            err,
            Error::Proto(graphplan_proto::Error::InvalidRow { actual: 1, .. })
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Execution);
    }

    #[test]
    fn test_parent_with_children_folds_once() {
        let metadata = shop();
        let request = QueryRequest::new("Order").expand(ExpandSpec::new("Lines"));
        let plan = PlanBuilder::new(&metadata).build(&request).unwrap();

        let set = rows(
            &plan,
            vec![
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(10)), ("Lines/Sku", "A".into())],
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(11)), ("Lines/Sku", "B".into())],
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(12)), ("Lines/Sku", "C".into())],
                vec![("Id", Value::from(2))],
            ],
        );
        let records = ResultMaterializer::new(&metadata).materialize(&plan, &[set]).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].many("Lines").len(), 3);
        assert!(records[1].many("Lines").is_empty());
        assert!(records[1].navigation("Lines").is_some());
    }

    #[test]
    fn test_expand_order_and_paging_per_parent() {
        let metadata = shop();
        let request = QueryRequest::new("Order").expand(
            ExpandSpec::new("Lines")
                .with_order(OrderSpec::desc("Sku"))
                .with_skip(1)
                .with_top(1),
        );
        let plan = PlanBuilder::new(&metadata).build(&request).unwrap();

        let set = rows(
            &plan,
            vec![
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(10)), ("Lines/Sku", "A".into())],
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(11)), ("Lines/Sku", "C".into())],
                vec![("Id", Value::from(1)), ("Lines/Id", Value::from(12)), ("Lines/Sku", "B".into())],
            ],
        );
        let records = ResultMaterializer::new(&metadata).materialize(&plan, &[set]).unwrap();

        let lines = records[0].many("Lines");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].get("Sku"), Some(&Value::from("B")));
    }

    #[test]
    fn test_scalar_navigation_shared_by_parents() {
        let metadata = shop();
        let request = QueryRequest::new("Order").expand(ExpandSpec::new("Customer"));
        let plan = PlanBuilder::new(&metadata).build(&request).unwrap();

        let set = rows(
            &plan,
            vec![
                vec![("Id", Value::from(1)), ("Customer/Id", Value::from(5)), ("Customer/Name", "Ada".into())],
                vec![("Id", Value::from(2)), ("Customer/Id", Value::from(5)), ("Customer/Name", "Ada".into())],
                vec![("Id", Value::from(3))],
            ],
        );
        let records = ResultMaterializer::new(&metadata).materialize(&plan, &[set]).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].one("Customer").unwrap().get("Name"), Some(&Value::from("Ada")));
        assert_eq!(records[1].one("Customer"), records[0].one("Customer"));
        assert!(records[2].one("Customer").is_none());
    }

    #[test]
    fn test_child_without_parent_is_inconsistent() {
        let metadata = shop();
        let request = QueryRequest::new("Order").expand(ExpandSpec::new("Lines"));
        let plan = PlanBuilder::new(&metadata).build(&request).unwrap();

        let set = rows(&plan, vec![vec![("Lines/Id", Value::from(10))]]);
        let err = ResultMaterializer::new(&metadata)
            .materialize(&plan, &[set])
            .unwrap_err();
        assert!(matches!(err, Error::DataInconsistency(_)));
    }

    #[test]
    fn test_row_set_count_must_match() {
        let metadata = shop();
        let plan = PlanBuilder::new(&metadata).build(&QueryRequest::new("Order")).unwrap();
        let err = ResultMaterializer::new(&metadata).materialize(&plan, &[]).unwrap_err();
        assert!(matches!(err, Error::Materialize(_)));
    }
}
