//! In-memory plan evaluation.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use graphplan_proto::{AggregateKind, CompareOp, OrderDirection, RowSet, Value};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::compare::{compare_values, like_match, values_equal};
use super::{BackendTarget, Executor, ShardSet};
use crate::error::Error;
use crate::plan::{
    Column, ColumnExpr, ColumnRef, Join, JoinType, OrderItem, OrderKey, Predicate, QueryPlan, Scalar, Source,
    SourceId, SourceKind,
};

/// One stored or derived row, keyed by column name.
type Row = HashMap<String, Value>;

/// The rows bound to each source at one point of a join. A missing source
/// reads as NULL.
type Tuple = HashMap<SourceId, Arc<Row>>;

/// Executor over in-memory tables.
///
/// Rows are keyed by storage column name. Reading a table that was never
/// created yields no rows.
#[derive(Debug)]
pub struct MemoryExecutor {
    tables: RwLock<HashMap<String, Vec<Arc<Row>>>>,
    count_expression: String,
    join_for_skip: bool,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            count_expression: "COUNT(*)".to_string(),
            join_for_skip: false,
        }
    }
}

impl MemoryExecutor {
    /// Create an executor with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the planner to emulate root paging with key joins.
    pub fn with_join_for_skip(mut self, enabled: bool) -> Self {
        self.join_for_skip = enabled;
        self
    }

    /// Set the reported count-all expression.
    pub fn with_count_expression(mut self, expression: impl Into<String>) -> Self {
        self.count_expression = expression.into();
        self
    }

    /// Create an empty table, keeping existing rows.
    pub fn create_table(&self, table: impl Into<String>) {
        self.tables.write().entry(table.into()).or_default();
    }

    /// Append a row to a table, creating the table if needed.
    pub fn insert<K: Into<String>>(&self, table: &str, row: impl IntoIterator<Item = (K, Value)>) {
        let row: Row = row.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(Arc::new(row));
    }

    /// Number of rows stored in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    fn source_rows(&self, source: &Source, outer: &Tuple) -> Result<Vec<Arc<Row>>, Error> {
        match &source.kind {
            SourceKind::Table { table } => match self.tables.read().get(table) {
                Some(rows) => Ok(rows.clone()),
                None => {
                    trace!(table = %table, "reading missing table as empty");
                    Ok(Vec::new())
                }
            },
            SourceKind::Select(plan) => Ok(into_rows(self.evaluate(plan, outer)?)),
            SourceKind::Union(selects) => {
                let mut rows = Vec::new();
                for select in selects {
                    rows.extend(into_rows(self.evaluate(select, outer)?));
                }
                Ok(rows)
            }
            SourceKind::Script(_) => Err(Error::Executor(format!(
                "script source {} is not supported in memory",
                source.id
            ))),
        }
    }

    /// Tuples of the plan's sources and joins that pass its filter.
    fn matching_tuples(&self, plan: &QueryPlan, outer: &Tuple) -> Result<Vec<Tuple>, Error> {
        let mut tuples: Vec<Tuple> = self
            .source_rows(&plan.source, outer)?
            .into_iter()
            .map(|row| {
                let mut tuple = outer.clone();
                tuple.insert(plan.source.id, row);
                tuple
            })
            .collect();
        for join in &plan.joins {
            tuples = self.join(tuples, join, outer)?;
        }
        if let Some(filter) = &plan.filter {
            let mut kept = Vec::with_capacity(tuples.len());
            for tuple in tuples {
                if self.eval(filter, &tuple)? == Some(true) {
                    kept.push(tuple);
                }
            }
            tuples = kept;
        }
        Ok(tuples)
    }

    fn join(&self, left: Vec<Tuple>, join: &Join, outer: &Tuple) -> Result<Vec<Tuple>, Error> {
        let right = self.source_rows(&join.target, outer)?;
        let id = join.target.id;
        let keep_left = matches!(join.join_type, JoinType::Left | JoinType::Merge);
        let keep_right = matches!(join.join_type, JoinType::Right | JoinType::Merge);

        let mut joined = Vec::new();
        let mut right_matched = vec![false; right.len()];
        for tuple in &left {
            let mut matched = false;
            for (idx, row) in right.iter().enumerate() {
                let mut candidate = tuple.clone();
                candidate.insert(id, Arc::clone(row));
                if self.join_matches(join, &candidate)? {
                    matched = true;
                    right_matched[idx] = true;
                    joined.push(candidate);
                }
            }
            if !matched && keep_left {
                joined.push(tuple.clone());
            }
        }
        if keep_right {
            for (row, matched) in right.iter().zip(right_matched) {
                if !matched {
                    let mut tuple = outer.clone();
                    tuple.insert(id, Arc::clone(row));
                    joined.push(tuple);
                }
            }
        }
        Ok(joined)
    }

    fn join_matches(&self, join: &Join, tuple: &Tuple) -> Result<bool, Error> {
        for (left, right) in &join.statements {
            if values_equal(&lookup(tuple, left), &lookup(tuple, right)) != Some(true) {
                return Ok(false);
            }
        }
        match &join.filter {
            Some(filter) => Ok(self.eval(filter, tuple)? == Some(true)),
            None => Ok(true),
        }
    }

    /// Three-valued predicate evaluation; `None` is SQL's UNKNOWN.
    fn eval(&self, predicate: &Predicate, tuple: &Tuple) -> Result<Option<bool>, Error> {
        let result = match predicate {
            Predicate::Compare { left, op, right } => {
                compare(&scalar(tuple, left), *op, &scalar(tuple, right))
            }
            Predicate::In {
                operand,
                values,
                negated,
            } => {
                let value = scalar(tuple, operand);
                if value.is_null() {
                    None
                } else {
                    let mut result = Some(false);
                    for candidate in values {
                        match values_equal(&value, candidate) {
                            Some(true) => {
                                result = Some(true);
                                break;
                            }
                            Some(false) => {}
                            None => result = None,
                        }
                    }
                    result.map(|found| found != *negated)
                }
            }
            Predicate::IsNull { operand, negated } => Some(scalar(tuple, operand).is_null() != *negated),
            Predicate::And(terms) => {
                let mut result = Some(true);
                for term in terms {
                    match self.eval(term, tuple)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Or(terms) => {
                let mut result = Some(false);
                for term in terms {
                    match self.eval(term, tuple)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Predicate::Not(inner) => self.eval(inner, tuple)?.map(|v| !v),
            Predicate::Exists { subquery, negated } => {
                let found = !self.matching_tuples(subquery, tuple)?.is_empty();
                Some(found != *negated)
            }
        };
        Ok(result)
    }

    fn evaluate(&self, plan: &QueryPlan, outer: &Tuple) -> Result<RowSet, Error> {
        let tuples = self.matching_tuples(plan, outer)?;
        let grouped = plan.is_aggregate_query
            || !plan.group_by.is_empty()
            || plan.all_columns().any(Column::is_aggregate);

        let columns: Vec<&Column> = plan.all_columns().collect();
        let mut rows: Vec<(Vec<Value>, Vec<Value>)> = if grouped {
            self.aggregate_rows(plan, &columns, &tuples)?
        } else {
            let mut rows = Vec::with_capacity(tuples.len());
            for tuple in &tuples {
                let values = columns
                    .iter()
                    .map(|c| project(tuple, c))
                    .collect::<Result<Vec<_>, Error>>()?;
                rows.push((sort_keys(&plan.order_by, &columns, tuple, &values), values));
            }
            rows
        };

        if !plan.order_by.is_empty() {
            rows.sort_by(|(a, _), (b, _)| {
                for ((x, y), item) in a.iter().zip(b.iter()).zip(&plan.order_by) {
                    let ordering = compare_values(x, y);
                    let ordering = match item.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let mut values: Vec<Vec<Value>> = rows.into_iter().map(|(_, values)| values).collect();
        if plan.distinct {
            let mut seen = HashSet::new();
            values.retain(|row| seen.insert(row_key(row)));
        }
        let skip = plan.skip.map_or(0, |s| s as usize);
        let top = plan.top.map_or(usize::MAX, |t| t as usize);
        let rows: Vec<Vec<Value>> = values.into_iter().skip(skip).take(top).collect();

        Ok(RowSet {
            columns: plan.output_aliases(),
            rows,
        })
    }

    /// One output row per group of every grouping set.
    fn aggregate_rows(
        &self,
        plan: &QueryPlan,
        columns: &[&Column],
        tuples: &[Tuple],
    ) -> Result<Vec<(Vec<Value>, Vec<Value>)>, Error> {
        let grouped_refs: Vec<&ColumnRef> = plan.group_by.iter().flat_map(|g| g.columns.iter()).collect();
        let empty = Tuple::new();
        let mut rows = Vec::new();

        for set in grouping_sets(plan) {
            let mut groups: Vec<(String, Vec<&Tuple>)> = Vec::new();
            let mut index: HashMap<String, usize> = HashMap::new();
            for tuple in tuples {
                let key = row_key(&set.iter().map(|r| lookup(tuple, r)).collect::<Vec<_>>());
                match index.get(&key) {
                    Some(&idx) => groups[idx].1.push(tuple),
                    None => {
                        index.insert(key.clone(), groups.len());
                        groups.push((key, vec![tuple]));
                    }
                }
            }
            if set.is_empty() && groups.is_empty() {
                groups.push((String::new(), Vec::new()));
            }

            for (_, members) in groups {
                let first = members.first().copied().unwrap_or(&empty);
                let mut values = Vec::with_capacity(columns.len());
                for column in columns {
                    let value = match &column.expr {
                        ColumnExpr::Aggregate { kind, args } => aggregate(kind, args, &members)?,
                        ColumnExpr::Field => {
                            let reference = column.reference();
                            let rolled_up =
                                grouped_refs.contains(&&reference) && !set.contains(&reference);
                            if rolled_up {
                                Value::Null
                            } else {
                                lookup(first, &reference)
                            }
                        }
                        ColumnExpr::Null => Value::Null,
                        ColumnExpr::Constant(value) => value.clone(),
                    };
                    values.push(value);
                }
                rows.push((sort_keys(&plan.order_by, columns, first, &values), values));
            }
        }
        debug!(rows = rows.len(), "aggregate rows computed");
        Ok(rows)
    }
}

impl Executor for MemoryExecutor {
    fn run_plan(
        &self,
        plan: &QueryPlan,
        target: &BackendTarget,
        shards: &ShardSet,
        timeout: Option<Duration>,
    ) -> Result<RowSet, Error> {
        if plan.is_split() {
            return Err(Error::Executor(
                "split plans run through their executable plans".to_string(),
            ));
        }
        let rows = self.evaluate(plan, &Tuple::new())?;
        trace!(
            backend = %target.name,
            shards = shards.shards.len(),
            ?timeout,
            rows = rows.len(),
            "plan evaluated in memory"
        );
        Ok(rows)
    }

    fn count_expression(&self) -> String {
        self.count_expression.clone()
    }

    fn use_join_for_skip(&self) -> bool {
        self.join_for_skip
    }
}

fn into_rows(set: RowSet) -> Vec<Arc<Row>> {
    let RowSet { columns, rows } = set;
    rows.into_iter()
        .map(|values| Arc::new(columns.iter().cloned().zip(values).collect()))
        .collect()
}

fn lookup(tuple: &Tuple, reference: &ColumnRef) -> Value {
    tuple
        .get(&reference.source)
        .and_then(|row| row.get(&reference.name))
        .cloned()
        .unwrap_or(Value::Null)
}

fn scalar(tuple: &Tuple, scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Column(reference) => lookup(tuple, reference),
        Scalar::Literal(value) => value.clone(),
    }
}

fn project(tuple: &Tuple, column: &Column) -> Result<Value, Error> {
    match &column.expr {
        ColumnExpr::Field => Ok(lookup(tuple, &column.reference())),
        ColumnExpr::Null => Ok(Value::Null),
        ColumnExpr::Constant(value) => Ok(value.clone()),
        ColumnExpr::Aggregate { .. } => Err(Error::Executor(format!(
            "aggregate column '{}' outside an aggregate plan",
            column.alias
        ))),
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Option<bool> {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => values_equal(left, right).map(|eq| !eq),
        CompareOp::Like | CompareOp::NotLike => {
            let matched = like_match(left.as_str()?, right.as_str()?);
            Some(matched == (op == CompareOp::Like))
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            values_equal(left, right)?;
            let ordering = compare_values(left, right);
            Some(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn sort_keys(order: &[OrderItem], columns: &[&Column], tuple: &Tuple, values: &[Value]) -> Vec<Value> {
    order
        .iter()
        .map(|item| match &item.key {
            OrderKey::Column(reference) => lookup(tuple, reference),
            OrderKey::Alias(alias) => columns
                .iter()
                .position(|c| &c.alias == alias)
                .and_then(|idx| values.get(idx).cloned())
                .unwrap_or(Value::Null),
        })
        .collect()
}

fn row_key(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::key_fragment)
        .collect::<Vec<_>>()
        .join("|")
}

/// Grouping sets of a plan: the cartesian product of its clauses, where a
/// rollup clause contributes every prefix of its columns.
fn grouping_sets(plan: &QueryPlan) -> Vec<Vec<ColumnRef>> {
    let mut sets: Vec<Vec<ColumnRef>> = vec![Vec::new()];
    for group in &plan.group_by {
        let options: Vec<&[ColumnRef]> = if group.rollup {
            (0..=group.columns.len()).rev().map(|len| &group.columns[..len]).collect()
        } else {
            vec![group.columns.as_slice()]
        };
        let mut next = Vec::with_capacity(sets.len() * options.len());
        for set in &sets {
            for option in &options {
                let mut combined = set.clone();
                combined.extend(option.iter().cloned());
                next.push(combined);
            }
        }
        sets = next;
    }
    sets
}

fn aggregate(kind: &AggregateKind, args: &[ColumnRef], tuples: &[&Tuple]) -> Result<Value, Error> {
    let rows: Vec<Vec<Value>> = tuples
        .iter()
        .map(|t| args.iter().map(|a| lookup(t, a)).collect())
        .collect();
    let non_null = || rows.iter().filter(|r| r.iter().all(|v| !v.is_null()));

    match kind {
        AggregateKind::Count => Ok(Value::Int64(non_null().count() as i64)),
        AggregateKind::CountDistinct => {
            let distinct: HashSet<String> = non_null().map(|r| row_key(r)).collect();
            Ok(Value::Int64(distinct.len() as i64))
        }
        AggregateKind::Custom(name) => Err(Error::Executor(format!(
            "custom aggregate '{}' is not supported in memory",
            name
        ))),
        _ => {
            if args.is_empty() {
                return Err(Error::Executor(format!(
                    "aggregate {} needs an argument",
                    kind.name()
                )));
            }
            let values: Vec<&Value> = non_null().map(|r| &r[0]).collect();
            if values.is_empty() {
                return Ok(Value::Null);
            }
            match kind {
                AggregateKind::Min => Ok(values
                    .into_iter()
                    .min_by(|a, b| compare_values(a, b))
                    .cloned()
                    .unwrap_or(Value::Null)),
                AggregateKind::Max => Ok(values
                    .into_iter()
                    .max_by(|a, b| compare_values(a, b))
                    .cloned()
                    .unwrap_or(Value::Null)),
                _ => numeric(kind, &values),
            }
        }
    }
}

/// Sum or average of non-null numeric values.
fn numeric(kind: &AggregateKind, values: &[&Value]) -> Result<Value, Error> {
    let mut ints: i64 = 0;
    let mut floats: f64 = 0.0;
    let mut any_float = false;
    for value in values {
        match value {
            Value::Int32(v) => ints += i64::from(*v),
            Value::Int64(v) => ints += v,
            Value::Float64(v) => {
                floats += v;
                any_float = true;
            }
            other => {
                return Err(Error::Executor(format!(
                    "{} over non-numeric value {}",
                    kind.name(),
                    other
                )))
            }
        }
    }
    let total = ints as f64 + floats;
    match kind {
        AggregateKind::Avg => Ok(Value::Float64(total / values.len() as f64)),
        _ if any_float => Ok(Value::Float64(total)),
        _ => Ok(Value::Int64(ints)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{GroupBy, SourceIds};
    use crate::path::NodeId;
    use pretty_assertions::assert_eq;

    fn column(source: SourceId, name: &str) -> Column {
        Column::computed(source, name, name, NodeId::ROOT, ColumnExpr::Field)
    }

    fn executor() -> MemoryExecutor {
        let executor = MemoryExecutor::new();
        for (id, name) in [(1, "Ada"), (2, "Bob"), (3, "Cy")] {
            executor.insert("Customers", [("Id", Value::from(id)), ("Name", Value::from(name))]);
        }
        for (id, customer, total) in [(10, 1, 5.0), (11, 1, 7.5), (12, 2, 1.0)] {
            executor.insert(
                "Orders",
                [
                    ("Id", Value::from(id)),
                    ("CustomerId", Value::from(customer)),
                    ("Total", Value::from(total)),
                ],
            );
        }
        executor
    }

    fn run(executor: &MemoryExecutor, plan: &QueryPlan) -> RowSet {
        executor
            .run_plan(plan, &BackendTarget::default(), &ShardSet::default(), None)
            .unwrap()
    }

    #[test]
    fn test_scan_filter_order_and_paging() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let c = ids.next_id();
        let mut plan = QueryPlan::new(Source::table(c, "Customers", None));
        plan.columns.push(column(c, "Name"));
        plan.filter = Some(Predicate::Compare {
            left: Scalar::Column(ColumnRef::new(c, "Name")),
            op: CompareOp::NotLike,
            right: Scalar::Literal(Value::from("B%")),
        });
        plan.order_by.push(OrderItem::column(ColumnRef::new(c, "Id"), OrderDirection::Desc));
        plan.top = Some(1);

        let rows = run(&executor, &plan);
        assert_eq!(rows.columns, vec!["Name"]);
        assert_eq!(rows.rows, vec![vec![Value::from("Cy")]]);
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let c = ids.next_id();
        let o = ids.next_id();
        let mut plan = QueryPlan::new(Source::table(c, "Customers", None));
        plan.columns.push(column(c, "Name"));
        plan.columns.push(Column::computed(o, "Id", "OrderId", NodeId::ROOT, ColumnExpr::Field));
        plan.joins.push(Join::new(
            c,
            Source::table(o, "Orders", None),
            JoinType::Left,
            vec![(ColumnRef::new(c, "Id"), ColumnRef::new(o, "CustomerId"))],
        ));
        plan.order_by.push(OrderItem::column(ColumnRef::new(c, "Id"), OrderDirection::Asc));

        let rows = run(&executor, &plan);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.rows[3], vec![Value::from("Cy"), Value::Null]);

        plan.joins[0].join_type = JoinType::Inner;
        assert_eq!(run(&executor, &plan).len(), 3);

        plan.joins[0].join_type = JoinType::Right;
        assert_eq!(run(&executor, &plan).len(), 3);
    }

    #[test]
    fn test_correlated_exists() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let c = ids.next_id();
        let o = ids.next_id();
        let mut subquery = QueryPlan::new(Source::table(o, "Orders", None));
        subquery.filter = Some(Predicate::columns_eq(ColumnRef::new(c, "Id"), ColumnRef::new(o, "CustomerId")));

        let mut plan = QueryPlan::new(Source::table(c, "Customers", None));
        plan.columns.push(column(c, "Name"));
        plan.filter = Some(Predicate::Exists {
            subquery: Box::new(subquery),
            negated: true,
        });

        let rows = run(&executor, &plan);
        assert_eq!(rows.rows, vec![vec![Value::from("Cy")]]);
    }

    #[test]
    fn test_group_by_rollup() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let o = ids.next_id();
        let mut plan = QueryPlan::new(Source::table(o, "Orders", None));
        plan.columns.push(column(o, "CustomerId"));
        plan.columns.push(Column::computed(
            o,
            "SUM",
            "Total",
            NodeId::ROOT,
            ColumnExpr::Aggregate {
                kind: AggregateKind::Sum,
                args: vec![ColumnRef::new(o, "Total")],
            },
        ));
        plan.group_by.push(GroupBy {
            columns: vec![ColumnRef::new(o, "CustomerId")],
            rollup: true,
        });
        plan.order_by.push(OrderItem::alias("Total", OrderDirection::Desc));
        plan.is_aggregate_query = true;

        let rows = run(&executor, &plan);
        assert_eq!(
            rows.rows,
            vec![
                vec![Value::Null, Value::Float64(13.5)],
                vec![Value::from(1), Value::Float64(12.5)],
                vec![Value::from(2), Value::Float64(1.0)],
            ]
        );
    }

    #[test]
    fn test_count_over_empty_input() {
        let executor = MemoryExecutor::new();
        let mut ids = SourceIds::new();
        let t = ids.next_id();
        let mut plan = QueryPlan::new(Source::table(t, "Missing", None));
        plan.columns.push(Column::computed(
            t,
            "COUNT(*)",
            "$count",
            NodeId::ROOT,
            ColumnExpr::Aggregate {
                kind: AggregateKind::Count,
                args: vec![],
            },
        ));
        plan.is_aggregate_query = true;

        let rows = run(&executor, &plan);
        assert_eq!(rows.rows, vec![vec![Value::Int64(0)]]);
    }

    #[test]
    fn test_union_and_distinct_select() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let a = ids.next_id();
        let b = ids.next_id();
        let mut left = QueryPlan::new(Source::table(a, "Orders", None));
        left.columns.push(column(a, "CustomerId"));
        let mut right = QueryPlan::new(Source::table(b, "Customers", None));
        right.columns.push(Column::computed(b, "Id", "CustomerId", NodeId::ROOT, ColumnExpr::Field));

        let u = ids.next_id();
        let mut plan = QueryPlan::new(Source::union(u, vec![left, right], None));
        plan.columns.push(column(u, "CustomerId"));
        assert_eq!(run(&executor, &plan).len(), 6);

        plan.distinct = true;
        assert_eq!(run(&executor, &plan).len(), 3);
    }

    #[test]
    fn test_unsupported_sources_and_aggregates() {
        let executor = executor();
        let mut ids = SourceIds::new();
        let s = ids.next_id();
        let plan = QueryPlan::new(Source {
            id: s,
            kind: SourceKind::Script("SELECT 1".into()),
            node: None,
        });
        let err = executor
            .run_plan(&plan, &BackendTarget::default(), &ShardSet::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Executor(_)));

        let value = aggregate(&AggregateKind::Custom("MEDIAN".into()), &[], &[]);
        assert!(value.is_err());
    }

    #[test]
    fn test_three_valued_logic() {
        let executor = executor();
        let tuple = Tuple::new();
        let unknown = Predicate::Compare {
            left: Scalar::Literal(Value::Null),
            op: CompareOp::Eq,
            right: Scalar::Literal(Value::from(1)),
        };
        let falsy = Predicate::Compare {
            left: Scalar::Literal(Value::from(2)),
            op: CompareOp::Lt,
            right: Scalar::Literal(Value::from(1)),
        };
        assert_eq!(executor.eval(&unknown, &tuple).unwrap(), None);
        assert_eq!(
            executor
                .eval(&Predicate::And(vec![unknown.clone(), falsy.clone()]), &tuple)
                .unwrap(),
            Some(false)
        );
        assert_eq!(
            executor
                .eval(&Predicate::Or(vec![unknown.clone(), falsy]), &tuple)
                .unwrap(),
            None
        );
        assert_eq!(
            executor.eval(&Predicate::Not(Box::new(unknown)), &tuple).unwrap(),
            None
        );
    }
}
