//! Group-by and aggregate plans.

use graphplan_proto::filter::split_member;
use graphplan_proto::{AggregateKind, AggregateSpec};
use tracing::debug;

use super::emit::{storage_name, Bindings, Bound, Emit};
use super::PlanContext;
use crate::error::Error;
use crate::metadata::ScalarType;
use crate::path::NodeId;
use crate::plan::{Column, ColumnExpr, ColumnRef, GroupBy, OrderItem, QueryPlan, SourceId};

impl PlanContext<'_> {
    /// A plan whose rows are groups: group columns followed by aggregate
    /// columns, filtered like any root query and ordered by output alias.
    pub(crate) fn aggregate_plan(&mut self) -> Result<QueryPlan, Error> {
        let request = self.request;
        let (mut plan, bindings) = self.emit_plan(Emit::Aggregate)?;
        plan.is_aggregate_query = true;

        for group in &request.group_by {
            if !group.rollup && group.properties.len() != 1 {
                return Err(Error::InvalidGroupBy {
                    columns: group.properties.len(),
                });
            }
            let mut refs = Vec::with_capacity(group.properties.len());
            for property in &group.properties {
                let (node, member) = self.resolve_property(NodeId::ROOT, property)?;
                let bound = self.bound(&bindings, node, property)?;
                let column = self.member_column(node, member)?;
                let name = storage_name(bound, &column);
                refs.push(ColumnRef::new(bound.source, name.clone()));
                if !plan.has_alias(property) {
                    plan.columns
                        .push(Column::field(bound.source, name, property.clone(), node, &column));
                }
            }
            plan.group_by.push(GroupBy {
                columns: refs,
                rollup: group.rollup,
            });
        }

        for spec in &request.aggregates {
            let column = self.aggregate_column(spec, &bindings, plan.source.id)?;
            if plan.has_alias(&column.alias) {
                return Err(Error::illegal_column(column.alias, self.root_type()));
            }
            plan.columns.push(column);
        }

        self.apply_filters(&mut plan, &bindings)?;

        for order in &request.order_by {
            if !plan.has_alias(&order.property) {
                return Err(Error::illegal_column(order.property.clone(), self.root_type()));
            }
            plan.order_by
                .push(OrderItem::alias(order.property.clone(), order.direction));
        }
        plan.top = request.top;
        plan.skip = request.skip;

        debug!(
            groups = plan.group_by.len(),
            aggregates = request.aggregates.len(),
            "aggregate plan built"
        );
        Ok(plan)
    }

    fn bound(&self, bindings: &Bindings, node: NodeId, property: &str) -> Result<Bound, Error> {
        bindings.get(&node).copied().ok_or_else(|| Error::UnresolvedJoin {
            parent: self.root_type().to_string(),
            path: property.to_string(),
        })
    }

    fn aggregate_column(
        &self,
        spec: &AggregateSpec,
        bindings: &Bindings,
        root_source: SourceId,
    ) -> Result<Column, Error> {
        let mut args = Vec::with_capacity(spec.properties.len());
        let mut scalars = Vec::with_capacity(spec.properties.len());
        let mut default_kind = None;
        for (idx, property) in spec.properties.iter().enumerate() {
            let (node, member) = self.resolve_property(NodeId::ROOT, property)?;
            let bound = self.bound(bindings, node, property)?;
            let column = self.member_column(node, member)?;
            if idx == 0 {
                default_kind = column.member.default_aggregate.clone();
            }
            scalars.push(column.scalar());
            args.push(ColumnRef::new(bound.source, storage_name(bound, &column)));
        }

        let kind = match spec.kind.clone().or(default_kind) {
            Some(kind) => kind,
            None => {
                return Err(Error::MissingAggregateKind {
                    property: spec
                        .properties
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "*".to_string()),
                    type_name: self.root_type().to_string(),
                })
            }
        };

        let alias = match (&spec.alias, spec.properties.as_slice()) {
            (Some(alias), _) => alias.clone(),
            (None, []) => self.config.count_alias.clone(),
            (None, [property]) => split_member(property).1.to_string(),
            (None, properties) => {
                return Err(Error::MissingAggregateAlias {
                    properties: properties.join(", "),
                })
            }
        };

        let name = if args.is_empty() {
            self.capabilities.count_expression.clone()
        } else {
            kind.name().to_string()
        };
        let first = scalars.first().copied().flatten();
        let scalar = match &kind {
            AggregateKind::Count | AggregateKind::CountDistinct => Some(ScalarType::Int64),
            AggregateKind::Avg => Some(ScalarType::Float64),
            AggregateKind::Sum => match first {
                Some(ScalarType::Int32 | ScalarType::Int64) => Some(ScalarType::Int64),
                Some(_) => Some(ScalarType::Float64),
                None => None,
            },
            AggregateKind::Min | AggregateKind::Max => first,
            AggregateKind::Custom(_) => None,
        };
        let counts = matches!(kind, AggregateKind::Count | AggregateKind::CountDistinct);

        let mut column = Column::computed(
            root_source,
            name,
            alias,
            NodeId::ROOT,
            ColumnExpr::Aggregate { kind, args },
        );
        column.scalar = scalar;
        column.nullable = !counts;
        Ok(column)
    }
}
