//! Sources for derived and polymorphic types.
//!
//! A concrete type stored across several tables (one per inheritance
//! level) is read through a select joining its chain of tables on the
//! primary key. A type with concrete subtypes is read through a union of
//! one such select per subtype, padded with NULLs to a common column list
//! and tagged with a discriminator constant.

use graphplan_proto::Value;
use tracing::debug;

use super::PlanContext;
use crate::error::Error;
use crate::metadata::{ScalarType, TypeColumn};
use crate::path::NodeId;
use crate::plan::{Column, ColumnExpr, ColumnRef, Join, JoinType, QueryPlan, Source, SourceId};

impl PlanContext<'_> {
    /// Source reading the rows of `type_name` for `node`.
    pub(crate) fn type_source(&mut self, type_name: &str, node: Option<NodeId>) -> Result<Source, Error> {
        let metadata = self.metadata;

        if metadata.is_polymorphic(type_name) {
            let subtypes = metadata.subtypes(type_name)?;
            if subtypes.is_empty() {
                return Err(Error::InvalidMetadata(format!(
                    "type '{}' has no concrete subtypes",
                    type_name
                )));
            }
            let columns = metadata.union_columns(type_name)?;
            let mut selects = Vec::with_capacity(subtypes.len());
            for subtype in &subtypes {
                selects.push(self.chain_select(subtype, &columns, node, true)?);
            }
            debug!(type_name, subtypes = subtypes.len(), "union source built");
            return Ok(Source::union(self.ids.next_id(), selects, node));
        }

        let descriptor = metadata.descriptor(type_name)?;
        if descriptor.base.is_some() {
            let columns = metadata.columns(type_name)?;
            let select = self.chain_select(type_name, &columns, node, false)?;
            return Ok(Source::select(self.ids.next_id(), select, node));
        }

        Ok(Source::table(self.ids.next_id(), descriptor.table.clone(), node))
    }

    /// Select over the table chain of one concrete type, projecting
    /// `columns` by member name.
    fn chain_select(
        &mut self,
        concrete: &str,
        columns: &[TypeColumn],
        node: Option<NodeId>,
        tagged: bool,
    ) -> Result<QueryPlan, Error> {
        let metadata = self.metadata;
        let chain = metadata.chain(concrete)?;
        let own = metadata.columns(concrete)?;
        let keys: Vec<&TypeColumn> = own.iter().filter(|c| c.member.key).collect();
        let owner = node.unwrap_or(NodeId::ROOT);

        let base = chain[0];
        let root_id = self.ids.next_id();
        let mut plan = QueryPlan::new(Source::table(root_id, base.table.clone(), node));
        let mut tables: Vec<(&str, SourceId)> = vec![(base.table.as_str(), root_id)];

        for level in chain.iter().skip(1) {
            // Levels sharing a table need no extra join.
            if tables.iter().any(|(table, _)| *table == level.table) {
                continue;
            }
            if keys.is_empty() {
                return Err(Error::MismatchedNodes {
                    left: base.name.clone(),
                    right: level.name.clone(),
                });
            }
            let id = self.ids.next_id();
            let statements = keys
                .iter()
                .map(|k| {
                    (
                        ColumnRef::new(root_id, k.member.column.clone()),
                        ColumnRef::new(id, k.member.column.clone()),
                    )
                })
                .collect();
            plan.joins.push(Join::new(
                root_id,
                Source::table(id, level.table.clone(), node),
                JoinType::Inner,
                statements,
            ));
            tables.push((level.table.as_str(), id));
        }

        for column in columns {
            let alias = column.name();
            match own.iter().find(|c| c.name() == alias) {
                Some(found) => {
                    let source = tables
                        .iter()
                        .find(|(table, _)| *table == found.table)
                        .map(|(_, id)| *id)
                        .unwrap_or(root_id);
                    plan.columns.push(Column::field(
                        source,
                        found.member.column.clone(),
                        alias,
                        owner,
                        found,
                    ));
                }
                None => {
                    let mut padding = Column::field(root_id, "NULL", alias, owner, column);
                    padding.expr = ColumnExpr::Null;
                    padding.nullable = true;
                    plan.columns.push(padding);
                }
            }
        }

        if tagged {
            let value = metadata.descriptor(concrete)?.discriminator_value().to_string();
            let mut tag = Column::computed(
                root_id,
                value.clone(),
                self.config.discriminator_alias.clone(),
                owner,
                ColumnExpr::Constant(Value::String(value)),
            );
            tag.discriminator = true;
            tag.scalar = Some(ScalarType::String);
            tag.nullable = false;
            tag.computed = false;
            plan.columns.push(tag);
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::PlanBuilder;
    use crate::metadata::{MemberDef, ScalarType, TypeDescriptor, TypeMetadata};
    use crate::plan::{ColumnExpr, SourceKind};
    use graphplan_proto::{QueryRequest, Value};

    fn animals() -> TypeMetadata {
        TypeMetadata::init(vec![
            TypeDescriptor::new("Animal")
                .with_table("Animals")
                .with_abstract()
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::scalar("Name", ScalarType::String)),
            TypeDescriptor::new("Dog")
                .with_table("Dogs")
                .with_base("Animal")
                .with_discriminator("dog")
                .with_member(MemberDef::scalar("Bark", ScalarType::String)),
            TypeDescriptor::new("Cat")
                .with_table("Cats")
                .with_base("Animal")
                .with_discriminator("cat")
                .with_member(MemberDef::scalar("Lives", ScalarType::Int32)),
        ])
        .unwrap()
    }

    #[test]
    fn test_union_selects_share_alias_list() {
        let metadata = animals();
        let plan = PlanBuilder::new(&metadata)
            .build(&QueryRequest::new("Animal"))
            .unwrap();

        let selects = plan.union_selects().unwrap();
        assert_eq!(selects.len(), 2);
        let aliases: Vec<Vec<String>> = selects.iter().map(|s| s.output_aliases()).collect();
        assert_eq!(aliases[0], vec!["Id", "Name", "Bark", "Lives", "$type"]);
        assert_eq!(aliases[0], aliases[1]);

        // Dog pads Lives with NULL and tags itself.
        let dog = &selects[0];
        assert_eq!(dog.column_by_alias("Lives").unwrap().expr, ColumnExpr::Null);
        assert_eq!(
            dog.column_by_alias("$type").unwrap().expr,
            ColumnExpr::Constant(Value::from("dog"))
        );
        assert_eq!(dog.joins.len(), 1);

        // The outer plan reads the discriminator as a system column.
        let tag = plan.column_by_alias("$type").unwrap();
        assert!(tag.discriminator);
        assert!(tag.system);
        assert!(plan.has_alias("Bark"));
    }

    #[test]
    fn test_derived_type_reads_through_chain_select() {
        let metadata = animals();
        let plan = PlanBuilder::new(&metadata)
            .build(&QueryRequest::new("Dog"))
            .unwrap();

        match &plan.source.kind {
            SourceKind::Select(inner) => {
                assert_eq!(inner.joins.len(), 1);
                assert_eq!(inner.output_aliases(), vec!["Id", "Name", "Bark"]);
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert!(!plan.has_alias("$type"));
    }
}
