//! Join key resolution between types.

use tracing::trace;

use super::link::JoinKeys;
use super::member::MemberDef;
use super::registry::TypeMetadata;
use crate::error::Error;

impl TypeMetadata {
    /// Resolve the join keys for navigating `path` from `parent_type`.
    ///
    /// An explicit override registered for the declaring type and member
    /// wins; otherwise keys are inferred from primary and foreign keys.
    pub fn resolve_join(&self, parent_type: &str, path: &str) -> Result<JoinKeys, Error> {
        let (declaring, member) = self
            .member_in_hierarchy(parent_type, path)
            .ok_or_else(|| Error::illegal_column(path, parent_type))?;
        let (target, _) = member
            .navigation_target()
            .ok_or_else(|| Error::illegal_column(path, parent_type))?;

        if let Some(keys) = self.override_for(declaring, &member.name) {
            trace!(parent = parent_type, path, "using join override");
            return Ok(keys);
        }

        self.resolve_join_nodes(parent_type, target, member)
            .map_err(|err| match err {
                Error::MismatchedNodes { .. } => Error::UnresolvedJoin {
                    parent: parent_type.to_string(),
                    path: path.to_string(),
                },
                other => other,
            })
    }

    /// Infer join keys between two types connected by `member`.
    ///
    /// For a collection navigation the child's foreign key to the parent's
    /// primary key is tried first, then the reverse; a single-valued
    /// navigation tries the parent's foreign key first. Types of the same
    /// hierarchy with no foreign key fall back to primary key equality.
    pub fn resolve_join_nodes(
        &self,
        parent_type: &str,
        child_type: &str,
        member: &MemberDef,
    ) -> Result<JoinKeys, Error> {
        let parent_keys = self.keys(parent_type)?;
        let child_keys = self.keys(child_type)?;
        let collection = member
            .navigation_target()
            .map(|(_, collection)| collection)
            .unwrap_or(false);

        let forward = || {
            self.foreign_keys_to(child_type, parent_type, &parent_keys, &member.name)
                .map(|fks| parent_keys.iter().cloned().zip(fks).collect::<Vec<_>>())
        };
        let backward = || {
            self.foreign_keys_to(parent_type, child_type, &child_keys, &member.name)
                .map(|fks| fks.into_iter().zip(child_keys.iter().cloned()).collect::<Vec<_>>())
        };

        let found = if collection {
            forward().or_else(backward)
        } else {
            backward().or_else(forward)
        };
        if let Some(pairs) = found {
            return Ok(JoinKeys::direct(pairs));
        }

        let same_hierarchy = self.hierarchy_root(parent_type)? == self.hierarchy_root(child_type)?;
        if same_hierarchy && !parent_keys.is_empty() && parent_keys == child_keys {
            return Ok(JoinKeys::direct(
                parent_keys.iter().map(|k| (k.clone(), k.clone())).collect(),
            ));
        }

        Err(Error::MismatchedNodes {
            left: parent_type.to_string(),
            right: child_type.to_string(),
        })
    }

    /// Find the non-key foreign key members on `holder` that reference the
    /// keys of `target`, one per key, in key order.
    ///
    /// Members named after the navigation or the target type plus the key
    /// name are preferred; a lone foreign key to the target type is accepted
    /// for single-column keys.
    fn foreign_keys_to(
        &self,
        holder: &str,
        target: &str,
        target_keys: &[String],
        navigation: &str,
    ) -> Option<Vec<String>> {
        if target_keys.is_empty() {
            return None;
        }

        let columns = self.columns(holder).ok()?;
        let candidates: Vec<&MemberDef> = columns
            .iter()
            .map(|c| &c.member)
            .filter(|m| !m.key)
            .filter(|m| {
                m.foreign_key.as_deref().is_some_and(|fk| {
                    self.is_assignable(target, fk) || self.is_assignable(fk, target)
                })
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let exact: Option<Vec<String>> = target_keys
            .iter()
            .map(|key| {
                candidates
                    .iter()
                    .find(|m| {
                        let fk = m.foreign_key.as_deref().unwrap_or_default();
                        m.name == format!("{navigation}{key}")
                            || m.name == format!("{target}{key}")
                            || m.name == format!("{fk}{key}")
                    })
                    .map(|m| m.name.clone())
            })
            .collect();
        if exact.is_some() {
            return exact;
        }

        if target_keys.len() == 1 && candidates.len() == 1 {
            return Some(vec![candidates[0].name.clone()]);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::metadata::{JoinOverride, LinkTable, MemberDef, ScalarType, TypeDescriptor, TypeMetadata};

    fn shop() -> TypeMetadata {
        TypeMetadata::init(vec![
            TypeDescriptor::new("Customer")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::collection("Orders", "Order")),
            TypeDescriptor::new("Order")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(
                    MemberDef::scalar("CustomerId", ScalarType::Int32).with_foreign_key("Customer"),
                )
                .with_member(
                    MemberDef::optional("BillingAddressId", ScalarType::Int32)
                        .with_foreign_key("Address"),
                )
                .with_member(
                    MemberDef::optional("ShippingAddressId", ScalarType::Int32)
                        .with_foreign_key("Address"),
                )
                .with_member(MemberDef::navigation("Customer", "Customer"))
                .with_member(MemberDef::navigation("BillingAddress", "Address"))
                .with_member(MemberDef::collection("Lines", "OrderLine"))
                .with_member(MemberDef::collection("Tags", "Tag")),
            TypeDescriptor::new("OrderLine")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::scalar("OrderId", ScalarType::Int32).with_foreign_key("Order"))
                .with_member(MemberDef::navigation("Order", "Order")),
            TypeDescriptor::new("Address")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key()),
            TypeDescriptor::new("Tag")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key()),
            TypeDescriptor::new("Employee")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(
                    MemberDef::optional("ManagerId", ScalarType::Int32).with_foreign_key("Employee"),
                )
                .with_member(MemberDef::navigation("Manager", "Employee"))
                .with_member(MemberDef::collection("Reports", "Employee")),
        ])
        .unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_collection_uses_child_foreign_key() {
        let meta = shop();
        let keys = meta.resolve_join("Order", "Lines").unwrap();
        assert_eq!(keys.pairs, pairs(&[("Id", "OrderId")]));
        assert!(keys.link.is_none());
    }

    #[test]
    fn test_scalar_uses_parent_foreign_key() {
        let meta = shop();
        let keys = meta.resolve_join("OrderLine", "Order").unwrap();
        assert_eq!(keys.pairs, pairs(&[("OrderId", "Id")]));
    }

    #[test]
    fn test_exact_name_beats_type_only_match() {
        let meta = shop();
        let keys = meta.resolve_join("Order", "BillingAddress").unwrap();
        assert_eq!(keys.pairs, pairs(&[("BillingAddressId", "Id")]));
    }

    #[test]
    fn test_self_referencing_navigations() {
        let meta = shop();
        let manager = meta.resolve_join("Employee", "Manager").unwrap();
        assert_eq!(manager.pairs, pairs(&[("ManagerId", "Id")]));

        let reports = meta.resolve_join("Employee", "Reports").unwrap();
        assert_eq!(reports.pairs, pairs(&[("Id", "ManagerId")]));
    }

    #[test]
    fn test_unresolvable_join() {
        let meta = shop();
        let err = meta.resolve_join("Order", "Tags").unwrap_err();
        assert!(matches!(err, Error::UnresolvedJoin { ref path, .. } if path == "Tags"));
    }

    #[test]
    fn test_override_with_link_table() {
        let meta = shop();
        meta.register_override(JoinOverride::linked(
            "Order",
            "Tags",
            LinkTable::new("OrderTags", "Id", "OrderId", "TagId", "Id"),
        ))
        .unwrap();

        let keys = meta.resolve_join("Order", "Tags").unwrap();
        let link = keys.link.unwrap();
        assert_eq!(link.table, "OrderTags");
        assert_eq!(link.source_pairs, pairs(&[("Id", "OrderId")]));
    }

    #[test]
    fn test_scalar_member_is_not_a_navigation() {
        let meta = shop();
        let err = meta.resolve_join("Order", "CustomerId").unwrap_err();
        assert!(matches!(err, Error::IllegalColumn { .. }));
    }
}
