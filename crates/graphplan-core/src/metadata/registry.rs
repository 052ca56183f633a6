//! The type metadata registry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::descriptor::TypeDescriptor;
use super::link::{JoinKeys, JoinOverride};
use super::member::MemberDef;
use super::types::ScalarType;
use crate::error::Error;

/// A scalar member as seen from a (possibly derived) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeColumn {
    /// The member definition.
    pub member: MemberDef,
    /// Type that declares the member.
    pub declaring_type: String,
    /// Table that stores the member.
    pub table: String,
}

impl TypeColumn {
    /// Logical member name.
    pub fn name(&self) -> &str {
        &self.member.name
    }

    /// Scalar type of the member.
    pub fn scalar(&self) -> Option<ScalarType> {
        self.member.scalar_type()
    }
}

/// Process-wide, read-mostly entity metadata.
///
/// Descriptors are immutable after [`TypeMetadata::init`]. Derived column
/// lists are cached on first use. Join overrides may be registered after
/// init; each registration bumps [`TypeMetadata::generation`].
#[derive(Debug)]
pub struct TypeMetadata {
    types: HashMap<String, TypeDescriptor>,
    /// Direct derived types, in registration order.
    derived: HashMap<String, Vec<String>>,
    /// (hierarchy root, discriminator value) -> concrete type.
    discriminators: HashMap<(String, String), String>,
    columns: DashMap<String, Arc<Vec<TypeColumn>>>,
    overrides: RwLock<HashMap<(String, String), JoinKeys>>,
    generation: AtomicU64,
}

impl TypeMetadata {
    /// Build the registry from all type descriptors.
    ///
    /// Validates base types, navigation targets and foreign keys, and
    /// requires every type with derived types to be abstract.
    pub fn init(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self, Error> {
        let mut types = HashMap::new();
        let mut order = Vec::new();
        for desc in descriptors {
            if types.contains_key(&desc.name) {
                return Err(Error::InvalidMetadata(format!(
                    "type '{}' registered twice",
                    desc.name
                )));
            }
            order.push(desc.name.clone());
            types.insert(desc.name.clone(), desc);
        }

        let mut derived: HashMap<String, Vec<String>> = HashMap::new();
        for name in &order {
            let desc = &types[name];
            if let Some(base) = &desc.base {
                if !types.contains_key(base) {
                    return Err(Error::InvalidMetadata(format!(
                        "type '{}' derives from unknown type '{}'",
                        name, base
                    )));
                }
                derived.entry(base.clone()).or_default().push(name.clone());
            }
        }

        let mut metadata = Self {
            types,
            derived,
            discriminators: HashMap::new(),
            columns: DashMap::new(),
            overrides: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        };

        for name in &order {
            metadata.validate_type(name)?;
        }

        for name in &order {
            let desc = &metadata.types[name];
            if desc.is_abstract {
                continue;
            }
            let root = metadata.hierarchy_root(name)?.to_string();
            let value = desc.discriminator_value().to_string();
            if let Some(existing) = metadata
                .discriminators
                .insert((root.clone(), value.clone()), name.clone())
            {
                return Err(Error::InvalidMetadata(format!(
                    "discriminator '{}' used by both '{}' and '{}' in hierarchy '{}'",
                    value, existing, name, root
                )));
            }
        }

        debug!(types = metadata.types.len(), "type metadata initialized");
        Ok(metadata)
    }

    fn validate_type(&self, name: &str) -> Result<(), Error> {
        // Walking the chain detects base cycles.
        let chain = self.chain(name)?;
        let desc = chain[chain.len() - 1];

        if self.derived.contains_key(name) && !desc.is_abstract {
            return Err(Error::InvalidMetadata(format!(
                "type '{}' has derived types and must be abstract",
                name
            )));
        }

        let mut seen = HashSet::new();
        for ancestor in &chain {
            for member in &ancestor.members {
                if !seen.insert(member.name.as_str()) {
                    return Err(Error::InvalidMetadata(format!(
                        "member '{}' declared twice in the hierarchy of '{}'",
                        member.name, name
                    )));
                }
            }
        }

        for member in &desc.members {
            if let Some((target, _)) = member.navigation_target() {
                if !self.types.contains_key(target) {
                    return Err(Error::InvalidMetadata(format!(
                        "navigation '{}.{}' targets unknown type '{}'",
                        name, member.name, target
                    )));
                }
            }
            if let Some(target) = &member.foreign_key {
                if !self.types.contains_key(target) {
                    return Err(Error::InvalidMetadata(format!(
                        "foreign key '{}.{}' targets unknown type '{}'",
                        name, member.name, target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Get a descriptor.
    pub fn descriptor(&self, name: &str) -> Result<&TypeDescriptor, Error> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Check if a type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The inheritance chain of a type, base first.
    pub fn chain(&self, name: &str) -> Result<Vec<&TypeDescriptor>, Error> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            let desc = self.descriptor(type_name)?;
            if chain.len() > self.types.len() {
                return Err(Error::InvalidMetadata(format!(
                    "inheritance cycle through '{}'",
                    name
                )));
            }
            chain.push(desc);
            current = desc.base.as_deref();
        }
        chain.reverse();
        Ok(chain)
    }

    /// The base-most type of a hierarchy.
    pub fn hierarchy_root(&self, name: &str) -> Result<&str, Error> {
        let chain = self.chain(name)?;
        Ok(chain[0].name.as_str())
    }

    /// Check whether `sub` is `base` or derives from it.
    pub fn is_assignable(&self, sub: &str, base: &str) -> bool {
        self.chain(sub)
            .map(|chain| chain.iter().any(|d| d.name == base))
            .unwrap_or(false)
    }

    /// Full scalar column list of a type, inherited members first.
    pub fn columns(&self, name: &str) -> Result<Arc<Vec<TypeColumn>>, Error> {
        if let Some(cached) = self.columns.get(name) {
            return Ok(Arc::clone(cached.value()));
        }

        let columns: Vec<TypeColumn> = self
            .chain(name)?
            .into_iter()
            .flat_map(|desc| {
                desc.members
                    .iter()
                    .filter(|m| !m.is_navigation())
                    .map(move |m| TypeColumn {
                        member: m.clone(),
                        declaring_type: desc.name.clone(),
                        table: desc.table.clone(),
                    })
            })
            .collect();

        let columns = Arc::new(columns);
        self.columns.insert(name.to_string(), Arc::clone(&columns));
        Ok(columns)
    }

    /// Columns visible on a polymorphic type: its own columns followed by
    /// the extra columns of every concrete subtype, without duplicates.
    pub fn union_columns(&self, name: &str) -> Result<Vec<TypeColumn>, Error> {
        let mut columns: Vec<TypeColumn> = self.columns(name)?.as_ref().clone();
        let mut seen: HashSet<String> = columns.iter().map(|c| c.member.name.clone()).collect();
        for sub in self.subtypes(name)? {
            for column in self.columns(&sub)?.iter() {
                if seen.insert(column.member.name.clone()) {
                    columns.push(column.clone());
                }
            }
        }
        Ok(columns)
    }

    /// Primary key member names of a type.
    pub fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .columns(name)?
            .iter()
            .filter(|c| c.member.key)
            .map(|c| c.member.name.clone())
            .collect())
    }

    /// Concrete types deriving from `name`, transitively, in registration order.
    pub fn subtypes(&self, name: &str) -> Result<Vec<String>, Error> {
        self.descriptor(name)?;
        let mut result = Vec::new();
        let mut stack: Vec<&str> = vec![name];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.derived.get(current) {
                for child in children.iter().rev() {
                    stack.push(child);
                }
                for child in children {
                    if !self.types[child].is_abstract {
                        result.push(child.clone());
                    }
                }
            }
        }
        Ok(result)
    }

    /// Check whether rows of a type may belong to several concrete types.
    pub fn is_polymorphic(&self, name: &str) -> bool {
        self.derived.contains_key(name)
    }

    /// Look up a member on a type or any of its bases.
    ///
    /// Returns the declaring type along with the member.
    pub fn member(&self, type_name: &str, member: &str) -> Option<(&str, &MemberDef)> {
        let chain = self.chain(type_name).ok()?;
        chain.into_iter().rev().find_map(|desc| {
            desc.get_member(member)
                .map(|m| (desc.name.as_str(), m))
        })
    }

    /// Look up a member on a type, its bases, or any of its subtypes.
    pub fn member_in_hierarchy(&self, type_name: &str, member: &str) -> Option<(&str, &MemberDef)> {
        if let Some(found) = self.member(type_name, member) {
            return Some(found);
        }
        let mut stack: Vec<&str> = vec![type_name];
        while let Some(current) = stack.pop() {
            for child in self.derived.get(current).into_iter().flatten() {
                if let Some(m) = self.types[child].get_member(member) {
                    return Some((child.as_str(), m));
                }
                stack.push(child);
            }
        }
        None
    }

    /// Resolve a discriminator value to a concrete type assignable to `base`.
    pub fn concrete_type_for(&self, base: &str, discriminator: &str) -> Option<&str> {
        let root = self.hierarchy_root(base).ok()?;
        let concrete = self
            .discriminators
            .get(&(root.to_string(), discriminator.to_string()))?;
        self.is_assignable(concrete, base).then_some(concrete.as_str())
    }

    /// Register explicit join keys for a navigation.
    pub fn register_override(&self, join: JoinOverride) -> Result<(), Error> {
        let member = self
            .descriptor(&join.declaring_type)?
            .get_member(&join.member)
            .ok_or_else(|| Error::illegal_column(&join.member, &join.declaring_type))?;
        if !member.is_navigation() {
            return Err(Error::illegal_column(&join.member, &join.declaring_type));
        }
        if join.keys.arity() == 0 {
            return Err(Error::InvalidMetadata(format!(
                "override for '{}.{}' has no key pairs",
                join.declaring_type, join.member
            )));
        }

        debug!(
            declaring_type = %join.declaring_type,
            member = %join.member,
            "registering join override"
        );
        self.overrides
            .write()
            .insert((join.declaring_type, join.member), join.keys);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Explicit join keys for a navigation, if registered.
    pub fn override_for(&self, declaring_type: &str, member: &str) -> Option<JoinKeys> {
        self.overrides
            .read()
            .get(&(declaring_type.to_string(), member.to_string()))
            .cloned()
    }

    /// Counter bumped on every override registration.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemberDef;
    use graphplan_proto::AggregateKind;

    fn people() -> TypeMetadata {
        TypeMetadata::init(vec![
            TypeDescriptor::new("Person")
                .with_abstract()
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::scalar("Name", ScalarType::String)),
            TypeDescriptor::new("Employee")
                .with_base("Person")
                .with_member(
                    MemberDef::scalar("Salary", ScalarType::Float64)
                        .with_default_aggregate(AggregateKind::Sum),
                ),
            TypeDescriptor::new("Contractor")
                .with_base("Person")
                .with_discriminator("C")
                .with_member(MemberDef::scalar("Rate", ScalarType::Float64)),
        ])
        .unwrap()
    }

    #[test]
    fn test_columns_inherited_first() {
        let meta = people();
        let columns = meta.columns("Employee").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Id", "Name", "Salary"]);
        assert_eq!(columns[0].declaring_type, "Person");
        assert_eq!(columns[2].table, "Employee");
    }

    #[test]
    fn test_columns_cached() {
        let meta = people();
        let a = meta.columns("Employee").unwrap();
        let b = meta.columns("Employee").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_subtypes_and_union_columns() {
        let meta = people();
        assert_eq!(meta.subtypes("Person").unwrap(), vec!["Employee", "Contractor"]);
        assert!(meta.subtypes("Employee").unwrap().is_empty());
        assert!(meta.is_polymorphic("Person"));

        let names: Vec<_> = meta
            .union_columns("Person")
            .unwrap()
            .iter()
            .map(|c| c.member.name.clone())
            .collect();
        assert_eq!(names, vec!["Id", "Name", "Salary", "Rate"]);
    }

    #[test]
    fn test_member_lookup() {
        let meta = people();
        assert_eq!(meta.member("Employee", "Name").map(|(d, _)| d), Some("Person"));
        assert!(meta.member("Person", "Salary").is_none());
        assert_eq!(
            meta.member_in_hierarchy("Person", "Salary").map(|(d, _)| d),
            Some("Employee")
        );
        assert_eq!(meta.keys("Contractor").unwrap(), vec!["Id"]);
    }

    #[test]
    fn test_concrete_type_for() {
        let meta = people();
        assert_eq!(meta.concrete_type_for("Person", "Employee"), Some("Employee"));
        assert_eq!(meta.concrete_type_for("Person", "C"), Some("Contractor"));
        assert_eq!(meta.concrete_type_for("Employee", "C"), None);
        assert_eq!(meta.concrete_type_for("Person", "X"), None);
    }

    #[test]
    fn test_concrete_base_with_derived_rejected() {
        let result = TypeMetadata::init(vec![
            TypeDescriptor::new("Animal")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key()),
            TypeDescriptor::new("Dog").with_base("Animal"),
        ]);
        assert!(matches!(result, Err(Error::InvalidMetadata(_))));
    }

    #[test]
    fn test_unknown_navigation_target_rejected() {
        let result = TypeMetadata::init(vec![TypeDescriptor::new("Order")
            .with_member(MemberDef::collection("Lines", "Missing"))]);
        assert!(matches!(result, Err(Error::InvalidMetadata(_))));
    }

    #[test]
    fn test_register_override_bumps_generation() {
        let meta = TypeMetadata::init(vec![
            TypeDescriptor::new("A")
                .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
                .with_member(MemberDef::navigation("B", "B")),
            TypeDescriptor::new("B")
                .with_member(MemberDef::scalar("Code", ScalarType::String).with_key()),
        ])
        .unwrap();

        assert_eq!(meta.generation(), 0);
        meta.register_override(JoinOverride::new(
            "A",
            "B",
            vec![("Id".into(), "Code".into())],
        ))
        .unwrap();
        assert_eq!(meta.generation(), 1);
        assert!(meta.override_for("A", "B").is_some());

        let err = meta
            .register_override(JoinOverride::new("A", "Id", vec![("Id".into(), "Code".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::IllegalColumn { .. }));
    }
}
