//! Type descriptors.

use serde::{Deserialize, Serialize};

use super::member::MemberDef;

/// Static description of one entity type.
///
/// A derived type lists only the members it declares itself; inherited
/// members are resolved through `base`. Each type in a hierarchy stores
/// its own members in its own table, keyed by the same primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type name.
    pub name: String,
    /// Storage table holding the members this type declares.
    pub table: String,
    /// Base type, if any.
    pub base: Option<String>,
    /// Abstract types have no rows of their own.
    pub is_abstract: bool,
    /// Discriminator value identifying this type in polymorphic rows.
    /// Defaults to the type name.
    pub discriminator: Option<String>,
    /// Open types keep unmatched columns in a dynamic property bag.
    pub open: bool,
    /// Members declared by this type.
    pub members: Vec<MemberDef>,
}

impl TypeDescriptor {
    /// Create a descriptor stored in a table of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            base: None,
            is_abstract: false,
            discriminator: None,
            open: false,
            members: Vec::new(),
        }
    }

    /// Set the storage table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Derive from a base type.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Mark as abstract.
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set the discriminator value.
    pub fn with_discriminator(mut self, value: impl Into<String>) -> Self {
        self.discriminator = Some(value.into());
        self
    }

    /// Mark as open.
    pub fn with_open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Add a member.
    pub fn with_member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    /// Add multiple members.
    pub fn with_members(mut self, members: impl IntoIterator<Item = MemberDef>) -> Self {
        self.members.extend(members);
        self
    }

    /// Get a declared member by name.
    pub fn get_member(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Discriminator value for this type.
    pub fn discriminator_value(&self) -> &str {
        self.discriminator.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ScalarType;

    #[test]
    fn test_descriptor_builder() {
        let desc = TypeDescriptor::new("Manager")
            .with_table("managers")
            .with_base("Employee")
            .with_discriminator("MGR")
            .with_member(MemberDef::scalar("Budget", ScalarType::Float64));

        assert_eq!(desc.table, "managers");
        assert_eq!(desc.base.as_deref(), Some("Employee"));
        assert_eq!(desc.discriminator_value(), "MGR");
        assert!(desc.get_member("Budget").is_some());
        assert!(desc.get_member("Name").is_none());
    }

    #[test]
    fn test_discriminator_defaults_to_name() {
        assert_eq!(TypeDescriptor::new("Order").discriminator_value(), "Order");
    }
}
