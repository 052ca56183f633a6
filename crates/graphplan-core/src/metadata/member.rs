//! Member definitions for type descriptors.

use graphplan_proto::AggregateKind;
use serde::{Deserialize, Serialize};

use super::types::ScalarType;

/// What a member holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    /// A stored scalar value.
    Scalar(ScalarType),
    /// A navigation to another type.
    Navigation {
        /// Target type name.
        target: String,
        /// Whether the navigation yields many targets.
        collection: bool,
    },
}

/// A member (property) of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDef {
    /// Logical member name, used in request paths.
    pub name: String,
    /// Storage column name.
    pub column: String,
    /// Scalar or navigation.
    pub kind: MemberKind,
    /// Part of the type's primary key.
    pub key: bool,
    /// Column accepts nulls.
    pub nullable: bool,
    /// Declared size, for strings and binary data.
    pub size: Option<u32>,
    /// Computed by the backend rather than stored.
    pub computed: bool,
    /// Internal bookkeeping column, never selected by default.
    pub system: bool,
    /// Type this member refers to as a foreign key.
    pub foreign_key: Option<String>,
    /// Aggregate applied when a request aggregates this member without
    /// naming a function.
    pub default_aggregate: Option<AggregateKind>,
}

impl MemberDef {
    /// Create a required scalar member stored in a column of the same name.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            kind: MemberKind::Scalar(scalar),
            key: false,
            nullable: false,
            size: None,
            computed: false,
            system: false,
            foreign_key: None,
            default_aggregate: None,
        }
    }

    /// Create a nullable scalar member.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            nullable: true,
            ..Self::scalar(name, scalar)
        }
    }

    /// Create a single-valued navigation.
    pub fn navigation(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::nav(name.into(), target.into(), false)
    }

    /// Create a collection-valued navigation.
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::nav(name.into(), target.into(), true)
    }

    fn nav(name: String, target: String, collection: bool) -> Self {
        Self {
            column: String::new(),
            name,
            kind: MemberKind::Navigation { target, collection },
            key: false,
            nullable: true,
            size: None,
            computed: false,
            system: false,
            foreign_key: None,
            default_aggregate: None,
        }
    }

    /// Mark as part of the primary key.
    pub fn with_key(mut self) -> Self {
        self.key = true;
        self.nullable = false;
        self
    }

    /// Store in a differently named column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Set the declared size.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Mark as backend-computed.
    pub fn with_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Mark as a system column.
    pub fn with_system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Declare this member a foreign key to `target`.
    pub fn with_foreign_key(mut self, target: impl Into<String>) -> Self {
        self.foreign_key = Some(target.into());
        self
    }

    /// Set the default aggregate function.
    pub fn with_default_aggregate(mut self, kind: AggregateKind) -> Self {
        self.default_aggregate = Some(kind);
        self
    }

    /// Scalar type, if this is a scalar member.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.kind {
            MemberKind::Scalar(t) => Some(*t),
            MemberKind::Navigation { .. } => None,
        }
    }

    /// Check if this member is a navigation.
    pub fn is_navigation(&self) -> bool {
        matches!(self.kind, MemberKind::Navigation { .. })
    }

    /// Navigation target and collection flag.
    pub fn navigation_target(&self) -> Option<(&str, bool)> {
        match &self.kind {
            MemberKind::Navigation { target, collection } => Some((target, *collection)),
            MemberKind::Scalar(_) => None,
        }
    }
}
