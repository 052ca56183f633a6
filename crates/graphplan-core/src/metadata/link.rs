//! Join key descriptions and explicit overrides.

use serde::{Deserialize, Serialize};

/// A many-to-many indirection table between two types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTable {
    /// Storage table name.
    pub table: String,
    /// (parent member, link column) pairs.
    pub source_pairs: Vec<(String, String)>,
    /// (link column, child member) pairs.
    pub target_pairs: Vec<(String, String)>,
}

impl LinkTable {
    /// Create a link table with single-column keys on both sides.
    pub fn new(
        table: impl Into<String>,
        parent_member: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
        child_member: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_pairs: vec![(parent_member.into(), source_column.into())],
            target_pairs: vec![(target_column.into(), child_member.into())],
        }
    }
}

/// Resolved equi-join keys between a parent and a child type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinKeys {
    /// (parent member, child member) pairs. Empty when `link` is set.
    pub pairs: Vec<(String, String)>,
    /// Indirection table for many-to-many navigations.
    pub link: Option<LinkTable>,
}

impl JoinKeys {
    /// Keys joining parent and child members directly.
    pub fn direct(pairs: Vec<(String, String)>) -> Self {
        Self { pairs, link: None }
    }

    /// Keys joining through a link table.
    pub fn linked(link: LinkTable) -> Self {
        Self {
            pairs: Vec::new(),
            link: Some(link),
        }
    }

    /// Number of key statements on the parent side.
    pub fn arity(&self) -> usize {
        match &self.link {
            Some(link) => link.source_pairs.len(),
            None => self.pairs.len(),
        }
    }

    /// Parent members taking part in the join.
    pub fn parent_members(&self) -> Vec<&str> {
        match &self.link {
            Some(link) => link.source_pairs.iter().map(|(p, _)| p.as_str()).collect(),
            None => self.pairs.iter().map(|(p, _)| p.as_str()).collect(),
        }
    }

    /// The same keys seen from the child towards the parent.
    pub fn reversed(&self) -> Self {
        match &self.link {
            Some(link) => JoinKeys::linked(LinkTable {
                table: link.table.clone(),
                source_pairs: link
                    .target_pairs
                    .iter()
                    .map(|(l, c)| (c.clone(), l.clone()))
                    .collect(),
                target_pairs: link
                    .source_pairs
                    .iter()
                    .map(|(p, l)| (l.clone(), p.clone()))
                    .collect(),
            }),
            None => JoinKeys::direct(
                self.pairs
                    .iter()
                    .map(|(p, c)| (c.clone(), p.clone()))
                    .collect(),
            ),
        }
    }
}

/// Explicit join keys registered for one navigation member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOverride {
    /// Type declaring the navigation.
    pub declaring_type: String,
    /// Navigation member name.
    pub member: String,
    /// Keys to use.
    pub keys: JoinKeys,
}

impl JoinOverride {
    /// Override with direct key pairs.
    pub fn new(
        declaring_type: impl Into<String>,
        member: impl Into<String>,
        pairs: Vec<(String, String)>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
            keys: JoinKeys::direct(pairs),
        }
    }

    /// Override through a link table.
    pub fn linked(
        declaring_type: impl Into<String>,
        member: impl Into<String>,
        link: LinkTable,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
            keys: JoinKeys::linked(link),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_direct() {
        let keys = JoinKeys::direct(vec![("Id".into(), "OrderId".into())]);
        assert_eq!(
            keys.reversed().pairs,
            vec![("OrderId".to_string(), "Id".to_string())]
        );
        assert_eq!(keys.parent_members(), vec!["Id"]);
    }

    #[test]
    fn test_reversed_link() {
        let keys = JoinKeys::linked(LinkTable::new("ProductTags", "Id", "ProductId", "TagId", "Id"));
        let rev = keys.reversed();
        let link = rev.link.unwrap();
        assert_eq!(link.source_pairs, vec![("Id".to_string(), "TagId".to_string())]);
        assert_eq!(link.target_pairs, vec![("ProductId".to_string(), "Id".to_string())]);
        assert_eq!(keys.arity(), 1);
    }
}
