//! Materialized records.

use graphplan_proto::Value;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Children reached through one navigation member.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// A scalar navigation, absent when the join matched nothing.
    One(Option<Box<Record>>),
    /// A collection navigation.
    Many(Vec<Record>),
}

impl Navigation {
    /// Empty value for a navigation of the given cardinality.
    pub fn empty(collection: bool) -> Self {
        if collection {
            Navigation::Many(Vec::new())
        } else {
            Navigation::One(None)
        }
    }
}

/// One entity instance rebuilt from flat rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Concrete type of the instance.
    pub type_name: String,
    /// Member values, in first-seen column order.
    pub fields: Vec<(String, Value)>,
    /// Values with no matching member, kept for open types and aggregate rows.
    pub dynamic: Vec<(String, Value)>,
    /// Expanded navigations.
    pub navigations: Vec<(String, Navigation)>,
}

impl Record {
    /// Create an empty record.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Value of a member or dynamic property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .chain(self.dynamic.iter())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Check if a member value is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.iter().find(|(n, _)| n == name).map(|(_, nav)| nav)
    }

    /// Children of a collection navigation; empty when not expanded.
    pub fn many(&self, name: &str) -> &[Record] {
        match self.navigation(name) {
            Some(Navigation::Many(records)) => records,
            _ => &[],
        }
    }

    /// Target of a scalar navigation.
    pub fn one(&self, name: &str) -> Option<&Record> {
        match self.navigation(name) {
            Some(Navigation::One(record)) => record.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn set_navigation(&mut self, name: &str, navigation: Navigation) {
        match self.navigations.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = navigation,
            None => self.navigations.push((name.to_string(), navigation)),
        }
    }

    /// JSON object with members, dynamic properties and navigations. The
    /// concrete type is written under `$type`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert(
            "$type".to_string(),
            serde_json::Value::String(self.type_name.clone()),
        );
        for (name, value) in self.fields.iter().chain(self.dynamic.iter()) {
            object.insert(name.clone(), value.to_json());
        }
        for (name, navigation) in &self.navigations {
            let value = match navigation {
                Navigation::One(Some(record)) => record.to_json(),
                Navigation::One(None) => serde_json::Value::Null,
                Navigation::Many(records) => {
                    serde_json::Value::Array(records.iter().map(Record::to_json).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        serde_json::Value::Object(object)
    }

    /// Convert into a typed value through its JSON form.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            Error::Materialize(format!("cannot convert {} record: {}", self.type_name, e))
        })
    }
}
