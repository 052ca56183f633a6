//! Raw flat rows returned by an executor.

use crate::error::Error;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A flat row set keyed by column alias.
///
/// Every row holds exactly one value per column, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column aliases, in row order.
    pub columns: Vec<String>,
    /// Row values.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Create an empty row set with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a row set, validating the width of every row.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, Error> {
        let mut set = Self::new(columns);
        for row in rows {
            set.push(row)?;
        }
        Ok(set)
    }

    /// Append a row.
    pub fn push(&mut self, row: Vec<Value>) -> Result<(), Error> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidRow {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of another set with the same columns.
    pub fn extend(&mut self, other: RowSet) -> Result<(), Error> {
        if other.columns != self.columns {
            return Err(Error::ColumnMismatch(format!(
                "[{}] vs [{}]",
                self.columns.join(", "),
                other.columns.join(", ")
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Position of a column alias.
    pub fn index_of(&self, alias: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == alias)
    }

    /// Value of `alias` in row `row`.
    pub fn get(&self, row: usize, alias: &str) -> Option<&Value> {
        let idx = self.index_of(alias)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_validation() {
        let mut set = RowSet::new(vec!["Id".into(), "Name".into()]);
        assert!(set.push(vec![1i32.into(), "a".into()]).is_ok());
        assert!(matches!(
            set.push(vec![2i32.into()]),
            Err(Error::InvalidRow {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_get_by_alias() {
        let set = RowSet::with_rows(
            vec!["Id".into(), "Name".into()],
            vec![vec![1i32.into(), "a".into()], vec![2i32.into(), "b".into()]],
        )
        .unwrap();

        assert_eq!(set.get(1, "Name"), Some(&Value::from("b")));
        assert_eq!(set.get(0, "Missing"), None);
        assert_eq!(set.get(5, "Id"), None);
    }

    #[test]
    fn test_extend_requires_same_columns() {
        let mut a = RowSet::new(vec!["Id".into()]);
        let b = RowSet::with_rows(vec!["Id".into()], vec![vec![1i32.into()]]).unwrap();
        let c = RowSet::new(vec!["Other".into()]);

        a.extend(b).unwrap();
        assert_eq!(a.len(), 1);
        assert!(a.extend(c).is_err());
    }
}
