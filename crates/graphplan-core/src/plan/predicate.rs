//! Translated filter predicates.

use graphplan_proto::{CompareOp, Value};

use super::column::ColumnRef;
use super::query::QueryPlan;

/// A scalar operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A source column.
    Column(ColumnRef),
    /// A literal.
    Literal(Value),
}

/// A boolean condition over source columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Binary comparison.
    Compare {
        left: Scalar,
        op: CompareOp,
        right: Scalar,
    },
    /// Set membership.
    In {
        operand: Scalar,
        values: Vec<Value>,
        negated: bool,
    },
    /// Null test.
    IsNull { operand: Scalar, negated: bool },
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
    /// Correlated subquery returns (or does not return) rows.
    Exists {
        subquery: Box<QueryPlan>,
        negated: bool,
    },
}

impl Predicate {
    /// Column equality.
    pub fn columns_eq(left: ColumnRef, right: ColumnRef) -> Self {
        Predicate::Compare {
            left: Scalar::Column(left),
            op: CompareOp::Eq,
            right: Scalar::Column(right),
        }
    }

    /// Column equals literal.
    pub fn column_eq(column: ColumnRef, value: Value) -> Self {
        Predicate::Compare {
            left: Scalar::Column(column),
            op: CompareOp::Eq,
            right: Scalar::Literal(value),
        }
    }

    /// Column is null.
    pub fn is_null(column: ColumnRef) -> Self {
        Predicate::IsNull {
            operand: Scalar::Column(column),
            negated: false,
        }
    }

    /// Conjunction that flattens nested conjunctions and collapses a single
    /// term. Returns `None` for no terms.
    pub fn all(terms: Vec<Predicate>) -> Option<Predicate> {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Predicate::And(flat)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SourceId;

    #[test]
    fn test_all_flattens() {
        let a = Predicate::is_null(ColumnRef::new(SourceId(0), "A"));
        let b = Predicate::is_null(ColumnRef::new(SourceId(0), "B"));
        let c = Predicate::is_null(ColumnRef::new(SourceId(1), "C"));

        assert_eq!(Predicate::all(vec![]), None);
        assert_eq!(Predicate::all(vec![a.clone()]), Some(a.clone()));

        let nested = Predicate::all(vec![Predicate::And(vec![a.clone(), b.clone()]), c.clone()]);
        assert_eq!(nested, Some(Predicate::And(vec![a, b, c])));
    }
}
