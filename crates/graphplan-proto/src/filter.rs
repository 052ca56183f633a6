//! Boolean filter expression trees.
//!
//! Property references are `/`-separated navigation paths relative to the
//! entity the expression is evaluated against (`"Lines/Sku"`). Inside the
//! predicate of an [`FilterExpr::Any`] or [`FilterExpr::All`], paths are
//! relative to the collection element the lambda ranges over.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Separator between navigation steps in a property path.
pub const PATH_SEPARATOR: char = '/';

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A property path such as `"Customer/Name"`.
    Property(String),
    /// A literal value.
    Literal(Value),
}

impl Operand {
    /// Create a property operand.
    pub fn property(path: impl Into<String>) -> Self {
        Operand::Property(path.into())
    }

    /// Create a literal operand.
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    /// The property path, if this operand references one.
    pub fn as_property(&self) -> Option<&str> {
        match self {
            Operand::Property(path) => Some(path),
            Operand::Literal(_) => None,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// LIKE pattern match (`%` and `_` wildcards).
    Like,
    /// Negated LIKE.
    NotLike,
}

impl CompareOp {
    /// SQL-ish symbol, used when rendering plans.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// Binary comparison between two operands.
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// Operand is (or is not) one of a set of values.
    In {
        operand: Operand,
        values: Vec<Value>,
        negated: bool,
    },
    /// Operand is (or is not) null.
    IsNull { operand: Operand, negated: bool },
    /// All conditions must hold.
    And(Vec<FilterExpr>),
    /// At least one condition must hold.
    Or(Vec<FilterExpr>),
    /// Negation.
    Not(Box<FilterExpr>),
    /// Some element of the collection at `path` satisfies `predicate`
    /// (any element at all when the predicate is absent).
    Any {
        path: String,
        predicate: Option<Box<FilterExpr>>,
    },
    /// Every element of the collection at `path` satisfies `predicate`.
    All {
        path: String,
        predicate: Box<FilterExpr>,
    },
}

impl FilterExpr {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        FilterExpr::Compare {
            left: Operand::Property(field.into()),
            op,
            right: Operand::Literal(value.into()),
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Create a not-equal filter.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// Create a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// Create a less-than-or-equal filter.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// Create a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// Create a greater-than-or-equal filter.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// Create a LIKE filter.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Like, Value::String(pattern.into()))
    }

    /// Compare two properties with each other.
    pub fn properties(left: impl Into<String>, op: CompareOp, right: impl Into<String>) -> Self {
        FilterExpr::Compare {
            left: Operand::Property(left.into()),
            op,
            right: Operand::Property(right.into()),
        }
    }

    /// Create an IN filter.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::In {
            operand: Operand::Property(field.into()),
            values,
            negated: false,
        }
    }

    /// Create a NOT IN filter.
    pub fn not_in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::In {
            operand: Operand::Property(field.into()),
            values,
            negated: true,
        }
    }

    /// Create an IS NULL filter.
    pub fn is_null(field: impl Into<String>) -> Self {
        FilterExpr::IsNull {
            operand: Operand::Property(field.into()),
            negated: false,
        }
    }

    /// Create an IS NOT NULL filter.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        FilterExpr::IsNull {
            operand: Operand::Property(field.into()),
            negated: true,
        }
    }

    /// Conjunction of several expressions.
    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    /// Disjunction of several expressions.
    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(exprs)
    }

    /// Negate an expression.
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }

    /// `path/any(x: predicate)`.
    pub fn any(path: impl Into<String>, predicate: FilterExpr) -> Self {
        FilterExpr::Any {
            path: path.into(),
            predicate: Some(Box::new(predicate)),
        }
    }

    /// `path/any()`: the collection is non-empty.
    pub fn any_exists(path: impl Into<String>) -> Self {
        FilterExpr::Any {
            path: path.into(),
            predicate: None,
        }
    }

    /// `path/all(x: predicate)`.
    pub fn all(path: impl Into<String>, predicate: FilterExpr) -> Self {
        FilterExpr::All {
            path: path.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Collect every property path referenced at this lambda level.
    ///
    /// Paths nested inside `Any`/`All` predicates are relative to the lambda
    /// target and are not returned; the lambda paths themselves are.
    pub fn property_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                FilterExpr::Compare { left, right, .. } => {
                    paths.extend(left.as_property());
                    paths.extend(right.as_property());
                }
                FilterExpr::In { operand, .. } | FilterExpr::IsNull { operand, .. } => {
                    paths.extend(operand.as_property());
                }
                FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                    stack.extend(exprs.iter().rev());
                }
                FilterExpr::Not(inner) => stack.push(inner),
                FilterExpr::Any { path, .. } | FilterExpr::All { path, .. } => {
                    paths.push(path);
                }
            }
        }
        paths
    }
}

/// Split a property path into its navigation prefix and final member.
///
/// `"Customer/Address/City"` becomes `("Customer/Address", "City")`;
/// a single segment has an empty prefix.
pub fn split_member(path: &str) -> (&str, &str) {
    match path.rsplit_once(PATH_SEPARATOR) {
        Some((prefix, member)) => (prefix, member),
        None => ("", path),
    }
}

/// Iterate the non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
}
