//! Filter translation.
//!
//! Request filters are translated with an explicit frame stack rather than
//! recursion, so deeply nested expressions cannot exhaust the call stack.
//! Each `any`/`all` lambda opens a scope backed by a correlated subquery;
//! paths inside the lambda are relative to its target and are joined into
//! that subquery on demand.

use graphplan_proto::filter::split_member;
use graphplan_proto::{FilterExpr, Operand};

use super::emit::{Bindings, Bound};
use super::PlanContext;
use crate::error::Error;
use crate::path::NodeId;
use crate::plan::{JoinType, Predicate, QueryPlan, Scalar};

/// Correlated subquery backing a lambda scope.
struct Lambda {
    plan: QueryPlan,
    correlation: Option<Predicate>,
}

/// Paths are resolved relative to `base`; `bindings` maps nodes to their
/// sources in the query the scope builds.
struct Scope {
    base: NodeId,
    bindings: Bindings,
    lambda: Option<Lambda>,
}

enum Frame<'e> {
    Enter(&'e FilterExpr),
    And(usize),
    Or(usize),
    Not,
    Lambda { all: bool, has_predicate: bool },
}

fn malformed() -> Error {
    Error::Unsupported("malformed filter expression".to_string())
}

/// Leaf property paths at the outer lambda level.
fn leaf_paths(expr: &FilterExpr) -> Vec<&str> {
    let mut paths = Vec::new();
    let mut stack = vec![expr];
    while let Some(expr) = stack.pop() {
        match expr {
            FilterExpr::Compare { left, right, .. } => {
                paths.extend(left.as_property());
                paths.extend(right.as_property());
            }
            FilterExpr::In { operand, .. } | FilterExpr::IsNull { operand, .. } => {
                paths.extend(operand.as_property());
            }
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => stack.extend(exprs.iter()),
            FilterExpr::Not(inner) => stack.push(inner),
            FilterExpr::Any { .. } | FilterExpr::All { .. } => {}
        }
    }
    paths
}

/// `EXISTS` over a lambda's subquery. `all` lambdas become
/// `NOT EXISTS (correlation AND NOT predicate)`.
fn close_lambda(lambda: Lambda, predicate: Option<Predicate>, all: bool) -> Predicate {
    let mut terms: Vec<Predicate> = lambda.correlation.into_iter().collect();
    match predicate {
        Some(predicate) if all => terms.push(Predicate::Not(Box::new(predicate))),
        Some(predicate) => terms.push(predicate),
        None => {}
    }
    let mut subquery = lambda.plan;
    subquery.filter = Predicate::all(terms);
    Predicate::Exists {
        subquery: Box::new(subquery),
        negated: all,
    }
}

impl PlanContext<'_> {
    /// Translate a filter whose paths are relative to `base`, against
    /// nodes already bound in `bindings`.
    pub(crate) fn translate_filter(
        &mut self,
        expr: &FilterExpr,
        base: NodeId,
        bindings: &Bindings,
    ) -> Result<Predicate, Error> {
        let scope = Scope {
            base,
            bindings: bindings.clone(),
            lambda: None,
        };
        let (predicate, _) = self.translate(expr, scope)?;
        Ok(predicate)
    }

    /// Translate the filter of an expanded node bound at `bound`.
    ///
    /// A filter that navigates away from the node is wrapped in a keyed
    /// self-correlated `EXISTS`, so the navigation joins cannot multiply
    /// the node's rows.
    pub(crate) fn translate_expand_filter(
        &mut self,
        node: NodeId,
        bound: Bound,
        expr: &FilterExpr,
    ) -> Result<Predicate, Error> {
        let navigates = leaf_paths(expr)
            .into_iter()
            .any(|path| !split_member(path).0.is_empty());
        if !navigates {
            let mut bindings = Bindings::new();
            bindings.insert(node, bound);
            return self.translate_filter(expr, node, &bindings);
        }

        let element_type = self.tree.node(node).element_type.clone();
        let keys = self.metadata.keys(&element_type)?;
        if keys.is_empty() {
            return Err(Error::Unsupported(format!(
                "expand filter on '{}' navigates away from keyless type '{}'",
                self.tree.full_path(node),
                element_type
            )));
        }

        let (source, inner) = self.bind_node(node)?;
        let correlation = keys
            .iter()
            .map(|key| {
                Ok(Predicate::columns_eq(
                    self.column_ref(node, bound, key)?,
                    self.column_ref(node, inner, key)?,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut bindings = Bindings::new();
        bindings.insert(node, inner);
        let scope = Scope {
            base: node,
            bindings,
            lambda: Some(Lambda {
                plan: QueryPlan::new(source),
                correlation: Predicate::all(correlation),
            }),
        };
        let (predicate, scope) = self.translate(expr, scope)?;
        let lambda = scope.lambda.ok_or_else(malformed)?;
        Ok(close_lambda(lambda, Some(predicate), false))
    }

    fn translate(&mut self, expr: &FilterExpr, scope: Scope) -> Result<(Predicate, Scope), Error> {
        let mut scopes = vec![scope];
        let mut frames = vec![Frame::Enter(expr)];
        let mut out: Vec<Predicate> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Enter(expr) => match expr {
                    FilterExpr::Compare { left, op, right } => {
                        let scope = scopes.last_mut().ok_or_else(malformed)?;
                        let left = self.operand(scope, left)?;
                        let right = self.operand(scope, right)?;
                        out.push(Predicate::Compare { left, op: *op, right });
                    }
                    FilterExpr::In {
                        operand,
                        values,
                        negated,
                    } => {
                        let scope = scopes.last_mut().ok_or_else(malformed)?;
                        out.push(Predicate::In {
                            operand: self.operand(scope, operand)?,
                            values: values.clone(),
                            negated: *negated,
                        });
                    }
                    FilterExpr::IsNull { operand, negated } => {
                        let scope = scopes.last_mut().ok_or_else(malformed)?;
                        out.push(Predicate::IsNull {
                            operand: self.operand(scope, operand)?,
                            negated: *negated,
                        });
                    }
                    FilterExpr::And(exprs) => {
                        frames.push(Frame::And(exprs.len()));
                        frames.extend(exprs.iter().rev().map(Frame::Enter));
                    }
                    FilterExpr::Or(exprs) => {
                        frames.push(Frame::Or(exprs.len()));
                        frames.extend(exprs.iter().rev().map(Frame::Enter));
                    }
                    FilterExpr::Not(inner) => {
                        frames.push(Frame::Not);
                        frames.push(Frame::Enter(inner));
                    }
                    FilterExpr::Any { path, predicate } => {
                        let parent = scopes.last().ok_or_else(malformed)?;
                        let scope = self.open_lambda(parent, path)?;
                        scopes.push(scope);
                        frames.push(Frame::Lambda {
                            all: false,
                            has_predicate: predicate.is_some(),
                        });
                        if let Some(predicate) = predicate {
                            frames.push(Frame::Enter(predicate));
                        }
                    }
                    FilterExpr::All { path, predicate } => {
                        let parent = scopes.last().ok_or_else(malformed)?;
                        let scope = self.open_lambda(parent, path)?;
                        scopes.push(scope);
                        frames.push(Frame::Lambda {
                            all: true,
                            has_predicate: true,
                        });
                        frames.push(Frame::Enter(predicate));
                    }
                },
                Frame::And(count) => {
                    let terms = out.split_off(out.len().saturating_sub(count));
                    out.push(Predicate::And(terms));
                }
                Frame::Or(count) => {
                    let terms = out.split_off(out.len().saturating_sub(count));
                    out.push(Predicate::Or(terms));
                }
                Frame::Not => {
                    let inner = out.pop().ok_or_else(malformed)?;
                    out.push(Predicate::Not(Box::new(inner)));
                }
                Frame::Lambda { all, has_predicate } => {
                    let predicate = if has_predicate {
                        Some(out.pop().ok_or_else(malformed)?)
                    } else {
                        None
                    };
                    let scope = scopes.pop().ok_or_else(malformed)?;
                    let lambda = scope.lambda.ok_or_else(malformed)?;
                    out.push(close_lambda(lambda, predicate, all));
                }
            }
        }

        let predicate = out.pop().ok_or_else(malformed)?;
        let scope = scopes.pop().ok_or_else(malformed)?;
        Ok((predicate, scope))
    }

    /// Open the scope of a lambda over `path`, relative to `parent`.
    ///
    /// The subquery starts at the first step of the path, correlated with
    /// the parent scope's base; further steps are inner joined.
    fn open_lambda(&mut self, parent: &Scope, path: &str) -> Result<Scope, Error> {
        let base_type = self.tree.node(parent.base).element_type.clone();
        let target = self
            .tree
            .lookup(parent.base, path)
            .ok_or_else(|| Error::illegal_column(path, base_type.clone()))?;

        let mut chain = Vec::new();
        let mut current = target;
        while current != parent.base {
            chain.push(current);
            current = self
                .tree
                .node(current)
                .parent
                .ok_or_else(|| Error::illegal_column(path, base_type.clone()))?;
        }
        chain.reverse();

        let outer = parent.bindings.get(&parent.base).copied().ok_or_else(|| {
            Error::UnresolvedJoin {
                parent: base_type.clone(),
                path: path.to_string(),
            }
        })?;
        let (&first, rest) = chain
            .split_first()
            .ok_or_else(|| Error::illegal_column(path, base_type.clone()))?;

        let (mut plan, mut previous, correlation) = self.correlate(first, outer)?;
        let mut bindings = Bindings::new();
        bindings.insert(first, previous);
        for &step in rest {
            let (source, bound) = self.bind_node(step)?;
            plan.joins
                .extend(self.connect(step, previous, source, bound, JoinType::Inner)?);
            bindings.insert(step, bound);
            previous = bound;
        }

        Ok(Scope {
            base: target,
            bindings,
            lambda: Some(Lambda { plan, correlation }),
        })
    }

    fn operand(&mut self, scope: &mut Scope, operand: &Operand) -> Result<Scalar, Error> {
        match operand {
            Operand::Literal(value) => Ok(Scalar::Literal(value.clone())),
            Operand::Property(path) => {
                let (prefix, member) = split_member(path);
                let node = self.tree.lookup(scope.base, prefix).ok_or_else(|| {
                    Error::illegal_column(path.clone(), self.tree.node(scope.base).element_type.clone())
                })?;
                let bound = self.bind_in(scope, node)?;
                Ok(Scalar::Column(self.column_ref(node, bound, member)?))
            }
        }
    }

    /// Source of `node` in the scope's query.
    ///
    /// Inside a lambda, unbound nodes are left joined into the subquery
    /// from their nearest bound ancestor.
    fn bind_in(&mut self, scope: &mut Scope, node: NodeId) -> Result<Bound, Error> {
        if let Some(bound) = scope.bindings.get(&node) {
            return Ok(*bound);
        }
        let unresolved = || Error::UnresolvedJoin {
            parent: self.tree.node(scope.base).element_type.clone(),
            path: self.tree.full_path(node),
        };
        let Some(lambda) = scope.lambda.as_mut() else {
            return Err(unresolved());
        };

        let mut pending = vec![node];
        let mut current = node;
        let mut bound = loop {
            let parent = self.tree.node(current).parent.ok_or_else(unresolved)?;
            if let Some(bound) = scope.bindings.get(&parent) {
                break *bound;
            }
            pending.push(parent);
            current = parent;
        };

        while let Some(step) = pending.pop() {
            let (source, next) = self.bind_node(step)?;
            lambda
                .plan
                .joins
                .extend(self.connect(step, bound, source, next, JoinType::Left)?);
            scope.bindings.insert(step, next);
            bound = next;
        }
        Ok(bound)
    }
}
