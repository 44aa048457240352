//! Canonicalization.
//!
//! Pushes negation inward (operator complement on filters, De Morgan on
//! compounds), rewrites `eq null`/`ne null` into null checks, flattens
//! nested compounds of the same kind, drops duplicate children, orders
//! children deterministically, and collapses single-child compounds.
//! Negation survives only above `contains` filters and traversals.
//!
//! `canonicalize(canonicalize(p)) == canonicalize(p)` for every tree.

use serde_json::Value;
use tracing::debug;

use crate::ir::{Filter, Operator, Predicate, QueryAst, Traversal};

/// Canonical form of a predicate.
pub fn canonicalize(predicate: &Predicate) -> Predicate {
    canon(predicate.clone(), false)
}

impl QueryAst {
    /// Copy of this query with its predicate canonicalized.
    pub fn canonical(&self) -> QueryAst {
        let mut ast = self.clone();
        if let Some(predicate) = self.predicate.as_ref() {
            let canonical = canonicalize(predicate);
            debug!(
                root = %self.root,
                before = predicate.node_count(),
                after = canonical.node_count(),
                "Canonicalized predicate"
            );
            ast.predicate = Some(canonical);
        }
        ast
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    And,
    Or,
}

impl Kind {
    fn flip(self) -> Self {
        match self {
            Kind::And => Kind::Or,
            Kind::Or => Kind::And,
        }
    }

    fn build(self, children: Vec<Predicate>) -> Predicate {
        match self {
            Kind::And => Predicate::And(children),
            Kind::Or => Predicate::Or(children),
        }
    }

    fn unwrap(self, predicate: Predicate) -> Result<Vec<Predicate>, Predicate> {
        match (self, predicate) {
            (Kind::And, Predicate::And(children)) | (Kind::Or, Predicate::Or(children)) => {
                Ok(children)
            }
            (_, other) => Err(other),
        }
    }
}

fn canon(predicate: Predicate, negated: bool) -> Predicate {
    match predicate {
        Predicate::Filter(filter) => canon_filter(filter, negated),
        Predicate::Not(inner) => canon(*inner, !negated),
        Predicate::And(children) => canon_compound(children, Kind::And, negated),
        Predicate::Or(children) => canon_compound(children, Kind::Or, negated),
        Predicate::Traverse(traversal) => {
            let traversal = Traversal {
                predicate: traversal
                    .predicate
                    .map(|inner| Box::new(canon(*inner, false))),
                ..traversal
            };
            wrap_negation(Predicate::Traverse(traversal), negated)
        }
    }
}

fn canon_filter(mut filter: Filter, negated: bool) -> Predicate {
    filter.op = match (filter.op, filter.value.is_null()) {
        (Operator::Eq, true) => Operator::IsNull,
        (Operator::Ne, true) => Operator::IsNotNull,
        (op, _) => op,
    };
    if filter.op.is_null_check() {
        filter.value = Value::Null;
    }

    if !negated {
        return Predicate::Filter(filter);
    }
    match filter.op.negate() {
        Some(op) => Predicate::Filter(Filter { op, ..filter }),
        None => wrap_negation(Predicate::Filter(filter), true),
    }
}

fn wrap_negation(predicate: Predicate, negated: bool) -> Predicate {
    if negated {
        Predicate::Not(Box::new(predicate))
    } else {
        predicate
    }
}

fn canon_compound(children: Vec<Predicate>, kind: Kind, negated: bool) -> Predicate {
    let kind = if negated { kind.flip() } else { kind };

    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match kind.unwrap(canon(child, negated)) {
            Ok(nested) => flat.extend(nested),
            Err(other) => flat.push(other),
        }
    }

    flat.sort_by_cached_key(ordering_key);
    flat.dedup();

    if flat.len() == 1 {
        if let Some(only) = flat.pop() {
            return only;
        }
    }
    kind.build(flat)
}

fn ordering_key(predicate: &Predicate) -> String {
    serde_json::to_string(predicate).unwrap_or_default()
}
