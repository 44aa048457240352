//! Query AST.
//!
//! The backend-agnostic tree the builder produces and both compilers
//! consume. Field names in a [`Filter`] are logical names on the entity in
//! scope; dotted paths are already desugared into [`Traversal`] nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// The operator that matches exactly the rows this one rejects, when one exists.
    pub fn negate(self) -> Option<Operator> {
        Some(match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Gt => Operator::Lte,
            Operator::Lte => Operator::Gt,
            Operator::Gte => Operator::Lt,
            Operator::Lt => Operator::Gte,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
            Operator::Contains => return None,
        })
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    /// Operators that take no literal.
    pub fn is_null_check(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
        };
        f.write_str(name)
    }
}

/// `field op value` on the entity in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: Operator,
    /// `Null` for null checks, an array for `in`/`not_in`
    pub value: Value,
}

/// A hop across a declared relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traversal {
    pub relation: String,
    /// Target entity name
    pub target: String,
    /// Required hops must match; optional hops never exclude the source row
    pub required: bool,
    /// Applied to the hop's target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Box<Predicate>>,
}

/// Boolean expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Filter(Filter),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Traverse(Traversal),
}

impl Predicate {
    pub fn filter(field: impl Into<String>, op: Operator, value: Value) -> Self {
        Predicate::Filter(Filter {
            field: field.into(),
            op,
            value,
        })
    }

    /// Longest chain of nested traversals.
    pub fn depth(&self) -> usize {
        match self {
            Predicate::Filter(_) => 0,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::depth).max().unwrap_or(0)
            }
            Predicate::Not(inner) => inner.depth(),
            Predicate::Traverse(t) => 1 + t.predicate.as_deref().map_or(0, Predicate::depth),
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Predicate::Filter(_) => 1,
            Predicate::And(children) | Predicate::Or(children) => {
                1 + children.iter().map(Predicate::node_count).sum::<usize>()
            }
            Predicate::Not(inner) => 1 + inner.node_count(),
            Predicate::Traverse(t) => 1 + t.predicate.as_deref().map_or(0, Predicate::node_count),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Page {
    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none() && self.offset == 0
    }
}

/// One query over a root entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAst {
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    /// Empty means every declared field
    #[serde(default)]
    pub projection: Vec<String>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub page: Page,
}

impl QueryAst {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            predicate: None,
            projection: Vec::new(),
            sort: Vec::new(),
            page: Page::default(),
        }
    }

    /// Conjoin a predicate with whatever is already there.
    pub(crate) fn push_predicate(&mut self, predicate: Predicate) {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(existing) => Predicate::And(vec![existing, predicate]),
        });
    }

    pub fn depth(&self) -> usize {
        self.predicate.as_ref().map_or(0, Predicate::depth)
    }
}
