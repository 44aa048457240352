//! Query Expression Builder.
//!
//! Every call resolves names against the registry snapshot and returns a
//! new builder; the receiver is never modified, so a partially built query
//! can be shared and extended independently by concurrent callers.

use serde_json::{Number, Value};
use std::sync::Arc;

use aerodata_core::mapping::normalize_timestamp;
use aerodata_core::{EntityDefinition, FieldSpec, FieldType, Registry, RelationSpec, Resolved};

use crate::error::BuildError;
use crate::ir::{Direction, Operator, Predicate, QueryAst, SortKey, Traversal};

/// Name resolution for one entity in the tree.
///
/// Closures passed to [`QueryBuilder::and`], [`QueryBuilder::traverse`] and
/// friends receive a scope bound to the entity they filter.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'r> {
    registry: &'r Registry,
    entity: &'r EntityDefinition,
}

impl<'r> Scope<'r> {
    pub fn entity(&self) -> &str {
        &self.entity.name
    }

    /// `path op value`, where `path` may cross relations (`materials.grade`).
    pub fn filter(
        &self,
        path: &str,
        op: Operator,
        value: impl Into<Value>,
    ) -> Result<Predicate, BuildError> {
        let resolved = self.registry.resolve_path(&self.entity.name, path)?;
        let Resolved::Field(spec) = resolved.terminal else {
            return Err(BuildError::NotAField {
                path: path.to_string(),
            });
        };
        let value = check_literal(path, spec, op, value.into())?;
        Ok(wrap_hops(
            &resolved.hops,
            Predicate::filter(spec.name.clone(), op, value),
        ))
    }

    pub fn eq(&self, path: &str, value: impl Into<Value>) -> Result<Predicate, BuildError> {
        self.filter(path, Operator::Eq, value)
    }

    pub fn is_null(&self, path: &str) -> Result<Predicate, BuildError> {
        self.filter(path, Operator::IsNull, Value::Null)
    }

    pub fn all(&self, predicates: Vec<Predicate>) -> Predicate {
        Predicate::And(predicates)
    }

    pub fn any(&self, predicates: Vec<Predicate>) -> Predicate {
        Predicate::Or(predicates)
    }

    pub fn not(&self, predicate: Predicate) -> Predicate {
        Predicate::Not(Box::new(predicate))
    }

    /// Required hop; the closure filters the target.
    pub fn traverse<F>(&self, relation: &str, body: F) -> Result<Predicate, BuildError>
    where
        F: FnOnce(&Scope<'r>) -> Result<Predicate, BuildError>,
    {
        self.hop(relation, true, Some(body))
    }

    /// Optional hop; never excludes the source row.
    pub fn traverse_optional<F>(&self, relation: &str, body: F) -> Result<Predicate, BuildError>
    where
        F: FnOnce(&Scope<'r>) -> Result<Predicate, BuildError>,
    {
        self.hop(relation, false, Some(body))
    }

    /// At least one related target exists.
    pub fn has(&self, relation: &str) -> Result<Predicate, BuildError> {
        self.hop::<fn(&Scope<'r>) -> Result<Predicate, BuildError>>(relation, true, None)
    }

    fn hop<F>(&self, path: &str, required: bool, body: Option<F>) -> Result<Predicate, BuildError>
    where
        F: FnOnce(&Scope<'r>) -> Result<Predicate, BuildError>,
    {
        let resolved = self.registry.resolve_path(&self.entity.name, path)?;
        let Resolved::Relation(relation) = resolved.terminal else {
            return Err(BuildError::NotARelation {
                path: path.to_string(),
            });
        };
        let target = self.registry.require(&relation.target)?;
        let nested = match body {
            Some(body) => Some(Box::new(body(&Scope {
                registry: self.registry,
                entity: target,
            })?)),
            None => None,
        };
        let last = Predicate::Traverse(Traversal {
            relation: relation.name.clone(),
            target: relation.target.clone(),
            required,
            predicate: nested,
        });
        Ok(wrap_hops(&resolved.hops, last))
    }
}

/// Nest `inner` under required hops, outermost first.
fn wrap_hops(hops: &[&RelationSpec], inner: Predicate) -> Predicate {
    hops.iter().rev().fold(inner, |acc, hop| {
        Predicate::Traverse(Traversal {
            relation: hop.name.clone(),
            target: hop.target.clone(),
            required: true,
            predicate: Some(Box::new(acc)),
        })
    })
}

fn check_literal(
    path: &str,
    spec: &FieldSpec,
    op: Operator,
    value: Value,
) -> Result<Value, BuildError> {
    let invalid = |value: &Value| BuildError::InvalidLiteral {
        path: path.to_string(),
        field_type: spec.field_type,
        op: op.to_string(),
        value: value.to_string(),
    };

    match op {
        Operator::IsNull | Operator::IsNotNull => Ok(Value::Null),
        Operator::Eq | Operator::Ne if value.is_null() => Ok(Value::Null),
        Operator::Eq | Operator::Ne => scalar(spec, &value).ok_or_else(|| invalid(&value)),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            if !spec.field_type.is_ordered() {
                return Err(invalid(&value));
            }
            scalar(spec, &value).ok_or_else(|| invalid(&value))
        }
        Operator::Contains => match (&spec.field_type, &value) {
            (FieldType::Text, Value::String(_)) => Ok(value),
            _ => Err(invalid(&value)),
        },
        Operator::In | Operator::NotIn => {
            let Value::Array(items) = &value else {
                return Err(invalid(&value));
            };
            if items.is_empty() {
                return Err(invalid(&value));
            }
            items
                .iter()
                .map(|item| scalar(spec, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
                .ok_or_else(|| invalid(&value))
        }
    }
}

/// Normalized non-null literal in the form writes store it.
fn scalar(spec: &FieldSpec, value: &Value) -> Option<Value> {
    if value.is_null() || !spec.field_type.accepts(value) {
        return None;
    }
    match spec.field_type {
        FieldType::FloatPair => None,
        FieldType::Float => Number::from_f64(value.as_f64()?).map(Value::Number),
        FieldType::Timestamp => normalize_timestamp(value.as_str()?).map(Value::String),
        FieldType::Text => Some(Value::from(spec.canonical_text(value.as_str()?))),
        _ => Some(value.clone()),
    }
}

/// Immutable fluent query builder over one root entity.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    registry: Arc<Registry>,
    ast: Arc<QueryAst>,
}

impl QueryBuilder {
    pub fn new(registry: Arc<Registry>, root: &str) -> Result<Self, BuildError> {
        let root = registry.require(root)?.name.clone();
        Ok(Self {
            registry,
            ast: Arc::new(QueryAst::new(root)),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The AST as built, before canonicalization.
    pub fn ast(&self) -> &Arc<QueryAst> {
        &self.ast
    }

    fn root_scope(&self) -> Result<Scope<'_>, BuildError> {
        Ok(Scope {
            registry: &self.registry,
            entity: self.registry.require(&self.ast.root)?,
        })
    }

    fn derive(&self, change: impl FnOnce(&mut QueryAst)) -> Self {
        let mut ast = (*self.ast).clone();
        change(&mut ast);
        Self {
            registry: Arc::clone(&self.registry),
            ast: Arc::new(ast),
        }
    }

    fn conjoin(&self, predicate: Predicate) -> Self {
        self.derive(|ast| ast.push_predicate(predicate))
    }

    pub fn filter(
        &self,
        path: &str,
        op: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, BuildError> {
        let predicate = self.root_scope()?.filter(path, op, value)?;
        Ok(self.conjoin(predicate))
    }

    /// Conjoin an arbitrary predicate built against the root scope.
    pub fn matching<F>(&self, build: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Predicate, BuildError>,
    {
        let predicate = build(&self.root_scope()?)?;
        Ok(self.conjoin(predicate))
    }

    /// Conjoin `all(children)`. An empty list leaves the query unchanged.
    pub fn and<F>(&self, build: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Vec<Predicate>, BuildError>,
    {
        let children = build(&self.root_scope()?)?;
        if children.is_empty() {
            return Ok(self.clone());
        }
        Ok(self.conjoin(Predicate::And(children)))
    }

    /// Conjoin `any(children)`. An empty list leaves the query unchanged.
    pub fn or<F>(&self, build: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Vec<Predicate>, BuildError>,
    {
        let children = build(&self.root_scope()?)?;
        if children.is_empty() {
            return Ok(self.clone());
        }
        Ok(self.conjoin(Predicate::Or(children)))
    }

    pub fn not<F>(&self, build: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Predicate, BuildError>,
    {
        let inner = build(&self.root_scope()?)?;
        Ok(self.conjoin(Predicate::Not(Box::new(inner))))
    }

    pub fn traverse<F>(&self, relation: &str, body: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Predicate, BuildError>,
    {
        let predicate = self.root_scope()?.traverse(relation, body)?;
        Ok(self.conjoin(predicate))
    }

    pub fn traverse_optional<F>(&self, relation: &str, body: F) -> Result<Self, BuildError>
    where
        F: for<'s> FnOnce(&Scope<'s>) -> Result<Predicate, BuildError>,
    {
        let predicate = self.root_scope()?.traverse_optional(relation, body)?;
        Ok(self.conjoin(predicate))
    }

    pub fn has(&self, relation: &str) -> Result<Self, BuildError> {
        let predicate = self.root_scope()?.has(relation)?;
        Ok(self.conjoin(predicate))
    }

    /// Restrict mapped fields. The identity field is always returned.
    pub fn project(&self, fields: &[&str]) -> Result<Self, BuildError> {
        let entity = self.root_scope()?.entity;
        let mut projection: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            let spec = self.root_field(entity, field, "projection")?;
            if !projection.contains(&spec.name) {
                projection.push(spec.name.clone());
            }
        }
        Ok(self.derive(|ast| ast.projection = projection))
    }

    /// Append a sort key. Root identity ascending is always the final tie-break.
    pub fn sort_by(&self, field: &str, direction: Direction) -> Result<Self, BuildError> {
        let entity = self.root_scope()?.entity;
        let spec = self.root_field(entity, field, "sort")?;
        if !spec.field_type.is_ordered() {
            return Err(BuildError::UnorderedField {
                path: field.to_string(),
                field_type: spec.field_type,
            });
        }
        let field = spec.name.clone();
        Ok(self.derive(|ast| {
            ast.sort.retain(|key| key.field != field);
            ast.sort.push(SortKey { field, direction });
        }))
    }

    pub fn limit(&self, limit: u64) -> Self {
        self.derive(|ast| ast.page.limit = Some(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        self.derive(|ast| ast.page.offset = offset)
    }

    /// One-based page of `size` root entities.
    pub fn page(&self, number: u64, size: u64) -> Result<Self, BuildError> {
        if number == 0 {
            return Err(BuildError::InvalidPage {
                reason: "page numbers start at 1".to_string(),
            });
        }
        if size == 0 {
            return Err(BuildError::InvalidPage {
                reason: "page size must be positive".to_string(),
            });
        }
        let offset = (number - 1)
            .checked_mul(size)
            .ok_or_else(|| BuildError::InvalidPage {
                reason: format!("page {} of size {} overflows", number, size),
            })?;
        Ok(self.limit(size).offset(offset))
    }

    fn root_field<'e>(
        &self,
        entity: &'e EntityDefinition,
        path: &str,
        clause: &str,
    ) -> Result<&'e FieldSpec, BuildError> {
        if path.contains('.') {
            return Err(BuildError::NestedPath {
                path: path.to_string(),
                clause: clause.to_string(),
            });
        }
        match self.registry.resolve(&entity.name, path)? {
            Resolved::Field(_) => entity.field(path).ok_or_else(|| BuildError::NotAField {
                path: path.to_string(),
            }),
            Resolved::Relation(_) => Err(BuildError::NotAField {
                path: path.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerodata_core::{catalog, UnknownFieldError};
    use serde_json::json;

    fn aircraft() -> QueryBuilder {
        QueryBuilder::new(Arc::new(catalog::registry().unwrap()), "Aircraft").unwrap()
    }

    #[test]
    fn test_builder_is_immutable() {
        let base = aircraft().filter("mtow", Operator::Gt, 50000).unwrap();
        let narrowed = base.filter("num_engines", Operator::Eq, 2).unwrap();

        assert!(matches!(base.ast().predicate, Some(Predicate::Filter(_))));
        assert!(matches!(narrowed.ast().predicate, Some(Predicate::And(ref c)) if c.len() == 2));
    }

    #[test]
    fn test_unknown_field_fails_at_build_time() {
        let err = aircraft()
            .filter("materials.hardness", Operator::Gt, 5)
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::UnknownField(UnknownFieldError::UnknownField {
                entity: "Material".into(),
                path: "materials.hardness".into(),
                segment: "hardness".into(),
            })
        );
    }

    #[test]
    fn test_dotted_path_desugars_to_required_traversal() {
        let query = aircraft()
            .filter("materials.grade", Operator::Eq, "7075-T6")
            .unwrap();

        assert_eq!(
            query.ast().predicate,
            Some(Predicate::Traverse(Traversal {
                relation: "materials".into(),
                target: "Material".into(),
                required: true,
                predicate: Some(Box::new(Predicate::filter(
                    "grade",
                    Operator::Eq,
                    json!("7075-T6")
                ))),
            }))
        );
    }

    #[test]
    fn test_literals_are_type_checked() {
        let q = aircraft();
        assert!(matches!(
            q.filter("mtow", Operator::Gt, "heavy"),
            Err(BuildError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            q.filter("model", Operator::In, json!([])),
            Err(BuildError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            q.filter("num_engines", Operator::Contains, "2"),
            Err(BuildError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            q.filter("engines", Operator::Eq, 1),
            Err(BuildError::NotAField { .. })
        ));
    }

    #[test]
    fn test_literals_are_normalized() {
        let q = aircraft()
            .filter("mtow", Operator::Gt, 50000)
            .unwrap()
            .filter("first_flight", Operator::Gte, "1967-04-09T10:00:00+02:00")
            .unwrap();

        let Some(Predicate::And(children)) = &q.ast().predicate else {
            panic!("expected conjunction");
        };
        assert_eq!(children[0], Predicate::filter("mtow", Operator::Gt, json!(50000.0)));
        assert_eq!(
            children[1],
            Predicate::filter("first_flight", Operator::Gte, json!("1967-04-09T08:00:00.000Z"))
        );
    }

    #[test]
    fn test_scoped_closures_build_nested_trees() {
        let q = aircraft()
            .or(|s| {
                Ok(vec![
                    s.filter("engine_type", Operator::Eq, "turboprop")?,
                    s.traverse("engines", |e| e.filter("thrust", Operator::Gte, 30000))?,
                ])
            })
            .unwrap()
            .not(|s| s.is_null("range"))
            .unwrap();

        let Some(Predicate::And(children)) = &q.ast().predicate else {
            panic!("expected conjunction");
        };
        assert!(matches!(&children[0], Predicate::Or(c) if c.len() == 2));
        assert!(matches!(&children[1], Predicate::Not(_)));
    }

    #[test]
    fn test_projection_and_sort_accept_root_fields_only() {
        let q = aircraft();
        assert!(matches!(
            q.sort_by("materials.grade", Direction::Asc),
            Err(BuildError::NestedPath { .. })
        ));
        assert!(matches!(
            q.project(&["model", "engines"]),
            Err(BuildError::NotAField { .. })
        ));

        let sorted = q
            .sort_by("mtow", Direction::Desc)
            .unwrap()
            .sort_by("model", Direction::Asc)
            .unwrap()
            .sort_by("mtow", Direction::Asc)
            .unwrap();
        let fields: Vec<_> = sorted.ast().sort.iter().map(|k| k.field.as_str()).collect();
        assert_eq!(fields, vec!["model", "mtow"]);
    }

    #[test]
    fn test_sort_requires_an_ordered_field() {
        let materials =
            QueryBuilder::new(Arc::new(catalog::registry().unwrap()), "Material").unwrap();

        assert_eq!(
            materials
                .sort_by("temperature_rating", Direction::Asc)
                .unwrap_err(),
            BuildError::UnorderedField {
                path: "temperature_rating".into(),
                field_type: FieldType::FloatPair,
            }
        );
        assert!(materials.sort_by("density", Direction::Asc).is_ok());
    }

    #[test]
    fn test_enumerated_literals_use_declared_spelling() {
        let q = QueryBuilder::new(Arc::new(catalog::registry().unwrap()), "Material")
            .unwrap()
            .filter("category", Operator::In, json!(["Alloy", "COMPOSITE"]))
            .unwrap();

        assert_eq!(
            q.ast().predicate,
            Some(Predicate::filter(
                "category",
                Operator::In,
                json!(["alloy", "composite"])
            ))
        );
    }

    #[test]
    fn test_page_translates_to_limit_and_offset() {
        let q = aircraft().page(3, 20).unwrap();
        assert_eq!(q.ast().page.limit, Some(20));
        assert_eq!(q.ast().page.offset, 40);

        assert!(aircraft().page(0, 20).is_err());
        assert!(aircraft().page(1, 0).is_err());
    }
}
