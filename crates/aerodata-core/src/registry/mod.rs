//! Entity Model Registry.
//!
//! A [`Registry`] is an immutable snapshot of entity definitions built once
//! from a [`SchemaDeclaration`](crate::schema::SchemaDeclaration). Schema
//! changes produce a new snapshot; see [`SharedRegistry`] for atomic
//! publication.

mod builder;
mod shared;

pub use builder::RegistryBuilder;
pub use shared::SharedRegistry;

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{SchemaError, UnknownFieldError};
use crate::schema::{
    Backend, Cardinality, FieldType, GraphEdge, RelationalJoin, SchemaDeclaration,
};
use crate::units::Unit;
use crate::validation::Constraint;

/// Relative tolerance for float equality between a written and a read value.
const FLOAT_EQ_TOLERANCE: f64 = 1e-9;

/// Resolved field of an entity.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub unit: Option<Unit>,
    pub nullable: bool,
    /// Relational column name
    pub column: String,
    /// Graph property name
    pub property: String,
    pub description: Option<String>,
    pub(crate) constraints: Vec<Constraint>,
}

impl FieldSpec {
    /// Physical name of the field on a backend.
    pub fn physical_name(&self, backend: Backend) -> &str {
        match backend {
            Backend::Relational => &self.column,
            Backend::Graph => &self.property,
        }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Text in the spelling an enumerated rule declares, or unchanged.
    pub fn canonical_text<'a>(&'a self, value: &'a str) -> &'a str {
        self.constraints
            .iter()
            .find_map(|c| c.enumerated_spelling(value))
            .unwrap_or(value)
    }

    /// Field equality: floats compare within a relative tolerance and
    /// timestamps compare as instants.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => match self.field_type {
                FieldType::Float => floats_equal(a.as_f64(), b.as_f64()),
                FieldType::Integer => match (a.as_i64(), b.as_i64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => floats_equal(a.as_f64(), b.as_f64()),
                },
                FieldType::Timestamp => match (a.as_str(), b.as_str()) {
                    (Some(x), Some(y)) => match (
                        chrono::DateTime::parse_from_rfc3339(x),
                        chrono::DateTime::parse_from_rfc3339(y),
                    ) {
                        (Ok(x), Ok(y)) => x == y,
                        _ => x == y,
                    },
                    _ => a == b,
                },
                FieldType::FloatPair => match (a.as_array(), b.as_array()) {
                    (Some(x), Some(y)) => {
                        x.len() == y.len()
                            && x.iter()
                                .zip(y)
                                .all(|(p, q)| floats_equal(p.as_f64(), q.as_f64()))
                    }
                    _ => false,
                },
                FieldType::Text | FieldType::Boolean => a == b,
            },
        }
    }
}

fn floats_equal(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => {
            let scale = x.abs().max(y.abs()).max(1.0);
            (x - y).abs() <= FLOAT_EQ_TOLERANCE * scale
        }
        _ => false,
    }
}

/// Resolved relation between two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: String,
    pub source: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub relational: RelationalJoin,
    pub graph: GraphEdge,
}

/// One entity type and its backend mappings.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub name: String,
    /// Identity field name
    pub identity: String,
    pub table: String,
    pub label: String,
    identity_spec: FieldSpec,
    fields: Vec<FieldSpec>,
    field_index: HashMap<String, usize>,
    relations: Vec<RelationSpec>,
    relation_index: HashMap<String, usize>,
}

impl EntityDefinition {
    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn relations(&self) -> &[RelationSpec] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relation_index.get(name).map(|&i| &self.relations[i])
    }

    /// Spec of the identity field.
    ///
    /// Always present: the builder refuses an entity whose identity is not
    /// among its declared fields.
    pub fn identity_field(&self) -> &FieldSpec {
        &self.identity_spec
    }

    /// Table or label, depending on backend.
    pub fn container(&self, backend: Backend) -> &str {
        match backend {
            Backend::Relational => &self.table,
            Backend::Graph => &self.label,
        }
    }

    /// Look a field up by its physical name on a backend.
    pub fn field_by_physical(&self, backend: Backend, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.physical_name(backend) == name)
    }
}

/// Result of resolving a path against an entity.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Field(&'a FieldSpec),
    Relation(&'a RelationSpec),
}

/// A dotted path resolved hop by hop.
#[derive(Debug, Clone)]
pub struct ResolvedPath<'a> {
    /// Relations walked before the final segment
    pub hops: Vec<&'a RelationSpec>,
    pub terminal: Resolved<'a>,
}

/// Immutable snapshot of all entity definitions.
#[derive(Debug, Clone)]
pub struct Registry {
    version: u64,
    entities: Vec<EntityDefinition>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from a schema declaration.
    pub fn register(declaration: &SchemaDeclaration) -> Result<Self, SchemaError> {
        RegistryBuilder::new().build(declaration)
    }

    /// Snapshot version; increases with every publish through [`SharedRegistry`].
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.iter()
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    /// Like [`entity`](Self::entity) but as a query-facing error.
    pub fn require(&self, name: &str) -> Result<&EntityDefinition, UnknownFieldError> {
        self.entity(name).ok_or_else(|| UnknownFieldError::UnknownEntity {
            entity: name.to_string(),
        })
    }

    /// Resolve a field or relation path such as `grade` or `materials.grade`.
    pub fn resolve(&self, entity: &str, path: &str) -> Result<Resolved<'_>, UnknownFieldError> {
        self.resolve_path(entity, path).map(|p| p.terminal)
    }

    /// Resolve a dotted path, keeping each relation hop.
    pub fn resolve_path(
        &self,
        entity: &str,
        path: &str,
    ) -> Result<ResolvedPath<'_>, UnknownFieldError> {
        let mut current = self.require(entity)?;
        let mut hops = Vec::new();
        let segments: Vec<&str> = path.split('.').collect();
        let last = segments.len() - 1;

        for (i, segment) in segments.iter().enumerate() {
            if i == last {
                let terminal = if let Some(field) = current.field(segment) {
                    Resolved::Field(field)
                } else if let Some(relation) = current.relation(segment) {
                    Resolved::Relation(relation)
                } else {
                    return Err(UnknownFieldError::UnknownField {
                        entity: current.name.clone(),
                        path: path.to_string(),
                        segment: segment.to_string(),
                    });
                };
                return Ok(ResolvedPath { hops, terminal });
            }

            let Some(relation) = current.relation(segment) else {
                return Err(if current.field(segment).is_some() {
                    UnknownFieldError::NotARelation {
                        entity: current.name.clone(),
                        path: path.to_string(),
                        segment: segment.to_string(),
                    }
                } else {
                    UnknownFieldError::UnknownField {
                        entity: current.name.clone(),
                        path: path.to_string(),
                        segment: segment.to_string(),
                    }
                });
            };
            hops.push(relation);
            current = self.require(&relation.target)?;
        }

        // `split` always yields at least one segment
        Err(UnknownFieldError::UnknownField {
            entity: entity.to_string(),
            path: path.to_string(),
            segment: String::new(),
        })
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}
