//! Error types for schema construction, path resolution, and result mapping.

use thiserror::Error;

use crate::schema::Backend;
use crate::validation::Violation;

/// Malformed or conflicting schema. Fatal at startup, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate field or relation '{name}' on entity {entity}")]
    DuplicateMember { entity: String, name: String },

    #[error("Entity {entity} does not declare its identity field '{identity}'")]
    MissingIdentity { entity: String, identity: String },

    #[error("Identity field {entity}.{identity} must not be nullable")]
    NullableIdentity { entity: String, identity: String },

    #[error("Relation {entity}.{relation} targets undeclared entity {target}")]
    DanglingRelation {
        entity: String,
        relation: String,
        target: String,
    },

    #[error("Relation {entity}.{relation} has an invalid mapping: {reason}")]
    InvalidRelationMapping {
        entity: String,
        relation: String,
        reason: String,
    },

    #[error("{backend} mapping conflict on {container}.{member}: claimed by {first} and {second}")]
    MappingConflict {
        backend: Backend,
        container: String,
        member: String,
        first: String,
        second: String,
    },

    #[error("Invalid identifier '{identifier}' in entity {entity}")]
    InvalidIdentifier { entity: String, identifier: String },

    #[error("Invalid rule on {entity}.{field}: {reason}")]
    InvalidRule {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Failed to parse {format} schema: {message}")]
    Parse { format: String, message: String },

    #[error("Failed to read schema file {path}: {message}")]
    Io { path: String, message: String },
}

/// A query referenced an entity, field, or relation the registry does not declare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnknownFieldError {
    #[error("Unknown entity: {entity}")]
    UnknownEntity { entity: String },

    #[error("Unknown field '{segment}' in path '{path}' on entity {entity}")]
    UnknownField {
        entity: String,
        path: String,
        segment: String,
    },

    #[error("'{segment}' in path '{path}' on entity {entity} is a field, not a relation")]
    NotARelation {
        entity: String,
        path: String,
        segment: String,
    },
}

impl UnknownFieldError {
    /// The path that failed to resolve, for remediation messages.
    pub fn path(&self) -> &str {
        match self {
            UnknownFieldError::UnknownEntity { entity } => entity,
            UnknownFieldError::UnknownField { path, .. }
            | UnknownFieldError::NotARelation { path, .. } => path,
        }
    }
}

/// A backend result violated the declared schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Unknown entity type in result mapping: {0}")]
    UnknownEntity(String),

    #[error("Non-nullable field {entity}.{field} arrived null from the {backend} backend")]
    NullInNonNullable {
        entity: String,
        field: String,
        backend: Backend,
    },

    #[error("Field {entity}.{field} expected {expected}, got {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("Entity {entity} with identity {identity} failed validation: {}", summarize(.violations))]
    Rejected {
        entity: String,
        identity: String,
        violations: Vec<Violation>,
    },
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} [{}]", v.field_path, v.code))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type SchemaResult<T> = Result<T, SchemaError>;
