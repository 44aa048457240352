//! AeroData core: entity model registry, validation, and result mapping.
//!
//! Entities are declared once as plain data ([`SchemaDeclaration`]), built
//! into an immutable [`Registry`] snapshot, validated by the [`Validator`],
//! and reconstructed from backend records by the [`ResultMapper`].

pub mod catalog;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod schema;
pub mod units;
pub mod validation;

pub use entity::{Entity, EntityRecord};
pub use error::{MappingError, SchemaError, SchemaResult, UnknownFieldError};
pub use mapping::{MapOptions, RawRecord, ResultMapper};
pub use registry::{
    EntityDefinition, FieldSpec, Registry, RegistryBuilder, RelationSpec, Resolved, ResolvedPath,
    SharedRegistry,
};
pub use schema::{
    Backend, Cardinality, EdgeDirection, EntityDeclaration, FieldDeclaration, FieldType,
    GraphEdge, RelationDeclaration, RelationalJoin, SchemaDeclaration,
};
pub use units::{Dimension, Unit};

// Re-export validation entry points
pub use validation::{
    codes, has_errors, RuleKind, RuleSpec, Severity, StandardsTable, Validatable,
    ValidationMode, Validator, Violation,
};
