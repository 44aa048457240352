//! Writes.
//!
//! A [`Mutation`] is validated and resolved against the registry once, then
//! handed to a compiler as a [`Write`]. Error-level violations refuse the
//! write before any text is produced.
//!
//! A cardinality-one relation mapped to a foreign key is carried by the key
//! field itself: any write that sets the key replaces the link, on both
//! backends. Join-table relations only change through [`Mutation::Link`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use aerodata_core::mapping::normalize_timestamp;
use aerodata_core::{
    codes, has_errors, Backend, Entity, EntityDefinition, FieldSpec, FieldType, Registry,
    RelationSpec, RelationalJoin, UnknownFieldError, ValidationMode, Validator, Violation,
};

use crate::error::CompileError;

/// A persistence operation on one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Create an entity from every field it carries
    Insert { entity: Entity },
    /// Set the carried fields on the entity with the carried identity
    Update { entity: Entity },
    Delete {
        entity_type: String,
        identity: Value,
    },
    /// Connect two existing entities through a declared relation
    Link {
        source_type: String,
        relation: String,
        source: Value,
        target: Value,
    },
}

impl Mutation {
    pub fn insert(entity: Entity) -> Self {
        Mutation::Insert { entity }
    }

    pub fn update(entity: Entity) -> Self {
        Mutation::Update { entity }
    }

    pub fn delete(entity_type: impl Into<String>, identity: impl Into<Value>) -> Self {
        Mutation::Delete {
            entity_type: entity_type.into(),
            identity: identity.into(),
        }
    }

    pub fn link(
        source_type: impl Into<String>,
        relation: impl Into<String>,
        source: impl Into<Value>,
        target: impl Into<Value>,
    ) -> Self {
        Mutation::Link {
            source_type: source_type.into(),
            relation: relation.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Entity type the write addresses.
    pub fn entity_type(&self) -> &str {
        match self {
            Mutation::Insert { entity } | Mutation::Update { entity } => &entity.entity_type,
            Mutation::Delete { entity_type, .. } => entity_type,
            Mutation::Link { source_type, .. } => source_type,
        }
    }
}

/// A validated write with every name resolved.
#[derive(Debug)]
pub(crate) enum Write<'r> {
    Insert {
        definition: &'r EntityDefinition,
        values: Vec<(&'r FieldSpec, Value)>,
        /// Non-null foreign keys among `values`
        links: Vec<KeyLink<'r>>,
    },
    Update {
        definition: &'r EntityDefinition,
        identity: Value,
        values: Vec<(&'r FieldSpec, Value)>,
        /// Foreign keys among `values`; a null key unlinks
        links: Vec<KeyLink<'r>>,
    },
    Delete {
        definition: &'r EntityDefinition,
        identity: Value,
    },
    Link {
        source: &'r EntityDefinition,
        relation: &'r RelationSpec,
        target: &'r EntityDefinition,
        source_id: Value,
        target_id: Value,
    },
}

pub(crate) fn prepare<'r>(
    validator: &'r Validator,
    mutation: &Mutation,
) -> Result<Write<'r>, CompileError> {
    let registry: &'r Registry = validator.registry();

    match mutation {
        Mutation::Insert { entity } => {
            let definition = registry.require(&entity.entity_type)?;
            refuse_errors(
                definition,
                validator.validate(entity, ValidationMode::CollectAll),
            )?;
            let values = carried_values(definition, entity, true);
            let links = key_links(registry, definition, &values)
                .into_iter()
                .filter(|link| !link.value.is_null())
                .collect();
            Ok(Write::Insert {
                definition,
                values,
                links,
            })
        }
        Mutation::Update { entity } => {
            let definition = registry.require(&entity.entity_type)?;
            let identity = identity_of(definition, entity.get(&definition.identity))?;
            let scope: Vec<String> = entity.fields.keys().cloned().collect();
            refuse_errors(
                definition,
                validator.validate_scoped(entity, ValidationMode::CollectAll, &scope),
            )?;
            let values = carried_values(definition, entity, false);
            if values.is_empty() {
                return Err(CompileError::EmptyUpdate {
                    entity: definition.name.clone(),
                });
            }
            let links = key_links(registry, definition, &values);
            Ok(Write::Update {
                definition,
                identity,
                values,
                links,
            })
        }
        Mutation::Delete {
            entity_type,
            identity,
        } => {
            let definition = registry.require(entity_type)?;
            Ok(Write::Delete {
                definition,
                identity: identity_of(definition, Some(identity))?,
            })
        }
        Mutation::Link {
            source_type,
            relation,
            source,
            target,
        } => {
            let source_def = registry.require(source_type)?;
            let spec = source_def
                .relation(relation)
                .ok_or_else(|| UnknownFieldError::UnknownField {
                    entity: source_def.name.clone(),
                    path: relation.clone(),
                    segment: relation.clone(),
                })?;
            let target_def = registry.require(&spec.target)?;
            Ok(Write::Link {
                source: source_def,
                relation: spec,
                target: target_def,
                source_id: identity_of(source_def, Some(source))?,
                target_id: identity_of(target_def, Some(target))?,
            })
        }
    }
}

/// A foreign-key relation whose key is a field of the written entity.
#[derive(Debug)]
pub(crate) struct KeyLink<'r> {
    pub relation: &'r RelationSpec,
    /// The written entity is the relation's source
    pub holder_is_source: bool,
    /// Entity at the other end
    pub other: &'r EntityDefinition,
    /// Field of `other` the key refers to
    pub referenced: &'r FieldSpec,
    pub value: Value,
}

/// End of a foreign-key relation that stores the key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyHolder {
    Source,
    Target,
}

/// Which end holds the key; `None` for join tables.
pub(crate) fn key_holder(source: &EntityDefinition, relation: &RelationSpec) -> Option<KeyHolder> {
    match &relation.relational {
        RelationalJoin::JoinTable { .. } => None,
        RelationalJoin::ForeignKey { source_column, .. }
            if *source_column == source.identity_field().column =>
        {
            Some(KeyHolder::Target)
        }
        RelationalJoin::ForeignKey { .. } => Some(KeyHolder::Source),
    }
}

/// Foreign keys carried in `values`, from relations declared on either end.
fn key_links<'r>(
    registry: &'r Registry,
    definition: &'r EntityDefinition,
    values: &[(&'r FieldSpec, Value)],
) -> Vec<KeyLink<'r>> {
    let carried = |column: &str| {
        values
            .iter()
            .find(|(spec, _)| spec.column == column)
            .map(|(_, value)| value.clone())
    };

    let mut links = Vec::new();
    for owner in registry.entities() {
        for relation in owner.relations() {
            let RelationalJoin::ForeignKey {
                source_column,
                target_column,
            } = &relation.relational
            else {
                continue;
            };
            let (holder_is_source, other, key_column, referenced_column) =
                match key_holder(owner, relation) {
                    Some(KeyHolder::Source) if owner.name == definition.name => {
                        let Some(target) = registry.entity(&relation.target) else {
                            continue;
                        };
                        (true, target, source_column, target_column)
                    }
                    Some(KeyHolder::Target) if relation.target == definition.name => {
                        (false, owner, target_column, source_column)
                    }
                    _ => continue,
                };
            let Some(value) = carried(key_column) else {
                continue;
            };
            let Some(referenced) = other.field_by_physical(Backend::Relational, referenced_column)
            else {
                continue;
            };
            links.push(KeyLink {
                relation,
                holder_is_source,
                other,
                referenced,
                value,
            });
        }
    }
    links
}

fn refuse_errors(
    definition: &EntityDefinition,
    violations: Vec<Violation>,
) -> Result<(), CompileError> {
    if has_errors(&violations) {
        return Err(CompileError::InvalidEntity {
            entity: definition.name.clone(),
            violations,
        });
    }
    Ok(())
}

fn identity_of(
    definition: &EntityDefinition,
    value: Option<&Value>,
) -> Result<Value, CompileError> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or_else(|| CompileError::MissingIdentity {
            entity: definition.name.clone(),
        })?;
    let spec = definition.identity_field();
    if !spec.field_type.accepts(value) {
        return Err(CompileError::InvalidEntity {
            entity: definition.name.clone(),
            violations: vec![Violation::error(
                spec.name.clone(),
                codes::TYPE_MISMATCH,
                format!("expected {}, got {}", spec.field_type, value),
            )],
        });
    }
    Ok(storable(spec, value))
}

/// Declared fields the entity carries, in declaration order.
fn carried_values<'r>(
    definition: &'r EntityDefinition,
    entity: &Entity,
    with_identity: bool,
) -> Vec<(&'r FieldSpec, Value)> {
    definition
        .fields()
        .iter()
        .filter(|spec| with_identity || spec.name != definition.identity)
        .filter_map(|spec| {
            entity
                .fields
                .get(&spec.name)
                .map(|value| (spec, storable(spec, value)))
        })
        .collect()
}

/// Canonical stored form: UTC millisecond timestamps, floats as floats,
/// enumerated text in its declared spelling.
pub(crate) fn storable(spec: &FieldSpec, value: &Value) -> Value {
    match (spec.field_type, value) {
        (FieldType::Text, Value::String(s)) => Value::from(spec.canonical_text(s)),
        (FieldType::Timestamp, Value::String(s)) => normalize_timestamp(s)
            .map(Value::String)
            .unwrap_or_else(|| value.clone()),
        (FieldType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}
