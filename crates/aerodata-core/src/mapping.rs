//! Result Mapper.
//!
//! Turns raw backend records (keyed by physical column or property name)
//! into validated [`Entity`] values. Backend null/absence conventions are
//! normalized against each field's nullability, rows repeated by traversal
//! expansion are collapsed by root identity in first-occurrence order, and
//! every entity is re-validated in collect-all mode.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::MappingError;
use crate::registry::{EntityDefinition, FieldSpec};
use crate::schema::{Backend, FieldType};
use crate::validation::{has_errors, ValidationMode, Validator};

/// One raw record as returned by a backend adapter.
pub type RawRecord = Map<String, Value>;

/// Per-call mapping options.
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    /// Projected logical fields; `None` maps every declared field
    pub fields: Option<Vec<String>>,
    /// Fail the batch on the first entity with error-level violations
    pub strict: bool,
}

impl MapOptions {
    pub fn strict() -> Self {
        Self {
            fields: None,
            strict: true,
        }
    }

    pub fn projected(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Maps raw records to validated entities.
#[derive(Debug, Clone)]
pub struct ResultMapper {
    validator: Validator,
}

impl ResultMapper {
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Map with default options: all fields, lenient.
    pub fn map(
        &self,
        rows: &[RawRecord],
        entity_type: &str,
        backend: Backend,
    ) -> Result<Vec<Entity>, MappingError> {
        self.map_with(rows, entity_type, backend, &MapOptions::default())
    }

    pub fn map_with(
        &self,
        rows: &[RawRecord],
        entity_type: &str,
        backend: Backend,
        options: &MapOptions,
    ) -> Result<Vec<Entity>, MappingError> {
        let registry = self.validator.registry();
        let definition = registry
            .entity(entity_type)
            .ok_or_else(|| MappingError::UnknownEntity(entity_type.to_string()))?;

        let specs = scoped_fields(definition, options.fields.as_deref());
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for row in rows {
            let identity = read_field(definition, definition.identity_field(), row, backend)?;
            if !seen.insert(identity.to_string()) {
                continue;
            }

            let mut fields = Map::new();
            for spec in &specs {
                let value = read_field(definition, spec, row, backend)?;
                fields.insert(spec.name.clone(), value);
            }

            let mut entity = Entity {
                entity_type: definition.name.clone(),
                fields,
                violations: Vec::new(),
            };
            entity.violations = match &options.fields {
                Some(scope) => {
                    self.validator
                        .validate_scoped(&entity, ValidationMode::CollectAll, scope)
                }
                None => self.validator.validate(&entity, ValidationMode::CollectAll),
            };

            if options.strict && has_errors(&entity.violations) {
                warn!(
                    entity = %definition.name,
                    identity = %identity,
                    violations = entity.violations.len(),
                    "Rejecting result batch in strict mode"
                );
                return Err(MappingError::Rejected {
                    entity: definition.name.clone(),
                    identity: identity.to_string(),
                    violations: entity.violations,
                });
            }
            entities.push(entity);
        }

        let duplicates = rows.len() - entities.len();
        if duplicates > 0 {
            debug!(
                entity = %definition.name,
                rows = rows.len(),
                duplicates,
                "Collapsed traversal-expanded rows"
            );
        }

        Ok(entities)
    }
}

fn scoped_fields<'a>(definition: &'a EntityDefinition, scope: Option<&[String]>) -> Vec<&'a FieldSpec> {
    match scope {
        Some(names) => definition
            .fields()
            .iter()
            .filter(|f| names.iter().any(|n| n == &f.name) || f.name == definition.identity)
            .collect(),
        None => definition.fields().iter().collect(),
    }
}

fn read_field(
    definition: &EntityDefinition,
    spec: &FieldSpec,
    row: &RawRecord,
    backend: Backend,
) -> Result<Value, MappingError> {
    let raw = row.get(spec.physical_name(backend)).unwrap_or(&Value::Null);
    if raw.is_null() {
        return if spec.nullable {
            Ok(Value::Null)
        } else {
            Err(MappingError::NullInNonNullable {
                entity: definition.name.clone(),
                field: spec.name.clone(),
                backend,
            })
        };
    }

    coerce(spec.field_type, raw).ok_or_else(|| MappingError::TypeMismatch {
        entity: definition.name.clone(),
        field: spec.name.clone(),
        expected: spec.field_type.to_string(),
        found: raw.to_string(),
    })
}

/// Normalize a backend-native value to the field type's canonical JSON form.
fn coerce(field_type: FieldType, raw: &Value) -> Option<Value> {
    match (field_type, raw) {
        (FieldType::Text, Value::String(_)) => Some(raw.clone()),
        (FieldType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(raw.clone())
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::from(f as i64))
            }
        }
        (FieldType::Float, Value::Number(n)) => Number::from_f64(n.as_f64()?).map(Value::Number),
        (FieldType::Boolean, Value::Bool(_)) => Some(raw.clone()),
        // SQLite stores booleans as 0/1
        (FieldType::Boolean, Value::Number(n)) => match n.as_i64()? {
            0 => Some(Value::Bool(false)),
            1 => Some(Value::Bool(true)),
            _ => None,
        },
        (FieldType::Timestamp, Value::String(s)) => normalize_timestamp(s).map(Value::String),
        (FieldType::FloatPair, Value::Array(items)) => float_pair(items),
        (FieldType::FloatPair, Value::String(s)) => match serde_json::from_str(s).ok()? {
            Value::Array(items) => float_pair(&items),
            _ => None,
        },
        _ => None,
    }
}

fn float_pair(items: &[Value]) -> Option<Value> {
    if items.len() != 2 {
        return None;
    }
    let pair = items
        .iter()
        .map(|v| v.as_f64().and_then(Number::from_f64).map(Value::Number))
        .collect::<Option<Vec<_>>>()?;
    Some(Value::Array(pair))
}

/// RFC 3339 in UTC with millisecond precision, so stored text sorts in
/// instant order. SQLite's `YYYY-MM-DD HH:MM:SS` text form is read as UTC.
pub fn normalize_timestamp(s: &str) -> Option<String> {
    let instant = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .ok()?
            .and_utc(),
    };
    Some(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}
