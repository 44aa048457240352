//! Entity instances.
//!
//! [`Entity`] is the dynamic form that flows between the API layer, the
//! validator, the write compilers, and the result mapper. Typed records
//! implement [`EntityRecord`] to convert to and from it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::registry::Registry;
use crate::validation::{has_errors, Validatable, Violation};

/// A dynamic entity instance keyed by logical field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub fields: Map<String, Value>,
    /// Violations found when the instance was last validated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Map::new(),
            violations: Vec::new(),
        }
    }

    /// Build from a JSON object; anything else yields an empty field map.
    pub fn from_value(entity_type: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            entity_type: entity_type.into(),
            fields,
            violations: Vec::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Identity value, if the registry knows the entity type.
    pub fn identity<'a>(&'a self, registry: &Registry) -> Option<&'a Value> {
        let definition = registry.entity(&self.entity_type)?;
        self.get(&definition.identity)
    }

    pub fn is_valid(&self) -> bool {
        !has_errors(&self.violations)
    }

    /// Equality under the registry's field equality. Violations are ignored.
    pub fn same_as(&self, other: &Entity, registry: &Registry) -> bool {
        if self.entity_type != other.entity_type {
            return false;
        }
        let Some(definition) = registry.entity(&self.entity_type) else {
            return self.fields == other.fields;
        };
        definition.fields().iter().all(|spec| {
            let a = self.fields.get(&spec.name).unwrap_or(&Value::Null);
            let b = other.fields.get(&spec.name).unwrap_or(&Value::Null);
            spec.values_equal(a, b)
        })
    }
}

impl Validatable for Entity {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn field_values(&self) -> Cow<'_, Map<String, Value>> {
        Cow::Borrowed(&self.fields)
    }
}

/// A typed record that corresponds to one registered entity type.
pub trait EntityRecord: Serialize + DeserializeOwned {
    /// Registered entity name
    const ENTITY_TYPE: &'static str;

    fn to_entity(&self) -> Result<Entity, serde_json::Error> {
        Ok(Entity::from_value(Self::ENTITY_TYPE, serde_json::to_value(self)?))
    }

    fn from_entity(entity: &Entity) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(entity.fields.clone()))
    }
}

impl<T: EntityRecord> Validatable for T {
    fn entity_type(&self) -> &str {
        T::ENTITY_TYPE
    }

    fn field_values(&self) -> Cow<'_, Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Cow::Owned(map),
            _ => Cow::Owned(Map::new()),
        }
    }
}
