//! Validation/Constraint Engine.
//!
//! Rules are data attached to field specs at registry build time. The
//! [`Validator`] evaluates them uniformly against an entity instance and
//! reports [`Violation`]s; it never mutates the instance or touches a
//! backend.
//!
//! Per declared field, checks run in order: `required`, `type_mismatch`,
//! then the field's rules in declaration order. Undeclared fields are
//! reported as `unknown_field` after all declared fields.

mod rules;
mod standards;
mod violation;

pub use rules::{Constraint, RuleKind, RuleSpec};
pub use standards::{PropertyRange, StandardLookup, StandardsTable};
pub use violation::{codes, has_errors, Severity, Violation};

use aerodata_config::ValidationConfig;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

use crate::error::SchemaError;
use crate::registry::Registry;
use rules::RuleContext;

/// Whether validation stops at the first violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    FailFast,
    #[default]
    CollectAll,
}

impl ValidationMode {
    pub fn from_config(config: &ValidationConfig) -> Self {
        if config.fail_fast {
            ValidationMode::FailFast
        } else {
            ValidationMode::CollectAll
        }
    }
}

/// Anything that can be presented to the validator as a typed field map.
pub trait Validatable {
    fn entity_type(&self) -> &str;

    /// Field values keyed by logical field name.
    fn field_values(&self) -> Cow<'_, Map<String, Value>>;
}

/// Evaluates registry rules against entity instances.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<Registry>,
    standards: Arc<StandardsTable>,
}

impl Validator {
    pub fn new(registry: Arc<Registry>, standards: Arc<StandardsTable>) -> Self {
        Self {
            registry,
            standards,
        }
    }

    /// Validator backed by the built-in ASTM aerospace alloy table.
    pub fn with_astm(registry: Arc<Registry>) -> Self {
        Self::new(registry, Arc::new(StandardsTable::astm_aerospace()))
    }

    /// Load the standards table named by the configuration, falling back to
    /// the built-in table.
    pub fn from_config(
        registry: Arc<Registry>,
        config: &ValidationConfig,
    ) -> Result<Self, SchemaError> {
        let standards = match &config.standards_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading material standards table");
                StandardsTable::load(path)?
            }
            None => StandardsTable::astm_aerospace(),
        };
        Ok(Self::new(registry, Arc::new(standards)))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn standards(&self) -> &StandardsTable {
        &self.standards
    }

    /// Validate every declared field of an instance.
    pub fn validate<T: Validatable + ?Sized>(&self, item: &T, mode: ValidationMode) -> Vec<Violation> {
        self.validate_fields(item.entity_type(), &item.field_values(), mode, None)
    }

    /// Validate only the fields named in `scope`; other fields are neither
    /// required nor checked. Used for projected results.
    pub fn validate_scoped<T: Validatable + ?Sized>(
        &self,
        item: &T,
        mode: ValidationMode,
        scope: &[String],
    ) -> Vec<Violation> {
        self.validate_fields(item.entity_type(), &item.field_values(), mode, Some(scope))
    }

    fn validate_fields(
        &self,
        entity_type: &str,
        fields: &Map<String, Value>,
        mode: ValidationMode,
        scope: Option<&[String]>,
    ) -> Vec<Violation> {
        let Some(definition) = self.registry.entity(entity_type) else {
            return vec![Violation::error(
                entity_type,
                codes::UNKNOWN_ENTITY,
                format!("entity type '{}' is not registered", entity_type),
            )];
        };

        let mut violations = Vec::new();
        let stop = |violations: &Vec<Violation>| {
            mode == ValidationMode::FailFast && !violations.is_empty()
        };

        for spec in definition.fields() {
            if scope.is_some_and(|s| !s.iter().any(|name| name == &spec.name)) {
                continue;
            }

            let value = fields.get(&spec.name).unwrap_or(&Value::Null);
            if value.is_null() {
                if !spec.nullable {
                    violations.push(Violation::error(
                        &spec.name,
                        codes::REQUIRED,
                        format!("{}.{} is required", definition.name, spec.name),
                    ));
                }
            } else if !spec.field_type.accepts(value) {
                violations.push(Violation::error(
                    &spec.name,
                    codes::TYPE_MISMATCH,
                    format!("{} expects {}, got {}", spec.name, spec.field_type, value),
                ));
            } else {
                let ctx = RuleContext {
                    field: &spec.name,
                    fields,
                    standards: &self.standards,
                };
                for constraint in spec.constraints() {
                    if let Some(violation) = constraint.evaluate(value, &ctx) {
                        violations.push(violation);
                        if stop(&violations) {
                            return violations;
                        }
                    }
                }
            }

            if stop(&violations) {
                return violations;
            }
        }

        for name in fields.keys() {
            if definition.field(name).is_none() {
                violations.push(Violation::error(
                    name,
                    codes::UNKNOWN_FIELD,
                    format!("{} has no field '{}'", definition.name, name),
                ));
                if stop(&violations) {
                    break;
                }
            }
        }

        violations
    }
}
