//! Validation rules as data.
//!
//! [`RuleSpec`] is the declared form carried by a schema; the registry
//! compiles each into a [`Constraint`] (regexes compiled, references
//! checked) so evaluation never fails on malformed rule data.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::standards::{StandardLookup, StandardsTable};
use super::violation::{codes, Severity, Violation};
use crate::schema::FieldType;

/// A declared rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Overrides the kind's default violation code
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    /// Overrides the generated violation message
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl RuleSpec {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            code: None,
            severity: Severity::Error,
            message: None,
            kind,
        }
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(RuleKind::Range {
            min,
            max,
            exclusive_min: false,
            exclusive_max: false,
        })
    }

    /// `value > 0`
    pub fn positive() -> Self {
        Self::new(RuleKind::Range {
            min: Some(0.0),
            max: None,
            exclusive_min: true,
            exclusive_max: false,
        })
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleKind::OneOf {
            values: values.into_iter().map(Into::into).collect(),
            case_insensitive: true,
        })
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern {
            pattern: pattern.into(),
        })
    }

    pub fn standard_range(standard: impl Into<String>, grade_field: impl Into<String>) -> Self {
        Self::new(RuleKind::StandardRange {
            standard: standard.into(),
            grade_field: grade_field.into(),
            property: None,
        })
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// The rule vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Numeric bounds
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        exclusive_min: bool,
        #[serde(default)]
        exclusive_max: bool,
    },
    /// Enumerated text values
    OneOf {
        values: Vec<String>,
        #[serde(default)]
        case_insensitive: bool,
    },
    /// Regex over text
    Pattern { pattern: String },
    /// `[min, max]` pair with `min < max` and an optional floor for `min`
    OrderedPair {
        #[serde(default)]
        floor: Option<f64>,
    },
    /// Cross-field lookup in the material standards table
    StandardRange {
        standard: String,
        /// Sibling field holding the certified grade
        grade_field: String,
        /// Property key in the table; defaults to the field name
        #[serde(default)]
        property: Option<String>,
    },
}

impl RuleKind {
    fn default_code(&self) -> &'static str {
        match self {
            RuleKind::Range { .. } => codes::RANGE,
            RuleKind::OneOf { .. } => codes::ONE_OF,
            RuleKind::Pattern { .. } => codes::PATTERN,
            RuleKind::OrderedPair { .. } => codes::ORDERED_PAIR,
            RuleKind::StandardRange { .. } => codes::STANDARD_RANGE,
        }
    }
}

/// Evaluation form of a rule.
#[derive(Debug, Clone)]
pub(crate) enum Check {
    Range {
        min: Option<(f64, bool)>,
        max: Option<(f64, bool)>,
    },
    OneOf {
        values: Vec<String>,
        case_insensitive: bool,
    },
    Pattern(Regex),
    OrderedPair {
        floor: Option<f64>,
    },
    StandardRange {
        standard: String,
        grade_field: String,
        property: String,
    },
}

/// A compiled rule attached to a field spec.
#[derive(Debug, Clone)]
pub struct Constraint {
    code: String,
    severity: Severity,
    message: Option<String>,
    check: Check,
}

/// Context available to a constraint while evaluating one field.
pub(crate) struct RuleContext<'a> {
    pub field: &'a str,
    pub fields: &'a Map<String, Value>,
    pub standards: &'a StandardsTable,
}

impl Constraint {
    /// Compile a declared rule for a field of `field_type`.
    ///
    /// `sibling` reports the type of another field on the same entity.
    pub(crate) fn compile(
        spec: &RuleSpec,
        field: &str,
        field_type: FieldType,
        sibling: impl Fn(&str) -> Option<FieldType>,
    ) -> Result<Self, String> {
        let check = match &spec.kind {
            RuleKind::Range {
                min,
                max,
                exclusive_min,
                exclusive_max,
            } => {
                if !field_type.is_numeric() {
                    return Err(format!("range rule requires a numeric field, got {}", field_type));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("range min {} exceeds max {}", lo, hi));
                    }
                }
                Check::Range {
                    min: min.map(|m| (m, *exclusive_min)),
                    max: max.map(|m| (m, *exclusive_max)),
                }
            }
            RuleKind::OneOf {
                values,
                case_insensitive,
            } => {
                if field_type != FieldType::Text {
                    return Err(format!("one_of rule requires a text field, got {}", field_type));
                }
                if values.is_empty() {
                    return Err("one_of rule lists no values".to_string());
                }
                Check::OneOf {
                    values: values.clone(),
                    case_insensitive: *case_insensitive,
                }
            }
            RuleKind::Pattern { pattern } => {
                if field_type != FieldType::Text {
                    return Err(format!("pattern rule requires a text field, got {}", field_type));
                }
                let regex = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
                Check::Pattern(regex)
            }
            RuleKind::OrderedPair { floor } => {
                if field_type != FieldType::FloatPair {
                    return Err(format!(
                        "ordered_pair rule requires a float_pair field, got {}",
                        field_type
                    ));
                }
                Check::OrderedPair { floor: *floor }
            }
            RuleKind::StandardRange {
                standard,
                grade_field,
                property,
            } => {
                if !field_type.is_numeric() {
                    return Err(format!(
                        "standard_range rule requires a numeric field, got {}",
                        field_type
                    ));
                }
                match sibling(grade_field) {
                    Some(FieldType::Text) => {}
                    Some(other) => {
                        return Err(format!(
                            "grade field '{}' must be text, got {}",
                            grade_field, other
                        ))
                    }
                    None => return Err(format!("grade field '{}' is not declared", grade_field)),
                }
                Check::StandardRange {
                    standard: standard.clone(),
                    grade_field: grade_field.clone(),
                    property: property.clone().unwrap_or_else(|| field.to_string()),
                }
            }
        };

        Ok(Self {
            code: spec
                .code
                .clone()
                .unwrap_or_else(|| spec.kind.default_code().to_string()),
            severity: spec.severity,
            message: spec.message.clone(),
            check,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Declared spelling of an enumerated value matched without regard to case.
    pub fn enumerated_spelling(&self, value: &str) -> Option<&str> {
        match &self.check {
            Check::OneOf {
                values,
                case_insensitive: true,
            } => values
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(value))
                .map(String::as_str),
            _ => None,
        }
    }

    fn violation(&self, ctx: &RuleContext<'_>, code: &str, generated: String) -> Violation {
        let message = self.message.clone().unwrap_or(generated);
        Violation::new(ctx.field, code, self.severity, message)
    }

    /// Evaluate against a non-null value already checked against the field type.
    pub(crate) fn evaluate(&self, value: &Value, ctx: &RuleContext<'_>) -> Option<Violation> {
        match &self.check {
            Check::Range { min, max } => {
                let v = value.as_f64()?;
                let below = min.is_some_and(|(m, exclusive)| if exclusive { v <= m } else { v < m });
                let above = max.is_some_and(|(m, exclusive)| if exclusive { v >= m } else { v > m });
                if below || above {
                    Some(self.violation(
                        ctx,
                        &self.code,
                        format!("{} = {} is outside {}", ctx.field, v, describe_bounds(min, max)),
                    ))
                } else {
                    None
                }
            }
            Check::OneOf {
                values,
                case_insensitive,
            } => {
                let v = value.as_str()?;
                let allowed = values.iter().any(|candidate| {
                    if *case_insensitive {
                        candidate.eq_ignore_ascii_case(v)
                    } else {
                        candidate == v
                    }
                });
                (!allowed).then(|| {
                    self.violation(
                        ctx,
                        &self.code,
                        format!("{} must be one of {:?}, got '{}'", ctx.field, values, v),
                    )
                })
            }
            Check::Pattern(regex) => {
                let v = value.as_str()?;
                (!regex.is_match(v)).then(|| {
                    self.violation(
                        ctx,
                        &self.code,
                        format!("{} '{}' does not match {}", ctx.field, v, regex.as_str()),
                    )
                })
            }
            Check::OrderedPair { floor } => {
                let pair = value.as_array()?;
                let (lo, hi) = (pair.first()?.as_f64()?, pair.get(1)?.as_f64()?);
                if lo >= hi {
                    return Some(self.violation(
                        ctx,
                        &self.code,
                        format!("{} minimum {} must be less than maximum {}", ctx.field, lo, hi),
                    ));
                }
                match floor {
                    Some(f) if lo < *f => Some(self.violation(
                        ctx,
                        &self.code,
                        format!("{} minimum {} is below the floor {}", ctx.field, lo, f),
                    )),
                    _ => None,
                }
            }
            Check::StandardRange {
                standard,
                grade_field,
                property,
            } => {
                let v = value.as_f64()?;
                // No grade claimed means no standard applies
                let grade = ctx.fields.get(grade_field)?.as_str()?;
                match ctx.standards.lookup(standard, grade, property) {
                    StandardLookup::Found(range) if range.contains(v) => None,
                    StandardLookup::Found(range) => Some(self.violation(
                        ctx,
                        &self.code,
                        format!(
                            "{} = {} is outside the {} range {} for grade {}",
                            ctx.field, v, standard, range, grade
                        ),
                    )),
                    StandardLookup::UnknownGrade => Some(self.violation(
                        ctx,
                        codes::UNKNOWN_GRADE,
                        format!("grade '{}' is not registered under {}", grade, standard),
                    )),
                    StandardLookup::UnknownStandard => Some(self.violation(
                        ctx,
                        codes::UNKNOWN_STANDARD,
                        format!("standard '{}' is not in the reference table", standard),
                    )),
                    StandardLookup::Unregistered => None,
                }
            }
        }
    }
}

fn describe_bounds(min: &Option<(f64, bool)>, max: &Option<(f64, bool)>) -> String {
    let lower = match min {
        Some((m, true)) => format!("({}", m),
        Some((m, false)) => format!("[{}", m),
        None => "(-inf".to_string(),
    };
    let upper = match max {
        Some((m, true)) => format!("{})", m),
        Some((m, false)) => format!("{}]", m),
        None => "inf)".to_string(),
    };
    format!("{}, {}", lower, upper)
}
