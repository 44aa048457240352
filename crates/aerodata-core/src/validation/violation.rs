//! Violation types.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable violation codes.
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const TYPE_MISMATCH: &str = "type_mismatch";
    pub const UNKNOWN_FIELD: &str = "unknown_field";
    pub const UNKNOWN_ENTITY: &str = "unknown_entity";
    pub const RANGE: &str = "range";
    pub const ONE_OF: &str = "one_of";
    pub const PATTERN: &str = "pattern";
    pub const ORDERED_PAIR: &str = "ordered_pair";
    pub const STANDARD_RANGE: &str = "standard_range";
    pub const UNKNOWN_STANDARD: &str = "unknown_standard";
    pub const UNKNOWN_GRADE: &str = "unknown_grade";
}

/// Severity of a violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// A domain-rule failure, reported as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field_path: String,
    pub code: String,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(
        field_path: impl Into<String>,
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            code: code.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn error(
        field_path: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(field_path, code, Severity::Error, message)
    }

    pub fn warning(
        field_path: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(field_path, code, Severity::Warning, message)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.field_path, self.code, self.message)
    }
}

/// Whether any violation in the slice is error-level.
pub fn has_errors(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_error)
}
