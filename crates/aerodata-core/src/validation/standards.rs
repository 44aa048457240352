//! Material standards reference table.
//!
//! Maps a standard (e.g. `ASTM`) and a certified grade (e.g. `7075-T6`) to
//! the allowed range of each mechanical/physical property. Serialized as
//! nested maps:
//!
//! ```toml
//! [ASTM."7075-T6".yield_strength]
//! min = 503.0
//! max = 590.0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::SchemaError;

/// Allowed range for one property. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl PropertyRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl std::fmt::Display for PropertyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (Some(min), None) => write!(f, ">= {}", min),
            (None, Some(max)) => write!(f, "<= {}", max),
            (None, None) => write!(f, "unbounded"),
        }
    }
}

/// Outcome of a standards lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StandardLookup<'a> {
    Found(&'a PropertyRange),
    UnknownStandard,
    UnknownGrade,
    /// The grade is registered but carries no range for this property
    Unregistered,
}

type GradeTable = BTreeMap<String, BTreeMap<String, PropertyRange>>;

/// standard → grade → property → range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardsTable {
    standards: BTreeMap<String, GradeTable>,
}

impl StandardsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(
        mut self,
        standard: &str,
        grade: &str,
        property: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        self.standards
            .entry(standard.to_string())
            .or_default()
            .entry(grade.to_string())
            .or_default()
            .insert(property.to_string(), PropertyRange::new(min, max));
        self
    }

    pub fn lookup(&self, standard: &str, grade: &str, property: &str) -> StandardLookup<'_> {
        let Some(grades) = self.standards.get(standard) else {
            return StandardLookup::UnknownStandard;
        };
        let Some(properties) = grades.get(grade) else {
            return StandardLookup::UnknownGrade;
        };
        match properties.get(property) {
            Some(range) => StandardLookup::Found(range),
            None => StandardLookup::Unregistered,
        }
    }

    pub fn grades(&self, standard: &str) -> Vec<&str> {
        self.standards
            .get(standard)
            .map(|g| g.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        toml::from_str(content).map_err(|e| SchemaError::Parse {
            format: "TOML".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(content).map_err(|e| SchemaError::Parse {
            format: "YAML".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(content).map_err(|e| SchemaError::Parse {
            format: "JSON".to_string(),
            message: e.to_string(),
        })
    }

    /// Read a table file; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Minimum mechanical properties (MPa) and densities (g/cm³) for common
    /// aerospace alloys, keyed under the `ASTM` standard.
    pub fn astm_aerospace() -> Self {
        Self::new()
            // ASTM B209 / B211, 7075-T6 plate and bar
            .with_range("ASTM", "7075-T6", "yield_strength", Some(503.0), Some(590.0))
            .with_range("ASTM", "7075-T6", "tensile_strength", Some(572.0), Some(650.0))
            .with_range("ASTM", "7075-T6", "density", Some(2.78), Some(2.83))
            // ASTM B209, 6061-T6
            .with_range("ASTM", "6061-T6", "yield_strength", Some(241.0), Some(310.0))
            .with_range("ASTM", "6061-T6", "tensile_strength", Some(290.0), Some(360.0))
            .with_range("ASTM", "6061-T6", "density", Some(2.68), Some(2.72))
            // ASTM B209, 2024-T3
            .with_range("ASTM", "2024-T3", "yield_strength", Some(345.0), Some(420.0))
            .with_range("ASTM", "2024-T3", "tensile_strength", Some(483.0), Some(540.0))
            .with_range("ASTM", "2024-T3", "density", Some(2.76), Some(2.80))
            // ASTM B265 Grade 5
            .with_range("ASTM", "Ti-6Al-4V", "yield_strength", Some(828.0), Some(1100.0))
            .with_range("ASTM", "Ti-6Al-4V", "tensile_strength", Some(895.0), Some(1200.0))
            .with_range("ASTM", "Ti-6Al-4V", "density", Some(4.40), Some(4.45))
    }
}
