//! Schema declaration input.
//!
//! A [`SchemaDeclaration`] is plain data describing entities, their fields,
//! relations, and per-backend mappings. It is consumed once by
//! [`Registry::register`](crate::registry::Registry::register) and may be
//! consumed again on reload. Declarations can be written in TOML, YAML, or
//! JSON:
//!
//! ```toml
//! [[entities]]
//! name = "Engine"
//! relational = { table = "engines" }
//! graph = { label = "Engine" }
//!
//! [[entities.fields]]
//! name = "id"
//! type = "integer"
//!
//! [[entities.fields]]
//! name = "thrust"
//! type = "float"
//! unit = "pounds_force"
//! rules = [{ kind = "range", min = 0.0, exclusive_min = true }]
//! ```

mod types;

pub use types::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SchemaError;
use crate::units::Unit;
use crate::validation::RuleSpec;

/// Root of a schema declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    #[serde(default)]
    pub entities: Vec<EntityDeclaration>,
}

impl SchemaDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityDeclaration) -> Self {
        self.entities.push(entity);
        self
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

    /// Read a declaration file; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Self::from_toml_str(&content),
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(SchemaError::Parse {
                format: other.to_string(),
                message: "unsupported schema file extension".to_string(),
            }),
        }
    }
}

fn default_identity() -> String {
    "id".to_string()
}

/// Relational placement of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalTable {
    pub table: String,
}

/// Graph placement of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
}

/// One entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    pub name: String,
    /// Name of the field that identifies an instance on both backends
    #[serde(default = "default_identity")]
    pub identity: String,
    pub relational: RelationalTable,
    pub graph: GraphNode,
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
    #[serde(default)]
    pub relations: Vec<RelationDeclaration>,
}

impl EntityDeclaration {
    pub fn new(name: impl Into<String>, table: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: default_identity(),
            relational: RelationalTable {
                table: table.into(),
            },
            graph: GraphNode {
                label: label.into(),
            },
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relation(mut self, relation: RelationDeclaration) -> Self {
        self.relations.push(relation);
        self
    }
}

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub nullable: bool,
    /// Column override; defaults to the field name
    #[serde(default)]
    pub column: Option<String>,
    /// Graph property override; defaults to the field name
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            unit: None,
            nullable: false,
            column: None,
            property: None,
            rules: Vec::new(),
            description: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }
}

/// One relation from an entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDeclaration {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub relational: RelationalJoin,
    pub graph: GraphEdge,
}

impl RelationDeclaration {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        relational: RelationalJoin,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            relational,
            graph: GraphEdge {
                edge_type: edge_type.into(),
                direction: EdgeDirection::Outgoing,
            },
        }
    }

    pub fn incoming(mut self) -> Self {
        self.graph.direction = EdgeDirection::Incoming;
        self
    }
}
