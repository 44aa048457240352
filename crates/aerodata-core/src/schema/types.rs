//! Closed vocabularies shared by schema declarations and the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two structurally different stores the engine compiles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Relational,
    Graph,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Relational => write!(f, "relational"),
            Backend::Graph => write!(f, "graph"),
        }
    }
}

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 instant
    Timestamp,
    /// Ordered `[min, max]` pair of floats
    FloatPair,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Whether values of this type have a total order usable in comparisons.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Float | FieldType::Timestamp | FieldType::Text
        )
    }

    /// Whether a JSON literal is an acceptable value for this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Text, Value::String(_)) => true,
            (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Timestamp, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (FieldType::FloatPair, Value::Array(items)) => {
                items.len() == 2 && items.iter().all(Value::is_number)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::FloatPair => "float_pair",
        };
        f.write_str(name)
    }
}

/// How many targets a relation reaches from one source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Relational lowering of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationalJoin {
    /// `source.source_column = target.target_column`
    ForeignKey {
        source_column: String,
        target_column: String,
    },
    /// `link.source_column = source.id AND link.target_column = target.id`
    JoinTable {
        table: String,
        source_column: String,
        target_column: String,
    },
}

/// Direction of an edge relative to the source entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    #[default]
    Outgoing,
    Incoming,
}

/// Graph lowering of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub edge_type: String,
    #[serde(default)]
    pub direction: EdgeDirection,
}
