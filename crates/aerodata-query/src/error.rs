//! Error types for query building, compilation, and execution.

use thiserror::Error;

use aerodata_core::{Backend, FieldType, MappingError, UnknownFieldError, Violation};

/// A builder call was rejected before any AST was produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error("Invalid literal for {path} ({field_type}) with operator {op}: {value}")]
    InvalidLiteral {
        path: String,
        field_type: FieldType,
        op: String,
        value: String,
    },

    #[error("'{path}' names a relation where a field was expected")]
    NotAField { path: String },

    #[error("'{path}' names a field where a relation was expected")]
    NotARelation { path: String },

    #[error("{clause} only accepts root fields, got '{path}'")]
    NestedPath { path: String, clause: String },

    #[error("Invalid page: {reason}")]
    InvalidPage { reason: String },

    #[error("Cannot sort by '{path}': {field_type} values have no order shared by both backends")]
    UnorderedField { path: String, field_type: FieldType },
}

/// The AST contains a construct the target backend cannot express.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Traversal depth {depth} exceeds the {backend} maximum of {max}")]
    TraversalTooDeep {
        backend: Backend,
        depth: usize,
        max: usize,
    },

    #[error("Optional traversal '{relation}' cannot appear under OR or NOT")]
    OptionalTraversalInDisjunction { relation: String },

    #[error("Backend mismatch: compiler targets {compiler}, adapter serves {adapter}")]
    BackendMismatch { compiler: Backend, adapter: Backend },

    #[error("Query was built against registry version {query}, context holds version {context}")]
    RegistryMismatch { query: u64, context: u64 },

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error("{entity} failed validation: {}", summarize(.violations))]
    InvalidEntity {
        entity: String,
        violations: Vec<Violation>,
    },

    #[error("{entity} has no identity value")]
    MissingIdentity { entity: String },

    #[error("Update of {entity} sets no fields besides its identity")]
    EmptyUpdate { entity: String },

    #[error("Unsupported construct for this compiler: {construct}")]
    Unsupported { construct: String },
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .filter(|v| v.is_error())
        .map(|v| format!("{} [{}]", v.field_path, v.code))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures reported by a backend adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendExecutionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Backend rejected query: {message}")]
    Syntax { message: String },
}

impl BackendExecutionError {
    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendExecutionError::Connection(_) | BackendExecutionError::Timeout { .. }
        )
    }
}

/// Any failure along build, compile, execute, and map.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Backend execution failed after {attempts} attempt(s): {source}")]
    Execution {
        attempts: u32,
        #[source]
        source: BackendExecutionError,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Unexpected result shape: {0}")]
    UnexpectedResult(String),
}

impl From<UnknownFieldError> for QueryError {
    fn from(err: UnknownFieldError) -> Self {
        QueryError::Build(BuildError::UnknownField(err))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
