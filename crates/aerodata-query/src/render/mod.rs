//! Backend compilers.
//!
//! A compiler lowers one canonical [`QueryAst`] (or one [`Mutation`]) into
//! a [`CompiledQuery`] for exactly one backend. Literals are always bound
//! as parameters; identifiers come from the registry, which only admits
//! plain `[A-Za-z_][A-Za-z0-9_]*` names.

mod cypher;
mod sql;

pub use cypher::CypherCompiler;
pub use sql::SqlCompiler;

use serde_json::Value;
use std::sync::Arc;

use aerodata_config::CompilerConfig;
use aerodata_core::{Backend, Registry, Validator};

use crate::error::CompileError;
use crate::ir::{Predicate, QueryAst};
use crate::mutation::Mutation;

/// What a compiled query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Distinct root rows
    Select,
    /// A single `count` column
    Count,
    /// No rows
    Write,
}

/// The tree a compiled query was produced from.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Query(Arc<QueryAst>),
    Mutation(Arc<Mutation>),
}

/// Backend-native query text plus its parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub backend: Backend,
    pub kind: QueryKind,
    pub text: String,
    /// Bindings in placeholder order; names carry no sigil
    pub params: Vec<(String, Value)>,
    /// Root entity
    pub entity: String,
    /// Projected logical fields, when narrower than the whole entity
    pub fields: Option<Vec<String>>,
    pub source: QuerySource,
}

impl CompiledQuery {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn ast(&self) -> Option<&QueryAst> {
        match &self.source {
            QuerySource::Query(ast) => Some(ast),
            QuerySource::Mutation(_) => None,
        }
    }
}

/// Lowers queries and mutations for one backend.
pub trait QueryCompiler: Send + Sync {
    /// Unique name for this compiler
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    /// Compile a canonical query into a `Select` or `Count`.
    fn compile(
        &self,
        registry: &Registry,
        ast: &Arc<QueryAst>,
        kind: QueryKind,
    ) -> Result<CompiledQuery, CompileError>;

    /// Validate and compile a write.
    fn compile_mutation(
        &self,
        validator: &Validator,
        mutation: &Arc<Mutation>,
    ) -> Result<CompiledQuery, CompileError>;
}

/// The compiler for a backend under the given options.
pub fn compiler_for(backend: Backend, config: &CompilerConfig) -> Box<dyn QueryCompiler> {
    match backend {
        Backend::Relational => Box::new(SqlCompiler::from_config(config)),
        Backend::Graph => Box::new(CypherCompiler::from_config(config)),
    }
}

/// Placeholder flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `:p0`
    Colon,
    /// `$1`
    Positional,
    /// `$p0`
    Dollar,
}

/// Collects bindings and hands out placeholders.
#[derive(Debug)]
pub(crate) struct Params {
    style: Placeholder,
    bindings: Vec<(String, Value)>,
}

impl Params {
    pub(crate) fn new(style: Placeholder) -> Self {
        Self {
            style,
            bindings: Vec::new(),
        }
    }

    pub(crate) fn bind(&mut self, value: Value) -> String {
        let index = self.bindings.len();
        let name = format!("p{}", index);
        let placeholder = match self.style {
            Placeholder::Colon => format!(":{}", name),
            Placeholder::Positional => format!("${}", index + 1),
            Placeholder::Dollar => format!("${}", name),
        };
        self.bindings.push((name, value));
        placeholder
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }

    pub(crate) fn into_bindings(self) -> Vec<(String, Value)> {
        self.bindings
    }
}

/// Checks shared by both compilers, run before any text is produced.
pub(crate) fn check_supported(
    ast: &QueryAst,
    backend: Backend,
    max_depth: usize,
) -> Result<(), CompileError> {
    let Some(predicate) = &ast.predicate else {
        return Ok(());
    };
    let depth = predicate.depth();
    if depth > max_depth {
        return Err(CompileError::TraversalTooDeep {
            backend,
            depth,
            max: max_depth,
        });
    }
    reject_optional_in_disjunction(predicate, false)
}

fn reject_optional_in_disjunction(
    predicate: &Predicate,
    disjunctive: bool,
) -> Result<(), CompileError> {
    match predicate {
        Predicate::Filter(_) => Ok(()),
        Predicate::And(children) => children
            .iter()
            .try_for_each(|c| reject_optional_in_disjunction(c, disjunctive)),
        Predicate::Or(children) => children
            .iter()
            .try_for_each(|c| reject_optional_in_disjunction(c, true)),
        Predicate::Not(inner) => reject_optional_in_disjunction(inner, true),
        Predicate::Traverse(t) => {
            if !t.required && disjunctive {
                return Err(CompileError::OptionalTraversalInDisjunction {
                    relation: t.relation.clone(),
                });
            }
            match &t.predicate {
                Some(inner) => reject_optional_in_disjunction(inner, disjunctive),
                None => Ok(()),
            }
        }
    }
}

/// Logical fields a select must return: the projection (or every field),
/// the identity, and every sort field, in that order without repeats.
pub(crate) fn selected_fields<'a>(
    definition: &'a aerodata_core::EntityDefinition,
    ast: &QueryAst,
) -> Vec<&'a aerodata_core::FieldSpec> {
    let mut names: Vec<&str> = if ast.projection.is_empty() {
        definition.fields().iter().map(|f| f.name.as_str()).collect()
    } else {
        let mut names = vec![definition.identity.as_str()];
        names.extend(ast.projection.iter().map(String::as_str));
        names
    };
    names.extend(ast.sort.iter().map(|k| k.field.as_str()));

    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(*name))
        .filter_map(|name| definition.field(name))
        .collect()
}
