//! Graph compiler.
//!
//! Lowers the canonical AST to Cypher. Required hops in conjunctive position
//! become `MATCH` clauses binding `n1`, `n2`, ...; hops under OR/NOT become
//! `EXISTS { ... }` subqueries; optional hops become `OPTIONAL MATCH`.
//! `WITH DISTINCT n0` collapses one row per matched path back to one row
//! per root before ordering and paging.
//!
//! A write that carries a foreign key replaces the node's edge for that
//! relation, so the key property and the edge always agree.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use aerodata_config::CompilerConfig;
use aerodata_core::{
    Backend, EdgeDirection, EntityDefinition, Registry, RelationSpec, RelationalJoin,
    UnknownFieldError, Validator,
};

use crate::error::CompileError;
use crate::ir::{Direction, Filter, Operator, Predicate, QueryAst};
use crate::mutation::{key_holder, prepare, KeyHolder, KeyLink, Mutation, Write};
use crate::render::{
    check_supported, selected_fields, CompiledQuery, Params, Placeholder, QueryCompiler,
    QueryKind, QuerySource,
};

/// Cypher compiler.
#[derive(Debug, Clone)]
pub struct CypherCompiler {
    max_depth: usize,
}

impl Default for CypherCompiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}

impl CypherCompiler {
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            max_depth: config.max_graph_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl QueryCompiler for CypherCompiler {
    fn name(&self) -> &str {
        "cypher"
    }

    fn backend(&self) -> Backend {
        Backend::Graph
    }

    fn compile(
        &self,
        registry: &Registry,
        ast: &Arc<QueryAst>,
        kind: QueryKind,
    ) -> Result<CompiledQuery, CompileError> {
        if kind == QueryKind::Write {
            return Err(CompileError::Unsupported {
                construct: "write kind for a query".to_string(),
            });
        }
        check_supported(ast, Backend::Graph, self.max_depth)?;

        let root = registry.require(&ast.root)?;
        let mut lowering = Lowering {
            registry,
            params: Params::new(Placeholder::Dollar),
            vars: 0,
        };

        let mut clauses = vec![format!("MATCH (n0:{})", root.label)];
        let mut optional = Vec::new();
        let conditions = match &ast.predicate {
            Some(predicate) => {
                lowering.conjunct(predicate, root, "n0", &mut clauses, &mut optional)?
            }
            None => Vec::new(),
        };
        if !conditions.is_empty() {
            clauses.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        clauses.extend(optional);
        clauses.push("WITH DISTINCT n0".to_string());

        match kind {
            QueryKind::Count => clauses.push("RETURN count(n0) AS count".to_string()),
            _ => {
                let columns: Vec<String> = selected_fields(root, ast)
                    .iter()
                    .map(|f| format!("n0.{} AS {}", f.property, f.property))
                    .collect();
                clauses.push(format!("RETURN {}", columns.join(", ")));

                let mut order = Vec::with_capacity(ast.sort.len() + 1);
                for key in &ast.sort {
                    let property = lowering.property(root, &key.field)?;
                    order.push(match key.direction {
                        Direction::Asc => format!("{} ASC", property),
                        Direction::Desc => format!("{} DESC", property),
                    });
                }
                if !ast.sort.iter().any(|k| k.field == root.identity) {
                    order.push(format!("{} ASC", root.identity_field().property));
                }
                clauses.push(format!("ORDER BY {}", order.join(", ")));

                if ast.page.offset > 0 {
                    let placeholder = lowering.params.bind(Value::from(ast.page.offset));
                    clauses.push(format!("SKIP {}", placeholder));
                }
                if let Some(limit) = ast.page.limit {
                    let placeholder = lowering.params.bind(Value::from(limit));
                    clauses.push(format!("LIMIT {}", placeholder));
                }
            }
        }

        let params = lowering.params.into_bindings();
        debug!(
            backend = %Backend::Graph,
            entity = %root.name,
            params = params.len(),
            "Compiled query"
        );

        Ok(CompiledQuery {
            backend: Backend::Graph,
            kind,
            text: clauses.join("\n"),
            params,
            entity: root.name.clone(),
            fields: (!ast.projection.is_empty()).then(|| ast.projection.clone()),
            source: QuerySource::Query(Arc::clone(ast)),
        })
    }

    fn compile_mutation(
        &self,
        validator: &Validator,
        mutation: &Arc<Mutation>,
    ) -> Result<CompiledQuery, CompileError> {
        let mut params = Params::new(Placeholder::Dollar);
        let (entity, text) = match prepare(validator, mutation)? {
            Write::Insert {
                definition,
                values,
                links,
            } => {
                let properties: Map<String, Value> = values
                    .into_iter()
                    .map(|(spec, value)| (spec.property.clone(), value))
                    .collect();
                let mut text = format!(
                    "CREATE (n0:{} {})",
                    definition.label,
                    params.bind(Value::Object(properties))
                );
                relink(&mut text, &mut params, links, false);
                (definition.name.clone(), text)
            }
            Write::Update {
                definition,
                identity,
                values,
                links,
            } => {
                let node = node_by_identity(&mut params, definition, "n0", identity);
                let properties: Map<String, Value> = values
                    .into_iter()
                    .map(|(spec, value)| (spec.property.clone(), value))
                    .collect();
                let mut text = format!(
                    "MATCH {}\nSET n0 += {}",
                    node,
                    params.bind(Value::Object(properties))
                );
                relink(&mut text, &mut params, links, true);
                (definition.name.clone(), text)
            }
            Write::Delete {
                definition,
                identity,
            } => {
                let node = node_by_identity(&mut params, definition, "n0", identity);
                (
                    definition.name.clone(),
                    format!("MATCH {}\nDETACH DELETE n0", node),
                )
            }
            Write::Link {
                source,
                relation,
                target,
                source_id,
                target_id,
            } => {
                let from = node_by_identity(&mut params, source, "n0", source_id);
                let to = node_by_identity(&mut params, target, "n1", target_id);
                let mut text = format!("MATCH {}, {}", from, to);
                match key_holder(source, relation) {
                    None => {
                        text.push_str(&format!("\nMERGE {}", edge("n0", "", relation, "n1")));
                    }
                    Some(holder) => {
                        let stale = match holder {
                            KeyHolder::Source => edge("n0", "r", relation, &format!(":{}", target.label)),
                            KeyHolder::Target => edge(&format!(":{}", source.label), "r", relation, "n1"),
                        };
                        text.push_str(&format!(
                            "\nOPTIONAL MATCH {}\nDELETE r\nWITH DISTINCT n0, n1\nMERGE {}",
                            stale,
                            edge("n0", "", relation, "n1")
                        ));
                        if let Some(assignment) = key_assignment(source, relation, target, holder) {
                            text.push_str(&format!("\nSET {}", assignment));
                        }
                    }
                }
                (source.name.clone(), text)
            }
        };

        let params = params.into_bindings();
        debug!(
            backend = %Backend::Graph,
            entity = %entity,
            params = params.len(),
            "Compiled write"
        );

        Ok(CompiledQuery {
            backend: Backend::Graph,
            kind: QueryKind::Write,
            text,
            params,
            entity,
            fields: None,
            source: QuerySource::Mutation(Arc::clone(mutation)),
        })
    }
}

fn node_by_identity(
    params: &mut Params,
    definition: &EntityDefinition,
    var: &str,
    identity: Value,
) -> String {
    format!(
        "({}:{} {{{}: {}}})",
        var,
        definition.label,
        definition.identity_field().property,
        params.bind(identity)
    )
}

/// Edge pattern between two node bodies, oriented as the relation declares.
fn edge(source: &str, var: &str, relation: &RelationSpec, target: &str) -> String {
    match relation.graph.direction {
        EdgeDirection::Outgoing => format!(
            "({})-[{}:{}]->({})",
            source, var, relation.graph.edge_type, target
        ),
        EdgeDirection::Incoming => format!(
            "({})<-[{}:{}]-({})",
            source, var, relation.graph.edge_type, target
        ),
    }
}

/// Follow carried foreign keys from the written node `n0`.
///
/// With `replace`, the node's previous edge for each relation is removed
/// first; a null key leaves it unlinked.
fn relink(text: &mut String, params: &mut Params, links: Vec<KeyLink<'_>>, replace: bool) {
    for (i, link) in links.into_iter().enumerate() {
        let var = format!("n{}", i + 1);
        let other = format!(":{}", link.other.label);
        let ends = |holder: &str, far: &str| {
            if link.holder_is_source {
                (holder.to_string(), far.to_string())
            } else {
                (far.to_string(), holder.to_string())
            }
        };

        text.push_str("\nWITH n0");
        if replace {
            let rel = format!("r{}", i + 1);
            let (from, to) = ends("n0", &other);
            text.push_str(&format!(
                "\nOPTIONAL MATCH {}\nDELETE {}",
                edge(&from, &rel, link.relation, &to),
                rel
            ));
            if link.value.is_null() {
                continue;
            }
            text.push_str("\nWITH DISTINCT n0");
        }

        let (from, to) = ends("n0", &var);
        text.push_str(&format!(
            "\nOPTIONAL MATCH ({}{} {{{}: {}}})\nFOREACH (_ IN CASE WHEN {} IS NULL THEN [] ELSE [1] END | MERGE {})",
            var,
            other,
            link.referenced.property,
            params.bind(link.value),
            var,
            edge(&from, "", link.relation, &to)
        ));
    }
}

/// `SET` copying the referenced property into the key property of the holder.
fn key_assignment(
    source: &EntityDefinition,
    relation: &RelationSpec,
    target: &EntityDefinition,
    holder: KeyHolder,
) -> Option<String> {
    let RelationalJoin::ForeignKey {
        source_column,
        target_column,
    } = &relation.relational
    else {
        return None;
    };
    let source_field = source.field_by_physical(Backend::Relational, source_column)?;
    let target_field = target.field_by_physical(Backend::Relational, target_column)?;
    Some(match holder {
        KeyHolder::Source => format!("n0.{} = n1.{}", source_field.property, target_field.property),
        KeyHolder::Target => format!("n1.{} = n0.{}", target_field.property, source_field.property),
    })
}

fn pattern(source_var: &str, relation: &RelationSpec, target: &EntityDefinition, var: &str) -> String {
    edge(source_var, "", relation, &format!("{}:{}", var, target.label))
}

struct Lowering<'r> {
    registry: &'r Registry,
    params: Params,
    vars: usize,
}

impl<'r> Lowering<'r> {
    fn next_var(&mut self) -> String {
        self.vars += 1;
        format!("n{}", self.vars)
    }

    fn relation(
        &self,
        source: &'r EntityDefinition,
        name: &str,
    ) -> Result<(&'r RelationSpec, &'r EntityDefinition), CompileError> {
        let relation = source
            .relation(name)
            .ok_or_else(|| UnknownFieldError::UnknownField {
                entity: source.name.clone(),
                path: name.to_string(),
                segment: name.to_string(),
            })?;
        let target = self.registry.require(&relation.target)?;
        Ok((relation, target))
    }

    fn property(&self, entity: &EntityDefinition, field: &str) -> Result<String, CompileError> {
        entity
            .field(field)
            .map(|spec| spec.property.clone())
            .ok_or_else(|| {
                UnknownFieldError::UnknownField {
                    entity: entity.name.clone(),
                    path: field.to_string(),
                    segment: field.to_string(),
                }
                .into()
            })
    }

    fn conjunct(
        &mut self,
        predicate: &Predicate,
        entity: &'r EntityDefinition,
        var: &str,
        clauses: &mut Vec<String>,
        optional: &mut Vec<String>,
    ) -> Result<Vec<String>, CompileError> {
        match predicate {
            Predicate::And(children) => {
                let mut conditions = Vec::new();
                for child in children {
                    conditions.extend(self.conjunct(child, entity, var, clauses, optional)?);
                }
                Ok(conditions)
            }
            Predicate::Traverse(t) if t.required => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_var();
                clauses.push(format!("MATCH {}", pattern(var, relation, target, &hop)));
                match &t.predicate {
                    Some(inner) => self.conjunct(inner, target, &hop, clauses, optional),
                    None => Ok(Vec::new()),
                }
            }
            Predicate::Traverse(t) => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_var();
                let mut clause = format!("OPTIONAL MATCH {}", pattern(var, relation, target, &hop));
                if let Some(inner) = &t.predicate {
                    if let Some(condition) = self.condition(inner, target, &hop)? {
                        clause.push_str(" WHERE ");
                        clause.push_str(&condition);
                    }
                }
                optional.push(clause);
                Ok(Vec::new())
            }
            other => Ok(self.condition(other, entity, var)?.into_iter().collect()),
        }
    }

    /// A boolean expression; `None` means vacuously true.
    fn condition(
        &mut self,
        predicate: &Predicate,
        entity: &'r EntityDefinition,
        var: &str,
    ) -> Result<Option<String>, CompileError> {
        match predicate {
            Predicate::Filter(filter) => self.filter(filter, entity, var).map(Some),
            Predicate::And(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.extend(self.condition(child, entity, var)?);
                }
                Ok(combine(parts, " AND "))
            }
            Predicate::Or(children) => {
                if children.is_empty() {
                    return Ok(Some("false".to_string()));
                }
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    match self.condition(child, entity, var)? {
                        Some(part) => parts.push(part),
                        None => return Ok(None),
                    }
                }
                Ok(combine(parts, " OR "))
            }
            Predicate::Not(inner) => Ok(Some(match self.condition(inner, entity, var)? {
                Some(part) if part.starts_with('(') => format!("NOT {}", part),
                Some(part) => format!("NOT ({})", part),
                None => "false".to_string(),
            })),
            Predicate::Traverse(t) if t.required => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_var();
                let nested = match &t.predicate {
                    Some(inner) => self.condition(inner, target, &hop)?,
                    None => None,
                };
                let body = pattern(var, relation, target, &hop);
                Ok(Some(match nested {
                    Some(condition) => format!("EXISTS {{ MATCH {} WHERE {} }}", body, condition),
                    None => format!("EXISTS {{ MATCH {} }}", body),
                }))
            }
            Predicate::Traverse(_) => Ok(None),
        }
    }

    fn filter(
        &mut self,
        filter: &Filter,
        entity: &EntityDefinition,
        var: &str,
    ) -> Result<String, CompileError> {
        let property = format!("{}.{}", var, self.property(entity, &filter.field)?);
        let null_literal = filter.value.is_null();

        Ok(match filter.op {
            Operator::IsNull => format!("{} IS NULL", property),
            Operator::Eq if null_literal => format!("{} IS NULL", property),
            Operator::IsNotNull => format!("{} IS NOT NULL", property),
            Operator::Ne if null_literal => format!("{} IS NOT NULL", property),
            Operator::Contains => {
                format!("{} CONTAINS {}", property, self.params.bind(filter.value.clone()))
            }
            Operator::In => format!("{} IN {}", property, self.bind_list(&filter.value)),
            Operator::NotIn => format!("NOT {} IN {}", property, self.bind_list(&filter.value)),
            op => {
                let symbol = match op {
                    Operator::Eq => "=",
                    Operator::Ne => "<>",
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    _ => "<=",
                };
                format!("{} {} {}", property, symbol, self.params.bind(filter.value.clone()))
            }
        })
    }

    fn bind_list(&mut self, value: &Value) -> String {
        let list = match value {
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        };
        self.params.bind(list)
    }
}

fn combine(mut parts: Vec<String>, separator: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(separator))),
    }
}
