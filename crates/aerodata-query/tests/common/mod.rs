//! Shared fixtures for aerodata-query integration tests.
//!
//! `SqliteAdapter` runs the relational compiler's SQL for real against an
//! in-memory database. `MemoryGraph` is a recording graph store: writes run
//! the compiled Cypher text clause by clause, so edge handling is whatever
//! the statement spells out. Reads are answered by evaluating the source
//! AST over nodes and edges, with Cypher's null semantics and ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use aerodata_core::{
    catalog, Backend, EdgeDirection, Entity, EntityDefinition, FieldType, RawRecord, Registry,
    RelationalJoin, Validator,
};
use aerodata_query::{
    BackendAdapter, BackendExecutionError, CompiledQuery, Direction, ExecutionContext, Mutation,
    Operator, Predicate, QueryAst, QueryKind, QuerySource,
};

pub fn catalog_registry() -> Arc<Registry> {
    Arc::new(catalog::registry().expect("embedded catalog schema builds"))
}

// ---------------------------------------------------------------------------
// Relational
// ---------------------------------------------------------------------------

pub struct SqliteAdapter {
    conn: Mutex<Connection>,
    executed: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<BackendExecutionError>>,
}

impl SqliteAdapter {
    /// In-memory database with a table per entity and per join table.
    pub fn new(registry: &Registry) -> Arc<Self> {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        for entity in registry.entities() {
            conn.execute_batch(&create_table(entity))
                .expect("create entity table");
            for relation in entity.relations() {
                if let RelationalJoin::JoinTable {
                    table,
                    source_column,
                    target_column,
                } = &relation.relational
                {
                    conn.execute_batch(&format!(
                        "CREATE TABLE IF NOT EXISTS {table} (\
                         {source_column} INTEGER NOT NULL, \
                         {target_column} INTEGER NOT NULL, \
                         PRIMARY KEY ({source_column}, {target_column}))"
                    ))
                    .expect("create join table");
                }
            }
        }
        Arc::new(Self {
            conn: Mutex::new(conn),
            executed: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        })
    }

    /// Run raw SQL, bypassing compilation and validation.
    pub fn raw(&self, sql: &str) {
        self.conn.lock().execute_batch(sql).expect("raw sql");
    }

    pub fn fail_next(&self, error: BackendExecutionError) {
        self.failures.lock().push_back(error);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

fn create_table(entity: &EntityDefinition) -> String {
    let columns: Vec<String> = entity
        .fields()
        .iter()
        .map(|f| {
            let sql_type = match f.field_type {
                FieldType::Integer | FieldType::Boolean => "INTEGER",
                FieldType::Float => "REAL",
                FieldType::Text | FieldType::Timestamp | FieldType::FloatPair => "TEXT",
            };
            let null = if f.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", f.column, sql_type, null)
        })
        .collect();
    format!(
        "CREATE TABLE {} ({}, PRIMARY KEY ({}))",
        entity.table,
        columns.join(", "),
        entity.identity_field().column
    )
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

fn syntax(err: rusqlite::Error) -> BackendExecutionError {
    BackendExecutionError::Syntax {
        message: err.to_string(),
    }
}

#[async_trait]
impl BackendAdapter for SqliteAdapter {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<RawRecord>, BackendExecutionError> {
        self.executed.lock().push(query.text.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let bound: Vec<(String, SqlValue)> = query
            .params
            .iter()
            .map(|(name, value)| (format!(":{}", name), to_sql(value)))
            .collect();
        let params: Vec<(&str, &dyn ToSql)> = bound
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query.text).map_err(syntax)?;
        if query.kind == QueryKind::Write {
            stmt.execute(params.as_slice()).map_err(syntax)?;
            return Ok(Vec::new());
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params.as_slice()).map_err(syntax)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(syntax)? {
            let mut record = Map::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), from_sql(row.get_ref(i).map_err(syntax)?));
            }
            records.push(record);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

struct Node {
    label: String,
    properties: Map<String, Value>,
}

struct Edge {
    edge_type: String,
    from: usize,
    to: usize,
}

#[derive(Default)]
struct GraphState {
    nodes: Vec<Option<Node>>,
    edges: Vec<Edge>,
}

pub struct MemoryGraph {
    registry: Arc<Registry>,
    state: Mutex<GraphState>,
    executed: Mutex<Vec<CompiledQuery>>,
    failures: Mutex<VecDeque<BackendExecutionError>>,
    grammar: Grammar,
    /// Emit one row per matched path, as a store ignoring `DISTINCT` would
    expand_paths: bool,
}

impl MemoryGraph {
    pub fn new(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self::build(registry, false))
    }

    pub fn expanding(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self::build(registry, true))
    }

    fn build(registry: Arc<Registry>, expand_paths: bool) -> Self {
        Self {
            registry,
            state: Mutex::new(GraphState::default()),
            executed: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            grammar: Grammar::new(),
            expand_paths,
        }
    }

    pub fn fail_next(&self, error: BackendExecutionError) {
        self.failures.lock().push_back(error);
    }

    pub fn executed(&self) -> Vec<CompiledQuery> {
        self.executed.lock().clone()
    }

    /// Run a compiled write clause by clause against the store.
    fn write(&self, query: &CompiledQuery) -> Result<(), BackendExecutionError> {
        let params: HashMap<&str, &Value> = query
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        let mut state = self.state.lock();
        let mut scope = Scope::default();
        for clause in query.text.lines() {
            if !state.apply(&self.grammar, clause.trim(), &params, &mut scope)? {
                break;
            }
        }
        Ok(())
    }

    fn read(&self, query: &CompiledQuery, ast: &QueryAst) -> Vec<RawRecord> {
        let state = self.state.lock();
        let root = self.registry.entity(&ast.root).expect("known root");

        let mut matched: Vec<usize> = state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, Some(node) if node.label == root.label))
            .map(|(i, _)| i)
            .filter(|&i| match &ast.predicate {
                Some(p) => self.eval(&state, p, root, i) == Some(true),
                None => true,
            })
            .collect();

        if query.kind == QueryKind::Count {
            return vec![json!({"count": matched.len()}).as_object().cloned().unwrap_or_default()];
        }

        let identity = root.identity_field().property.clone();
        matched.sort_by(|&a, &b| {
            let mut ordering = Ordering::Equal;
            for key in &ast.sort {
                let property = &root.field(&key.field).expect("sort field").property;
                ordering = order_values(
                    state.property(a, property),
                    state.property(b, property),
                    key.direction,
                );
                if ordering != Ordering::Equal {
                    break;
                }
            }
            ordering.then_with(|| {
                order_values(
                    state.property(a, &identity),
                    state.property(b, &identity),
                    Direction::Asc,
                )
            })
        });

        let page: Vec<usize> = matched
            .into_iter()
            .skip(ast.page.offset as usize)
            .take(ast.page.limit.map_or(usize::MAX, |l| l as usize))
            .collect();

        let mut fields: Vec<&str> = if ast.projection.is_empty() {
            root.fields().iter().map(|f| f.name.as_str()).collect()
        } else {
            std::iter::once(root.identity.as_str())
                .chain(ast.projection.iter().map(String::as_str))
                .collect()
        };
        fields.extend(ast.sort.iter().map(|k| k.field.as_str()));

        let mut rows = Vec::new();
        for i in page {
            let mut row = Map::new();
            for name in &fields {
                let property = &root.field(name).expect("selected field").property;
                if let Some(value) = state.property(i, property) {
                    row.insert(property.clone(), value.clone());
                }
            }
            let copies = if self.expand_paths {
                state.edges.iter().filter(|e| e.from == i).count().max(1)
            } else {
                1
            };
            for _ in 0..copies {
                rows.push(row.clone());
            }
        }
        rows
    }

    /// Three-valued evaluation; `None` is unknown.
    fn eval(
        &self,
        state: &GraphState,
        predicate: &Predicate,
        entity: &EntityDefinition,
        node: usize,
    ) -> Option<bool> {
        match predicate {
            Predicate::Filter(filter) => {
                let property = &entity.field(&filter.field)?.property;
                let value = state.property(node, property).unwrap_or(&Value::Null);
                compare(value, filter.op, &filter.value)
            }
            Predicate::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match self.eval(state, child, entity, node) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match self.eval(state, child, entity, node) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Predicate::Not(inner) => self.eval(state, inner, entity, node).map(|b| !b),
            Predicate::Traverse(t) if !t.required => Some(true),
            Predicate::Traverse(t) => {
                let relation = entity.relation(&t.relation)?;
                let target = self.registry.entity(&relation.target)?;
                let found = state.neighbours(node, &relation.graph.edge_type, relation.graph.direction)
                    .into_iter()
                    .filter(|&n| matches!(&state.nodes[n], Some(x) if x.label == target.label))
                    .any(|n| match &t.predicate {
                        Some(inner) => self.eval(state, inner, target, n) == Some(true),
                        None => true,
                    });
                Some(found)
            }
        }
    }
}

/// Clause shapes the graph compiler emits for writes.
struct Grammar {
    node_by_key: Regex,
    create: Regex,
    set_map: Regex,
    set_copy: Regex,
    edge: Regex,
    foreach: Regex,
}

impl Grammar {
    fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("valid clause pattern");
        Self {
            node_by_key: re(r"\((\w+):(\w+) \{(\w+): \$(\w+)\}\)"),
            create: re(r"^CREATE \((\w+):(\w+) \$(\w+)\)$"),
            set_map: re(r"^SET (\w+) \+= \$(\w+)$"),
            set_copy: re(r"^SET (\w+)\.(\w+) = (\w+)\.(\w+)$"),
            edge: re(r"^\((\w*)(?::(\w+))?\)(<?)-\[(\w*):(\w+)\]-(>?)\((\w*)(?::(\w+))?\)$"),
            foreach: re(r"^FOREACH \(_ IN CASE WHEN (\w+) IS NULL THEN \[\] ELSE \[1\] END \| (.+)\)$"),
        }
    }
}

/// Variables bound while one write statement runs.
#[derive(Default)]
struct Scope {
    nodes: HashMap<String, Option<usize>>,
    edges: HashMap<String, Vec<(String, usize, usize)>>,
}

impl Scope {
    fn node(&self, var: &str) -> Option<usize> {
        self.nodes.get(var).copied().flatten()
    }
}

/// One side of an edge pattern: a bound variable, a label, or both.
struct End<'a> {
    var: &'a str,
    label: Option<&'a str>,
}

/// Edge pattern with its stored orientation resolved.
struct EdgePattern<'a> {
    from: End<'a>,
    to: End<'a>,
    var: &'a str,
    edge_type: &'a str,
}

fn clause_syntax(clause: &str) -> BackendExecutionError {
    BackendExecutionError::Syntax {
        message: format!("unsupported clause: {}", clause),
    }
}

impl GraphState {
    fn find(&self, definition: &EntityDefinition, identity: &Value) -> Option<usize> {
        self.find_by(&definition.label, &definition.identity_field().property, identity)
    }

    fn find_by(&self, label: &str, property: &str, value: &Value) -> Option<usize> {
        self.nodes.iter().position(|n| {
            matches!(n, Some(node) if node.label == label
                && node.properties.get(property).map_or(false, |v| same_value(v, value)))
        })
    }

    /// Apply one clause; `false` ends the statement with no rows left.
    fn apply(
        &mut self,
        grammar: &Grammar,
        clause: &str,
        params: &HashMap<&str, &Value>,
        scope: &mut Scope,
    ) -> Result<bool, BackendExecutionError> {
        let param = |name: &str| params.get(name).map_or(Value::Null, |v| (*v).clone());

        if clause.starts_with("WITH ") {
            return Ok(true);
        }
        if let Some(c) = grammar.create.captures(clause) {
            let properties = match param(&c[3]) {
                Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
                _ => Map::new(),
            };
            self.nodes.push(Some(Node {
                label: c[2].to_string(),
                properties,
            }));
            scope.nodes.insert(c[1].to_string(), Some(self.nodes.len() - 1));
            return Ok(true);
        }
        if let Some(rest) = clause.strip_prefix("OPTIONAL MATCH ") {
            if let Some(pattern) = parse_edge(grammar, rest) {
                let matched = self.match_edges(&pattern, scope);
                scope.edges.insert(pattern.var.to_string(), matched);
                return Ok(true);
            }
            let c = grammar
                .node_by_key
                .captures(rest)
                .filter(|c| c[0].len() == rest.len())
                .ok_or_else(|| clause_syntax(clause))?;
            let found = self.find_by(&c[2], &c[3], &param(&c[4]));
            scope.nodes.insert(c[1].to_string(), found);
            return Ok(true);
        }
        if let Some(rest) = clause.strip_prefix("MATCH ") {
            let patterns: Vec<_> = grammar.node_by_key.captures_iter(rest).collect();
            if patterns.is_empty() {
                return Err(clause_syntax(clause));
            }
            for c in patterns {
                let Some(found) = self.find_by(&c[2], &c[3], &param(&c[4])) else {
                    return Ok(false);
                };
                scope.nodes.insert(c[1].to_string(), Some(found));
            }
            return Ok(true);
        }
        if let Some(c) = grammar.set_map.captures(clause) {
            if let (Some(i), Value::Object(changes)) = (scope.node(&c[1]), param(&c[2])) {
                if let Some(node) = self.nodes[i].as_mut() {
                    for (k, v) in changes {
                        if v.is_null() {
                            node.properties.remove(&k);
                        } else {
                            node.properties.insert(k, v);
                        }
                    }
                }
            }
            return Ok(true);
        }
        if let Some(c) = grammar.set_copy.captures(clause) {
            if let (Some(to), Some(from)) = (scope.node(&c[1]), scope.node(&c[3])) {
                let value = self.property(from, &c[4]).cloned();
                if let Some(node) = self.nodes[to].as_mut() {
                    match value {
                        Some(v) => node.properties.insert(c[2].to_string(), v),
                        None => node.properties.remove(&c[2]),
                    };
                }
            }
            return Ok(true);
        }
        if let Some(var) = clause.strip_prefix("DETACH DELETE ") {
            if let Some(i) = scope.node(var) {
                self.nodes[i] = None;
                self.edges.retain(|e| e.from != i && e.to != i);
            }
            return Ok(true);
        }
        if let Some(var) = clause.strip_prefix("DELETE ") {
            for (edge_type, from, to) in scope.edges.remove(var).unwrap_or_default() {
                self.edges
                    .retain(|e| !(e.edge_type == edge_type && e.from == from && e.to == to));
            }
            return Ok(true);
        }
        if let Some(c) = grammar.foreach.captures(clause) {
            if scope.node(&c[1]).is_some() {
                let inner = c[2].to_string();
                return self.apply(grammar, &inner, params, scope);
            }
            return Ok(true);
        }
        if let Some(rest) = clause.strip_prefix("MERGE ") {
            let pattern = parse_edge(grammar, rest).ok_or_else(|| clause_syntax(clause))?;
            if let (Some(from), Some(to)) = (scope.node(pattern.from.var), scope.node(pattern.to.var)) {
                let exists = self
                    .edges
                    .iter()
                    .any(|e| e.edge_type == pattern.edge_type && e.from == from && e.to == to);
                if !exists {
                    self.edges.push(Edge {
                        edge_type: pattern.edge_type.to_string(),
                        from,
                        to,
                    });
                }
            }
            return Ok(true);
        }
        Err(clause_syntax(clause))
    }

    /// Stored edges matching `pattern`; an unbound variable end matches nothing.
    fn match_edges(&self, pattern: &EdgePattern<'_>, scope: &Scope) -> Vec<(String, usize, usize)> {
        let fits = |end: &End<'_>, node: usize| {
            let bound = end.var.is_empty() || scope.node(end.var) == Some(node);
            let labelled = end.label.map_or(true, |label| {
                matches!(&self.nodes[node], Some(n) if n.label == label)
            });
            bound && labelled
        };
        self.edges
            .iter()
            .filter(|e| e.edge_type == pattern.edge_type)
            .filter(|e| fits(&pattern.from, e.from) && fits(&pattern.to, e.to))
            .map(|e| (e.edge_type.clone(), e.from, e.to))
            .collect()
    }

    fn property(&self, node: usize, property: &str) -> Option<&Value> {
        self.nodes[node]
            .as_ref()
            .and_then(|n| n.properties.get(property))
            .filter(|v| !v.is_null())
    }

    fn neighbours(&self, node: usize, edge_type: &str, direction: EdgeDirection) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.edge_type == edge_type)
            .filter_map(|e| match direction {
                EdgeDirection::Outgoing if e.from == node => Some(e.to),
                EdgeDirection::Incoming if e.to == node => Some(e.from),
                _ => None,
            })
            .collect()
    }
}

fn parse_edge<'a>(grammar: &Grammar, text: &'a str) -> Option<EdgePattern<'a>> {
    let c = grammar.edge.captures(text)?;
    let text_of = |i: usize| c.get(i).map_or("", |m| m.as_str());
    let left = End {
        var: text_of(1),
        label: c.get(2).map(|m| m.as_str()),
    };
    let right = End {
        var: text_of(7),
        label: c.get(8).map(|m| m.as_str()),
    };
    let (from, to) = match (text_of(3), text_of(6)) {
        ("", ">") => (left, right),
        ("<", "") => (right, left),
        _ => return None,
    };
    Some(EdgePattern {
        from,
        to,
        var: text_of(4),
        edge_type: text_of(5),
    })
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn partial(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(value: &Value, op: Operator, literal: &Value) -> Option<bool> {
    match op {
        Operator::IsNull => return Some(value.is_null()),
        Operator::IsNotNull => return Some(!value.is_null()),
        _ => {}
    }
    if value.is_null() {
        return None;
    }
    match op {
        Operator::In | Operator::NotIn => {
            let hit = literal
                .as_array()?
                .iter()
                .any(|item| partial(value, item) == Some(Ordering::Equal));
            Some(hit == (op == Operator::In))
        }
        Operator::Contains => Some(value.as_str()?.contains(literal.as_str()?)),
        _ => {
            let ordering = partial(value, literal)?;
            Some(match op {
                Operator::Eq => ordering == Ordering::Equal,
                Operator::Ne => ordering != Ordering::Equal,
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gte => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

/// Cypher ordering: nulls last ascending, first descending.
fn order_values(a: Option<&Value>, b: Option<&Value>, direction: Direction) -> Ordering {
    let ascending = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => partial(x, y).unwrap_or(Ordering::Equal),
    };
    match direction {
        Direction::Asc => ascending,
        Direction::Desc => ascending.reverse(),
    }
}

#[async_trait]
impl BackendAdapter for MemoryGraph {
    fn backend(&self) -> Backend {
        Backend::Graph
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<RawRecord>, BackendExecutionError> {
        self.executed.lock().push(query.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        Ok(match &query.source {
            QuerySource::Mutation(_) => {
                self.write(query)?;
                Vec::new()
            }
            QuerySource::Query(ast) => self.read(query, ast),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixture data
// ---------------------------------------------------------------------------

pub fn sqlite_context(registry: &Arc<Registry>) -> (ExecutionContext, Arc<SqliteAdapter>) {
    let adapter = SqliteAdapter::new(registry);
    let ctx = ExecutionContext::new(Validator::with_astm(Arc::clone(registry)), adapter.clone());
    (ctx, adapter)
}

pub fn graph_context(registry: &Arc<Registry>) -> (ExecutionContext, Arc<MemoryGraph>) {
    let adapter = MemoryGraph::new(Arc::clone(registry));
    let ctx = ExecutionContext::new(Validator::with_astm(Arc::clone(registry)), adapter.clone());
    (ctx, adapter)
}

pub fn material(id: i64, name: &str, grade: Option<&str>, props: [f64; 4]) -> Entity {
    let [density, tensile, yield_strength, modulus] = props;
    Entity::new("Material")
        .with("id", id)
        .with("name", name)
        .with("grade", grade.map_or(Value::Null, Value::from))
        .with("density", density)
        .with("tensile_strength", tensile)
        .with("yield_strength", yield_strength)
        .with("elastic_modulus", modulus)
}

pub fn engine(id: i64, model: &str, manufacturer: &str, kind: &str, thrust: f64, weight: f64) -> Entity {
    Entity::new("Engine")
        .with("id", id)
        .with("model", model)
        .with("manufacturer", manufacturer)
        .with("engine_type", kind)
        .with("thrust", thrust)
        .with("weight", weight)
}

#[allow(clippy::too_many_arguments)]
pub fn aircraft(
    id: i64,
    model: &str,
    manufacturer: &str,
    mtow: f64,
    range: Option<f64>,
    engines: i64,
    first_flight: &str,
    status: &str,
) -> Entity {
    Entity::new("Aircraft")
        .with("id", id)
        .with("model", model)
        .with("manufacturer", manufacturer)
        .with("max_speed", 470.0 + id as f64)
        .with("max_altitude", 41000.0)
        .with("wingspan", 110.0 + id as f64)
        .with("length", 120.0 + id as f64)
        .with("mtow", mtow)
        .with("range", range.map_or(Value::Null, Value::from))
        .with("num_engines", engines)
        .with("first_flight", first_flight)
        .with("production_status", status)
}

pub fn flight(id: i64, number: &str, aircraft_id: i64, route: (&str, &str), departure: &str, status: &str) -> Entity {
    Entity::new("FlightData")
        .with("id", id)
        .with("flight_number", number)
        .with("aircraft_id", aircraft_id)
        .with("origin", route.0)
        .with("destination", route.1)
        .with("departure_date", departure)
        .with("status", status)
}

/// A small fleet with engines, certified materials, and flights.
pub fn fleet() -> Vec<Mutation> {
    let mut writes = vec![
        Mutation::insert(
            material(1, "Aluminum 7075-T6", Some("7075-T6"), [2.81, 572.0, 503.0, 71.7])
                .with("specification", "B209")
                .with("temperature_rating", json!([-55.0, 120.0]))
                .with("category", "alloy"),
        ),
        Mutation::insert(
            material(2, "Aluminum 2024-T3", Some("2024-T3"), [2.78, 483.0, 345.0, 73.1])
                .with("category", "alloy"),
        ),
        Mutation::insert(
            material(3, "Titanium Ti-6Al-4V", Some("Ti-6Al-4V"), [4.43, 950.0, 880.0, 113.8])
                .with("specification", "B265")
                .with("category", "alloy"),
        ),
        Mutation::insert(
            material(4, "Carbon fibre laminate", None, [1.60, 600.0, 550.0, 70.0])
                .with("category", "composite"),
        ),
        Mutation::insert(engine(1, "CFM56-7B", "CFM International", "turbofan", 27300.0, 5216.0)),
        Mutation::insert(engine(2, "GE90-115B", "General Electric", "turbofan", 115300.0, 18260.0)),
        Mutation::insert(engine(3, "PW127M", "Pratt & Whitney Canada", "turboprop", 2750.0, 1060.0)),
        Mutation::insert(engine(4, "Trent XWB-84", "Rolls-Royce", "turbofan", 84200.0, 16640.0)),
        Mutation::insert(aircraft(1, "737-800", "Boeing", 174200.0, Some(2935.0), 2, "1997-07-31T00:00:00Z", "active")),
        Mutation::insert(aircraft(2, "777-300ER", "Boeing", 775000.0, Some(7370.0), 2, "2003-02-24T00:00:00Z", "active")),
        Mutation::insert(aircraft(3, "ATR 72-600", "ATR", 50700.0, Some(825.0), 2, "2009-07-24T00:00:00Z", "active")),
        Mutation::insert(aircraft(4, "A350-900", "Airbus", 617295.0, Some(8100.0), 2, "2013-06-14T00:00:00Z", "active")),
        Mutation::insert(aircraft(5, "Concorde", "BAC/Aerospatiale", 408000.0, None, 4, "1969-03-02T00:00:00Z", "retired")),
        Mutation::insert(flight(1, "AA100", 1, ("KJFK", "KLAX"), "2024-06-01T13:00:00Z", "arrived").with("distance", 2151.0)),
        Mutation::insert(flight(2, "BA117", 2, ("EGLL", "KJFK"), "2024-06-02T10:30:00Z", "arrived").with("distance", 3008.0)),
        Mutation::insert(flight(3, "AF7702", 3, ("LFPG", "LFML"), "2024-06-03T07:15:00+02:00", "scheduled")),
        Mutation::insert(flight(4, "DL45", 4, ("KATL", "EGLL"), "2024-06-03T22:05:00Z", "cancelled")),
    ];

    for (aircraft_id, engine_id) in [(1, 1), (2, 2), (3, 3), (4, 4), (5, 2)] {
        writes.push(Mutation::link("Aircraft", "engines", aircraft_id, engine_id));
    }
    for (aircraft_id, material_id) in [(1, 1), (1, 2), (2, 1), (2, 3), (3, 2), (4, 3), (4, 4), (5, 1), (5, 2), (5, 3)] {
        writes.push(Mutation::link("Aircraft", "materials", aircraft_id, material_id));
    }
    // Flights reach their aircraft through `aircraft_id` alone
    writes
}

pub async fn seed(ctx: &ExecutionContext) {
    for mutation in fleet() {
        ctx.apply(mutation).await.expect("fixture write succeeds");
    }
}

/// Identity values in result order.
pub fn ids(entities: &[Entity]) -> Vec<i64> {
    entities
        .iter()
        .map(|e| e.fields["id"].as_i64().expect("integer identity"))
        .collect()
}
