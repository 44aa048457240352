//! Relational compiler.
//!
//! Lowers the canonical AST to SQL:
//! - Required traversals in conjunctive position become `INNER JOIN`s
//! - Optional traversals become `LEFT JOIN`s carrying their filters in `ON`
//! - Traversals under OR/NOT become correlated `EXISTS` subqueries
//! - `SELECT DISTINCT` over root columns collapses join fan-out
//!
//! Aliases: `t0` is the root, `tN`/`lN` the target and link table of hop N.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use aerodata_config::{CompilerConfig, SqlDialect};
use aerodata_core::{
    Backend, EntityDefinition, FieldType, Registry, RelationSpec, RelationalJoin,
    UnknownFieldError, Validator,
};

use crate::error::CompileError;
use crate::ir::{Direction, Filter, Operator, Predicate, QueryAst};
use crate::mutation::{prepare, Mutation, Write};
use crate::render::{
    check_supported, selected_fields, CompiledQuery, Params, Placeholder, QueryCompiler,
    QueryKind, QuerySource,
};

/// SQL compiler for SQLite or PostgreSQL.
#[derive(Debug, Clone)]
pub struct SqlCompiler {
    dialect: SqlDialect,
    max_depth: usize,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}

impl SqlCompiler {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            dialect: config.sql_dialect,
            max_depth: config.max_relational_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn params(&self) -> Params {
        Params::new(match self.dialect {
            SqlDialect::Sqlite => Placeholder::Colon,
            SqlDialect::Postgres => Placeholder::Positional,
        })
    }
}

impl QueryCompiler for SqlCompiler {
    fn name(&self) -> &str {
        match self.dialect {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Postgres => "postgres",
        }
    }

    fn backend(&self) -> Backend {
        Backend::Relational
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
        check_supported(ast, Backend::Relational, self.max_depth)?;

        let root = registry.require(&ast.root)?;
        let mut lowering = Lowering {
            registry,
            dialect: self.dialect,
            params: self.params(),
            hops: 0,
        };

        let mut joins = Vec::new();
        let conditions = match &ast.predicate {
            Some(predicate) => lowering.conjunct(predicate, root, "t0", &mut joins)?,
            None => Vec::new(),
        };

        let identity = &root.identity_field().column;
        let mut sql = match kind {
            QueryKind::Count => format!(
                "SELECT COUNT(DISTINCT t0.{}) AS count FROM {} t0",
                identity, root.table
            ),
            _ => {
                let columns: Vec<String> = selected_fields(root, ast)
                    .iter()
                    .map(|f| format!("t0.{} AS {}", f.column, f.column))
                    .collect();
                format!("SELECT DISTINCT {} FROM {} t0", columns.join(", "), root.table)
            }
        };

        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if kind == QueryKind::Select {
            let mut order: Vec<String> = Vec::with_capacity(ast.sort.len() + 1);
            for key in &ast.sort {
                let column = lowering.column(root, "t0", &key.field)?;
                order.push(match key.direction {
                    Direction::Asc => format!("{} ASC NULLS LAST", column),
                    Direction::Desc => format!("{} DESC NULLS FIRST", column),
                });
            }
            if !ast.sort.iter().any(|k| k.field == root.identity) {
                order.push(format!("t0.{} ASC", identity));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
            lowering.paginate(&mut sql, ast);
        }

        let params = lowering.params.into_bindings();
        debug!(
            backend = %Backend::Relational,
            dialect = self.name(),
            entity = %root.name,
            params = params.len(),
            "Compiled query"
        );

        Ok(CompiledQuery {
            backend: Backend::Relational,
            kind,
            text: sql,
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
        let mut params = self.params();
        let (entity, sql) = match prepare(validator, mutation)? {
            // Foreign keys are ordinary columns; setting one is the link
            Write::Insert {
                definition, values, ..
            } => {
                let columns: Vec<&str> = values.iter().map(|(s, _)| s.column.as_str()).collect();
                let placeholders: Vec<String> = values
                    .into_iter()
                    .map(|(spec, value)| params.bind(column_value(spec.field_type, value)))
                    .collect();
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    definition.table,
                    columns.join(", "),
                    placeholders.join(", ")
                );
                (definition.name.clone(), sql)
            }
            Write::Update {
                definition,
                identity,
                values,
                ..
            } => {
                let assignments: Vec<String> = values
                    .into_iter()
                    .map(|(spec, value)| {
                        let placeholder = params.bind(column_value(spec.field_type, value));
                        format!("{} = {}", spec.column, placeholder)
                    })
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = {}",
                    definition.table,
                    assignments.join(", "),
                    definition.identity_field().column,
                    params.bind(identity)
                );
                (definition.name.clone(), sql)
            }
            Write::Delete {
                definition,
                identity,
            } => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = {}",
                    definition.table,
                    definition.identity_field().column,
                    params.bind(identity)
                );
                (definition.name.clone(), sql)
            }
            Write::Link {
                source,
                relation,
                target,
                source_id,
                target_id,
            } => {
                let sql = link_sql(&mut params, source, relation, target, source_id, target_id);
                (source.name.clone(), sql)
            }
        };

        let params = params.into_bindings();
        debug!(
            backend = %Backend::Relational,
            entity = %entity,
            params = params.len(),
            "Compiled write"
        );

        Ok(CompiledQuery {
            backend: Backend::Relational,
            kind: QueryKind::Write,
            text: sql,
            params,
            entity,
            fields: None,
            source: QuerySource::Mutation(Arc::clone(mutation)),
        })
    }
}

/// Pairs are stored as JSON text.
fn column_value(field_type: FieldType, value: Value) -> Value {
    match (field_type, value) {
        (FieldType::FloatPair, value @ Value::Array(_)) => Value::String(value.to_string()),
        (_, value) => value,
    }
}

fn link_sql(
    params: &mut Params,
    source: &EntityDefinition,
    relation: &RelationSpec,
    target: &EntityDefinition,
    source_id: Value,
    target_id: Value,
) -> String {
    let source_key = &source.identity_field().column;
    let target_key = &target.identity_field().column;

    match &relation.relational {
        RelationalJoin::JoinTable {
            table,
            source_column,
            target_column,
        } => format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            table,
            source_column,
            target_column,
            params.bind(source_id),
            params.bind(target_id)
        ),
        // The key lives on the target side: point the target at the source
        RelationalJoin::ForeignKey {
            source_column,
            target_column,
        } if source_column == source_key => {
            let source_ph = params.bind(source_id);
            let target_ph = params.bind(target_id);
            format!(
                "UPDATE {} SET {} = (SELECT {} FROM {} WHERE {} = {}) WHERE {} = {}",
                target.table,
                target_column,
                source_column,
                source.table,
                source_key,
                source_ph,
                target_key,
                target_ph
            )
        }
        RelationalJoin::ForeignKey {
            source_column,
            target_column,
        } => {
            let source_ph = params.bind(source_id);
            let target_ph = params.bind(target_id);
            format!(
                "UPDATE {} SET {} = (SELECT {} FROM {} WHERE {} = {}) WHERE {} = {}",
                source.table,
                source_column,
                target_column,
                target.table,
                target_key,
                target_ph,
                source_key,
                source_ph
            )
        }
    }
}

struct Lowering<'r> {
    registry: &'r Registry,
    dialect: SqlDialect,
    params: Params,
    hops: usize,
}

impl<'r> Lowering<'r> {
    fn next_hop(&mut self) -> usize {
        self.hops += 1;
        self.hops
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

    fn column(
        &self,
        entity: &EntityDefinition,
        alias: &str,
        field: &str,
    ) -> Result<String, CompileError> {
        let spec = entity
            .field(field)
            .ok_or_else(|| UnknownFieldError::UnknownField {
                entity: entity.name.clone(),
                path: field.to_string(),
                segment: field.to_string(),
            })?;
        Ok(format!("{}.{}", alias, spec.column))
    }

    /// Conditions that must all hold, with joins for required hops.
    fn conjunct(
        &mut self,
        predicate: &Predicate,
        entity: &'r EntityDefinition,
        alias: &str,
        joins: &mut Vec<String>,
    ) -> Result<Vec<String>, CompileError> {
        match predicate {
            Predicate::And(children) => {
                let mut conditions = Vec::new();
                for child in children {
                    conditions.extend(self.conjunct(child, entity, alias, joins)?);
                }
                Ok(conditions)
            }
            Predicate::Traverse(t) if t.required => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_hop();
                joins.extend(join_clauses("INNER JOIN", relation, entity, alias, target, hop, None));
                match &t.predicate {
                    Some(inner) => self.conjunct(inner, target, &format!("t{}", hop), joins),
                    None => Ok(Vec::new()),
                }
            }
            Predicate::Traverse(t) => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_hop();
                let on = match &t.predicate {
                    Some(inner) => self.condition(inner, target, &format!("t{}", hop))?,
                    None => None,
                };
                joins.extend(join_clauses("LEFT JOIN", relation, entity, alias, target, hop, on));
                Ok(Vec::new())
            }
            other => Ok(self.condition(other, entity, alias)?.into_iter().collect()),
        }
    }

    /// A boolean expression; `None` means vacuously true.
    fn condition(
        &mut self,
        predicate: &Predicate,
        entity: &'r EntityDefinition,
        alias: &str,
    ) -> Result<Option<String>, CompileError> {
        match predicate {
            Predicate::Filter(filter) => self.filter(filter, entity, alias).map(Some),
            Predicate::And(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.extend(self.condition(child, entity, alias)?);
                }
                Ok(combine(parts, " AND "))
            }
            Predicate::Or(children) => {
                if children.is_empty() {
                    return Ok(Some("1 = 0".to_string()));
                }
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    match self.condition(child, entity, alias)? {
                        Some(part) => parts.push(part),
                        None => return Ok(None),
                    }
                }
                Ok(combine(parts, " OR "))
            }
            Predicate::Not(inner) => Ok(Some(match self.condition(inner, entity, alias)? {
                Some(part) if part.starts_with('(') => format!("NOT {}", part),
                Some(part) => format!("NOT ({})", part),
                None => "1 = 0".to_string(),
            })),
            Predicate::Traverse(t) if t.required => {
                let (relation, target) = self.relation(entity, &t.relation)?;
                let hop = self.next_hop();
                let target_alias = format!("t{}", hop);
                let nested = match &t.predicate {
                    Some(inner) => self.condition(inner, target, &target_alias)?,
                    None => None,
                };
                Ok(Some(exists(relation, entity, alias, target, hop, nested)))
            }
            Predicate::Traverse(_) => Ok(None),
        }
    }

    fn filter(
        &mut self,
        filter: &Filter,
        entity: &EntityDefinition,
        alias: &str,
    ) -> Result<String, CompileError> {
        let column = self.column(entity, alias, &filter.field)?;
        let null_literal = filter.value.is_null();

        Ok(match filter.op {
            Operator::IsNull => format!("{} IS NULL", column),
            Operator::Eq if null_literal => format!("{} IS NULL", column),
            Operator::IsNotNull => format!("{} IS NOT NULL", column),
            Operator::Ne if null_literal => format!("{} IS NOT NULL", column),
            Operator::Contains => {
                let placeholder = self.params.bind(filter.value.clone());
                match self.dialect {
                    SqlDialect::Sqlite => format!("instr({}, {}) > 0", column, placeholder),
                    SqlDialect::Postgres => format!("strpos({}, {}) > 0", column, placeholder),
                }
            }
            Operator::In | Operator::NotIn => {
                let items = match &filter.value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                let negated = filter.op == Operator::NotIn;
                if items.is_empty() {
                    return Ok(if negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let placeholders: Vec<String> =
                    items.into_iter().map(|item| self.params.bind(item)).collect();
                format!(
                    "{} {} ({})",
                    column,
                    if negated { "NOT IN" } else { "IN" },
                    placeholders.join(", ")
                )
            }
            op => {
                let symbol = match op {
                    Operator::Eq => "=",
                    Operator::Ne => "<>",
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    _ => "<=",
                };
                let placeholder = self.params.bind(filter.value.clone());
                format!("{} {} {}", column, symbol, placeholder)
            }
        })
    }

    fn paginate(&mut self, sql: &mut String, ast: &QueryAst) {
        let page = ast.page;
        match (page.limit, self.dialect) {
            (Some(limit), _) => {
                let placeholder = self.params.bind(Value::from(limit));
                sql.push_str(&format!(" LIMIT {}", placeholder));
            }
            (None, SqlDialect::Sqlite) if page.offset > 0 => sql.push_str(" LIMIT -1"),
            (None, _) => {}
        }
        if page.offset > 0 {
            let placeholder = self.params.bind(Value::from(page.offset));
            sql.push_str(&format!(" OFFSET {}", placeholder));
        }
    }
}

fn combine(mut parts: Vec<String>, separator: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(separator))),
    }
}

fn join_clauses(
    kind: &str,
    relation: &RelationSpec,
    source: &EntityDefinition,
    source_alias: &str,
    target: &EntityDefinition,
    hop: usize,
    on: Option<String>,
) -> Vec<String> {
    let extra = on.map(|c| format!(" AND {}", c)).unwrap_or_default();
    match &relation.relational {
        RelationalJoin::ForeignKey {
            source_column,
            target_column,
        } => vec![format!(
            "{kind} {table} t{hop} ON t{hop}.{target_column} = {source_alias}.{source_column}{extra}",
            table = target.table,
        )],
        RelationalJoin::JoinTable {
            table,
            source_column,
            target_column,
        } => vec![
            format!(
                "{kind} {table} l{hop} ON l{hop}.{source_column} = {source_alias}.{source_key}",
                source_key = source.identity_field().column,
            ),
            format!(
                "{kind} {target_table} t{hop} ON t{hop}.{target_key} = l{hop}.{target_column}{extra}",
                target_table = target.table,
                target_key = target.identity_field().column,
            ),
        ],
    }
}

fn exists(
    relation: &RelationSpec,
    source: &EntityDefinition,
    source_alias: &str,
    target: &EntityDefinition,
    hop: usize,
    nested: Option<String>,
) -> String {
    let extra = nested.map(|c| format!(" AND {}", c)).unwrap_or_default();
    match &relation.relational {
        RelationalJoin::ForeignKey {
            source_column,
            target_column,
        } => format!(
            "EXISTS (SELECT 1 FROM {table} t{hop} WHERE t{hop}.{target_column} = {source_alias}.{source_column}{extra})",
            table = target.table,
        ),
        RelationalJoin::JoinTable {
            table,
            source_column,
            target_column,
        } => format!(
            "EXISTS (SELECT 1 FROM {table} l{hop} INNER JOIN {target_table} t{hop} ON t{hop}.{target_key} = l{hop}.{target_column} WHERE l{hop}.{source_column} = {source_alias}.{source_key}{extra})",
            target_table = target.table,
            target_key = target.identity_field().column,
            source_key = source.identity_field().column,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::QueryBuilder;
    use aerodata_core::{catalog, Entity};
    use serde_json::json;

    fn registry() -> Arc<Registry> {
        Arc::new(catalog::registry().unwrap())
    }

    fn compile(builder: &QueryBuilder, compiler: &SqlCompiler) -> CompiledQuery {
        let ast = Arc::new(builder.ast().canonical());
        compiler
            .compile(builder.registry(), &ast, QueryKind::Select)
            .unwrap()
    }

    fn projected(registry: &Arc<Registry>, root: &str, fields: &[&str]) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(registry), root)
            .unwrap()
            .project(fields)
            .unwrap()
    }

    #[test]
    fn test_scenario_compiles_to_inner_join_with_two_parameters() {
        let registry = registry();
        let query = projected(&registry, "Aircraft", &["model"])
            .filter("mtow", Operator::Gt, 50000)
            .unwrap()
            .traverse("materials", |m| m.eq("grade", "7075-T6"))
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::default());
        assert_eq!(
            compiled.text,
            "SELECT DISTINCT t0.id AS id, t0.model AS model FROM aircraft t0 \
             INNER JOIN aircraft_materials l1 ON l1.aircraft_id = t0.id \
             INNER JOIN materials t1 ON t1.id = l1.material_id \
             WHERE t0.mtow > :p0 AND t1.grade = :p1 \
             ORDER BY t0.id ASC"
        );
        assert_eq!(
            compiled.params,
            vec![
                ("p0".to_string(), json!(50000.0)),
                ("p1".to_string(), json!("7075-T6"))
            ]
        );
        assert_eq!(compiled.fields, Some(vec!["model".to_string()]));
    }

    #[test]
    fn test_literals_never_reach_the_text() {
        let registry = registry();
        let query = projected(&registry, "Aircraft", &["model"])
            .filter("model", Operator::Eq, "x'; DROP TABLE aircraft; --")
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::default());
        assert!(!compiled.text.contains("DROP"));
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn test_optional_traversal_becomes_left_join_with_on_filter() {
        let registry = registry();
        let query = projected(&registry, "Aircraft", &["model"])
            .traverse_optional("engines", |e| e.filter("thrust", Operator::Gte, 30000))
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::default());
        assert_eq!(
            compiled.text,
            "SELECT DISTINCT t0.id AS id, t0.model AS model FROM aircraft t0 \
             LEFT JOIN aircraft_engines l1 ON l1.aircraft_id = t0.id \
             LEFT JOIN engines t1 ON t1.id = l1.engine_id AND t1.thrust >= :p0 \
             ORDER BY t0.id ASC"
        );
    }

    #[test]
    fn test_traversal_under_or_becomes_exists() {
        let registry = registry();
        let query = projected(&registry, "FlightData", &["flight_number"])
            .or(|s| {
                Ok(vec![
                    s.filter("status", Operator::Eq, "cancelled")?,
                    s.filter("aircraft.model", Operator::Contains, "737")?,
                ])
            })
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::default());
        assert_eq!(
            compiled.text,
            "SELECT DISTINCT t0.id AS id, t0.flight_number AS flight_number FROM flight_data t0 \
             WHERE (t0.status = :p0 OR EXISTS (SELECT 1 FROM aircraft t1 \
             WHERE t1.id = t0.aircraft_id AND instr(t1.model, :p1) > 0)) \
             ORDER BY t0.id ASC"
        );
    }

    #[test]
    fn test_negated_traversal_and_in_list() {
        let registry = registry();
        let query = projected(&registry, "Aircraft", &["model"])
            .filter("engine_type", Operator::In, json!(["turbofan", "turboprop"]))
            .unwrap()
            .not(|s| s.has("engines"))
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::default());
        assert!(compiled.text.contains("t0.engine_type IN (:p0, :p1)"));
        assert!(compiled.text.contains(
            "NOT (EXISTS (SELECT 1 FROM aircraft_engines l1 INNER JOIN engines t1 \
             ON t1.id = l1.engine_id WHERE l1.aircraft_id = t0.id))"
        ));
    }

    #[test]
    fn test_sort_and_pagination_sqlite() {
        let registry = registry();
        let query = projected(&registry, "Engine", &["model"])
            .sort_by("thrust", Direction::Desc)
            .unwrap()
            .limit(10)
            .offset(20);

        let compiled = compile(&query, &SqlCompiler::default());
        assert!(compiled.text.starts_with(
            "SELECT DISTINCT t0.id AS id, t0.model AS model, t0.thrust AS thrust FROM engines t0"
        ));
        assert!(compiled
            .text
            .ends_with("ORDER BY t0.thrust DESC NULLS FIRST, t0.id ASC LIMIT :p0 OFFSET :p1"));
        assert_eq!(compiled.param("p0"), Some(&json!(10)));
        assert_eq!(compiled.param("p1"), Some(&json!(20)));
    }

    #[test]
    fn test_offset_without_limit() {
        let registry = registry();
        let query = projected(&registry, "Engine", &["model"]).offset(5);

        let sqlite = compile(&query, &SqlCompiler::new(SqlDialect::Sqlite));
        assert!(sqlite.text.ends_with("ORDER BY t0.id ASC LIMIT -1 OFFSET :p0"));

        let postgres = compile(&query, &SqlCompiler::new(SqlDialect::Postgres));
        assert!(postgres.text.ends_with("ORDER BY t0.id ASC OFFSET $1"));
    }

    #[test]
    fn test_postgres_placeholders_and_contains() {
        let registry = registry();
        let query = projected(&registry, "Material", &["name"])
            .filter("name", Operator::Contains, "Titanium")
            .unwrap()
            .filter("density", Operator::Lt, 5)
            .unwrap();

        let compiled = compile(&query, &SqlCompiler::new(SqlDialect::Postgres));
        assert!(compiled
            .text
            .contains("WHERE t0.density < $1 AND strpos(t0.name, $2) > 0"));
        assert_eq!(compiled.params[0], ("p0".to_string(), json!(5.0)));
    }

    #[test]
    fn test_count_ignores_order_and_page() {
        let registry = registry();
        let query = QueryBuilder::new(Arc::clone(&registry), "Aircraft")
            .unwrap()
            .has("materials")
            .unwrap()
            .limit(5);

        let ast = Arc::new(query.ast().canonical());
        let compiled = SqlCompiler::default()
            .compile(&registry, &ast, QueryKind::Count)
            .unwrap();
        assert_eq!(
            compiled.text,
            "SELECT COUNT(DISTINCT t0.id) AS count FROM aircraft t0 \
             INNER JOIN aircraft_materials l1 ON l1.aircraft_id = t0.id \
             INNER JOIN materials t1 ON t1.id = l1.material_id"
        );
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_depth_limit_is_a_compile_error() {
        let registry = registry();
        let query = QueryBuilder::new(Arc::clone(&registry), "FlightData")
            .unwrap()
            .filter("aircraft.engines.thrust", Operator::Gt, 1000)
            .unwrap();

        let ast = Arc::new(query.ast().canonical());
        let err = SqlCompiler::default()
            .with_max_depth(1)
            .compile(&registry, &ast, QueryKind::Select)
            .unwrap_err();
        assert!(matches!(err, CompileError::TraversalTooDeep { depth: 2, max: 1, .. }));
    }

    #[test]
    fn test_write_statements() {
        let validator = Validator::with_astm(registry());
        let compiler = SqlCompiler::default();

        let link = compiler
            .compile_mutation(&validator, &Arc::new(Mutation::link("Aircraft", "engines", 1, 2)))
            .unwrap();
        assert_eq!(
            link.text,
            "INSERT INTO aircraft_engines (aircraft_id, engine_id) VALUES (:p0, :p1)"
        );

        let operated_by = compiler
            .compile_mutation(&validator, &Arc::new(Mutation::link("FlightData", "aircraft", 9, 1)))
            .unwrap();
        assert_eq!(
            operated_by.text,
            "UPDATE flight_data SET aircraft_id = (SELECT id FROM aircraft WHERE id = :p1) WHERE id = :p0"
        );

        let update = compiler
            .compile_mutation(
                &validator,
                &Arc::new(Mutation::update(
                    Entity::new("Material").with("id", 3).with("temperature_rating", json!([-55.0, 120.0])),
                )),
            )
            .unwrap();
        assert_eq!(
            update.text,
            "UPDATE materials SET temperature_rating = :p0 WHERE id = :p1"
        );
        assert_eq!(update.params[0].1, json!("[-55.0,120.0]"));

        let delete = compiler
            .compile_mutation(&validator, &Arc::new(Mutation::delete("Engine", 2)))
            .unwrap();
        assert_eq!(delete.text, "DELETE FROM engines WHERE id = :p0");
        assert_eq!(delete.kind, QueryKind::Write);
    }
}
