//! RegistryBuilder: validates a schema declaration and produces a Registry.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{EntityDefinition, FieldSpec, Registry, RelationSpec};
use crate::error::SchemaError;
use crate::schema::{Backend, EntityDeclaration, FieldType, RelationalJoin, SchemaDeclaration};
use crate::validation::Constraint;

/// Builder for an immutable [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    version: u64,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self { version: 1 }
    }

    /// Version stamped on the built snapshot.
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Validate the declaration and build the snapshot.
    pub fn build(&self, declaration: &SchemaDeclaration) -> Result<Registry, SchemaError> {
        let mut declared: HashMap<&str, &EntityDeclaration> = HashMap::new();
        for entity in &declaration.entities {
            if declared.insert(entity.name.as_str(), entity).is_some() {
                return Err(SchemaError::DuplicateEntity(entity.name.clone()));
            }
        }

        let mut claims = MappingClaims::default();
        let mut entities = Vec::with_capacity(declaration.entities.len());
        let mut index = HashMap::new();

        for decl in &declaration.entities {
            let definition = build_entity(decl, &declared, &mut claims)?;
            debug!(
                entity = %definition.name,
                fields = definition.fields.len(),
                relations = definition.relations.len(),
                "Registered entity"
            );
            index.insert(definition.name.clone(), entities.len());
            entities.push(definition);
        }

        claims.check_link_tables()?;

        info!(
            entities = entities.len(),
            version = self.version,
            "Built entity registry"
        );

        Ok(Registry {
            version: self.version,
            entities,
            index,
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`; physical names are interpolated into compiled
/// query text.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(entity: &str, identifier: &str) -> Result<(), SchemaError> {
    if is_identifier(identifier) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            entity: entity.to_string(),
            identifier: identifier.to_string(),
        })
    }
}

fn build_entity(
    decl: &EntityDeclaration,
    declared: &HashMap<&str, &EntityDeclaration>,
    claims: &mut MappingClaims,
) -> Result<EntityDefinition, SchemaError> {
    let entity = decl.name.as_str();
    check_identifier(entity, entity)?;
    check_identifier(entity, &decl.relational.table)?;
    check_identifier(entity, &decl.graph.label)?;

    let mut members = HashSet::new();
    for name in decl
        .fields
        .iter()
        .map(|f| &f.name)
        .chain(decl.relations.iter().map(|r| &r.name))
    {
        check_identifier(entity, name)?;
        if !members.insert(name.as_str()) {
            return Err(SchemaError::DuplicateMember {
                entity: entity.to_string(),
                name: name.clone(),
            });
        }
    }

    let identity = decl
        .fields
        .iter()
        .find(|f| f.name == decl.identity)
        .ok_or_else(|| SchemaError::MissingIdentity {
            entity: entity.to_string(),
            identity: decl.identity.clone(),
        })?;
    if identity.nullable {
        return Err(SchemaError::NullableIdentity {
            entity: entity.to_string(),
            identity: decl.identity.clone(),
        });
    }

    let sibling_types: HashMap<&str, FieldType> = decl
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.field_type))
        .collect();

    let mut fields = Vec::with_capacity(decl.fields.len());
    let mut field_index = HashMap::new();
    for field in &decl.fields {
        let column = field.column.clone().unwrap_or_else(|| field.name.clone());
        let property = field.property.clone().unwrap_or_else(|| field.name.clone());
        check_identifier(entity, &column)?;
        check_identifier(entity, &property)?;

        let owner = format!("{}.{}", entity, field.name);
        claims.claim(Backend::Relational, &decl.relational.table, &column, &owner)?;
        claims.claim(Backend::Graph, &decl.graph.label, &property, &owner)?;

        let constraints = field
            .rules
            .iter()
            .map(|rule| {
                Constraint::compile(rule, &field.name, field.field_type, |name| {
                    sibling_types.get(name).copied()
                })
                .map_err(|reason| SchemaError::InvalidRule {
                    entity: entity.to_string(),
                    field: field.name.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        field_index.insert(field.name.clone(), fields.len());
        fields.push(FieldSpec {
            name: field.name.clone(),
            field_type: field.field_type,
            unit: field.unit,
            nullable: field.nullable,
            column,
            property,
            description: field.description.clone(),
            constraints,
        });
    }

    let identity_spec = fields
        .iter()
        .find(|f| f.name == decl.identity)
        .cloned()
        .ok_or_else(|| SchemaError::MissingIdentity {
            entity: entity.to_string(),
            identity: decl.identity.clone(),
        })?;

    let mut relations = Vec::with_capacity(decl.relations.len());
    let mut relation_index = HashMap::new();
    for relation in &decl.relations {
        let Some(target) = declared.get(relation.target.as_str()) else {
            return Err(SchemaError::DanglingRelation {
                entity: entity.to_string(),
                relation: relation.name.clone(),
                target: relation.target.clone(),
            });
        };
        check_identifier(entity, &relation.graph.edge_type)?;

        let invalid = |reason: String| SchemaError::InvalidRelationMapping {
            entity: entity.to_string(),
            relation: relation.name.clone(),
            reason,
        };
        match &relation.relational {
            RelationalJoin::ForeignKey {
                source_column,
                target_column,
            } => {
                if !has_column(decl, source_column) {
                    return Err(invalid(format!(
                        "source column '{}' is not a column of {}",
                        source_column, decl.relational.table
                    )));
                }
                if !has_column(target, target_column) {
                    return Err(invalid(format!(
                        "target column '{}' is not a column of {}",
                        target_column, target.relational.table
                    )));
                }
            }
            RelationalJoin::JoinTable {
                table,
                source_column,
                target_column,
            } => {
                check_identifier(entity, table)?;
                check_identifier(entity, source_column)?;
                check_identifier(entity, target_column)?;
                if source_column == target_column {
                    return Err(invalid(format!(
                        "join table {} uses '{}' for both sides",
                        table, source_column
                    )));
                }
                let owner = format!("{}.{}", entity, relation.name);
                claims.link(table, source_column, &owner);
                claims.link(table, target_column, &owner);
            }
        }

        relation_index.insert(relation.name.clone(), relations.len());
        relations.push(RelationSpec {
            name: relation.name.clone(),
            source: entity.to_string(),
            target: relation.target.clone(),
            cardinality: relation.cardinality,
            relational: relation.relational.clone(),
            graph: relation.graph.clone(),
        });
    }

    Ok(EntityDefinition {
        name: entity.to_string(),
        identity: decl.identity.clone(),
        table: decl.relational.table.clone(),
        label: decl.graph.label.clone(),
        identity_spec,
        fields,
        field_index,
        relations,
        relation_index,
    })
}

fn has_column(decl: &EntityDeclaration, column: &str) -> bool {
    decl.fields
        .iter()
        .any(|f| f.column.as_deref().unwrap_or(&f.name) == column)
}

/// Physical (container, member) pairs claimed so far.
#[derive(Debug, Default)]
struct MappingClaims {
    owners: HashMap<(Backend, String, String), String>,
    /// Join-table columns; several relations may share one join table
    links: Vec<(String, String, String)>,
}

impl MappingClaims {
    fn claim(
        &mut self,
        backend: Backend,
        container: &str,
        member: &str,
        owner: &str,
    ) -> Result<(), SchemaError> {
        let key = (backend, container.to_string(), member.to_string());
        if let Some(first) = self.owners.get(&key) {
            return Err(SchemaError::MappingConflict {
                backend,
                container: container.to_string(),
                member: member.to_string(),
                first: first.clone(),
                second: owner.to_string(),
            });
        }
        self.owners.insert(key, owner.to_string());
        Ok(())
    }

    fn link(&mut self, table: &str, column: &str, owner: &str) {
        self.links
            .push((table.to_string(), column.to_string(), owner.to_string()));
    }

    /// A join-table column must not also be an entity's column.
    fn check_link_tables(&self) -> Result<(), SchemaError> {
        for (table, column, owner) in &self.links {
            let key = (Backend::Relational, table.clone(), column.clone());
            if let Some(first) = self.owners.get(&key) {
                return Err(SchemaError::MappingConflict {
                    backend: Backend::Relational,
                    container: table.clone(),
                    member: column.clone(),
                    first: first.clone(),
                    second: owner.clone(),
                });
            }
        }
        Ok(())
    }
}
