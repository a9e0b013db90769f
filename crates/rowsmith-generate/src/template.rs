use std::collections::HashMap;
use std::sync::Arc;

use rowsmith_core::{Error, SqlType};

use crate::descriptor::{FieldDescriptor, ForeignKey};
use crate::entity::{EntityGenerator, GenerationContext};
use crate::errors::GenerationError;
use crate::row::Row;

/// Fields whose name starts with this prefix are generated and visible to
/// expressions but never emitted as columns.
pub const HIDDEN_PREFIX: char = '_';

#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    descriptor: FieldDescriptor,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with(HIDDEN_PREFIX)
    }
}

/// Output column of an entity.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    target_field: Option<String>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Referenced target field when the column belongs to a foreign key.
    pub fn target_field(&self) -> Option<&str> {
        self.target_field.as_deref()
    }
}

/// Immutable description of an entity: its name and ordered fields.
#[derive(Debug)]
pub struct EntityTemplate {
    name: String,
    fields: Vec<FieldDef>,
    primary_key: Vec<String>,
    foreign_keys: Vec<String>,
    unique: Vec<String>,
    columns: Vec<Column>,
    sources: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct EntityTemplateBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntityTemplateBuilder {
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            descriptor,
        });
        self
    }

    pub fn build(self) -> Result<Arc<EntityTemplate>, Error> {
        let entity = self.name;
        if entity.trim().is_empty() {
            return Err(Error::InvalidSchema("entity name must not be empty".to_string()));
        }

        let mut primary_key = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut unique = Vec::new();
        let mut columns = Vec::new();
        let mut sources: HashMap<String, usize> = HashMap::new();

        for (idx, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "entity '{entity}' has a field with an empty name"
                )));
            }
            if self.fields[..idx].iter().any(|other| other.name == field.name) {
                return Err(Error::InvalidSchema(format!(
                    "entity '{entity}' declares field '{}' twice",
                    field.name
                )));
            }
            check_descriptor(&entity, field, &field.descriptor, true)?;

            if field.descriptor.is_unique() {
                unique.push(field.name.clone());
            }

            let produced: Vec<(String, Option<String>)> = match &field.descriptor {
                FieldDescriptor::ForeignKey(fk) => {
                    foreign_keys.push(field.name.clone());
                    fk.columns(&field.name)
                        .into_iter()
                        .map(|(column, target)| (column, Some(target.to_string())))
                        .collect()
                }
                descriptor => {
                    if descriptor.is_primary_key() {
                        primary_key.push(field.name.clone());
                    }
                    vec![(field.name.clone(), None)]
                }
            };

            for (column, target_field) in produced {
                if sources.insert(column.clone(), idx).is_some() {
                    return Err(Error::InvalidSchema(format!(
                        "entity '{entity}' produces column '{column}' twice"
                    )));
                }
                if !field.is_hidden() {
                    columns.push(Column {
                        name: column,
                        target_field,
                    });
                }
            }
        }

        let template = EntityTemplate {
            name: entity,
            fields: self.fields,
            primary_key,
            foreign_keys,
            unique,
            columns,
            sources,
        };
        template.check_references()?;
        Ok(Arc::new(template))
    }
}

fn check_descriptor(
    entity: &str,
    field: &FieldDef,
    descriptor: &FieldDescriptor,
    top: bool,
) -> Result<(), Error> {
    match descriptor {
        FieldDescriptor::PrimaryKey(inner) => {
            if !top {
                return Err(Error::InvalidSchema(format!(
                    "'{entity}.{}': primary key must be the outermost marker",
                    field.name
                )));
            }
            if field.is_hidden() {
                return Err(Error::InvalidSchema(format!(
                    "'{entity}.{}': hidden fields cannot be primary key members",
                    field.name
                )));
            }
            if inner.is_key_marker() {
                return Err(Error::EmptyKey(format!(
                    "'{entity}.{}': primary key wraps a {} instead of a value",
                    field.name,
                    inner.kind()
                )));
            }
            check_descriptor(entity, field, inner, false)
        }
        FieldDescriptor::ForeignKey(_) => {
            if !top {
                return Err(Error::InvalidSchema(format!(
                    "'{entity}.{}': foreign keys cannot be wrapped",
                    field.name
                )));
            }
            if field.is_hidden() {
                return Err(Error::InvalidSchema(format!(
                    "'{entity}.{}': hidden fields cannot be foreign keys",
                    field.name
                )));
            }
            Ok(())
        }
        FieldDescriptor::Unique(inner) => {
            if inner.is_key_marker() {
                return Err(Error::InvalidSchema(format!(
                    "'{entity}.{}': unique cannot wrap a {}",
                    field.name,
                    inner.kind()
                )));
            }
            check_descriptor(entity, field, inner, false)
        }
        _ => Ok(()),
    }
}

/// Row fields a descriptor reads while producing its value.
fn descriptor_refs(descriptor: &FieldDescriptor) -> Vec<&str> {
    match descriptor {
        FieldDescriptor::Generated(generator) => generator.inputs(),
        FieldDescriptor::Expression { expr, .. } => expr.field_refs(),
        FieldDescriptor::PrimaryKey(inner) | FieldDescriptor::Unique(inner) => {
            descriptor_refs(inner)
        }
        _ => Vec::new(),
    }
}

impl EntityTemplate {
    pub fn builder(name: impl Into<String>) -> EntityTemplateBuilder {
        EntityTemplateBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order, hidden ones included.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field(name).map(FieldDef::descriptor)
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[String] {
        &self.foreign_keys
    }

    pub fn foreign_key(&self, field: &str) -> Option<&ForeignKey> {
        match self.descriptor(field)? {
            FieldDescriptor::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    pub fn unique_fields(&self) -> &[String] {
        &self.unique
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Entities referenced by foreign keys, without duplicates, in field order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for field in &self.foreign_keys {
            if let Some(fk) = self.foreign_key(field)
                && !deps.contains(&fk.target_name())
            {
                deps.push(fk.target_name());
            }
        }
        deps
    }

    /// SQL type of a column or hidden field.
    pub fn column_type(&self, name: &str) -> Result<SqlType, Error> {
        let field = self
            .source_index(name)
            .and_then(|idx| self.fields.get(idx))
            .ok_or_else(|| {
                Error::InvalidSchema(format!("entity '{}' has no column '{}'", self.name, name))
            })?;

        if let FieldDescriptor::ForeignKey(fk) = &field.descriptor {
            let target_field = self
                .columns
                .iter()
                .find(|column| column.name == name)
                .and_then(Column::target_field)
                .ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "entity '{}' has no foreign key column '{}'",
                        self.name, name
                    ))
                })?;
            return fk.target().column_type(target_field);
        }

        self.descriptor_type(&field.name, &field.descriptor)
    }

    /// Column names paired with their SQL types, in output order.
    pub fn column_types(&self) -> Result<Vec<(&str, SqlType)>, Error> {
        self.columns
            .iter()
            .map(|column| Ok((column.name(), self.column_type(column.name())?)))
            .collect()
    }

    /// Fresh generator with its own counters and seen-key sets.
    pub fn instantiate(self: &Arc<Self>) -> EntityGenerator {
        EntityGenerator::new(Arc::clone(self))
    }

    /// One row from a fresh generator.
    pub fn generate(self: &Arc<Self>, ctx: &mut GenerationContext<'_>) -> Result<Row, GenerationError> {
        self.instantiate().generate(ctx)
    }

    pub(crate) fn source_index(&self, name: &str) -> Option<usize> {
        self.sources.get(name).copied()
    }

    fn descriptor_type(&self, field: &str, descriptor: &FieldDescriptor) -> Result<SqlType, Error> {
        match descriptor {
            FieldDescriptor::Literal(value) => value.sql_type().map_err(|err| match err {
                Error::UnsupportedType(message) => {
                    Error::UnsupportedType(format!("'{}.{}': {}", self.name, field, message))
                }
                other => other,
            }),
            FieldDescriptor::Generated(generator) => Ok(generator.sql_type()),
            FieldDescriptor::AutoIncrement(_) => Ok(SqlType::Integer),
            FieldDescriptor::PrimaryKey(inner) | FieldDescriptor::Unique(inner) => {
                self.descriptor_type(field, inner)
            }
            FieldDescriptor::ForeignKey(fk) => Err(Error::InvalidSchema(format!(
                "'{}.{}': nested foreign key to '{}'",
                self.name,
                field,
                fk.target_name()
            ))),
            FieldDescriptor::Expression {
                sql_type: Some(sql_type),
                ..
            } => Ok(sql_type.clone()),
            FieldDescriptor::Expression {
                expr,
                sql_type: None,
            } => {
                let mut resolve = |name: &str| self.column_type(name);
                expr.sql_type(&mut resolve)
            }
        }
    }

    /// Every field reference must resolve and references must not loop.
    fn check_references(&self) -> Result<(), Error> {
        let mut edges: Vec<Vec<usize>> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let mut targets = Vec::new();
            for reference in descriptor_refs(&field.descriptor) {
                let idx = self.source_index(reference).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "'{}.{}' references unknown field '{}'",
                        self.name, field.name, reference
                    ))
                })?;
                targets.push(idx);
            }
            edges.push(targets);
        }

        // 0 = unvisited, 1 = on the current path, 2 = finished
        let mut state = vec![0_u8; self.fields.len()];
        let mut path = Vec::new();
        for start in 0..self.fields.len() {
            if let Some(cycle) = find_cycle(start, &edges, &mut state, &mut path) {
                let names: Vec<&str> = cycle.iter().map(|idx| self.fields[*idx].name()).collect();
                return Err(Error::InvalidSchema(format!(
                    "entity '{}' has cyclic field references: {}",
                    self.name,
                    names.join(" -> ")
                )));
            }
        }
        Ok(())
    }
}

fn find_cycle(
    node: usize,
    edges: &[Vec<usize>],
    state: &mut [u8],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    match state[node] {
        2 => return None,
        1 => {
            let start = path.iter().position(|idx| *idx == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        _ => {}
    }

    state[node] = 1;
    path.push(node);
    for next in &edges[node] {
        if let Some(cycle) = find_cycle(*next, edges, state, path) {
            return Some(cycle);
        }
    }
    path.pop();
    state[node] = 2;
    None
}
