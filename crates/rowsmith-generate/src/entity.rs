use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rand::{Rng, RngCore};
use rowsmith_core::{Error, Value};
use tracing::debug;

use crate::catalog::Catalog;
use crate::descriptor::{AutoIncrement, CounterScope, FieldDescriptor, ForeignKey};
use crate::errors::GenerationError;
use crate::expression::Expression;
use crate::generators::{GeneratorContext, ValueGenerator};
use crate::model::GenerateOptions;
use crate::row::Row;
use crate::template::EntityTemplate;

/// Supplies existing rows of other entities for foreign keys.
pub trait ReferenceSource {
    /// Pick one row of `entity`. `Ok(None)` means the entity is known but
    /// has no rows; an unknown entity is `GenerationError::UnknownEntity`.
    fn sample_row(
        &mut self,
        entity: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError>;
}

/// Fixed rows keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRows {
    rows: BTreeMap<String, Vec<Row>>,
}

impl ReferenceRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: impl Into<String>, rows: Vec<Row>) -> Self {
        self.insert(entity, rows);
        self
    }

    pub fn insert(&mut self, entity: impl Into<String>, rows: Vec<Row>) {
        self.rows.entry(entity.into()).or_default().extend(rows);
    }

    pub fn get(&self, entity: &str) -> Option<&[Row]> {
        self.rows.get(entity).map(Vec::as_slice)
    }
}

impl ReferenceSource for ReferenceRows {
    fn sample_row(
        &mut self,
        entity: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let rows = self
            .rows
            .get(entity)
            .ok_or_else(|| GenerationError::UnknownEntity(entity.to_string()))?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(rows.get(rng.random_range(0..rows.len())).cloned())
    }
}

/// Everything a row pass needs from the outside world.
pub struct GenerationContext<'a> {
    pub rng: &'a mut dyn RngCore,
    pub catalog: &'a Catalog,
    pub references: Option<&'a mut dyn ReferenceSource>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(rng: &'a mut dyn RngCore, catalog: &'a Catalog) -> Self {
        Self {
            rng,
            catalog,
            references: None,
        }
    }

    pub fn with_references(mut self, references: &'a mut dyn ReferenceSource) -> Self {
        self.references = Some(references);
        self
    }
}

#[derive(Debug)]
struct EntityState {
    counters: HashMap<String, i64>,
    seen_keys: HashSet<String>,
    unique_seen: HashMap<String, HashSet<String>>,
    rows_generated: u64,
    retries: u64,
    generator_usage: BTreeMap<String, u64>,
    max_row_attempts: u32,
    max_unique_retries: u32,
}

/// Stateful generator for one entity: auto-increment counters, primary key
/// and unique-field bookkeeping live here, not on the template.
#[derive(Debug)]
pub struct EntityGenerator {
    template: Arc<EntityTemplate>,
    state: EntityState,
}

impl EntityGenerator {
    pub fn new(template: Arc<EntityTemplate>) -> Self {
        let defaults = GenerateOptions::default();
        Self {
            template,
            state: EntityState {
                counters: HashMap::new(),
                seen_keys: HashSet::new(),
                unique_seen: HashMap::new(),
                rows_generated: 0,
                retries: 0,
                generator_usage: BTreeMap::new(),
                max_row_attempts: defaults.max_row_attempts,
                max_unique_retries: defaults.max_unique_retries,
            },
        }
    }

    pub fn with_limits(mut self, max_row_attempts: u32, max_unique_retries: u32) -> Self {
        self.state.max_row_attempts = max_row_attempts.max(1);
        self.state.max_unique_retries = max_unique_retries.max(1);
        self
    }

    pub fn template(&self) -> &Arc<EntityTemplate> {
        &self.template
    }

    pub fn rows_generated(&self) -> u64 {
        self.state.rows_generated
    }

    /// Rows and unique values that were drawn again after a collision.
    pub fn retries(&self) -> u64 {
        self.state.retries
    }

    pub fn generator_usage(&self) -> &BTreeMap<String, u64> {
        &self.state.generator_usage
    }

    /// Produce the next row. Rows whose primary key was already emitted by
    /// this generator are discarded and rebuilt.
    pub fn generate(&mut self, ctx: &mut GenerationContext<'_>) -> Result<Row, GenerationError> {
        let template = Arc::clone(&self.template);
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            let pass = RowPass::new(&template, &mut self.state, ctx).run()?;

            if let Some(key) = primary_key_of(&template, &pass.row) {
                if self.state.seen_keys.contains(&key) {
                    if attempts >= self.state.max_row_attempts {
                        return Err(GenerationError::ExhaustedUniqueness {
                            entity: template.name().to_string(),
                            field: template.primary_key().join(", "),
                            attempts,
                        });
                    }
                    self.state.retries += 1;
                    debug!(
                        entity = template.name(),
                        attempt = attempts,
                        "duplicate primary key, regenerating row"
                    );
                    continue;
                }
                self.state.seen_keys.insert(key);
            }

            for (field, key) in pass.unique_values {
                self.state.unique_seen.entry(field).or_default().insert(key);
            }
            self.state.rows_generated += 1;
            return Ok(pass.row);
        }
    }
}

fn primary_key_of(template: &EntityTemplate, row: &Row) -> Option<String> {
    if template.primary_key().is_empty() {
        return None;
    }
    let parts: Vec<String> = template
        .primary_key()
        .iter()
        .map(|column| row.get(column).map(Value::key).unwrap_or_default())
        .collect();
    Some(parts.join("\u{1f}"))
}

struct PassOutput {
    row: Row,
    unique_values: Vec<(String, String)>,
}

/// Builds one row. Every value produced is cached in `values`, so a field
/// read by several expressions or generators is drawn exactly once.
struct RowPass<'p, 'c, 'r> {
    template: &'p EntityTemplate,
    state: &'p mut EntityState,
    ctx: &'c mut GenerationContext<'r>,
    values: Row,
    done: Vec<bool>,
    active: Vec<usize>,
    unique_values: Vec<(String, String)>,
}

impl<'p, 'c, 'r> RowPass<'p, 'c, 'r> {
    fn new(
        template: &'p EntityTemplate,
        state: &'p mut EntityState,
        ctx: &'c mut GenerationContext<'r>,
    ) -> Self {
        Self {
            template,
            state,
            ctx,
            values: Row::new(),
            done: vec![false; template.fields().len()],
            active: Vec::new(),
            unique_values: Vec::new(),
        }
    }

    fn run(mut self) -> Result<PassOutput, GenerationError> {
        let template = self.template;
        for idx in 0..template.fields().len() {
            self.ensure_field(idx)?;
        }

        let mut row = Row::new();
        for column in template.columns() {
            let value = self.values.get(column.name()).cloned().unwrap_or(Value::Null);
            row.insert(column.name(), value);
        }
        Ok(PassOutput {
            row,
            unique_values: self.unique_values,
        })
    }

    fn ensure_field(&mut self, idx: usize) -> Result<(), GenerationError> {
        if self.done.get(idx).copied().unwrap_or(true) {
            return Ok(());
        }
        let template = self.template;
        let field = &template.fields()[idx];
        if self.active.contains(&idx) {
            return Err(Error::InvalidSchema(format!(
                "'{}.{}' depends on itself",
                template.name(),
                field.name()
            ))
            .into());
        }

        self.active.push(idx);
        match field.descriptor() {
            FieldDescriptor::ForeignKey(fk) => self.resolve_foreign_key(field.name(), fk)?,
            descriptor => {
                let value = self.produce(field.name(), descriptor)?;
                self.values.insert(field.name(), value);
            }
        }
        self.active.pop();
        self.done[idx] = true;
        Ok(())
    }

    fn ensure_column(&mut self, requester: &str, column: &str) -> Result<(), GenerationError> {
        let template = self.template;
        let idx = template.source_index(column).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "'{}.{}' references unknown field '{}'",
                template.name(),
                requester,
                column
            ))
        })?;
        self.ensure_field(idx)
    }

    fn produce(
        &mut self,
        field: &str,
        descriptor: &FieldDescriptor,
    ) -> Result<Value, GenerationError> {
        match descriptor {
            FieldDescriptor::Literal(value) => Ok(value.clone()),
            FieldDescriptor::Generated(generator) => self.draw(field, generator.as_ref()),
            FieldDescriptor::AutoIncrement(counter) => self.next_increment(field, counter),
            FieldDescriptor::PrimaryKey(inner) => self.produce(field, inner),
            FieldDescriptor::Unique(inner) => self.produce_unique(field, inner),
            FieldDescriptor::Expression { expr, .. } => self.evaluate(field, expr),
            FieldDescriptor::ForeignKey(fk) => Err(Error::InvalidSchema(format!(
                "'{}.{}': nested foreign key to '{}'",
                self.template.name(),
                field,
                fk.target_name()
            ))
            .into()),
        }
    }

    fn draw(
        &mut self,
        field: &str,
        generator: &dyn ValueGenerator,
    ) -> Result<Value, GenerationError> {
        for input in generator.inputs() {
            self.ensure_column(field, input)?;
        }

        let template = self.template;
        let catalog = self.ctx.catalog;
        let has_dataset = self.ctx.references.is_some();
        let gen_ctx = GeneratorContext {
            entity: template.name(),
            field,
            row_index: self.state.rows_generated,
            row: &self.values,
            catalog,
            has_dataset,
        };
        let value = generator.generate(&gen_ctx, &mut *self.ctx.rng)?;
        *self
            .state
            .generator_usage
            .entry(generator.id().to_string())
            .or_insert(0) += 1;
        Ok(value)
    }

    fn next_increment(
        &mut self,
        field: &str,
        counter: &AutoIncrement,
    ) -> Result<Value, GenerationError> {
        let next = match &counter.scope {
            CounterScope::Shared(shared) => return Ok(Value::Int(shared.next_value())),
            CounterScope::Instance => match self.state.counters.get(field) {
                None => Some(counter.start),
                Some(last) => last.checked_add(counter.step),
            },
        };
        let next = next.ok_or_else(|| {
            Error::Generator(format!(
                "auto increment '{}.{}' overflowed",
                self.template.name(),
                field
            ))
        })?;
        self.state.counters.insert(field.to_string(), next);
        Ok(Value::Int(next))
    }

    fn produce_unique(
        &mut self,
        field: &str,
        inner: &FieldDescriptor,
    ) -> Result<Value, GenerationError> {
        let limit = self.state.max_unique_retries;
        for _ in 0..limit {
            let value = self.produce(field, inner)?;
            let key = value.key();
            let seen = self
                .state
                .unique_seen
                .get(field)
                .is_some_and(|keys| keys.contains(&key));
            if !seen {
                self.unique_values.push((field.to_string(), key));
                return Ok(value);
            }
            self.state.retries += 1;
        }
        Err(GenerationError::ExhaustedUniqueness {
            entity: self.template.name().to_string(),
            field: field.to_string(),
            attempts: limit,
        })
    }

    fn evaluate(&mut self, field: &str, expr: &Expression) -> Result<Value, GenerationError> {
        let value = match expr {
            Expression::Literal(value) => value.clone(),
            Expression::Field(name) => {
                self.ensure_column(field, name)?;
                self.values.get(name).cloned().ok_or_else(|| {
                    Error::InvalidSchema(format!("field '{name}' produced no value"))
                })?
            }
            Expression::Generate(generator) => self.draw(field, generator.as_ref())?,
            Expression::Arithmetic { op, lhs, rhs } => {
                let lhs = self.evaluate(field, lhs)?;
                let rhs = self.evaluate(field, rhs)?;
                lhs.arithmetic(*op, &rhs)?
            }
            Expression::Compare { op, lhs, rhs } => {
                let lhs = self.evaluate(field, lhs)?;
                let rhs = self.evaluate(field, rhs)?;
                lhs.compare(*op, &rhs)?
            }
            Expression::Attribute { target, name } => self.evaluate(field, target)?.attribute(name)?,
            Expression::Call {
                target,
                method,
                args,
            } => {
                let target = self.evaluate(field, target)?;
                let args = self.evaluate_all(field, args)?;
                target.call(*method, &args)?
            }
            Expression::Function { function, args } => {
                let args = self.evaluate_all(field, args)?;
                function.apply(&args)?
            }
        };
        Ok(value)
    }

    fn evaluate_all(
        &mut self,
        field: &str,
        exprs: &[Expression],
    ) -> Result<Vec<Value>, GenerationError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.evaluate(field, expr)?);
        }
        Ok(values)
    }

    fn resolve_foreign_key(&mut self, field: &str, fk: &ForeignKey) -> Result<(), GenerationError> {
        let template = self.template;
        let entity = template.name();
        let target = fk.target_name();
        let dataset_required = || GenerationError::DatasetRequired {
            entity: entity.to_string(),
            field: field.to_string(),
            target: target.to_string(),
        };

        let Some(references) = self.ctx.references.as_deref_mut() else {
            return Err(dataset_required());
        };
        let sampled = match references.sample_row(target, &mut *self.ctx.rng) {
            Ok(sampled) => sampled,
            Err(GenerationError::UnknownEntity(name)) if name == target => {
                return Err(dataset_required());
            }
            Err(err) => return Err(err),
        };
        let row = sampled.ok_or_else(|| {
            GenerationError::Integrity(format!(
                "'{entity}.{field}' references '{target}' but no '{target}' rows exist"
            ))
        })?;

        for (column, target_field) in fk.columns(field) {
            let value = row.get(target_field).cloned().ok_or_else(|| {
                GenerationError::Integrity(format!(
                    "referenced '{target}' row has no field '{target_field}'"
                ))
            })?;
            self.values.insert(column, value);
        }
        debug!(entity, field, target, "foreign key resolved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::descriptor::{
        SharedCounter, auto_increment_from, literal, primary_key, shared_increment, unique,
    };

    #[test]
    fn instance_counters_restart_per_generator() {
        let template = EntityTemplate::builder("Ticket")
            .field("id", primary_key(auto_increment_from(100, 10)))
            .build()
            .expect("template");
        let catalog = Catalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut first = template.instantiate();
        let mut second = template.instantiate();
        let mut ctx = GenerationContext::new(&mut rng, &catalog);
        assert_eq!(first.generate(&mut ctx).unwrap().get("id"), Some(&Value::Int(100)));
        assert_eq!(first.generate(&mut ctx).unwrap().get("id"), Some(&Value::Int(110)));
        assert_eq!(second.generate(&mut ctx).unwrap().get("id"), Some(&Value::Int(100)));
    }

    #[test]
    fn shared_counters_span_templates() {
        let counter = SharedCounter::new(1, 1);
        let invoices = EntityTemplate::builder("Invoice")
            .field("number", shared_increment(&counter))
            .build()
            .expect("template");
        let credit_notes = EntityTemplate::builder("CreditNote")
            .field("number", shared_increment(&counter))
            .build()
            .expect("template");
        let catalog = Catalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = GenerationContext::new(&mut rng, &catalog);

        let a = invoices.generate(&mut ctx).unwrap();
        let b = credit_notes.generate(&mut ctx).unwrap();
        assert_eq!(a.get("number"), Some(&Value::Int(1)));
        assert_eq!(b.get("number"), Some(&Value::Int(2)));
    }

    #[test]
    fn unique_literal_is_exhausted_on_second_row() {
        let template = EntityTemplate::builder("Tag")
            .field("label", unique(literal("same")))
            .build()
            .expect("template");
        let catalog = Catalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = GenerationContext::new(&mut rng, &catalog);
        let mut generator = template.instantiate().with_limits(5, 3);

        generator.generate(&mut ctx).expect("first row");
        let err = generator.generate(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ExhaustedUniqueness { ref field, attempts: 3, .. } if field == "label"
        ));
        assert_eq!(generator.retries(), 3);
    }

    #[test]
    fn duplicate_primary_keys_are_exhausted() {
        let template = EntityTemplate::builder("Singleton")
            .field("id", primary_key(literal(1)))
            .build()
            .expect("template");
        let catalog = Catalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = GenerationContext::new(&mut rng, &catalog);
        let mut generator = template.instantiate().with_limits(4, 4);

        generator.generate(&mut ctx).expect("first row");
        let err = generator.generate(&mut ctx).unwrap_err();
        assert!(matches!(err, GenerationError::ExhaustedUniqueness { attempts: 4, .. }));
        assert_eq!(generator.rows_generated(), 1);
    }
}
