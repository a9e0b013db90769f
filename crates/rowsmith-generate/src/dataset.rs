use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::entity::{EntityGenerator, GenerationContext, ReferenceSource};
use crate::errors::GenerationError;
use crate::model::{DatasetReport, EntityReport, GenerateOptions};
use crate::output::{render_sql, write_bytes_atomic};
use crate::planner::dependency_graph;
use crate::row::Row;
use crate::template::EntityTemplate;

#[derive(Debug)]
struct EntitySlot {
    template: Arc<EntityTemplate>,
    /// Taken out while one of its rows is being generated.
    generator: Option<EntityGenerator>,
    requested: u64,
    remaining: u64,
    rows: Vec<Row>,
    populated_on_demand: bool,
}

/// Registered entities and the rows generated so far.
#[derive(Debug)]
struct EntityPool {
    order: Vec<String>,
    slots: HashMap<String, EntitySlot>,
    catalog: Arc<Catalog>,
    /// Entities with a row in progress. Only a backstop: `DatasetGenerator`
    /// rejects FK cycles before any row is generated.
    resolving: Vec<String>,
}

impl EntityPool {
    fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            order: Vec::new(),
            slots: HashMap::new(),
            catalog,
            resolving: Vec::new(),
        }
    }

    fn register(&mut self, template: Arc<EntityTemplate>, count: u64, options: &GenerateOptions) {
        let name = template.name().to_string();
        let generator = template
            .instantiate()
            .with_limits(options.max_row_attempts, options.max_unique_retries);
        self.slots.insert(
            name.clone(),
            EntitySlot {
                template,
                generator: Some(generator),
                requested: count,
                remaining: count,
                rows: Vec::new(),
                populated_on_demand: false,
            },
        );
        self.order.push(name);
    }

    fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    fn slot(&self, name: &str) -> Result<&EntitySlot, GenerationError> {
        self.slots
            .get(name)
            .ok_or_else(|| GenerationError::UnknownEntity(name.to_string()))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut EntitySlot, GenerationError> {
        self.slots
            .get_mut(name)
            .ok_or_else(|| GenerationError::UnknownEntity(name.to_string()))
    }

    /// Generate rows for `name` until its remaining count reaches zero.
    fn populate(&mut self, name: &str, rng: &mut dyn RngCore) -> Result<(), GenerationError> {
        while self.slot(name)?.remaining > 0 {
            self.generate_one(name, rng)?;
        }
        Ok(())
    }

    fn generate_one(&mut self, name: &str, rng: &mut dyn RngCore) -> Result<(), GenerationError> {
        if self.resolving.iter().any(|entry| entry == name) {
            let mut chain = self.resolving.clone();
            chain.push(name.to_string());
            return Err(GenerationError::CyclicDependency(chain));
        }

        let slot = self.slot_mut(name)?;
        if slot.remaining == 0 {
            return Ok(());
        }
        let mut generator = slot
            .generator
            .take()
            .ok_or_else(|| GenerationError::CyclicDependency(vec![name.to_string()]))?;

        self.resolving.push(name.to_string());
        let catalog = Arc::clone(&self.catalog);
        let result = {
            let mut ctx = GenerationContext::new(&mut *rng, &catalog).with_references(&mut *self);
            generator.generate(&mut ctx)
        };
        self.resolving.pop();

        let slot = self.slot_mut(name)?;
        slot.generator = Some(generator);
        slot.rows.push(result?);
        slot.remaining -= 1;
        Ok(())
    }

    fn report(&self, seed: u64, elapsed: Duration) -> DatasetReport {
        let mut report = DatasetReport::new(seed);
        for name in &self.order {
            let Some(slot) = self.slots.get(name) else {
                continue;
            };
            let retries = slot.generator.as_ref().map(EntityGenerator::retries).unwrap_or(0);
            report.record_entity(EntityReport {
                name: name.clone(),
                rows_requested: slot.requested,
                rows_generated: slot.rows.len() as u64,
                retries,
                populated_on_demand: slot.populated_on_demand,
            });
            if let Some(generator) = &slot.generator {
                for (id, count) in generator.generator_usage() {
                    report.record_generator_usage(id, *count);
                }
            }
        }
        report.duration_ms = elapsed.as_millis() as u64;
        report
    }
}

impl ReferenceSource for EntityPool {
    fn sample_row(
        &mut self,
        entity: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let slot = self.slot_mut(entity)?;
        if slot.remaining > 0 {
            slot.populated_on_demand = true;
            debug!(
                entity,
                remaining = slot.remaining,
                "populating referenced entity on demand"
            );
            self.populate(entity, rng)?;
        }

        let rows = &self.slot(entity)?.rows;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(rows.get(rng.random_range(0..rows.len())).cloned())
    }
}

/// Populates a set of entities to their requested row counts, satisfying
/// foreign keys from rows of the referenced entities.
///
/// Entities are populated in registration order. When a row needs a
/// reference to an entity that still has rows to generate, that entity is
/// populated completely first, so a reference only ever points at a row that
/// already exists.
#[derive(Debug)]
pub struct DatasetGenerator {
    pool: EntityPool,
    seed: u64,
    report: DatasetReport,
}

impl DatasetGenerator {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn new<I>(entities: I, options: &GenerateOptions) -> Result<Self, GenerationError>
    where
        I: IntoIterator<Item = (Arc<EntityTemplate>, u64)>,
    {
        let catalog = match &options.catalog_dir {
            Some(dir) => Arc::new(Catalog::load_dir(dir)?),
            None => Catalog::builtin(),
        };
        Self::with_catalog(entities, options, catalog)
    }

    pub fn with_catalog<I>(
        entities: I,
        options: &GenerateOptions,
        catalog: Arc<Catalog>,
    ) -> Result<Self, GenerationError>
    where
        I: IntoIterator<Item = (Arc<EntityTemplate>, u64)>,
    {
        options.validate()?;
        let start = Instant::now();
        let seed = options.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut pool = EntityPool::new(catalog);
        let mut templates = Vec::new();
        for (template, count) in entities {
            if pool.contains(template.name()) {
                return Err(GenerationError::InvalidDataset(format!(
                    "entity '{}' registered twice",
                    template.name()
                )));
            }
            templates.push(Arc::clone(&template));
            pool.register(template, count, options);
        }

        let graph = dependency_graph(&templates);
        let dependencies = graph.summary();
        graph
            .topo_order()
            .map_err(GenerationError::CyclicDependency)?;

        info!(
            entities = pool.order.len(),
            edges = dependencies.edges,
            seed,
            "dataset generation started"
        );

        for name in pool.order.clone() {
            let entity_start = Instant::now();
            pool.populate(&name, &mut rng)?;
            info!(
                entity = %name,
                rows = pool.slot(&name)?.rows.len(),
                duration_ms = entity_start.elapsed().as_millis() as u64,
                "entity populated"
            );
        }

        let mut report = pool.report(seed, start.elapsed());
        report.dependencies = dependencies;
        info!(
            entities = report.entities.len(),
            rows = report.entities.iter().map(|entity| entity.rows_generated).sum::<u64>(),
            retries = report.retries_total,
            duration_ms = report.duration_ms,
            "dataset generation completed"
        );

        Ok(Self { pool, seed, report })
    }

    /// Rows of `name` in generation order.
    pub fn get(&self, name: &str) -> Option<&[Row]> {
        self.pool.slots.get(name).map(|slot| slot.rows.as_slice())
    }

    pub fn remaining(&self, name: &str) -> Option<u64> {
        self.pool.slots.get(name).map(|slot| slot.remaining)
    }

    /// Entity names in registration order.
    pub fn entity_names(&self) -> &[String] {
        &self.pool.order
    }

    pub fn template(&self, name: &str) -> Option<&Arc<EntityTemplate>> {
        self.pool.slots.get(name).map(|slot| &slot.template)
    }

    /// Templates in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<EntityTemplate>> {
        self.pool
            .order
            .iter()
            .filter_map(|name| self.pool.slots.get(name).map(|slot| &slot.template))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.pool.catalog
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn report(&self) -> &DatasetReport {
        &self.report
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.pool.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.order.is_empty()
    }

    /// Render the dataset as SQL and, when a sink is given, write the same
    /// text to it. Nothing is written unless rendering succeeds.
    pub fn get_sql(
        &self,
        sink: Option<&mut dyn Write>,
        create_tables: bool,
    ) -> Result<String, GenerationError> {
        let sql = render_sql(self, create_tables)?;
        if let Some(sink) = sink {
            sink.write_all(sql.as_bytes())?;
            sink.flush()?;
        }
        info!(
            tables = self.len(),
            bytes = sql.len(),
            create_tables,
            "sql rendered"
        );
        Ok(sql)
    }

    /// Render the dataset as SQL and atomically replace `path` with it.
    pub fn save_sql(&self, path: &Path, create_tables: bool) -> Result<String, GenerationError> {
        let sql = render_sql(self, create_tables)?;
        write_bytes_atomic(path, sql.as_bytes())?;
        info!(path = %path.display(), bytes = sql.len(), "sql saved");
        Ok(sql)
    }
}

/// Lets a finished dataset serve references for templates generated outside it.
impl ReferenceSource for DatasetGenerator {
    fn sample_row(
        &mut self,
        entity: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        self.pool.sample_row(entity, rng)
    }
}

#[derive(Debug, Default)]
pub struct DatasetBuilder {
    entities: Vec<(Arc<EntityTemplate>, u64)>,
    options: GenerateOptions,
    catalog: Option<Arc<Catalog>>,
}

impl DatasetBuilder {
    pub fn entity(mut self, template: &Arc<EntityTemplate>, count: u64) -> Self {
        self.entities.push((Arc::clone(template), count));
        self
    }

    pub fn options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<DatasetGenerator, GenerationError> {
        match self.catalog {
            Some(catalog) => DatasetGenerator::with_catalog(self.entities, &self.options, catalog),
            None => DatasetGenerator::new(self.entities, &self.options),
        }
    }
}
