use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rowsmith_core::DependencySummary;
use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Options for the generation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Seed for the dataset random source. Drawn from the thread RNG when unset.
    pub seed: Option<u64>,
    /// Maximum attempts to build a row with an unseen primary key.
    pub max_row_attempts: u32,
    /// Maximum draws for a single `Unique` field.
    pub max_unique_retries: u32,
    /// Directory with reference data overriding the built-in catalog.
    pub catalog_dir: Option<PathBuf>,
    /// Emit `CREATE TABLE` statements before the inserts.
    pub create_tables: bool,
    pub log_format: LogFormat,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_row_attempts: 50,
            max_unique_retries: 50,
            catalog_dir: None,
            create_tables: true,
            log_format: LogFormat::Text,
        }
    }
}

impl GenerateOptions {
    /// Parse options from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, GenerationError> {
        let options: GenerateOptions = toml::from_str(input)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_row_attempts == 0 {
            return Err(GenerationError::InvalidOptions(
                "max_row_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_unique_retries == 0 {
            return Err(GenerationError::InvalidOptions(
                "max_unique_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of a generated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub name: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub retries: u64,
    /// Rows were produced while satisfying another entity's foreign key.
    pub populated_on_demand: bool,
}

/// Report for a dataset run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetReport {
    pub seed: u64,
    pub entities: Vec<EntityReport>,
    pub retries_total: u64,
    pub generator_usage: BTreeMap<String, u64>,
    /// Foreign key graph of the registered entities.
    pub dependencies: DependencySummary,
    pub duration_ms: u64,
}

impl DatasetReport {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn record_entity(&mut self, entity: EntityReport) {
        self.retries_total += entity.retries;
        self.entities.push(entity);
    }

    pub fn record_generator_usage(&mut self, id: &str, count: u64) {
        *self.generator_usage.entry(id.to_string()).or_insert(0) += count;
    }

    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|entity| entity.name == name)
    }
}
