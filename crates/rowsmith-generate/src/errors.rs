use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("entity '{entity}' field '{field}' references '{target}' but no dataset containing '{target}' rows was supplied")]
    DatasetRequired {
        entity: String,
        field: String,
        target: String,
    },
    #[error("could not find a new unique value for '{entity}.{field}' after {attempts} attempts")]
    ExhaustedUniqueness {
        entity: String,
        field: String,
        attempts: u32,
    },
    #[error("cyclic foreign key dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error(transparent)]
    Core(#[from] rowsmith_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
