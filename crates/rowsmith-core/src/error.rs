use thiserror::Error;

/// Core error type shared across rowsmith crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A foreign key points at a field that is not part of the target's primary key.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// A primary key marker wraps no underlying field.
    #[error("empty key: {0}")]
    EmptyKey(String),
    /// A value has no SQL equivalent type.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// Operator or method applied to values it is not defined for.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The entity schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A value generator could not produce a value.
    #[error("generator error: {0}")]
    Generator(String),
}

/// Convenience alias for results returned by rowsmith crates.
pub type Result<T> = std::result::Result<T, Error>;
