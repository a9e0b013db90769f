//! Core contracts and helpers for rowsmith.
//!
//! This crate defines the value model, SQL type mapping and the dependency
//! graph shared by the generation engine.

pub mod error;
pub mod graph;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, DependencyReport, DependencySummary};
pub use types::{ArithmeticOp, CastTarget, CompareOp, Method, SqlType};
pub use value::Value;
