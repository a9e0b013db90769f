//! Declarative synthetic dataset generation for rowsmith.
//!
//! Entities are described as templates of named fields. A
//! [`DatasetGenerator`] populates them to requested row counts, resolving
//! foreign keys against rows it has already produced, and renders the result
//! as a SQL script.

pub mod catalog;
pub mod dataset;
pub mod descriptor;
pub mod entity;
pub mod errors;
pub mod expression;
pub mod generators;
pub mod logging;
pub mod model;
pub mod output;
pub mod planner;
pub mod row;
pub mod template;

pub use catalog::Catalog;
pub use dataset::{DatasetBuilder, DatasetGenerator};
pub use descriptor::{FieldDescriptor, ForeignKey, SharedCounter};
pub use entity::{EntityGenerator, GenerationContext, ReferenceRows, ReferenceSource};
pub use errors::GenerationError;
pub use expression::{Expression, Function};
pub use generators::{GeneratorContext, ValueGenerator};
pub use logging::init_tracing;
pub use model::{DatasetReport, EntityReport, GenerateOptions, LogFormat};
pub use row::Row;
pub use template::{EntityTemplate, EntityTemplateBuilder};
