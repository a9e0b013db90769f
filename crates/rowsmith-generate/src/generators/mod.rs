use std::fmt;

use rand::{Rng, RngCore};
use rowsmith_core::{Error, SqlType, Value};

use crate::catalog::Catalog;
use crate::row::Row;

pub mod faker_rs;
pub mod primitives;
pub mod semantic;

pub use faker_rs::{Faker, FakerKind};
pub use primitives::{RandomDateTime, RandomFloat, RandomInteger, RandomString, UuidV4};
pub use semantic::{
    BloodType, CarBrand, CarModel, CountryName, CreditCard, Gender, Ipv4Address, RandomName,
};

/// Read-only view handed to a generator while a row is being built.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub entity: &'a str,
    pub field: &'a str,
    /// Number of rows already accepted for this entity instance.
    pub row_index: u64,
    /// Values produced so far in the current row pass, hidden fields included.
    pub row: &'a Row,
    pub catalog: &'a Catalog,
    pub has_dataset: bool,
}

impl GeneratorContext<'_> {
    /// Value of a field this generator declared in `inputs()`.
    pub fn input(&self, field: &str) -> Result<&Value, Error> {
        self.row.get(field).ok_or_else(|| {
            Error::Generator(format!(
                "{}.{}: input field '{}' has not been generated",
                self.entity, self.field, field
            ))
        })
    }
}

/// Rule producing one value per call.
pub trait ValueGenerator: Send + Sync + fmt::Debug {
    fn id(&self) -> &'static str;

    /// SQL type of the values this generator produces.
    fn sql_type(&self) -> SqlType;

    /// Fields of the same row that must be generated before this one.
    fn inputs(&self) -> Vec<&str> {
        Vec::new()
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore)
    -> Result<Value, Error>;
}

pub(crate) fn pick<'a, T>(values: &'a [T], rng: &mut dyn RngCore) -> Option<&'a T> {
    if values.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..values.len());
    values.get(idx)
}
