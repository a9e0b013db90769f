use fake::Fake;
use fake::faker::address::en::{CityName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::Word;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rowsmith_core::{Error, SqlType, Value};
use serde::{Deserialize, Serialize};

use crate::generators::{GeneratorContext, ValueGenerator};

/// Value families backed by the `fake` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FakerKind {
    FirstName,
    LastName,
    FullName,
    Email,
    Username,
    CompanyName,
    CityName,
    StreetName,
    PhoneNumber,
    Word,
}

impl FakerKind {
    pub fn id(&self) -> &'static str {
        match self {
            FakerKind::FirstName => "faker.first_name",
            FakerKind::LastName => "faker.last_name",
            FakerKind::FullName => "faker.full_name",
            FakerKind::Email => "faker.email",
            FakerKind::Username => "faker.username",
            FakerKind::CompanyName => "faker.company_name",
            FakerKind::CityName => "faker.city_name",
            FakerKind::StreetName => "faker.street_name",
            FakerKind::PhoneNumber => "faker.phone_number",
            FakerKind::Word => "faker.word",
        }
    }

    fn max_len(&self) -> usize {
        match self {
            FakerKind::FirstName | FakerKind::LastName | FakerKind::Word => 50,
            FakerKind::Username | FakerKind::PhoneNumber => 50,
            FakerKind::FullName | FakerKind::CityName | FakerKind::StreetName => 100,
            FakerKind::Email | FakerKind::CompanyName => 255,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Faker {
    kind: FakerKind,
}

impl Faker {
    pub fn new(kind: FakerKind) -> Self {
        Self { kind }
    }
}

impl ValueGenerator for Faker {
    fn id(&self) -> &'static str {
        self.kind.id()
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(self.kind.max_len())
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        // fake wants a sized rng; derive one from the dataset stream
        let mut fake_rng = ChaCha8Rng::seed_from_u64(rng.next_u64());
        let value: String = match self.kind {
            FakerKind::FirstName => FirstName().fake_with_rng(&mut fake_rng),
            FakerKind::LastName => LastName().fake_with_rng(&mut fake_rng),
            FakerKind::FullName => Name().fake_with_rng(&mut fake_rng),
            FakerKind::Email => SafeEmail().fake_with_rng(&mut fake_rng),
            FakerKind::Username => Username().fake_with_rng(&mut fake_rng),
            FakerKind::CompanyName => CompanyName().fake_with_rng(&mut fake_rng),
            FakerKind::CityName => CityName().fake_with_rng(&mut fake_rng),
            FakerKind::StreetName => StreetName().fake_with_rng(&mut fake_rng),
            FakerKind::PhoneNumber => PhoneNumber().fake_with_rng(&mut fake_rng),
            FakerKind::Word => Word().fake_with_rng(&mut fake_rng),
        };
        Ok(Value::Text(value))
    }
}
