use rand::{Rng, RngCore};
use rowsmith_core::{Error, SqlType, Value};
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_LOCALE;
use crate::generators::{GeneratorContext, ValueGenerator, pick};

const BLOOD_GROUPS: &[&str] = &["A", "B", "0", "AB"];
const RH_FACTORS: &[&str] = &["+", "-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// First name from the catalog, for a fixed or random gender.
#[derive(Debug, Clone, Default)]
pub struct RandomName {
    gender: Option<Gender>,
    locale: Option<String>,
}

impl RandomName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

impl ValueGenerator for RandomName {
    fn id(&self) -> &'static str {
        "random_name"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(15)
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let locale = match self.locale.as_deref() {
            Some(locale) if !locale.eq_ignore_ascii_case("default") => locale.to_string(),
            _ => {
                let locales: Vec<&str> = ctx.catalog.name_locales().collect();
                pick(&locales, rng).copied().unwrap_or(DEFAULT_LOCALE).to_string()
            }
        };
        let table = ctx.catalog.names(&locale).ok_or_else(|| {
            Error::Generator(format!("{}: no names for locale '{}'", self.id(), locale))
        })?;

        let gender = match self.gender {
            Some(gender) => gender,
            None if rng.random_bool(0.5) => Gender::Male,
            None => Gender::Female,
        };
        let names = match gender {
            Gender::Male => &table.male,
            Gender::Female => &table.female,
        };

        pick(names, rng)
            .map(|name| Value::Text(name.clone()))
            .ok_or_else(|| {
                Error::Generator(format!(
                    "{}: no {:?} names for locale '{}'",
                    self.id(),
                    gender,
                    locale
                ))
            })
    }
}

/// Country name in the requested locale.
#[derive(Debug, Clone, Default)]
pub struct CountryName {
    locale: Option<String>,
}

impl CountryName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locale(locale: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
        }
    }
}

impl ValueGenerator for CountryName {
    fn id(&self) -> &'static str {
        "country_name"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(50)
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let locale = match self.locale.as_deref() {
            Some(locale) if !locale.eq_ignore_ascii_case("default") => locale,
            _ => DEFAULT_LOCALE,
        };
        let countries = ctx.catalog.countries(locale).ok_or_else(|| {
            Error::Generator(format!("{}: unknown locale '{}'", self.id(), locale))
        })?;
        pick(&countries, rng)
            .map(|name| Value::Text(name.to_string()))
            .ok_or_else(|| Error::Generator(format!("{}: catalog has no countries", self.id())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CarBrand;

impl ValueGenerator for CarBrand {
    fn id(&self) -> &'static str {
        "car_brand"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(15)
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let brands = ctx.catalog.car_brands();
        pick(&brands, rng)
            .map(|brand| Value::Text(brand.to_string()))
            .ok_or_else(|| Error::Generator(format!("{}: catalog has no car brands", self.id())))
    }
}

/// Car model of the brand held in another field of the row, or of a random
/// brand that has models. Brands listed without models give `NULL`.
#[derive(Debug, Clone, Default)]
pub struct CarModel {
    brand_field: Option<String>,
}

impl CarModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_brand(field: impl Into<String>) -> Self {
        Self {
            brand_field: Some(field.into()),
        }
    }
}

impl ValueGenerator for CarModel {
    fn id(&self) -> &'static str {
        "car_model"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(25)
    }

    fn inputs(&self) -> Vec<&str> {
        self.brand_field.iter().map(String::as_str).collect()
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let brand = match &self.brand_field {
            Some(field) => {
                let value = ctx.input(field)?;
                value
                    .as_str()
                    .ok_or_else(|| {
                        Error::Generator(format!(
                            "{}: brand field '{}' holds a {} value",
                            self.id(),
                            field,
                            value.kind()
                        ))
                    })?
                    .to_string()
            }
            None => {
                let brands = ctx.catalog.car_brands_with_models();
                pick(&brands, rng)
                    .map(|brand| brand.to_string())
                    .ok_or_else(|| {
                        Error::Generator(format!("{}: catalog has no car models", self.id()))
                    })?
            }
        };

        let models = ctx.catalog.car_models(&brand).ok_or_else(|| {
            Error::Generator(format!("{}: unknown car brand '{}'", self.id(), brand))
        })?;
        // a known brand without models has no model to report
        Ok(pick(models, rng)
            .map(|model| Value::Text(model.clone()))
            .unwrap_or(Value::Null))
    }
}

/// ABO group plus Rh factor, e.g. `AB-`.
#[derive(Debug, Clone, Default)]
pub struct BloodType;

impl ValueGenerator for BloodType {
    fn id(&self) -> &'static str {
        "blood_type"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(3)
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let group = pick(BLOOD_GROUPS, rng).copied().unwrap_or("0");
        let rh = pick(RH_FACTORS, rng).copied().unwrap_or("+");
        Ok(Value::Text(format!("{group}{rh}")))
    }
}

/// Sixteen digit Luhn-valid card number in groups of four.
#[derive(Debug, Clone, Default)]
pub struct CreditCard;

impl ValueGenerator for CreditCard {
    fn id(&self) -> &'static str {
        "credit_card"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(19)
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let mut digits: Vec<u8> = (0..15).map(|_| rng.random_range(0..=9)).collect();
        digits.push(luhn_check_digit(&digits));

        let groups: Vec<String> = digits
            .chunks(4)
            .map(|chunk| chunk.iter().map(|digit| char::from(b'0' + digit)).collect())
            .collect();
        Ok(Value::Text(groups.join(" ")))
    }
}

/// Check digit that makes `payload` followed by it pass the Luhn test.
fn luhn_check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, digit)| {
            let digit = u32::from(*digit);
            if idx % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Dotted-quad address with octets in `0..=254`, never `0.0.0.0`.
#[derive(Debug, Clone, Default)]
pub struct Ipv4Address;

impl ValueGenerator for Ipv4Address {
    fn id(&self) -> &'static str {
        "ipv4_address"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(15)
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> Result<Value, Error> {
        let mut octets = [0_u8; 4];
        while octets == [0, 0, 0, 0] {
            for octet in &mut octets {
                *octet = rng.random_range(0..=254);
            }
        }
        Ok(Value::Text(format!(
            "{}.{}.{}.{}",
            octets[0], octets[1], octets[2], octets[3]
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_check_digit_matches_known_number() {
        // 4539 1488 0343 6467 is a well-known valid test number.
        let payload = [4, 5, 3, 9, 1, 4, 8, 8, 0, 3, 4, 3, 6, 4, 6];
        assert_eq!(luhn_check_digit(&payload), 7);
    }
}
