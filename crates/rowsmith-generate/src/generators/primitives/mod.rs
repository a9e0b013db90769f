use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rand::{Rng, RngCore};
use rowsmith_core::{Error, SqlType, Value};

use crate::generators::{GeneratorContext, ValueGenerator, pick};

pub const DEFAULT_CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Uniform integer in `[lb, ub]`.
#[derive(Debug, Clone)]
pub struct RandomInteger {
    lb: i64,
    ub: i64,
}

impl RandomInteger {
    pub fn new(lb: i64, ub: i64) -> Self {
        Self { lb, ub }
    }
}

impl ValueGenerator for RandomInteger {
    fn id(&self) -> &'static str {
        "random_integer"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::Integer
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, Error> {
        if self.lb > self.ub {
            return Err(Error::Generator(format!(
                "{}: lower bound {} is greater than upper bound {}",
                self.id(),
                self.lb,
                self.ub
            )));
        }
        Ok(Value::Int(rng.random_range(self.lb..=self.ub)))
    }
}

/// Uniform float in `[lb, ub]`.
#[derive(Debug, Clone)]
pub struct RandomFloat {
    lb: f64,
    ub: f64,
}

impl RandomFloat {
    pub fn new(lb: f64, ub: f64) -> Self {
        Self { lb, ub }
    }
}

impl ValueGenerator for RandomFloat {
    fn id(&self) -> &'static str {
        "random_float"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::Decimal
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, Error> {
        if !self.lb.is_finite() || !self.ub.is_finite() || self.lb > self.ub {
            return Err(Error::Generator(format!(
                "{}: invalid bounds [{}, {}]",
                self.id(),
                self.lb,
                self.ub
            )));
        }
        let unit: f64 = rng.random();
        Ok(Value::Float(self.lb + unit * (self.ub - self.lb)))
    }
}

/// Fixed-length string drawn from a symbol set.
#[derive(Debug, Clone)]
pub struct RandomString {
    length: usize,
    symbols: Vec<char>,
}

impl RandomString {
    pub fn new(length: usize) -> Self {
        Self::with_symbols(length, DEFAULT_CHARSET)
    }

    pub fn with_symbols(length: usize, symbols: &str) -> Self {
        Self {
            length,
            symbols: symbols.chars().collect(),
        }
    }
}

impl ValueGenerator for RandomString {
    fn id(&self) -> &'static str {
        "random_string"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(self.length)
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, Error> {
        if self.symbols.is_empty() {
            return Err(Error::Generator(format!(
                "{}: symbol set must not be empty",
                self.id()
            )));
        }
        let mut out = String::with_capacity(self.length);
        for _ in 0..self.length {
            if let Some(ch) = pick(&self.symbols, rng) {
                out.push(*ch);
            }
        }
        Ok(Value::Text(out))
    }
}

/// Timestamp in `[start, end]` at second resolution, optionally rendered
/// with a strftime pattern.
#[derive(Debug, Clone)]
pub struct RandomDateTime {
    start: NaiveDateTime,
    end: NaiveDateTime,
    format: Option<String>,
}

impl Default for RandomDateTime {
    fn default() -> Self {
        Self {
            start: NaiveDateTime::new(
                NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN),
                NaiveTime::MIN,
            ),
            end: NaiveDateTime::new(
                NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX),
                NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
            ),
            format: None,
        }
    }
}

impl RandomDateTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl ValueGenerator for RandomDateTime {
    fn id(&self) -> &'static str {
        "random_datetime"
    }

    fn sql_type(&self) -> SqlType {
        match self.format {
            Some(_) => SqlType::Text,
            None => SqlType::DateTime,
        }
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, Error> {
        if self.start > self.end {
            return Err(Error::Generator(format!(
                "{}: start {} is after end {}",
                self.id(),
                self.start,
                self.end
            )));
        }
        let span = (self.end - self.start).num_seconds();
        let offset = rng.random_range(0..=span);
        let value = TimeDelta::try_seconds(offset)
            .and_then(|delta| self.start.checked_add_signed(delta))
            .ok_or_else(|| Error::Generator(format!("{}: timestamp out of range", self.id())))?;

        match &self.format {
            Some(pattern) => Value::Timestamp(value).call(
                rowsmith_core::Method::Format,
                &[Value::Text(pattern.clone())],
            ),
            None => Ok(Value::Timestamp(value)),
        }
    }
}

/// Random version 4 UUID rendered as text.
#[derive(Debug, Clone, Default)]
pub struct UuidV4;

impl ValueGenerator for UuidV4 {
    fn id(&self) -> &'static str {
        "uuid_v4"
    }

    fn sql_type(&self) -> SqlType {
        SqlType::VarChar(36)
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, Error> {
        let mut bytes = [0_u8; 16];
        rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Value::Text(uuid.to_string()))
    }
}
