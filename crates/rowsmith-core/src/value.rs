use std::cmp::Ordering;
use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::error::{Error, Result};
use crate::types::{ArithmeticOp, CastTarget, CompareOp, Method, SqlType};

/// Upper bound on the byte length of a repeated text value.
pub const MAX_TEXT_BYTES: usize = 1 << 20;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Generated value for a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Interval(TimeDelta),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Interval(_) => "interval",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Infer the SQL equivalent of a literal value.
    pub fn sql_type(&self) -> Result<SqlType> {
        match self {
            Value::Null => Err(Error::UnsupportedType(
                "null literal has no SQL equivalent".to_string(),
            )),
            Value::Bool(_) => Ok(SqlType::Boolean),
            Value::Int(_) => Ok(SqlType::Integer),
            Value::Float(_) => Ok(SqlType::Float),
            Value::Text(value) => Ok(SqlType::VarChar(value.chars().count())),
            Value::Date(_) => Ok(SqlType::Date),
            Value::Timestamp(_) => Ok(SqlType::DateTime),
            Value::Interval(_) => Ok(SqlType::Interval),
        }
    }

    /// Render the value as a SQL literal. NaN and infinities have no
    /// literal form.
    pub fn to_sql_literal(&self) -> Result<String> {
        let literal = match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Float(value) if !value.is_finite() => {
                return Err(Error::UnsupportedType(format!(
                    "float {value} has no SQL literal"
                )));
            }
            Value::Int(_) | Value::Float(_) => self.to_string(),
            Value::Text(_) | Value::Date(_) | Value::Timestamp(_) | Value::Interval(_) => {
                format!("'{}'", self.to_string().replace('\'', "''"))
            }
        };
        Ok(literal)
    }

    /// Stable string key used for uniqueness bookkeeping.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind(), self)
    }

    pub fn arithmetic(&self, op: ArithmeticOp, rhs: &Value) -> Result<Value> {
        use ArithmeticOp::{Add, Div, Mul, Sub};

        let value = match (self, op, rhs) {
            (Value::Int(a), _, Value::Int(b)) => match op {
                Add => a.checked_add(*b).map(Value::Int),
                Sub => a.checked_sub(*b).map(Value::Int),
                Mul => a.checked_mul(*b).map(Value::Int),
                Div => {
                    if *b == 0 {
                        return Err(division_by_zero());
                    }
                    Some(Value::Float(*a as f64 / *b as f64))
                }
            },
            (Value::Int(_) | Value::Float(_), _, Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (self.as_f64().unwrap_or_default(), rhs.as_f64().unwrap_or_default());
                let result = match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => {
                        if b == 0.0 {
                            return Err(division_by_zero());
                        }
                        a / b
                    }
                };
                result.is_finite().then_some(Value::Float(result))
            }
            (Value::Text(a), Add, Value::Text(b)) => Some(Value::Text(format!("{a}{b}"))),
            (Value::Text(text), Mul, Value::Int(times)) | (Value::Int(times), Mul, Value::Text(text)) => {
                let times = usize::try_from((*times).max(0)).unwrap_or(usize::MAX);
                text.len()
                    .checked_mul(times)
                    .filter(|len| *len <= MAX_TEXT_BYTES)
                    .map(|_| Value::Text(text.repeat(times)))
            }
            (Value::Date(a), Sub, Value::Date(b)) => Some(Value::Interval(a.signed_duration_since(*b))),
            (Value::Timestamp(a), Sub, Value::Timestamp(b)) => {
                Some(Value::Interval(a.signed_duration_since(*b)))
            }
            (Value::Date(date), Add, Value::Interval(delta))
            | (Value::Interval(delta), Add, Value::Date(date)) => {
                date.checked_add_signed(*delta).map(Value::Date)
            }
            (Value::Date(date), Sub, Value::Interval(delta)) => {
                date.checked_sub_signed(*delta).map(Value::Date)
            }
            (Value::Timestamp(ts), Add, Value::Interval(delta))
            | (Value::Interval(delta), Add, Value::Timestamp(ts)) => {
                ts.checked_add_signed(*delta).map(Value::Timestamp)
            }
            (Value::Timestamp(ts), Sub, Value::Interval(delta)) => {
                ts.checked_sub_signed(*delta).map(Value::Timestamp)
            }
            (Value::Interval(a), Add, Value::Interval(b)) => a.checked_add(b).map(Value::Interval),
            (Value::Interval(a), Sub, Value::Interval(b)) => a.checked_sub(b).map(Value::Interval),
            (Value::Interval(delta), Mul, Value::Int(factor))
            | (Value::Int(factor), Mul, Value::Interval(delta)) => interval_nanos(delta)
                .checked_mul(i128::from(*factor))
                .and_then(interval_from_nanos)
                .map(Value::Interval),
            (Value::Interval(delta), Div, Value::Int(divisor)) => {
                if *divisor == 0 {
                    return Err(division_by_zero());
                }
                interval_from_nanos(interval_nanos(delta) / i128::from(*divisor)).map(Value::Interval)
            }
            _ => {
                return Err(Error::UnsupportedOperation(format!(
                    "unsupported operand types for {}: {} and {}",
                    op.symbol(),
                    self.kind(),
                    rhs.kind()
                )));
            }
        };

        value.ok_or_else(|| {
            Error::UnsupportedOperation(format!(
                "{} {} {} is out of range",
                self,
                op.symbol(),
                rhs
            ))
        })
    }

    pub fn compare(&self, op: CompareOp, rhs: &Value) -> Result<Value> {
        let result = match (op, self.partial_order(rhs)) {
            (CompareOp::Eq, ordering) => ordering == Some(Ordering::Equal),
            (CompareOp::Ne, ordering) => ordering != Some(Ordering::Equal),
            (_, None) => {
                return Err(Error::UnsupportedOperation(format!(
                    "'{}' not supported between {} and {}",
                    op.symbol(),
                    self.kind(),
                    rhs.kind()
                )));
            }
            (CompareOp::Lt, Some(ordering)) => ordering == Ordering::Less,
            (CompareOp::Le, Some(ordering)) => ordering != Ordering::Greater,
            (CompareOp::Gt, Some(ordering)) => ordering == Ordering::Greater,
            (CompareOp::Ge, Some(ordering)) => ordering != Ordering::Less,
        };
        Ok(Value::Bool(result))
    }

    fn partial_order(&self, rhs: &Value) -> Option<Ordering> {
        match (self, rhs) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&rhs.as_f64()?)
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Interval(a), Value::Interval(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Read a named attribute of the value.
    pub fn attribute(&self, name: &str) -> Result<Value> {
        let value = match (self, name) {
            (Value::Date(date), _) => date_part(date, name).map(Value::Int),
            (Value::Timestamp(ts), "date") => Some(Value::Date(ts.date())),
            (Value::Timestamp(ts), "hour") => Some(Value::Int(ts.hour() as i64)),
            (Value::Timestamp(ts), "minute") => Some(Value::Int(ts.minute() as i64)),
            (Value::Timestamp(ts), "second") => Some(Value::Int(ts.second() as i64)),
            (Value::Timestamp(ts), _) => date_part(&ts.date(), name).map(Value::Int),
            (Value::Interval(delta), "days") => Some(Value::Int(delta.num_days())),
            (Value::Interval(delta), "hours") => Some(Value::Int(delta.num_hours())),
            (Value::Interval(delta), "minutes") => Some(Value::Int(delta.num_minutes())),
            (Value::Interval(delta), "seconds") => Some(Value::Int(delta.num_seconds())),
            (Value::Text(text), "length") => Some(Value::Int(text.chars().count() as i64)),
            _ => None,
        };

        value.ok_or_else(|| {
            Error::UnsupportedOperation(format!(
                "{} value has no attribute '{}'",
                self.kind(),
                name
            ))
        })
    }

    /// Call a method on the value.
    pub fn call(&self, method: Method, args: &[Value]) -> Result<Value> {
        if args.len() != method.arity() {
            return Err(Error::UnsupportedOperation(format!(
                "{}() takes {} argument(s), {} given",
                method.name(),
                method.arity(),
                args.len()
            )));
        }

        let value = match (method, self) {
            (Method::Upper, Value::Text(text)) => Some(Value::Text(text.to_uppercase())),
            (Method::Lower, Value::Text(text)) => Some(Value::Text(text.to_lowercase())),
            (Method::Trim, Value::Text(text)) => Some(Value::Text(text.trim().to_string())),
            (Method::Length, Value::Text(text)) => Some(Value::Int(text.chars().count() as i64)),
            (Method::Replace, Value::Text(text)) => match (&args[0], &args[1]) {
                (Value::Text(from), Value::Text(to)) => Some(Value::Text(text.replace(from, to))),
                _ => None,
            },
            (Method::Format, Value::Date(date)) => match &args[0] {
                Value::Text(pattern) => Some(Value::Text(format_with(pattern, |items| {
                    date.format_with_items(items).to_string_checked()
                })?)),
                _ => None,
            },
            (Method::Format, Value::Timestamp(ts)) => match &args[0] {
                Value::Text(pattern) => Some(Value::Text(format_with(pattern, |items| {
                    ts.format_with_items(items).to_string_checked()
                })?)),
                _ => None,
            },
            (Method::Round, Value::Float(number)) => match &args[0] {
                Value::Int(digits) => {
                    let digits = (*digits).clamp(0, 15) as i32;
                    let factor = 10_f64.powi(digits);
                    Some(Value::Float((number * factor).round() / factor))
                }
                _ => None,
            },
            (Method::Round, Value::Int(number)) => match &args[0] {
                Value::Int(_) => Some(Value::Int(*number)),
                _ => None,
            },
            (Method::Abs, Value::Int(number)) => number.checked_abs().map(Value::Int),
            (Method::Abs, Value::Float(number)) => Some(Value::Float(number.abs())),
            (Method::Abs, Value::Interval(delta)) => {
                Some(Value::Interval(if *delta < TimeDelta::zero() { -*delta } else { *delta }))
            }
            _ => None,
        };

        value.ok_or_else(|| {
            Error::UnsupportedOperation(format!(
                "{}() not supported on {} value",
                method.name(),
                self.kind()
            ))
        })
    }

    pub fn cast(&self, target: CastTarget) -> Result<Value> {
        let value = match (target, self) {
            (CastTarget::Text, Value::Text(_)) => Some(self.clone()),
            (CastTarget::Text, other) => Some(Value::Text(other.to_string())),
            (CastTarget::Int, Value::Int(_)) => Some(self.clone()),
            (CastTarget::Int, Value::Float(number)) if number.is_finite() => {
                Some(Value::Int(number.trunc() as i64))
            }
            (CastTarget::Int, Value::Bool(flag)) => Some(Value::Int(i64::from(*flag))),
            (CastTarget::Int, Value::Text(text)) => text.trim().parse().ok().map(Value::Int),
            (CastTarget::Float, Value::Int(_) | Value::Float(_)) => {
                self.as_f64().map(Value::Float)
            }
            (CastTarget::Float, Value::Text(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(Value::Float),
            (CastTarget::Bool, Value::Bool(_)) => Some(self.clone()),
            (CastTarget::Bool, Value::Int(number)) => Some(Value::Bool(*number != 0)),
            (CastTarget::Bool, Value::Text(text)) => match text.trim().to_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };

        value.ok_or_else(|| {
            Error::UnsupportedOperation(format!("cannot cast {} '{}' to {:?}", self.kind(), self, target))
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::Text(value) => f.write_str(value),
            Value::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Value::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Value::Interval(value) => {
                let nanos = interval_nanos(value);
                let sign = if nanos < 0 { "-" } else { "" };
                let nanos = nanos.unsigned_abs();
                let whole = nanos / NANOS_PER_SECOND as u128;
                let fraction = nanos % NANOS_PER_SECOND as u128;
                if fraction == 0 {
                    write!(f, "{sign}{whole} seconds")
                } else {
                    let digits = format!("{fraction:09}");
                    write!(f, "{sign}{whole}.{} seconds", digits.trim_end_matches('0'))
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

fn date_part(date: &NaiveDate, name: &str) -> Option<i64> {
    match name {
        "year" => Some(date.year() as i64),
        "month" => Some(date.month() as i64),
        "day" => Some(date.day() as i64),
        "weekday" => Some(date.weekday().num_days_from_monday() as i64),
        "ordinal" => Some(date.ordinal() as i64),
        _ => None,
    }
}

fn interval_nanos(delta: &TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SECOND + i128::from(delta.subsec_nanos())
}

fn interval_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    TimeDelta::new(seconds, subsec)
}

fn division_by_zero() -> Error {
    Error::UnsupportedOperation("division by zero".to_string())
}

/// Formats through chrono without panicking on invalid patterns.
fn format_with<F>(pattern: &str, render: F) -> Result<String>
where
    F: FnOnce(std::slice::Iter<'_, Item<'_>>) -> Option<String>,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::UnsupportedOperation(format!(
            "invalid format pattern '{pattern}'"
        )));
    }
    render(items.iter())
        .ok_or_else(|| Error::UnsupportedOperation(format!("failed to format with '{pattern}'")))
}

trait ToStringChecked {
    fn to_string_checked(&self) -> Option<String>;
}

impl<T: fmt::Display> ToStringChecked for T {
    fn to_string_checked(&self) -> Option<String> {
        let mut out = String::new();
        write!(out, "{self}").ok()?;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn integer_division_is_true_division() {
        let value = Value::Int(34).arithmetic(ArithmeticOp::Div, &Value::Int(11)).unwrap();
        assert_eq!(value, Value::Float(34.0 / 11.0));
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let err = Value::Int(1)
            .arithmetic(ArithmeticOp::Div, &Value::Int(0))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn date_difference_yields_interval_days() {
        let diff = Value::Date(date(2024, 3, 1))
            .arithmetic(ArithmeticOp::Sub, &Value::Date(date(2024, 2, 1)))
            .unwrap();
        assert_eq!(diff.attribute("days").unwrap(), Value::Int(29));
    }

    #[test]
    fn mismatched_operands_are_type_errors() {
        let err = Value::Text("a".to_string())
            .arithmetic(ArithmeticOp::Sub, &Value::Int(1))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported operand types for -"));
    }

    #[test]
    fn ordering_between_kinds_fails_but_equality_does_not() {
        let text = Value::Text("1".to_string());
        assert_eq!(text.compare(CompareOp::Eq, &Value::Int(1)).unwrap(), Value::Bool(false));
        assert!(text.compare(CompareOp::Lt, &Value::Int(1)).is_err());
        assert_eq!(
            Value::Int(2).compare(CompareOp::Gt, &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn literal_types_are_inferred() {
        assert_eq!(Value::Bool(true).sql_type().unwrap(), SqlType::Boolean);
        assert_eq!(Value::Int(3).sql_type().unwrap(), SqlType::Integer);
        assert_eq!(Value::Float(0.5).sql_type().unwrap(), SqlType::Float);
        assert_eq!(Value::from("abcd").sql_type().unwrap(), SqlType::VarChar(4));
        assert!(matches!(Value::Null.sql_type(), Err(Error::UnsupportedType(_))));
    }

    #[test]
    fn sql_literals_quote_text_and_escape_quotes() {
        assert_eq!(Value::from("O'Hara").to_sql_literal().unwrap(), "'O''Hara'");
        assert_eq!(Value::Int(7).to_sql_literal().unwrap(), "7");
        assert_eq!(Value::Bool(false).to_sql_literal().unwrap(), "FALSE");
        assert_eq!(
            Value::Date(date(2020, 1, 2)).to_sql_literal().unwrap(),
            "'2020-01-02'"
        );
    }

    #[test]
    fn huge_text_repetition_is_out_of_range() {
        let err = Value::from("ab")
            .arithmetic(ArithmeticOp::Mul, &Value::Int(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(message) if message.contains("out of range")));

        let repeated = Value::Int(3)
            .arithmetic(ArithmeticOp::Mul, &Value::from("ab"))
            .unwrap();
        assert_eq!(repeated, Value::from("ababab"));
        assert_eq!(
            Value::from("ab").arithmetic(ArithmeticOp::Mul, &Value::Int(-2)).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn float_overflow_is_out_of_range() {
        let err = Value::Float(1e300)
            .arithmetic(ArithmeticOp::Mul, &Value::Float(1e300))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(message) if message.contains("out of range")));
        assert!(Value::from("inf").cast(CastTarget::Float).is_err());
    }

    #[test]
    fn non_finite_floats_have_no_sql_literal() {
        assert!(matches!(
            Value::Float(f64::INFINITY).to_sql_literal(),
            Err(Error::UnsupportedType(_))
        ));
        assert!(Value::Float(f64::NAN).to_sql_literal().is_err());
        assert_eq!(Value::Float(2.5).to_sql_literal().unwrap(), "2.5");
    }

    #[test]
    fn interval_scaling_keeps_sub_millisecond_precision() {
        let delta = TimeDelta::new(1, 500_000).unwrap();
        let tripled = Value::Interval(delta)
            .arithmetic(ArithmeticOp::Mul, &Value::Int(3))
            .unwrap();
        assert_eq!(tripled, Value::Interval(TimeDelta::new(3, 1_500_000).unwrap()));

        let halved = Value::Interval(TimeDelta::new(1, 0).unwrap())
            .arithmetic(ArithmeticOp::Div, &Value::Int(-3))
            .unwrap();
        assert_eq!(halved, Value::Interval(-TimeDelta::new(0, 333_333_333).unwrap()));
    }

    #[test]
    fn intervals_render_fractional_seconds() {
        assert_eq!(Value::Interval(TimeDelta::new(90, 0).unwrap()).to_string(), "90 seconds");
        assert_eq!(
            Value::Interval(TimeDelta::new(1, 250_000_000).unwrap()).to_sql_literal().unwrap(),
            "'1.25 seconds'"
        );
        assert_eq!(
            Value::Interval(-TimeDelta::new(0, 500_000_000).unwrap()).to_string(),
            "-0.5 seconds"
        );
    }

    #[test]
    fn format_rejects_invalid_patterns() {
        let value = Value::Date(date(2020, 1, 2));
        let formatted = value
            .call(Method::Format, &[Value::from("%d/%m/%Y")])
            .unwrap();
        assert_eq!(formatted, Value::from("02/01/2020"));
        assert!(value.call(Method::Format, &[Value::from("%Q")]).is_err());
    }

    #[test]
    fn method_arity_is_checked() {
        let err = Value::from("abc").call(Method::Upper, &[Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("upper() takes 0 argument(s)"));
    }
}
