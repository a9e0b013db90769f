use std::fmt;

use serde::{Deserialize, Serialize};

/// SQL-equivalent type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    Float,
    /// Arbitrary precision decimal, used for generated fractional numbers.
    Decimal,
    Boolean,
    /// Variable-length string with a maximum length.
    VarChar(usize),
    Text,
    Date,
    DateTime,
    Interval,
}

impl SqlType {
    pub fn as_sql(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Decimal => "DECIMAL".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({len})"),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Interval => "INTERVAL".to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::Float | SqlType::Decimal)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_sql())
    }
}

/// Arithmetic operators usable in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Comparison operators usable in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Methods callable on generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Upper,
    Lower,
    Trim,
    Length,
    /// `replace(from, to)` on text.
    Replace,
    /// `format(pattern)` on dates and timestamps, chrono strftime syntax.
    Format,
    /// `round(digits)` on numbers.
    Round,
    Abs,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::Trim => "trim",
            Method::Length => "length",
            Method::Replace => "replace",
            Method::Format => "format",
            Method::Round => "round",
            Method::Abs => "abs",
        }
    }

    /// Number of arguments the method expects.
    pub fn arity(&self) -> usize {
        match self {
            Method::Replace => 2,
            Method::Format | Method::Round => 1,
            _ => 0,
        }
    }
}

/// Target kinds for the `cast` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastTarget {
    Bool,
    Int,
    Float,
    Text,
}

impl CastTarget {
    pub fn sql_type(&self) -> SqlType {
        match self {
            CastTarget::Bool => SqlType::Boolean,
            CastTarget::Int => SqlType::Integer,
            CastTarget::Float => SqlType::Float,
            CastTarget::Text => SqlType::Text,
        }
    }
}
