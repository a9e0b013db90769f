//! Composite expressions over the fields of a row.
//!
//! Expressions are plain data. They are evaluated by the entity generator
//! against the current row pass, so a field referenced from several
//! expressions is drawn once per row and every reference sees the same value.

use std::sync::Arc;

use rowsmith_core::{ArithmeticOp, CastTarget, CompareOp, Error, Method, SqlType, Value};

use crate::generators::ValueGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Average,
    Maximum,
    Minimum,
    Cast(CastTarget),
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Average => "average",
            Function::Maximum => "maximum",
            Function::Minimum => "minimum",
            Function::Cast(_) => "cast",
        }
    }

    pub fn apply(&self, args: &[Value]) -> Result<Value, Error> {
        match self {
            Function::Average => {
                if args.is_empty() {
                    return Err(Error::UnsupportedOperation(
                        "average() needs at least one argument".to_string(),
                    ));
                }
                let mut sum = 0.0;
                for arg in args {
                    sum += arg.as_f64().ok_or_else(|| {
                        Error::UnsupportedOperation(format!(
                            "average() not supported on {} value",
                            arg.kind()
                        ))
                    })?;
                }
                let mean = sum / args.len() as f64;
                if !mean.is_finite() {
                    return Err(Error::UnsupportedOperation(
                        "average() is out of range".to_string(),
                    ));
                }
                Ok(Value::Float(mean))
            }
            Function::Maximum => extreme(self.name(), CompareOp::Gt, args),
            Function::Minimum => extreme(self.name(), CompareOp::Lt, args),
            Function::Cast(target) => match args {
                [value] => value.cast(*target),
                _ => Err(Error::UnsupportedOperation(format!(
                    "cast() takes 1 argument, {} given",
                    args.len()
                ))),
            },
        }
    }
}

fn extreme(name: &str, op: CompareOp, args: &[Value]) -> Result<Value, Error> {
    let (first, rest) = args.split_first().ok_or_else(|| {
        Error::UnsupportedOperation(format!("{name}() needs at least one argument"))
    })?;
    let mut best = first;
    for candidate in rest {
        if candidate.compare(op, best)?.as_bool() == Some(true) {
            best = candidate;
        }
    }
    Ok(best.clone())
}

/// Expression tree node.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    /// Value of another field of the same row.
    Field(String),
    /// Fresh draw from a generator, not shared with any field.
    Generate(Arc<dyn ValueGenerator>),
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Attribute {
        target: Box<Expression>,
        name: String,
    },
    Call {
        target: Box<Expression>,
        method: Method,
        args: Vec<Expression>,
    },
    Function {
        function: Function,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Row fields the expression reads, directly or through generator inputs.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Field(name) => refs.push(name.as_str()),
            Expression::Generate(generator) => refs.extend(generator.inputs()),
            Expression::Arithmetic { lhs, rhs, .. } | Expression::Compare { lhs, rhs, .. } => {
                lhs.collect_refs(refs);
                rhs.collect_refs(refs);
            }
            Expression::Attribute { target, .. } => target.collect_refs(refs),
            Expression::Call { target, args, .. } => {
                target.collect_refs(refs);
                for arg in args {
                    arg.collect_refs(refs);
                }
            }
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.collect_refs(refs);
                }
            }
        }
    }

    /// SQL type of the values the expression produces. `resolve` maps a
    /// referenced field to its column type.
    pub fn sql_type(
        &self,
        resolve: &mut dyn FnMut(&str) -> Result<SqlType, Error>,
    ) -> Result<SqlType, Error> {
        match self {
            Expression::Literal(value) => value.sql_type(),
            Expression::Field(name) => resolve(name),
            Expression::Generate(generator) => Ok(generator.sql_type()),
            Expression::Arithmetic { op, lhs, rhs } => {
                let lhs_type = lhs.sql_type(resolve)?;
                let ty = match op {
                    ArithmeticOp::Div if lhs_type.is_numeric() => SqlType::Float,
                    ArithmeticOp::Sub
                        if matches!(lhs_type, SqlType::Date | SqlType::DateTime) =>
                    {
                        if rhs.sql_type(resolve)? == SqlType::Interval {
                            lhs_type
                        } else {
                            SqlType::Interval
                        }
                    }
                    ArithmeticOp::Add if matches!(lhs_type, SqlType::VarChar(_)) => SqlType::Text,
                    _ if lhs_type == SqlType::Integer => match rhs.sql_type(resolve)? {
                        widened @ (SqlType::Float | SqlType::Decimal | SqlType::Interval) => widened,
                        _ => lhs_type,
                    },
                    _ => lhs_type,
                };
                Ok(ty)
            }
            Expression::Compare { .. } => Ok(SqlType::Boolean),
            Expression::Attribute { name, .. } => Ok(match name.as_str() {
                "date" => SqlType::Date,
                _ => SqlType::Integer,
            }),
            Expression::Call { target, method, .. } => Ok(match method {
                Method::Length => SqlType::Integer,
                Method::Format | Method::Replace => SqlType::Text,
                Method::Upper | Method::Lower | Method::Trim | Method::Round | Method::Abs => {
                    target.sql_type(resolve)?
                }
            }),
            Expression::Function { function, args } => match function {
                Function::Cast(target) => Ok(target.sql_type()),
                Function::Average => Ok(SqlType::Float),
                Function::Maximum | Function::Minimum => match args.first() {
                    Some(first) => first.sql_type(resolve),
                    None => Err(Error::UnsupportedType(format!(
                        "{}() without arguments has no type",
                        function.name()
                    ))),
                },
            },
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

pub fn lit(value: impl Into<Value>) -> Expression {
    Expression::Literal(value.into())
}

pub fn field(name: impl Into<String>) -> Expression {
    Expression::Field(name.into())
}

/// Inline generator draw.
pub fn draw(generator: impl ValueGenerator + 'static) -> Expression {
    Expression::Generate(Arc::new(generator))
}

fn arithmetic(op: ArithmeticOp, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Arithmetic {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn compare(op: CompareOp, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Compare {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn add(lhs: Expression, rhs: Expression) -> Expression {
    arithmetic(ArithmeticOp::Add, lhs, rhs)
}

pub fn sub(lhs: Expression, rhs: Expression) -> Expression {
    arithmetic(ArithmeticOp::Sub, lhs, rhs)
}

pub fn mul(lhs: Expression, rhs: Expression) -> Expression {
    arithmetic(ArithmeticOp::Mul, lhs, rhs)
}

pub fn div(lhs: Expression, rhs: Expression) -> Expression {
    arithmetic(ArithmeticOp::Div, lhs, rhs)
}

pub fn eq(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Eq, lhs, rhs)
}

pub fn ne(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Ne, lhs, rhs)
}

pub fn lt(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Lt, lhs, rhs)
}

pub fn le(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Le, lhs, rhs)
}

pub fn gt(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Gt, lhs, rhs)
}

pub fn ge(lhs: Expression, rhs: Expression) -> Expression {
    compare(CompareOp::Ge, lhs, rhs)
}

pub fn attr(target: Expression, name: impl Into<String>) -> Expression {
    Expression::Attribute {
        target: Box::new(target),
        name: name.into(),
    }
}

pub fn call(target: Expression, method: Method, args: Vec<Expression>) -> Expression {
    Expression::Call {
        target: Box::new(target),
        method,
        args,
    }
}

pub fn apply(function: Function, args: Vec<Expression>) -> Expression {
    Expression::Function { function, args }
}

pub fn average(args: Vec<Expression>) -> Expression {
    apply(Function::Average, args)
}

pub fn maximum(args: Vec<Expression>) -> Expression {
    apply(Function::Maximum, args)
}

pub fn minimum(args: Vec<Expression>) -> Expression {
    apply(Function::Minimum, args)
}

pub fn cast(value: Expression, target: CastTarget) -> Expression {
    apply(Function::Cast(target), vec![value])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_and_minimum_pick_extremes() {
        let args = [Value::Int(3), Value::Float(7.5), Value::Int(-2)];
        assert_eq!(Function::Maximum.apply(&args).unwrap(), Value::Float(7.5));
        assert_eq!(Function::Minimum.apply(&args).unwrap(), Value::Int(-2));
    }

    #[test]
    fn average_rejects_text() {
        let err = Function::Average
            .apply(&[Value::Int(1), Value::from("x")])
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn average_of_huge_values_is_out_of_range() {
        let err = Function::Average
            .apply(&[Value::Float(f64::MAX), Value::Float(f64::MAX)])
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(message) if message.contains("out of range")));
    }

    #[test]
    fn field_refs_walk_the_whole_tree() {
        let expr = add(
            field("a"),
            call(field("b"), Method::Replace, vec![field("c"), lit("x")]),
        );
        assert_eq!(expr.field_refs(), vec!["a", "b", "c"]);
    }

    #[test]
    fn date_difference_is_an_interval() {
        let expr = sub(field("today"), field("birthday"));
        let mut resolve = |_: &str| -> Result<SqlType, Error> { Ok(SqlType::Date) };
        let ty = expr.sql_type(&mut resolve).expect("type");
        assert_eq!(ty, SqlType::Interval);
    }
}
