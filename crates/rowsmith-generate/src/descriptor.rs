use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use rowsmith_core::{Error, SqlType, Value};

use crate::expression::Expression;
use crate::generators::ValueGenerator;
use crate::template::EntityTemplate;

/// How a field obtains its value.
#[derive(Debug, Clone)]
pub enum FieldDescriptor {
    Literal(Value),
    Generated(Arc<dyn ValueGenerator>),
    AutoIncrement(AutoIncrement),
    /// Marks the wrapped field as a member of the entity's primary key.
    PrimaryKey(Box<FieldDescriptor>),
    ForeignKey(ForeignKey),
    /// The wrapped value is redrawn until it differs from every value the
    /// entity instance has produced for this field.
    Unique(Box<FieldDescriptor>),
    Expression {
        expr: Expression,
        sql_type: Option<SqlType>,
    },
}

impl FieldDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldDescriptor::Literal(_) => "literal",
            FieldDescriptor::Generated(_) => "generated",
            FieldDescriptor::AutoIncrement(_) => "auto_increment",
            FieldDescriptor::PrimaryKey(_) => "primary_key",
            FieldDescriptor::ForeignKey(_) => "foreign_key",
            FieldDescriptor::Unique(_) => "unique",
            FieldDescriptor::Expression { .. } => "expression",
        }
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self, FieldDescriptor::PrimaryKey(_))
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, FieldDescriptor::ForeignKey(_))
    }

    pub fn is_unique(&self) -> bool {
        match self {
            FieldDescriptor::Unique(_) => true,
            FieldDescriptor::PrimaryKey(inner) => inner.is_unique(),
            _ => false,
        }
    }

    pub(crate) fn is_key_marker(&self) -> bool {
        self.is_primary_key() || self.is_foreign_key()
    }
}

/// Sequence state shared by every template field that uses it.
#[derive(Debug, Clone)]
pub struct SharedCounter {
    next: Arc<AtomicI64>,
    step: i64,
}

impl SharedCounter {
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            next: Arc::new(AtomicI64::new(start)),
            step,
        }
    }

    pub fn next_value(&self) -> i64 {
        self.next.fetch_add(self.step, Ordering::Relaxed)
    }

    /// Value the next call to `next_value` will return.
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub enum CounterScope {
    /// Each entity generator keeps its own sequence.
    Instance,
    Shared(SharedCounter),
}

#[derive(Debug, Clone)]
pub struct AutoIncrement {
    pub start: i64,
    pub step: i64,
    pub scope: CounterScope,
}

/// Reference to primary key fields of another entity.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    target: Arc<EntityTemplate>,
    fields: Vec<String>,
}

impl ForeignKey {
    /// Every referenced field must be a primary key member of `target`.
    pub fn new(target: &Arc<EntityTemplate>, fields: &[&str]) -> Result<Self, Error> {
        if fields.is_empty() {
            return Err(Error::EmptyKey(format!(
                "foreign key to '{}' references no fields",
                target.name()
            )));
        }

        for field in fields {
            match target.descriptor(field) {
                None => {
                    return Err(Error::Integrity(format!(
                        "entity '{}' has no field '{}'",
                        target.name(),
                        field
                    )));
                }
                Some(descriptor) if !descriptor.is_primary_key() => {
                    return Err(Error::Integrity(format!(
                        "expected primary key for '{}.{}', got {}",
                        target.name(),
                        field,
                        descriptor.kind()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            target: Arc::clone(target),
            fields: fields.iter().map(|field| field.to_string()).collect(),
        })
    }

    pub fn target(&self) -> &Arc<EntityTemplate> {
        &self.target
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// Output columns for a foreign key stored under `field`, paired with the
    /// target field each one copies.
    pub fn columns(&self, field: &str) -> Vec<(String, &str)> {
        if self.is_composite() {
            self.fields
                .iter()
                .map(|target| (format!("{field}_{target}"), target.as_str()))
                .collect()
        } else {
            self.fields
                .iter()
                .map(|target| (field.to_string(), target.as_str()))
                .collect()
        }
    }
}

pub fn literal(value: impl Into<Value>) -> FieldDescriptor {
    FieldDescriptor::Literal(value.into())
}

pub fn generated(generator: impl ValueGenerator + 'static) -> FieldDescriptor {
    FieldDescriptor::Generated(Arc::new(generator))
}

/// Sequence starting at 1 with step 1, private to each entity generator.
pub fn auto_increment() -> FieldDescriptor {
    auto_increment_from(1, 1)
}

pub fn auto_increment_from(start: i64, step: i64) -> FieldDescriptor {
    FieldDescriptor::AutoIncrement(AutoIncrement {
        start,
        step,
        scope: CounterScope::Instance,
    })
}

pub fn shared_increment(counter: &SharedCounter) -> FieldDescriptor {
    FieldDescriptor::AutoIncrement(AutoIncrement {
        start: counter.peek(),
        step: counter.step,
        scope: CounterScope::Shared(counter.clone()),
    })
}

pub fn primary_key(inner: FieldDescriptor) -> FieldDescriptor {
    FieldDescriptor::PrimaryKey(Box::new(inner))
}

pub fn foreign_key(target: &Arc<EntityTemplate>, fields: &[&str]) -> Result<FieldDescriptor, Error> {
    ForeignKey::new(target, fields).map(FieldDescriptor::ForeignKey)
}

pub fn unique(inner: FieldDescriptor) -> FieldDescriptor {
    FieldDescriptor::Unique(Box::new(inner))
}

pub fn expression(expr: Expression) -> FieldDescriptor {
    FieldDescriptor::Expression {
        expr,
        sql_type: None,
    }
}

/// Expression with an explicit column type instead of the inferred one.
pub fn typed_expression(expr: Expression, sql_type: SqlType) -> FieldDescriptor {
    FieldDescriptor::Expression {
        expr,
        sql_type: Some(sql_type),
    }
}
