//! Declared-field reflection for persistable models.
//!
//! The engine never walks a struct's runtime state. It only reads and writes
//! the columns a model lists in its [`ModelSchema`], which keeps transient
//! fields and bookkeeping out of deduplication and field merging.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::core::{DataType, FactoryError, ModelSchema, Result, Value};

/// A detached row image: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Value of `column`, treating a missing column as `NULL`.
    pub fn value(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Conversion between a Rust field type and a column [`Value`].
pub trait FieldValue: Sized {
    const DATA_TYPE: DataType;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: DataType, value: &Value) -> FactoryError {
    FactoryError::TypeMismatch(format!(
        "expected {}, got {}",
        expected,
        value.type_name()
    ))
}

impl FieldValue for i64 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch(Self::DATA_TYPE, &value))
    }
}

impl FieldValue for i32 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| mismatch(Self::DATA_TYPE, &value))
    }
}

impl FieldValue for u32 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| mismatch(Self::DATA_TYPE, &value))
    }
}

impl FieldValue for f64 {
    const DATA_TYPE: DataType = DataType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch(Self::DATA_TYPE, &value))
    }
}

impl FieldValue for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch(Self::DATA_TYPE, &value))
    }
}

impl FieldValue for String {
    const DATA_TYPE: DataType = DataType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(Self::DATA_TYPE, &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const DATA_TYPE: DataType = T::DATA_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Constructor arguments for a model: positional values bound in column
/// order, then keyword values bound by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelArgs {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl ModelArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &[(String, Value)] {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// A type the persistence engine can construct, inspect and persist.
///
/// Usually implemented with `#[derive(Model)]`.
pub trait Model: Clone + fmt::Debug + Sized {
    fn schema() -> &'static ModelSchema;

    /// Builds an unpersisted instance from constructor arguments.
    fn from_args(args: ModelArgs) -> Result<Self>;

    /// Current value of a declared column, `None` for undeclared names.
    fn field(&self, name: &str) -> Option<Value>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;

    fn from_record(record: &Record) -> Result<Self>;

    fn to_record(&self) -> Record {
        Self::schema()
            .field_names()
            .filter_map(|name| self.field(name).map(|value| (name, value)))
            .collect()
    }
}

/// Default-then-assign construction shared by derived models.
pub fn build_from_args<M: Model + Default>(args: ModelArgs) -> Result<M> {
    let schema = M::schema();
    let names: Vec<&str> = schema.field_names().collect();

    if args.positional.len() > names.len() {
        return Err(FactoryError::TooManyArguments {
            model: schema.table().to_string(),
            expected: names.len(),
            got: args.positional.len(),
        });
    }

    let mut instance = M::default();
    let mut bound = HashSet::new();

    for (name, value) in names.iter().zip(args.positional) {
        instance.set_field(name, value)?;
        bound.insert((*name).to_string());
    }

    for (name, value) in args.named {
        if !schema.has_column(&name) {
            return Err(FactoryError::UnknownField {
                model: schema.table().to_string(),
                field: name,
            });
        }
        if !bound.insert(name.clone()) {
            return Err(FactoryError::DuplicateArgument {
                model: schema.table().to_string(),
                field: name,
            });
        }
        instance.set_field(&name, value)?;
    }

    Ok(instance)
}

/// Rebuilds a model from a session row; columns the model doesn't declare are ignored.
pub fn build_from_record<M: Model + Default>(record: &Record) -> Result<M> {
    let schema = M::schema();
    let mut instance = M::default();
    for (name, value) in record.iter() {
        if schema.has_column(name) {
            instance.set_field(name, value.clone())?;
        }
    }
    Ok(instance)
}
