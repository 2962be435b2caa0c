use super::{DataType, FactoryError, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(FactoryError::IntegrityViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(FactoryError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

/// A group of columns whose combined values must be distinct across a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    name: Option<String>,
    columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Table metadata for a model: ordered columns and unique constraints.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    table: String,
    columns: Vec<Column>,
    unique_constraints: Vec<UniqueConstraint>,
}

impl ModelSchema {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            columns,
            unique_constraints: Vec::new(),
        }
    }

    pub fn with_unique(mut self, constraint: UniqueConstraint) -> Self {
        self.unique_constraints.push(constraint);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Declared column names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|col| col.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|col| col.primary_key)
    }

    /// Unique constraints in declaration order.
    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }
}
