//! A self-contained unit-of-work session backed by process memory.
//!
//! Rows move through three images: `current` (what the identity map hands
//! out), `flushed` (what queries can see) and `committed` (what survives a
//! rollback). Every call is journaled so callers can assert on exactly which
//! operations a persistence strategy performed.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::{Session, SessionOp, SessionOpKind};
use crate::core::{DataType, FactoryError, ModelSchema, Result, Value};
use crate::model::Record;

#[derive(Debug, Clone)]
struct Entry {
    current: Record,
    flushed: Option<Record>,
    committed: Option<Record>,
}

impl Entry {
    fn pending(record: Record) -> Self {
        Self {
            current: record,
            flushed: None,
            committed: None,
        }
    }

    fn is_dirty(&self) -> bool {
        self.flushed.as_ref() != Some(&self.current)
    }
}

#[derive(Debug)]
struct Table {
    schema: ModelSchema,
    entries: Vec<Entry>,
    next_key: i64,
}

impl Table {
    fn new(schema: &ModelSchema) -> Self {
        Self {
            schema: schema.clone(),
            entries: Vec::new(),
            next_key: 0,
        }
    }

    fn identity_index(&self, record: &Record) -> Option<usize> {
        let pk = self.schema.primary_key()?;
        let key = record.value(&pk.name);
        if key.is_null() {
            return None;
        }
        self.entries
            .iter()
            .position(|entry| entry.current.value(&pk.name) == key)
    }

    fn assign_key(&mut self, record: &mut Record) -> Result<()> {
        let Some(pk) = self.schema.primary_key() else {
            return Ok(());
        };
        match record.value(&pk.name) {
            Value::Null if pk.data_type == DataType::Integer => {
                self.next_key = self.next_key.checked_add(1).ok_or_else(|| {
                    FactoryError::IntegrityViolation(format!(
                        "primary key sequence exhausted on table '{}'",
                        self.schema.table()
                    ))
                })?;
                record.set(pk.name.clone(), self.next_key);
            }
            Value::Integer(explicit) => self.next_key = self.next_key.max(explicit),
            _ => {}
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for entry in self.entries.iter().filter(|entry| entry.is_dirty()) {
            for column in self.schema.columns() {
                column.validate(&entry.current.value(&column.name))?;
            }
        }

        if let Some(pk) = self.schema.primary_key() {
            self.ensure_distinct(std::slice::from_ref(&pk.name), "primary key")?;
        }
        for constraint in self.schema.unique_constraints() {
            let label = match constraint.name() {
                Some(name) => format!("unique constraint '{}'", name),
                None => "unique constraint".to_string(),
            };
            self.ensure_distinct(constraint.columns(), &label)?;
        }
        Ok(())
    }

    fn ensure_distinct(&self, columns: &[String], label: &str) -> Result<()> {
        let mut seen: Vec<Vec<Value>> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let key: Vec<Value> = columns.iter().map(|c| entry.current.value(c)).collect();
            if key.iter().any(Value::is_null) {
                continue;
            }
            if seen.contains(&key) {
                let shown = key
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(FactoryError::IntegrityViolation(format!(
                    "duplicate ({}) = ({}) violates {} on table '{}'",
                    columns.join(", "),
                    shown,
                    label,
                    self.schema.table()
                )));
            }
            seen.push(key);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct InMemorySession {
    tables: HashMap<String, Table>,
    ops: Vec<SessionOp>,
    faults: HashSet<SessionOpKind>,
    autoflush: bool,
    commit_count: usize,
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySession {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            ops: Vec::new(),
            faults: HashSet::new(),
            autoflush: true,
            commit_count: 0,
        }
    }

    /// Whether queries flush pending changes first. Enabled by default.
    pub fn with_autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }

    pub fn ops(&self) -> &[SessionOp] {
        &self.ops
    }

    pub fn op_kinds(&self) -> Vec<SessionOpKind> {
        self.ops.iter().map(SessionOp::kind).collect()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    /// Makes the next call of `kind` fail with [`FactoryError::SessionFailure`].
    pub fn fail_next(&mut self, kind: SessionOpKind) {
        self.faults.insert(kind);
    }

    /// Rows as the identity map currently holds them, including pending ones.
    pub fn tracked_rows(&self, table: &str) -> Vec<Record> {
        self.rows_by(table, |entry| Some(&entry.current))
    }

    pub fn flushed_rows(&self, table: &str) -> Vec<Record> {
        self.rows_by(table, |entry| entry.flushed.as_ref())
    }

    pub fn committed_rows(&self, table: &str) -> Vec<Record> {
        self.rows_by(table, |entry| entry.committed.as_ref())
    }

    /// Discards everything not yet committed.
    pub fn rollback(&mut self) -> Result<()> {
        self.begin(SessionOp::Rollback)?;
        for table in self.tables.values_mut() {
            table.entries.retain(|entry| entry.committed.is_some());
            for entry in &mut table.entries {
                if let Some(committed) = &entry.committed {
                    entry.current = committed.clone();
                    entry.flushed = Some(committed.clone());
                }
            }
        }
        Ok(())
    }

    fn rows_by<F>(&self, table: &str, image: F) -> Vec<Record>
    where
        F: Fn(&Entry) -> Option<&Record>,
    {
        self.tables
            .get(table)
            .map(|t| t.entries.iter().filter_map(&image).cloned().collect())
            .unwrap_or_default()
    }

    fn begin(&mut self, op: SessionOp) -> Result<()> {
        let kind = op.kind();
        self.ops.push(op);
        if self.faults.remove(&kind) {
            return Err(FactoryError::SessionFailure {
                operation: kind,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn table_mut(&mut self, schema: &ModelSchema) -> &mut Table {
        self.tables
            .entry(schema.table().to_string())
            .or_insert_with(|| Table::new(schema))
    }

    /// Validates every table before touching any, so a failed flush leaves
    /// all flushed images as they were.
    fn flush_pending(&mut self) -> Result<()> {
        for table in self.tables.values() {
            table.validate()?;
        }
        for (name, table) in self.tables.iter_mut() {
            let mut written = 0usize;
            for entry in table.entries.iter_mut().filter(|entry| entry.is_dirty()) {
                entry.flushed = Some(entry.current.clone());
                written += 1;
            }
            if written > 0 {
                trace!(table = %name, rows = written, "flushed rows");
            }
        }
        Ok(())
    }
}

impl Session for InMemorySession {
    fn query_first(
        &mut self,
        schema: &ModelSchema,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>> {
        self.begin(SessionOp::Query {
            table: schema.table().to_string(),
            column: column.to_string(),
            value: value.clone(),
        })?;
        if self.autoflush {
            self.flush_pending()?;
        }

        let Some(table) = self.tables.get(schema.table()) else {
            return Ok(None);
        };
        Ok(table
            .entries
            .iter()
            .find(|entry| {
                entry
                    .flushed
                    .as_ref()
                    .is_some_and(|image| image.value(column) == *value)
            })
            .map(|entry| entry.current.clone()))
    }

    fn merge(&mut self, schema: &ModelSchema, record: Record) -> Result<Record> {
        self.begin(SessionOp::Merge {
            table: schema.table().to_string(),
        })?;
        let table = self.table_mut(schema);

        if let Some(idx) = table.identity_index(&record) {
            let entry = &mut table.entries[idx];
            for (column, value) in record.iter() {
                entry.current.set(column, value.clone());
            }
            return Ok(entry.current.clone());
        }

        let mut record = record;
        table.assign_key(&mut record)?;
        table.entries.push(Entry::pending(record.clone()));
        Ok(record)
    }

    fn add(&mut self, schema: &ModelSchema, record: Record) -> Result<Record> {
        self.begin(SessionOp::Add {
            table: schema.table().to_string(),
        })?;
        let table = self.table_mut(schema);
        let mut record = record;
        table.assign_key(&mut record)?;
        table.entries.push(Entry::pending(record.clone()));
        Ok(record)
    }

    fn flush(&mut self) -> Result<()> {
        self.begin(SessionOp::Flush)?;
        self.flush_pending()
    }

    fn commit(&mut self) -> Result<()> {
        self.begin(SessionOp::Commit)?;
        self.flush_pending()?;
        for table in self.tables.values_mut() {
            for entry in &mut table.entries {
                entry.committed = entry.flushed.clone();
            }
        }
        self.commit_count += 1;
        trace!(commits = self.commit_count, "committed session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, UniqueConstraint};

    fn schema() -> ModelSchema {
        ModelSchema::new(
            "person",
            vec![
                Column::new("id", DataType::Integer).primary_key(),
                Column::new("name", DataType::Text).not_null(),
                Column::new("email", DataType::Text),
            ],
        )
        .with_unique(UniqueConstraint::new(["email"]))
    }

    fn person(name: &str, email: &str) -> Record {
        Record::new()
            .with("id", Value::Null)
            .with("name", name)
            .with("email", email)
    }

    #[test]
    fn test_add_assigns_keys_and_commit_makes_rows_durable() {
        let schema = schema();
        let mut session = InMemorySession::new();

        let first = session.add(&schema, person("Alice", "a@x.com")).unwrap();
        let second = session.add(&schema, person("Bob", "b@x.com")).unwrap();
        assert_eq!(first.value("id"), Value::Integer(1));
        assert_eq!(second.value("id"), Value::Integer(2));
        assert!(session.flushed_rows("person").is_empty());

        session.commit().unwrap();
        assert_eq!(session.committed_rows("person").len(), 2);
        assert_eq!(session.commit_count(), 1);
    }

    #[test]
    fn test_exhausted_key_sequence_is_an_integrity_violation() {
        let schema = schema();
        let mut session = InMemorySession::new();

        let last = person("Max", "max@x.com").with("id", i64::MAX);
        session.add(&schema, last).unwrap();

        let err = session
            .add(&schema, person("Next", "next@x.com"))
            .unwrap_err();
        assert!(matches!(err, FactoryError::IntegrityViolation(msg) if msg.contains("person")));
        assert_eq!(session.tracked_rows("person").len(), 1);

        let err = session
            .merge(&schema, person("Other", "other@x.com"))
            .unwrap_err();
        assert!(matches!(err, FactoryError::IntegrityViolation(_)));
    }

    #[test]
    fn test_merge_updates_tracked_row_with_same_key() {
        let schema = schema();
        let mut session = InMemorySession::new();
        session.add(&schema, person("Alice", "a@x.com")).unwrap();
        session.commit().unwrap();

        let merged = session
            .merge(&schema, person("Alicia", "a@x.com").with("id", 1))
            .unwrap();
        assert_eq!(merged.value("name"), Value::from("Alicia"));
        assert_eq!(session.tracked_rows("person").len(), 1);
        assert_eq!(
            session.committed_rows("person")[0].value("name"),
            Value::from("Alice")
        );
    }

    #[test]
    fn test_flush_rejects_duplicates_without_partial_writes() {
        let schema = schema();
        let mut session = InMemorySession::new();
        session.add(&schema, person("Alice", "a@x.com")).unwrap();
        session.flush().unwrap();

        session.add(&schema, person("Other", "a@x.com")).unwrap();
        let err = session.flush().unwrap_err();
        assert!(matches!(err, FactoryError::IntegrityViolation(_)));
        assert_eq!(session.flushed_rows("person").len(), 1);
    }

    #[test]
    fn test_flush_validates_columns() {
        let schema = schema();
        let mut session = InMemorySession::new();
        session
            .add(&schema, Record::new().with("email", "c@x.com"))
            .unwrap();
        let err = session.flush().unwrap_err();
        assert!(matches!(err, FactoryError::IntegrityViolation(msg) if msg.contains("name")));
    }

    #[test]
    fn test_query_sees_flushed_rows_only_without_autoflush() {
        let schema = schema();
        let mut session = InMemorySession::new().with_autoflush(false);
        session.add(&schema, person("Alice", "a@x.com")).unwrap();

        let email = Value::from("a@x.com");
        assert!(session.query_first(&schema, "email", &email).unwrap().is_none());

        session.flush().unwrap();
        let found = session.query_first(&schema, "email", &email).unwrap().unwrap();
        assert_eq!(found.value("name"), Value::from("Alice"));
    }

    #[test]
    fn test_rollback_discards_uncommitted_state() {
        let schema = schema();
        let mut session = InMemorySession::new();
        session.add(&schema, person("Alice", "a@x.com")).unwrap();
        session.commit().unwrap();
        session.add(&schema, person("Bob", "b@x.com")).unwrap();
        session
            .merge(&schema, person("Changed", "a@x.com").with("id", 1))
            .unwrap();
        session.flush().unwrap();

        session.rollback().unwrap();
        let rows = session.tracked_rows("person");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("name"), Value::from("Alice"));
    }

    #[test]
    fn test_injected_failure_is_one_shot_and_journaled() {
        let schema = schema();
        let mut session = InMemorySession::new();
        session.fail_next(SessionOpKind::Commit);

        let err = session.commit().unwrap_err();
        assert!(matches!(
            err,
            FactoryError::SessionFailure {
                operation: SessionOpKind::Commit,
                ..
            }
        ));
        session.commit().unwrap();
        session.add(&schema, person("Alice", "a@x.com")).unwrap();

        assert_eq!(
            session.op_kinds(),
            vec![SessionOpKind::Commit, SessionOpKind::Commit, SessionOpKind::Add]
        );
    }
}
