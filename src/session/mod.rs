//! The unit-of-work boundary the persistence engine talks to.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::core::{ModelSchema, Result, Value};
use crate::model::Record;

pub mod memory;

pub use memory::InMemorySession;

/// A unit-of-work session.
///
/// Every call is blocking and is expected to surface its own failures; the
/// engine propagates them untouched.
pub trait Session {
    /// First row of `schema`'s table whose `column` equals `value`.
    fn query_first(
        &mut self,
        schema: &ModelSchema,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>>;

    /// Reattaches a detached record, returning the tracked image.
    fn merge(&mut self, schema: &ModelSchema, record: Record) -> Result<Record>;

    /// Starts tracking a record without writing it.
    fn add(&mut self, schema: &ModelSchema, record: Record) -> Result<Record>;

    fn flush(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;
}

/// Shared handle stored in factory options.
pub type SessionHandle = Arc<Mutex<dyn Session + Send>>;

/// Wraps a session so it can be handed to factory options while the caller
/// keeps a typed reference to it.
pub fn shared<S: Session + Send + 'static>(session: S) -> (Arc<Mutex<S>>, SessionHandle) {
    let typed = Arc::new(Mutex::new(session));
    let handle: SessionHandle = typed.clone();
    (typed, handle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOpKind {
    Query,
    Merge,
    Add,
    Flush,
    Commit,
    Rollback,
}

impl fmt::Display for SessionOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::Merge => "merge",
            Self::Add => "add",
            Self::Flush => "flush",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// One journaled session call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOp {
    Query {
        table: String,
        column: String,
        value: Value,
    },
    Merge {
        table: String,
    },
    Add {
        table: String,
    },
    Flush,
    Commit,
    Rollback,
}

impl SessionOp {
    pub fn kind(&self) -> SessionOpKind {
        match self {
            Self::Query { .. } => SessionOpKind::Query,
            Self::Merge { .. } => SessionOpKind::Merge,
            Self::Add { .. } => SessionOpKind::Add,
            Self::Flush => SessionOpKind::Flush,
            Self::Commit => SessionOpKind::Commit,
            Self::Rollback => SessionOpKind::Rollback,
        }
    }
}
