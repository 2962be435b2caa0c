// ============================================================================
// factory_persist
// ============================================================================
//
// Persistence strategies for object factories backed by a unit-of-work
// session. A factory resolves its options once, builds an unpersisted model
// instance, and lets the engine decide whether to add, merge, deduplicate,
// update in place, flush or commit it.
//
// ============================================================================

extern crate self as factory_persist;

pub mod core;
pub mod engine;
pub mod factory;
pub mod model;
pub mod options;
pub mod prelude;
pub mod session;

pub use crate::core::{Column, DataType, FactoryError, ModelSchema, Result, UniqueConstraint, Value};
pub use engine::{find_existing, persist, update_existing};
pub use factory::ModelFactory;
pub use factory_persist_derive::Model;
pub use model::{FieldValue, Model, ModelArgs, Record};
pub use options::{ConfigDiagnostic, FactoryOptions, OptionsLayer, PersistenceMode, Resolution};
pub use session::{InMemorySession, Session, SessionHandle, SessionOp, SessionOpKind};
