//! Everything a factory definition usually needs.

pub use crate::{
    FactoryError, FieldValue, InMemorySession, Model, ModelArgs, ModelFactory, OptionsLayer,
    PersistenceMode, Result, Session, SessionHandle, Value,
};
pub use crate::session::shared;
