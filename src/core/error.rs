use thiserror::Error;

use crate::session::SessionOpKind;

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("{factory}.session_persistence must be one of [{allowed}], got {value:?}")]
    InvalidPersistenceMode {
        factory: String,
        value: String,
        allowed: String,
    },

    #[error("No session provided for factory '{0}'")]
    MissingSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("'{field}' is not a field of model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("Model '{model}' got multiple values for field '{field}'")]
    DuplicateArgument { model: String, field: String },

    #[error("Model '{model}' takes at most {expected} positional arguments, got {got}")]
    TooManyArguments {
        model: String,
        expected: usize,
        got: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Session {operation} failed: {message}")]
    SessionFailure {
        operation: SessionOpKind,
        message: String,
    },

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, FactoryError>;

impl<T> From<std::sync::PoisonError<T>> for FactoryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for FactoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for FactoryError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
