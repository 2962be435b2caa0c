pub mod error;
pub mod types;
pub mod value;

pub use error::{FactoryError, Result};
pub use types::{Column, ModelSchema, UniqueConstraint};
pub use value::{DataType, Value};
