use std::marker::PhantomData;

use crate::core::Result;
use crate::engine;
use crate::model::{Model, ModelArgs};
use crate::options::{FactoryOptions, Resolution};

/// Binds resolved options to a model type.
///
/// ```
/// use factory_persist::{InMemorySession, Model, ModelArgs, ModelFactory, OptionsLayer, PersistenceMode, session};
///
/// #[derive(Debug, Clone, Default, Model)]
/// struct Person {
///     #[column(primary_key)]
///     id: Option<i64>,
///     name: String,
///     #[column(unique)]
///     email: String,
/// }
///
/// # fn main() -> factory_persist::Result<()> {
/// let (_, handle) = session::shared(InMemorySession::new());
/// let options = OptionsLayer::new()
///     .session(handle)
///     .persistence(PersistenceMode::GetOrAdd)
///     .resolve("PersonFactory")?;
/// let factory = ModelFactory::<Person>::new(options.into_options());
///
/// let person = factory.create(ModelArgs::new().kwarg("name", "Ada").kwarg("email", "ada@x.com"))?;
/// assert_eq!(person.id, Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ModelFactory<M> {
    options: FactoryOptions,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelFactory<M> {
    pub fn new(options: FactoryOptions) -> Self {
        Self {
            options,
            _model: PhantomData,
        }
    }

    /// Logs any resolution diagnostics and builds the factory.
    pub fn from_resolution(resolution: Resolution) -> Self {
        resolution.log_diagnostics();
        Self::new(resolution.into_options())
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    /// Builds and persists an instance.
    pub fn create(&self, args: ModelArgs) -> Result<M> {
        engine::persist(&self.options, args)
    }

    /// Builds an instance without touching the session.
    pub fn build(&self, args: ModelArgs) -> Result<M> {
        M::from_args(args)
    }
}
