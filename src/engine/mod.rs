//! The persistence decision engine.
//!
//! Given resolved [`FactoryOptions`] and constructor arguments, [`persist`]
//! builds a model instance and hands it to the configured session strategy.
//! Session failures are returned exactly as the session reported them.

use tracing::debug;

use crate::core::{FactoryError, Result};
use crate::model::{Model, ModelArgs, Record};
use crate::options::{FactoryOptions, PersistenceMode};
use crate::session::Session;

mod dedup;
mod field_merge;

pub use dedup::find_existing;
pub use field_merge::update_existing;

/// Builds an `M` from `args` and persists it according to `options`.
///
/// The returned instance is either the one just built (possibly refreshed
/// with session-assigned keys) or a pre-existing row found through a unique
/// constraint.
pub fn persist<M: Model>(options: &FactoryOptions, args: ModelArgs) -> Result<M> {
    let mode = options.effective_mode();
    let handle = options
        .session()
        .ok_or_else(|| FactoryError::MissingSession(options.factory_name().to_string()))?;

    let instance = M::from_args(args)?;
    let schema = M::schema();
    debug!(
        factory = options.factory_name(),
        table = schema.table(),
        mode = mode.map(|m| m.as_str()).unwrap_or("none"),
        "persisting instance"
    );

    let Some(mode) = mode else {
        return Ok(instance);
    };

    let mut guard = handle.lock()?;
    let session = &mut *guard;

    match mode {
        PersistenceMode::Merge => {
            let merged = session.merge(schema, instance.to_record())?;
            session.commit()?;
            M::from_record(&merged)
        }
        PersistenceMode::CheckAndMerge => {
            check_and_merge(session, instance, options.update_existing())
        }
        PersistenceMode::GetOrAdd => get_or_add(session, instance),
        PersistenceMode::Flush => {
            session.flush()?;
            Ok(instance)
        }
        PersistenceMode::Commit => {
            session.commit()?;
            Ok(instance)
        }
        PersistenceMode::Add => {
            let tracked = session.add(schema, instance.to_record())?;
            refresh(instance, &tracked)
        }
    }
}

fn check_and_merge<M, S>(session: &mut S, instance: M, update: bool) -> Result<M>
where
    M: Model,
    S: Session + ?Sized,
{
    let schema = M::schema();
    match find_existing(session, &instance)? {
        Some(existing) if update => {
            debug!(table = schema.table(), "refreshing existing row");
            let updated = update_existing(existing, &instance)?;
            let merged = session.merge(schema, updated.to_record())?;
            session.flush()?;
            M::from_record(&merged)
        }
        Some(existing) => {
            debug!(table = schema.table(), "reusing existing row");
            Ok(existing)
        }
        None => {
            let merged = session.merge(schema, instance.to_record())?;
            session.flush()?;
            M::from_record(&merged)
        }
    }
}

fn get_or_add<M, S>(session: &mut S, instance: M) -> Result<M>
where
    M: Model,
    S: Session + ?Sized,
{
    let schema = M::schema();
    match find_existing(session, &instance)? {
        Some(existing) => {
            debug!(table = schema.table(), "reusing existing row");
            session.merge(schema, existing.to_record())?;
            Ok(existing)
        }
        None => {
            let tracked = session.add(schema, instance.to_record())?;
            session.commit()?;
            refresh(instance, &tracked)
        }
    }
}

/// Applies session-assigned column values to the caller's instance, keeping
/// its undeclared fields intact.
fn refresh<M: Model>(mut instance: M, tracked: &Record) -> Result<M> {
    for name in M::schema().field_names() {
        if let Some(value) = tracked.get(name) {
            if instance.field(name).as_ref() != Some(value) {
                instance.set_field(name, value.clone())?;
            }
        }
    }
    Ok(instance)
}
