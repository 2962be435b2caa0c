use crate::core::Result;
use crate::model::Model;

/// Copies every declared column where `incoming` holds a truthy value that
/// differs from `existing`. Falsy incoming values never overwrite.
pub fn update_existing<M: Model>(mut existing: M, incoming: &M) -> Result<M> {
    for name in M::schema().field_names() {
        let Some(new_value) = incoming.field(name) else {
            continue;
        };
        if !new_value.is_truthy() {
            continue;
        }
        if existing.field(name).as_ref() != Some(&new_value) {
            existing.set_field(name, new_value)?;
        }
    }
    Ok(existing)
}
