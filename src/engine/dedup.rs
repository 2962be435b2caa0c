use tracing::trace;

use crate::core::Result;
use crate::model::Model;
use crate::session::Session;

/// Looks up a persisted row sharing a unique column value with `candidate`.
///
/// Constraints are scanned in declaration order and columns within a
/// constraint in their declared order; each non-empty column value is queried
/// on its own and the first hit wins.
pub fn find_existing<M, S>(session: &mut S, candidate: &M) -> Result<Option<M>>
where
    M: Model,
    S: Session + ?Sized,
{
    let schema = M::schema();
    for constraint in schema.unique_constraints() {
        for column in constraint.columns() {
            let Some(value) = candidate.field(column) else {
                continue;
            };
            if !value.is_truthy() || !schema.has_column(column) {
                continue;
            }
            if let Some(row) = session.query_first(schema, column, &value)? {
                trace!(table = schema.table(), column = %column, "found existing row");
                return M::from_record(&row).map(Some);
            }
        }
    }
    Ok(None)
}
