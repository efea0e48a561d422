use tracing::debug;

use super::{IdRegistry, NodeIds, QueryContext};
use crate::{
    error::{ProcessError, Result},
    progress::QueryBudget,
    source::get_numeric_attribute,
    types::NodeRecord,
};

/// Node weights read from `field`.
///
/// Features with a null id or a null weight are skipped; a negative weight
/// fails the query since Conefor rejects it.
pub fn run(
    ctx: &mut QueryContext,
    ids: &NodeIds,
    field: &str,
    budget: QueryBudget,
) -> Result<Vec<NodeRecord>> {
    let features = ctx.features();
    let step = budget.per_step(features.len());
    let mut registry = IdRegistry::new(ctx.layer.name());
    let mut records = Vec::with_capacity(features.len());

    for (ordinal, feature) in features.into_iter().enumerate() {
        ctx.check_cancelled()?;

        let id = ids.resolve(ctx.layer, feature, ordinal)?;
        let value = get_numeric_attribute::<f64>(ctx.layer, feature, field)?;

        match (id, value) {
            (Some(id), Some(value)) => {
                if value < 0.0 {
                    return Err(ProcessError::NegativeAttribute { id, value });
                }
                registry.register(id)?;
                records.push(NodeRecord { id, value });
            }
            _ => debug!("Feature {} has a null id or '{}', skipping", feature.fid, field),
        }

        ctx.advance(step);
    }

    Ok(records)
}
