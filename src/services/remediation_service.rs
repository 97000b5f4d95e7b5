//! Operator recovery resetting every match document to its baseline.

use tracing::{info, warn};

use crate::{
    dao::models::{MatchFields, MatchUpdate},
    error::ServiceError,
    services::batch_applier,
    state::SharedState,
};

/// Reset every match document to `status = open`, `visible = true`.
///
/// Intended for operator recovery only: the reset clobbers live and expired
/// matches alike. `confirmed` must be `true`, otherwise nothing is written.
/// Returns the number of documents updated.
pub async fn force_reset(state: &SharedState, confirmed: bool) -> Result<usize, ServiceError> {
    if !confirmed {
        return Err(ServiceError::InvalidInput(
            "force reset requires explicit confirmation".into(),
        ));
    }

    let store = state.require_match_store().await?;
    let ids = store.list_ids().await?;
    if ids.is_empty() {
        info!("force reset found no match documents");
        return Ok(0);
    }

    let updates = ids
        .into_iter()
        .map(|id| MatchUpdate::new(id, MatchFields::baseline()))
        .collect();
    let updated = batch_applier::commit(store.as_ref(), updates).await?;

    warn!(updated, "force reset restored every match to open and visible");
    Ok(updated)
}
