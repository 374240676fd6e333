use axum::Json;
use axum::extract::State;

use super::PointId;
use crate::error::Result;
use crate::point::ClockLedger;
use crate::router::{Acknowledge, deleted};

/// Handler of `DELETE /points/{id}`.
pub async fn handler(
    State(ledger): State<ClockLedger>,
    PointId(id): PointId,
) -> Result<Json<Acknowledge>> {
    ledger.delete(id).await?;

    Ok(deleted())
}
