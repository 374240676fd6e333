use axum::Json;
use axum::extract::State;

use super::PointId;
use crate::error::Result;
use crate::point::{ClockLedger, Point};

/// Handler of `GET /points`.
pub async fn list(State(ledger): State<ClockLedger>) -> Result<Json<Vec<Point>>> {
    Ok(Json(ledger.list().await?))
}

/// Handler of `GET /points/{id}`.
pub async fn handler(
    State(ledger): State<ClockLedger>,
    PointId(id): PointId,
) -> Result<Json<Point>> {
    Ok(Json(ledger.get(id).await?))
}
