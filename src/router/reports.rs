//! Reports-related HTTP API.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;
use crate::error::Result;
use crate::report::{Frequency, GroupBy, Page, PointsPage, ReportFilter, ReportQuery, Reports};

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /reports/points` goes to `points`.
        .route("/points", get(points))
        // `GET /reports/frequency` goes to `frequency`.
        .route("/frequency", get(frequency))
}

/// Handler of `GET /reports/points`.
async fn points(
    State(reports): State<Reports>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<PointsPage>> {
    let filter = ReportFilter::from_query(&query)?;
    let page = Page::from_query(&query);

    Ok(Json(reports.points(&filter, page).await?))
}

/// Handler of `GET /reports/frequency`.
async fn frequency(
    State(reports): State<Reports>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Frequency>> {
    let filter = ReportFilter::from_query(&query)?;
    let group_by = GroupBy::parse(query.group_by.as_deref())?;

    Ok(Json(reports.frequency(group_by, &filter).await?))
}
