//! Points-related HTTP API.
mod delete;
mod get;
mod toggle;
mod update;

use axum::extract::{FromRequestParts, Path};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::{AppState, ServerError};

/// Numeric point id taken from the path.
#[derive(Debug, Clone, Copy, Deserialize, FromRequestParts)]
#[from_request(via(Path), rejection(ServerError))]
pub struct PointId(pub i64);

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /points` goes to `toggle`, `GET /points` lists every point.
        .route("/", get(get::list).post(toggle::handler))
        .route(
            "/{id}",
            get(get::handler)
                .patch(update::handler)
                .delete(delete::handler),
        )
}
