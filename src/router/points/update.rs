use axum::Json;
use axum::extract::State;

use super::PointId;
use crate::error::Result;
use crate::point::{ClockLedger, PatchBody, PointPatch};
use crate::router::{Acknowledge, updated};

/// Handler of `PATCH /points/{id}`.
pub async fn handler(
    State(ledger): State<ClockLedger>,
    PointId(id): PointId,
    Json(body): Json<PatchBody>,
) -> Result<Json<Acknowledge>> {
    let patch = PointPatch::try_from(body)?;
    ledger.update(id, &patch).await?;

    Ok(updated())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    use crate::point::{Point, PointStatus};
    use crate::*;

    async fn point_of(state: &AppState, user_id: &str, status: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM points WHERE user_id = $1 AND status = $2 ORDER BY id LIMIT 1")
            .bind(user_id)
            .bind(status)
            .fetch_one(&state.db.postgres)
            .await
            .unwrap()
    }

    #[sqlx::test(fixtures("../../../fixtures/users.sql", "../../../fixtures/points.sql"))]
    async fn test_update_handler(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let app = app(state.clone());
        let id = point_of(&state, "user-ana", "open").await;

        let body = json!({ "clock_out": "2024-02-01T08:00:00Z", "status": "closed" });
        let response = make_request(Some(&state), app, Method::PATCH, &format!("/points/{id}"), body.to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let point = sqlx::query_as::<_, point::PointRecord>(&format!(
            "SELECT {} FROM points p WHERE p.id = $1",
            point::POINT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&state.db.postgres)
        .await
        .unwrap();
        let point = Point::try_from(point).unwrap();
        assert_eq!(point.status, PointStatus::Closed);
        assert_eq!(point.clock_out.unwrap().to_rfc3339(), "2024-02-01T08:00:00+00:00");
    }

    #[sqlx::test(fixtures("../../../fixtures/users.sql", "../../../fixtures/points.sql"))]
    async fn test_update_validation(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let app = app(state.clone());
        let id = point_of(&state, "user-bruno", "close").await;

        // Stored clock_in is 2023-12-31T23:00:00Z.
        let body = json!({ "clock_out": "2023-12-31T22:00:00Z" });
        let response = make_request(Some(&state), app.clone(), Method::PATCH, &format!("/points/{id}"), body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json!({ "photo_in": "/etc/passwd" });
        let response = make_request(Some(&state), app.clone(), Method::PATCH, &format!("/points/{id}"), body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json!({ "status": "open" });
        let response = make_request(Some(&state), app, Method::PATCH, "/points/0", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(fixtures("../../../fixtures/users.sql", "../../../fixtures/points.sql"))]
    async fn test_reopen_conflict(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let id = point_of(&state, "user-ana", "close").await;

        // Ana already has an open point.
        let body = json!({ "status": "open" });
        let response = make_request(Some(&state), app(state.clone()), Method::PATCH, &format!("/points/{id}"), body.to_string()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
