//! Setores-related HTTP API.

use axum::extract::{FromRequestParts, Path, State};
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{Acknowledge, Valid, deleted, updated};
use crate::error::Result;
use crate::middleware::require_admin;
use crate::setor::{NewSetor, Setor, SetorMembers, SetorPatch, SetorPatchBody, SetorService};
use crate::{AppState, ServerError};

#[derive(Debug, Clone, Deserialize, FromRequestParts)]
#[from_request(via(Path), rejection(ServerError))]
pub struct SetorId(pub String);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create.layer(from_fn(require_admin))))
        .route(
            "/{setor_id}",
            get(handler)
                .patch(update.layer(from_fn(require_admin)))
                .delete(delete.layer(from_fn(require_admin))),
        )
}

async fn list(State(service): State<SetorService>) -> Result<Json<Vec<Setor>>> {
    Ok(Json(service.list().await?))
}

/// Setor with its members.
async fn handler(
    State(service): State<SetorService>,
    SetorId(setor_id): SetorId,
) -> Result<Json<SetorMembers>> {
    Ok(Json(service.get(&setor_id).await?))
}

async fn create(
    State(service): State<SetorService>,
    Valid(body): Valid<NewSetor>,
) -> Result<(StatusCode, Json<Setor>)> {
    Ok((StatusCode::CREATED, Json(service.create(&body).await?)))
}

async fn update(
    State(service): State<SetorService>,
    SetorId(setor_id): SetorId,
    Json(body): Json<SetorPatchBody>,
) -> Result<Json<Acknowledge>> {
    let patch = SetorPatch::try_from(body)?;
    service.update(&setor_id, &patch).await?;

    Ok(updated())
}

async fn delete(
    State(service): State<SetorService>,
    SetorId(setor_id): SetorId,
) -> Result<Json<Acknowledge>> {
    service.delete(&setor_id).await?;

    Ok(deleted())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use sqlx::{Pool, Postgres};

    use crate::router::users::tests::request_as;
    use crate::*;

    async fn send(state: &AppState, method: Method, path: &str, body: Value) -> (StatusCode, Value) {
        let response = make_request(Some(state), app(state.clone()), method, path, body.to_string()).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql", "../../fixtures/users.sql"))]
    async fn test_setor_lifecycle(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);

        let (status, created) = send(
            &state,
            Method::POST,
            "/setores",
            json!({ "name": "Financeiro", "qtd_users": 3, "lider": "Dora", "createdBy": "user-ana" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["nome"], "Financeiro");
        assert_eq!(created["quantidade"], 3);
        assert_eq!(created["created_by"], "user-ana");
        let setor_id = created["setor_id"].as_str().unwrap().to_owned();

        let (status, list) = send(&state, Method::GET, "/setores", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let names = list
            .as_array()
            .unwrap()
            .iter()
            .map(|setor| setor["nome"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Financeiro", "RH", "TI"]);

        let path = format!("/setores/{setor_id}");
        let (status, _) = send(&state, Method::PATCH, &path, json!({ "nome": "Finanças", "quantidade": 4 })).await;
        assert_eq!(status, StatusCode::OK);

        let (_, setor) = send(&state, Method::GET, &path, Value::Null).await;
        assert_eq!(setor["nome"], "Finanças");
        assert_eq!(setor["quantidade"], 4);
        assert_eq!(setor["lider"], "Dora");
        assert_eq!(setor["users"], json!([]));

        let (status, body) = send(&state, Method::DELETE, &path, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "deleted" }));

        let (status, _) = send(&state, Method::GET, &path, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql", "../../fixtures/users.sql"))]
    async fn test_setor_members(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);

        let (status, setor) = send(&state, Method::GET, "/setores/setor-ti", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(setor["setor_id"], "setor-ti");
        assert_eq!(setor["users"].as_array().unwrap().len(), 1);
        assert_eq!(setor["users"][0]["user_id"], "user-bruno");
        assert!(setor["users"][0].get("password").is_none());
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql"))]
    async fn test_setor_validation(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);

        let (status, _) = send(&state, Method::POST, "/setores", json!({ "nome": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::POST, "/setores", json!({ "nome": "X", "quantidade": -1 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::PATCH, "/setores/setor-rh", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::PATCH, "/setores/setor-rh", json!({ "quantidade": "many" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::PATCH, "/setores/unknown", json!({ "lider": "Eva" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, Method::DELETE, "/setores/unknown", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql"))]
    async fn test_writes_require_admin(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);

        assert_eq!(request_as(&state, "", Method::GET, "/setores", Value::Null).await, StatusCode::OK);
        assert_eq!(
            request_as(&state, "", Method::POST, "/setores", json!({ "nome": "Compras" })).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            request_as(&state, "", Method::DELETE, "/setores/setor-rh", Value::Null).await,
            StatusCode::FORBIDDEN
        );
    }
}
