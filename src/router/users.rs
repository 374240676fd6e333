//! Users-related HTTP API.

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
use crate::user::{NewUser, User, UserPatch, UserPatchBody, UserService};
use crate::{AppState, ServerError};

#[derive(Debug, Clone, Deserialize, FromRequestParts)]
#[from_request(via(Path), rejection(ServerError))]
pub struct UserId(pub String);

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /users` lists users, `POST /users` creates one. Admin only.
        .route("/", get(list).post(create.layer(from_fn(require_admin))))
        // `PATCH` and `DELETE /users/{user_id}` are admin only.
        .route(
            "/{user_id}",
            get(handler)
                .patch(update.layer(from_fn(require_admin)))
                .delete(delete.layer(from_fn(require_admin))),
        )
}

async fn list(State(service): State<UserService>) -> Result<Json<Vec<User>>> {
    Ok(Json(service.list().await?))
}

async fn handler(
    State(service): State<UserService>,
    UserId(user_id): UserId,
) -> Result<Json<User>> {
    Ok(Json(service.get(&user_id).await?))
}

async fn create(
    State(service): State<UserService>,
    Valid(body): Valid<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = service.create(&body).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    State(service): State<UserService>,
    UserId(user_id): UserId,
    Json(body): Json<UserPatchBody>,
) -> Result<Json<Acknowledge>> {
    let patch = UserPatch::try_from(body)?;
    service.update(&user_id, patch).await?;

    Ok(updated())
}

async fn delete(
    State(service): State<UserService>,
    UserId(user_id): UserId,
) -> Result<Json<Acknowledge>> {
    service.delete(&user_id).await?;

    Ok(deleted())
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use sqlx::{Pool, Postgres};
    use tower::util::ServiceExt;

    use crate::*;

    /// Send `body` as a caller holding `role`.
    pub(crate) async fn request_as(
        state: &AppState,
        role: &str,
        method: Method,
        path: &str,
        body: Value,
    ) -> StatusCode {
        let token = state.token.create("user-bruno", "bruno", role).unwrap();

        app(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    async fn json_of(response: axum::http::Response<Body>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql"))]
    async fn test_create_handler(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let body = json!({
            "name": "Eva Lima",
            "username": "eva",
            "email": "eva@example.com",
            "password": "s3cret!",
            "setor": "setor-rh",
            "cargo": "Analista",
        });

        let response = make_request(Some(&state), app(state.clone()), Method::POST, "/users", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let user = json_of(response).await;
        assert_eq!(user["username"], "eva");
        assert_eq!(user["setor_id"], "setor-rh");
        assert_eq!(user["status"], "active");
        assert!(user.get("password").is_none());
        assert!(uuid::Uuid::parse_str(user["user_id"].as_str().unwrap()).is_ok());

        let hash: String = sqlx::query_scalar("SELECT password FROM users WHERE username = 'eva'")
            .fetch_one(&state.db.postgres)
            .await
            .unwrap();
        assert!(hash.starts_with("$argon2id$"));

        // Same username twice.
        let response = make_request(Some(&state), app(state.clone()), Method::POST, "/users", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[sqlx::test]
    async fn test_create_validation(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let body = json!({
            "name": "",
            "username": "e v",
            "email": "not-an-email",
            "password": "s3cret!",
        });

        let response = make_request(Some(&state), app(state.clone()), Method::POST, "/users", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem = json_of(response).await;
        let fields = problem["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|error| error["field"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(fields, ["email", "name", "username"]);

        let body = json!({
            "name": "Eva",
            "username": "eva",
            "email": "eva@example.com",
            "password": "s3cret!",
            "status": "vacations",
        });
        let response = make_request(Some(&state), app(state.clone()), Method::POST, "/users", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(fixtures("../../fixtures/setores.sql", "../../fixtures/users.sql"))]
    async fn test_get_update_delete(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);

        let response = make_request(Some(&state), app(state.clone()), Method::GET, "/users", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let users = json_of(response).await;
        assert_eq!(users.as_array().unwrap().len(), 4);
        assert_eq!(users[0]["user_id"], "user-ana");

        let body = json!({ "cargo": "Coordenador", "setor": "", "status": "inactive" });
        let response = make_request(Some(&state), app(state.clone()), Method::PATCH, "/users/user-bruno", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(Some(&state), app(state.clone()), Method::GET, "/users/user-bruno", String::default()).await;
        let bruno = json_of(response).await;
        assert_eq!(bruno["cargo"], "Coordenador");
        assert_eq!(bruno["status"], "inactive");
        assert_eq!(bruno["setor_id"], Value::Null);

        let response = make_request(Some(&state), app(state.clone()), Method::PATCH, "/users/user-bruno", json!({ "nickname": "b" }).to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(Some(&state), app(state.clone()), Method::DELETE, "/users/user-caio", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        for method in [Method::GET, Method::DELETE] {
            let response = make_request(Some(&state), app(state.clone()), method, "/users/user-caio", String::default()).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        let response = make_request(Some(&state), app(state.clone()), Method::PATCH, "/users/user-caio", json!({ "cargo": "x" }).to_string()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(fixtures("../../fixtures/users.sql"))]
    async fn test_writes_require_admin(pool: Pool<Postgres>) {
        let (state, _uploads) = test_state(pool);
        let body = json!({
            "name": "Eva",
            "username": "eva",
            "email": "eva@example.com",
            "password": "s3cret!",
        });

        assert_eq!(request_as(&state, "", Method::GET, "/users", Value::Null).await, StatusCode::OK);
        assert_eq!(request_as(&state, "", Method::GET, "/users/user-ana", Value::Null).await, StatusCode::OK);
        assert_eq!(request_as(&state, "", Method::POST, "/users", body).await, StatusCode::FORBIDDEN);
        assert_eq!(
            request_as(&state, "manager", Method::PATCH, "/users/user-ana", json!({ "role": "" })).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(request_as(&state, "", Method::DELETE, "/users/user-ana", Value::Null).await, StatusCode::FORBIDDEN);

        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE user_id = 'user-ana'")
            .fetch_one(&state.db.postgres)
            .await
            .unwrap();
        assert_eq!(role, "admin");
    }
}
