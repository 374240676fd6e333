//! Exchange credentials for a bearer token.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Valid;
use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::UserService;

#[derive(Debug, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Username is required."))]
    username: String,
    #[serde(alias = "senha")]
    #[validate(length(min = 1, message = "Password is required."))]
    password: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
    status: &'static str,
    token: String,
}

/// Handler of `POST /login`.
pub async fn handler(
    State(state): State<AppState>,
    State(users): State<UserService>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let user = users
        .authenticate(body.username.trim(), &body.password)
        .await
        .inspect_err(|err| {
            if matches!(err, ServerError::InvalidCredentials) {
                tracing::debug!(username = %body.username, "login refused");
            }
        })?;

    let token = state.token.create(&user.user_id, &user.username, &user.role)?;
    tracing::info!(user_id = %user.user_id, "user logged in");

    Ok(Json(Response {
        status: "Logged",
        token,
    }))
}
