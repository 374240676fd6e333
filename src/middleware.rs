//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};

const BEARER: &str = "Bearer";

/// Role allowed to write the directory.
pub const ADMIN_ROLE: &str = "admin";

/// Caller authenticated by [`auth`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Token of a `Bearer` authorization value. The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

/// Validate the bearer token and attach the caller [`Identity`].
pub async fn auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ServerError::Unauthorized)?;

    let claims = state.token.decode(token)?;

    req.extensions_mut().insert(Identity {
        user_id: claims.sub,
        username: claims.username,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Reject callers without the admin role. Must run after [`auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response> {
    match req.extensions().get::<Identity>() {
        Some(identity) if identity.is_admin() => Ok(next.run(req).await),
        Some(identity) => {
            tracing::debug!(user_id = %identity.user_id, role = %identity.role, "admin role required");
            Err(ServerError::MissingRole { role: ADMIN_ROLE })
        },
        None => Err(ServerError::Unauthorized),
    }
}
