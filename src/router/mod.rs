//! HTTP handlers.
pub mod login;
pub mod points;
pub mod reports;
pub mod setores;
pub mod status;
pub mod users;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::ServerError;

/// JSON body checked with [`Validate`] before reaching the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Valid(value))
    }
}

/// Acknowledgement of a mutation.
#[derive(Debug, Serialize)]
pub struct Acknowledge {
    status: &'static str,
}

pub fn updated() -> Json<Acknowledge> {
    Json(Acknowledge { status: "updated" })
}

pub fn deleted() -> Json<Acknowledge> {
    Json(Acknowledge { status: "deleted" })
}
