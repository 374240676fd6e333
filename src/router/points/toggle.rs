//! Clock in or clock out.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::{Json, RequestExt};
use serde::Deserialize;

use crate::ServerError;
use crate::error::Result;
use crate::point::{ClockLedger, ClockRequest, Point};
use crate::storage::Upload;

/// JSON payload, sent alone or as the `data` part of a multipart form.
#[derive(Debug, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    user_id: String,
    location: Option<String>,
}

/// Toggle request, from JSON or `multipart/form-data`.
#[derive(Debug)]
pub struct ClockForm(pub ClockRequest);

fn form_error<E>(err: E) -> ServerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ServerError::ParsingForm(Box::new(err))
}

impl<S> FromRequest<S> for ClockForm
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(body) = req.extract::<Json<Body>, _>().await?;
            return Ok(ClockForm(ClockRequest {
                user_id: body.user_id,
                location: body.location,
                photo: None,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(form_error)?;
        let mut body = Body::default();
        let mut photo = None;

        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "data" => {
                    let bytes = field.bytes().await.map_err(form_error)?;
                    body = serde_json::from_slice(&bytes).map_err(|_| {
                        ServerError::field("data", "json", "data must be a JSON object.")
                    })?;
                },
                "user_id" => body.user_id = field.text().await.map_err(form_error)?,
                "location" => body.location = Some(field.text().await.map_err(form_error)?),
                "file" | "photo" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(form_error)?;
                    if !bytes.is_empty() || content_type.is_some() {
                        photo = Some(Upload::new(file_name, content_type.as_deref(), bytes)?);
                    }
                },
                _ => {},
            }
        }

        Ok(ClockForm(ClockRequest {
            user_id: body.user_id,
            location: body.location,
            photo,
        }))
    }
}

/// Handler of `POST /points`.
pub async fn handler(
    State(ledger): State<ClockLedger>,
    ClockForm(request): ClockForm,
) -> Result<Json<Point>> {
    let toggled = ledger.toggle(request).await?;

    Ok(Json(toggled.into_point()))
}
