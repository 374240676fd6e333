//! Error handler for ponto.

use std::borrow::Cow;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

pub type Result<T> = std::result::Result<T, ServerError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("error parsing form data: {0}")]
    ParsingForm(BoxError),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("content type '{content_type}' is not allowed")]
    ForbiddenType { content_type: String },

    #[error("missing required role '{role}'")]
    MissingRole { role: &'static str },

    #[error("{0}")]
    Conflict(Cow<'static, str>),

    #[error("store operation timed out")]
    Timeout,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<BoxError>,
    },

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("invalid username or password")]
    InvalidCredentials,
}

impl ServerError {
    /// Build a [`ServerError::Validation`] holding a single field error.
    pub fn field(
        field: &'static str,
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(
            field,
            ValidationError::new(code).with_message(message.into()),
        );
        Self::Validation(errors)
    }

    /// Wrap any error as an opaque internal failure.
    pub fn internal<E>(details: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::internal("file system operation failed", err)
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect::<Vec<_>>();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::ParsingForm(err) => response
                .title("Server error during data parsing.")
                .details(&err.to_string()),

            ServerError::Axum(rejection) => response
                .title("Invalid request body.")
                .details(&rejection.body_text())
                .status(match rejection {
                    JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    _ => StatusCode::BAD_REQUEST,
                }),

            ServerError::Path(rejection) => response
                .title("Invalid path parameter.")
                .details(&rejection.body_text())
                .status(rejection.status()),

            ServerError::Sql(SQLxError::RowNotFound) => response
                .title("Resource not found.")
                .details("no matching row")
                .status(StatusCode::NOT_FOUND),

            ServerError::Sql(err)
                if err
                    .as_database_error()
                    .is_some_and(|e| e.is_unique_violation()) =>
            {
                response
                    .title("Resource conflicts with its current state.")
                    .details("a conflicting record already exists, retry the request")
                    .status(StatusCode::CONFLICT)
            },

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");

                ResponseError::default()
            },

            ServerError::NotFound { .. } => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::ForbiddenType { .. } => response
                .title("Uploaded file type is forbidden.")
                .status(StatusCode::FORBIDDEN),

            ServerError::MissingRole { .. } => response
                .title("Insufficient permissions.")
                .status(StatusCode::FORBIDDEN),

            ServerError::Conflict(_) => response
                .title("Resource conflicts with its current state.")
                .status(StatusCode::CONFLICT),

            ServerError::Timeout => {
                tracing::error!("store operation exceeded its deadline");

                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(error = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::InvalidCredentials => response
                .title("Authentication failed.")
                .status(StatusCode::UNAUTHORIZED),
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::field("x", "x", "bad"), StatusCode::BAD_REQUEST),
            (ServerError::NotFound { resource: "point" }, StatusCode::NOT_FOUND),
            (
                ServerError::ForbiddenType {
                    content_type: "image/gif".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (ServerError::Conflict("busy".into()), StatusCode::CONFLICT),
            (ServerError::Timeout, StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServerError::Sql(SQLxError::RowNotFound), StatusCode::NOT_FOUND),
            (
                ServerError::Sql(SQLxError::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_field_errors_are_listed() {
        let mut errors = ValidationErrors::new();
        errors.add("status", ValidationError::new("status").with_message("bad status".into()));
        errors.add("clock_in", ValidationError::new("timestamp"));

        let fields = parse_validation_errors(&errors);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "clock_in");
        assert_eq!(fields[0].message, "timestamp");
        assert_eq!(fields[1].message, "bad status");
    }
}
