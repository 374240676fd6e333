//! Typed partial update of a [`User`](super::User).

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use validator::{ValidationError, ValidationErrors};

use super::{UserStatus, validate_username};
use crate::error::{Result, ServerError};

/// Raw request body. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatchBody {
    name: Option<Value>,
    username: Option<Value>,
    #[serde(alias = "setor")]
    setor_id: Option<Value>,
    cargo: Option<Value>,
    role: Option<Value>,
    #[serde(alias = "senha")]
    password: Option<Value>,
    status: Option<Value>,
    birth: Option<Value>,
}

/// Validated, non-empty user update. `password` is still in clear text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub setor_id: Option<String>,
    pub cargo: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
    pub status: Option<UserStatus>,
    pub birth: Option<NaiveDate>,
}

fn text(
    value: Option<Value>,
    field: &'static str,
    allow_empty: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match value? {
        Value::String(s) if allow_empty || !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => {
            errors.add(
                field,
                ValidationError::new("text")
                    .with_message(format!("{field} must be a non-empty string.").into()),
            );
            None
        },
    }
}

impl TryFrom<UserPatchBody> for UserPatch {
    type Error = ServerError;

    fn try_from(body: UserPatchBody) -> Result<Self> {
        let mut errors = ValidationErrors::new();

        let name = text(body.name, "name", false, &mut errors);
        let username = text(body.username, "username", false, &mut errors);
        if let Some(username) = &username {
            if let Err(err) = validate_username(username) {
                errors.add("username", err);
            }
        }
        let setor_id = text(body.setor_id, "setor_id", true, &mut errors);
        let cargo = text(body.cargo, "cargo", true, &mut errors);
        let role = text(body.role, "role", true, &mut errors);
        // Passwords are not trimmed.
        let password = match body.password {
            Some(Value::String(p)) if !p.is_empty() => Some(p),
            Some(_) => {
                errors.add(
                    "password",
                    ValidationError::new("text").with_message("password is required.".into()),
                );
                None
            },
            None => None,
        };
        let status = body.status.and_then(|value| {
            serde_json::from_value::<UserStatus>(value)
                .map_err(|_| {
                    errors.add(
                        "status",
                        ValidationError::new("status")
                            .with_message("status must be 'active' or 'inactive'.".into()),
                    )
                })
                .ok()
        });
        let birth = body.birth.and_then(|value| {
            value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .or_else(|| {
                    errors.add(
                        "birth",
                        ValidationError::new("date")
                            .with_message("birth must be a YYYY-MM-DD date.".into()),
                    );
                    None
                })
        });

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let patch = Self {
            name,
            username,
            setor_id,
            cargo,
            role,
            password,
            status,
            birth,
        };

        if patch == Self::default() {
            return Err(ServerError::field(
                "body",
                "empty",
                "no valid fields to update.",
            ));
        }

        Ok(patch)
    }
}
