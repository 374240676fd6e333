//! Departments grouping users.
mod repository;
mod service;

pub use repository::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{Result, ServerError};
use crate::user::User;

/// Setor as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setor {
    pub id: i64,
    pub setor_id: String,
    pub nome: String,
    pub quantidade: i32,
    pub lider: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const SETOR_COLUMNS: &str =
    "id, setor_id, nome, quantidade, lider, created_by, created_at, updated_at";

/// Setor and its current members.
#[derive(Debug, Serialize)]
pub struct SetorMembers {
    #[serde(flatten)]
    pub setor: Setor,
    pub users: Vec<User>,
}

/// Setor creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct NewSetor {
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 120, message = "nome is required."))]
    pub nome: String,
    #[serde(default, alias = "qtd_users")]
    #[validate(range(min = 0, message = "quantidade cannot be negative."))]
    pub quantidade: i32,
    #[serde(default)]
    pub lider: String,
    #[serde(default, alias = "createdBy")]
    pub created_by: String,
}

/// Raw update body. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SetorPatchBody {
    #[serde(alias = "name")]
    nome: Option<Value>,
    #[serde(alias = "qtd_users")]
    quantidade: Option<Value>,
    lider: Option<Value>,
    #[serde(alias = "createdBy")]
    created_by: Option<Value>,
}

/// Validated, non-empty setor update.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SetorPatch {
    pub nome: Option<String>,
    pub quantidade: Option<i32>,
    pub lider: Option<String>,
    pub created_by: Option<String>,
}

impl TryFrom<SetorPatchBody> for SetorPatch {
    type Error = ServerError;

    fn try_from(body: SetorPatchBody) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let mut invalid = |field: &'static str, message: &'static str| {
            errors.add(field, ValidationError::new("invalid").with_message(message.into()))
        };

        let nome = match body.nome {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Some(_) => {
                invalid("nome", "nome must be a non-empty string.");
                None
            },
            None => None,
        };
        let quantidade = match body.quantidade {
            Some(value) => match value.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(n) if n >= 0 => Some(n),
                _ => {
                    invalid("quantidade", "quantidade must be a non-negative integer.");
                    None
                },
            },
            None => None,
        };
        let lider = match body.lider {
            Some(Value::String(s)) => Some(s.trim().to_owned()),
            Some(_) => {
                invalid("lider", "lider must be a string.");
                None
            },
            None => None,
        };
        let created_by = match body.created_by {
            Some(Value::String(s)) => Some(s.trim().to_owned()),
            Some(_) => {
                invalid("created_by", "created_by must be a string.");
                None
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let patch = Self {
            nome,
            quantidade,
            lider,
            created_by,
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<SetorPatch> {
        SetorPatch::try_from(serde_json::from_value::<SetorPatchBody>(value).unwrap())
    }

    #[test]
    fn test_new_setor() {
        let setor: NewSetor =
            serde_json::from_value(json!({ "name": "Financeiro", "qtd_users": 4 })).unwrap();
        assert!(setor.validate().is_ok());
        assert_eq!(setor.nome, "Financeiro");
        assert_eq!(setor.quantidade, 4);

        let setor: NewSetor = serde_json::from_value(json!({ "nome": "" })).unwrap();
        assert!(setor.validate().is_err());
    }

    #[test]
    fn test_patch() {
        let patch = parse(json!({ "quantidade": 3, "lider": "Ana" })).unwrap();
        assert_eq!(patch.quantidade, Some(3));
        assert_eq!(patch.lider.as_deref(), Some("Ana"));

        assert!(parse(json!({ "quantidade": -1 })).is_err());
        assert!(parse(json!({ "quantidade": 1.5 })).is_err());
        assert!(parse(json!({ "nome": "  " })).is_err());
        assert!(parse(json!({ "setor_id": "x" })).is_err());
    }
}
