mod patch;
mod repository;
mod service;

pub use patch::*;
pub use repository::*;
pub use service::*;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").ok());

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub setor_id: Option<String>,
    pub cargo: String,
    pub birth: Option<NaiveDate>,
    pub status: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) const USER_COLUMNS: &str = "id, user_id, name, username, email, password, setor_id, cargo, birth, status, role, created_at";

/// Status an account may be given through the API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    match USERNAME.as_ref() {
        Some(regex) if regex.is_match(username) => Ok(()),
        _ => Err(ValidationError::new("username")),
    }
}

/// Account creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 120, message = "Name must be 1 to 120 characters long."))]
    pub name: String,
    #[validate(custom(
        function = "validate_username",
        message = "Username must be 3 to 32 letters, digits, dots, dashes or underscores."
    ))]
    pub username: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "Password is required."))]
    pub password: String,
    #[serde(alias = "setor")]
    pub setor_id: Option<String>,
    #[serde(default)]
    pub cargo: String,
    #[serde(default)]
    pub role: String,
    pub birth: Option<NaiveDate>,
    #[serde(default)]
    pub status: UserStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username() {
        assert!(validate_username("ana.souza").is_ok());
        assert!(validate_username("a-b_c").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("with space").is_err());
    }

    #[test]
    fn test_new_user() {
        let user: NewUser = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "username": "ana",
            "email": "ana@example.com",
            "password": "secret",
            "setor": "s-1",
        }))
        .unwrap();

        assert!(user.validate().is_ok());
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.setor_id.as_deref(), Some("s-1"));

        let user: NewUser = serde_json::from_value(serde_json::json!({
            "name": "",
            "username": "ana",
            "email": "not-an-email",
            "password": "",
        }))
        .unwrap();
        let errors = user.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_status_is_restricted() {
        assert!(serde_json::from_str::<UserStatus>(r#""inactive""#).is_ok());
        assert!(serde_json::from_str::<UserStatus>(r#""vacations""#).is_err());
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User {
            id: 1,
            user_id: "u-1".into(),
            name: "Ana".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: "$argon2id$...".into(),
            setor_id: None,
            cargo: String::new(),
            birth: None,
            status: "active".into(),
            role: String::new(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
    }
}
