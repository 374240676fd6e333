//! Handle database requests.

use sqlx::{Pool, Postgres};

use super::{NewUser, USER_COLUMNS, User, UserPatch};
use crate::error::{Result, ServerError};

const RESOURCE: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a new user. `password` must already be hashed.
    pub async fn insert(&self, user_id: &str, user: &NewUser, password: &str) -> Result<User> {
        let query = format!(
            r#"INSERT INTO users (user_id, name, username, email, password, setor_id, cargo, role, birth, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING {USER_COLUMNS}"#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(user.name.trim())
            .bind(user.username.trim())
            .bind(user.email.trim())
            .bind(password)
            .bind(user.setor_id.as_deref().map(str::trim).filter(|s| !s.is_empty()))
            .bind(user.cargo.trim())
            .bind(user.role.trim())
            .bind(user.birth)
            .bind(user.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(username_taken)
    }

    /// Every user, in creation order.
    pub async fn list(&self) -> Result<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");

        Ok(sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Members of a setor.
    pub async fn list_by_setor(&self, setor_id: &str) -> Result<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE setor_id = $1 ORDER BY name");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(setor_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Find user using `user_id` field.
    pub async fn find_by_id(&self, user_id: &str) -> Result<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServerError::NotFound { resource: RESOURCE })
    }

    /// Find user using `username` field.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Apply `patch`. `password` must already be hashed. An empty
    /// `setor_id` detaches the user from its setor.
    pub async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE users
                SET name = COALESCE($2, name),
                    username = COALESCE($3, username),
                    setor_id = CASE WHEN $4::text IS NULL THEN setor_id ELSE NULLIF($4, '') END,
                    cargo = COALESCE($5, cargo),
                    role = COALESCE($6, role),
                    password = COALESCE($7, password),
                    status = COALESCE($8, status),
                    birth = COALESCE($9, birth)
                WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(patch.name.as_deref())
        .bind(patch.username.as_deref())
        .bind(patch.setor_id.as_deref())
        .bind(patch.cargo.as_deref())
        .bind(patch.role.as_deref())
        .bind(patch.password.as_deref())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.birth)
        .execute(&self.pool)
        .await
        .map_err(username_taken)?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound { resource: RESOURCE });
        }

        Ok(())
    }

    /// Delete user.
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound { resource: RESOURCE });
        }

        Ok(())
    }
}

fn username_taken(err: sqlx::Error) -> ServerError {
    if err
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
    {
        ServerError::Conflict("username is already taken".into())
    } else {
        err.into()
    }
}
