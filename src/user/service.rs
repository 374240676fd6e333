use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use super::{NewUser, User, UserPatch, UserRepository};
use crate::AppState;
use crate::crypto::{CryptoError, PasswordManager};
use crate::database::bounded;
use crate::error::{Result, ServerError};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    pub repo: UserRepository,
    pwd: Arc<PasswordManager>,
    timeout: Duration,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(repo: UserRepository, pwd: Arc<PasswordManager>, timeout: Duration) -> Self {
        Self { repo, pwd, timeout }
    }

    fn hash(&self, password: &str) -> Result<String> {
        self.pwd
            .hash_password(password)
            .map_err(|err| ServerError::internal("failed to hash password", err))
    }

    /// Create user with a generated `user_id` and hashed password.
    pub async fn create(&self, user: &NewUser) -> Result<User> {
        let user_id = uuid::Uuid::new_v4().to_string();
        let password = self.hash(&user.password)?;

        let user = bounded(self.timeout, self.repo.insert(&user_id, user, &password)).await?;
        tracing::info!(user_id = %user.user_id, username = %user.username, "user created");

        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        bounded(self.timeout, self.repo.list()).await
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        bounded(self.timeout, self.repo.find_by_id(user_id)).await
    }

    /// Update user, hashing a new password if any.
    pub async fn update(&self, user_id: &str, mut patch: UserPatch) -> Result<()> {
        if let Some(password) = patch.password.take() {
            patch.password = Some(self.hash(&password)?);
        }

        bounded(self.timeout, self.repo.update(user_id, &patch)).await?;
        tracing::info!(%user_id, "user updated");

        Ok(())
    }

    pub async fn delete(&self, user_id: &str) -> Result<()> {
        bounded(self.timeout, self.repo.delete(user_id)).await?;
        tracing::info!(%user_id, "user deleted");

        Ok(())
    }

    /// Check credentials. Unknown users and wrong passwords are
    /// indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let user = bounded(self.timeout, self.repo.find_by_username(username))
            .await?
            .ok_or(ServerError::InvalidCredentials)?;

        match self.pwd.verify_password(password, &user.password) {
            Ok(()) => Ok(user),
            Err(CryptoError::Mismatch) => Err(ServerError::InvalidCredentials),
            Err(err) => Err(ServerError::internal("failed to verify password", err)),
        }
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> UserService {
        UserService::new(
            UserRepository::new(state.db.postgres.clone()),
            Arc::clone(&state.pwd),
            state.db.timeout,
        )
    }
}
