use std::time::Duration;

use axum::extract::FromRef;

use super::{NewSetor, Setor, SetorMembers, SetorPatch, SetorRepository};
use crate::AppState;
use crate::database::bounded;
use crate::error::Result;
use crate::user::UserRepository;

/// Setor manager.
#[derive(Clone)]
pub struct SetorService {
    pub repo: SetorRepository,
    users: UserRepository,
    timeout: Duration,
}

impl SetorService {
    /// Create a new [`SetorService`].
    pub fn new(repo: SetorRepository, users: UserRepository, timeout: Duration) -> Self {
        Self {
            repo,
            users,
            timeout,
        }
    }

    pub async fn create(&self, setor: &NewSetor) -> Result<Setor> {
        let setor_id = uuid::Uuid::new_v4().to_string();
        let setor = bounded(self.timeout, self.repo.insert(&setor_id, setor)).await?;
        tracing::info!(setor_id = %setor.setor_id, nome = %setor.nome, "setor created");

        Ok(setor)
    }

    pub async fn list(&self) -> Result<Vec<Setor>> {
        bounded(self.timeout, self.repo.list()).await
    }

    /// Setor with the users attached to it.
    pub async fn get(&self, setor_id: &str) -> Result<SetorMembers> {
        bounded(self.timeout, async {
            let setor = self.repo.find_by_id(setor_id).await?;
            let users = self.users.list_by_setor(setor_id).await?;
            Ok(SetorMembers { setor, users })
        })
        .await
    }

    pub async fn update(&self, setor_id: &str, patch: &SetorPatch) -> Result<()> {
        bounded(self.timeout, self.repo.update(setor_id, patch)).await?;
        tracing::info!(%setor_id, "setor updated");

        Ok(())
    }

    pub async fn delete(&self, setor_id: &str) -> Result<()> {
        bounded(self.timeout, self.repo.delete(setor_id)).await?;
        tracing::info!(%setor_id, "setor deleted");

        Ok(())
    }
}

impl FromRef<AppState> for SetorService {
    fn from_ref(state: &AppState) -> SetorService {
        SetorService::new(
            SetorRepository::new(state.db.postgres.clone()),
            UserRepository::new(state.db.postgres.clone()),
            state.db.timeout,
        )
    }
}
