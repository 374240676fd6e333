//! Handle database requests.

use sqlx::{Pool, Postgres};

use super::{NewSetor, SETOR_COLUMNS, Setor, SetorPatch};
use crate::error::{Result, ServerError};

const RESOURCE: &str = "setor";

#[derive(Clone)]
pub struct SetorRepository {
    pool: Pool<Postgres>,
}

impl SetorRepository {
    /// Create a new [`SetorRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, setor_id: &str, setor: &NewSetor) -> Result<Setor> {
        let query = format!(
            r#"INSERT INTO setores (setor_id, nome, quantidade, lider, created_by)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {SETOR_COLUMNS}"#
        );

        Ok(sqlx::query_as::<_, Setor>(&query)
            .bind(setor_id)
            .bind(setor.nome.trim())
            .bind(setor.quantidade)
            .bind(setor.lider.trim())
            .bind(setor.created_by.trim())
            .fetch_one(&self.pool)
            .await?)
    }

    /// Every setor, by name.
    pub async fn list(&self) -> Result<Vec<Setor>> {
        let query = format!("SELECT {SETOR_COLUMNS} FROM setores ORDER BY nome, id");

        Ok(sqlx::query_as::<_, Setor>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn find_by_id(&self, setor_id: &str) -> Result<Setor> {
        let query = format!("SELECT {SETOR_COLUMNS} FROM setores WHERE setor_id = $1");

        sqlx::query_as::<_, Setor>(&query)
            .bind(setor_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServerError::NotFound { resource: RESOURCE })
    }

    pub async fn update(&self, setor_id: &str, patch: &SetorPatch) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE setores
                SET nome = COALESCE($2, nome),
                    quantidade = COALESCE($3, quantidade),
                    lider = COALESCE($4, lider),
                    created_by = COALESCE($5, created_by),
                    updated_at = now()
                WHERE setor_id = $1"#,
        )
        .bind(setor_id)
        .bind(patch.nome.as_deref())
        .bind(patch.quantidade)
        .bind(patch.lider.as_deref())
        .bind(patch.created_by.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound { resource: RESOURCE });
        }

        Ok(())
    }

    /// Delete setor. Members keep a dangling `setor_id`.
    pub async fn delete(&self, setor_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM setores WHERE setor_id = $1")
            .bind(setor_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound { resource: RESOURCE });
        }

        Ok(())
    }
}
