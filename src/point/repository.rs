//! Handle database requests.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{POINT_COLUMNS, Point, PointPatch, PointRecord, PointStatus};
use crate::error::{Result, ServerError};

const RESOURCE: &str = "point";

#[derive(Clone)]
pub struct PointRepository {
    pool: Pool<Postgres>,
}

impl PointRepository {
    /// Create a new [`PointRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Start a transaction on the underlying pool.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Serialize every toggle of `user_id` until the transaction ends.
    pub async fn lock_user(conn: &mut PgConnection, user_id: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Id of the open point of `user_id`, if any. The row stays locked.
    pub async fn find_open(conn: &mut PgConnection, user_id: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"SELECT id FROM points WHERE user_id = $1 AND status = $2 FOR UPDATE"#,
        )
        .bind(user_id)
        .bind(PointStatus::Open.as_str())
        .fetch_optional(conn)
        .await?;

        Ok(id)
    }

    /// Insert a new open point.
    pub async fn open(
        conn: &mut PgConnection,
        user_id: &str,
        at: DateTime<Utc>,
        location: Option<&str>,
        photo: Option<&str>,
    ) -> Result<Point> {
        let query = format!(
            r#"INSERT INTO points AS p (user_id, clock_in, status, location_in, photo_in)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {POINT_COLUMNS}"#
        );

        sqlx::query_as::<_, PointRecord>(&query)
            .bind(user_id)
            .bind(at)
            .bind(PointStatus::Open.as_str())
            .bind(location)
            .bind(photo)
            .fetch_one(conn)
            .await
            .map_err(already_open)?
            .try_into()
    }

    /// Close point `id`.
    pub async fn close(
        conn: &mut PgConnection,
        id: i64,
        at: DateTime<Utc>,
        location: Option<&str>,
        photo: Option<&str>,
    ) -> Result<Point> {
        let query = format!(
            r#"UPDATE points AS p
                SET clock_out = $2, status = $3, location_out = $4, photo_out = $5, updated_at = now()
                WHERE p.id = $1
                RETURNING {POINT_COLUMNS}"#
        );

        sqlx::query_as::<_, PointRecord>(&query)
            .bind(id)
            .bind(at)
            .bind(PointStatus::Closed.as_str())
            .bind(location)
            .bind(photo)
            .fetch_one(conn)
            .await?
            .try_into()
    }

    /// Every point, newest first.
    pub async fn list(&self) -> Result<Vec<Point>> {
        let query = format!(
            r#"SELECT {POINT_COLUMNS} FROM points p ORDER BY p.created_at DESC, p.id DESC"#
        );

        sqlx::query_as::<_, PointRecord>(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Point::try_from)
            .collect()
    }

    /// Find point using `id` field.
    pub async fn find_by_id(&self, id: i64) -> Result<Point> {
        let query = format!(r#"SELECT {POINT_COLUMNS} FROM points p WHERE p.id = $1"#);

        sqlx::query_as::<_, PointRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServerError::NotFound { resource: RESOURCE })?
            .try_into()
    }

    /// Apply `patch` to point `id`.
    ///
    /// Clock ordering is checked against the stored row while it is locked.
    pub async fn update(&self, id: i64, patch: &PointPatch) -> Result<Point> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, (Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
            r#"SELECT clock_in, clock_out FROM points WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServerError::NotFound { resource: RESOURCE })?;

        patch.check_against(stored.0, stored.1)?;

        let query = format!(
            r#"UPDATE points AS p
                SET clock_in = COALESCE($2, p.clock_in),
                    clock_out = COALESCE($3, p.clock_out),
                    status = COALESCE($4, p.status),
                    updated_at = now()
                WHERE p.id = $1
                RETURNING {POINT_COLUMNS}"#
        );

        let record = sqlx::query_as::<_, PointRecord>(&query)
            .bind(id)
            .bind(patch.clock_in())
            .bind(patch.clock_out())
            .bind(patch.status().map(|s| s.as_str()))
            .fetch_optional(&mut *tx)
            .await
            .map_err(already_open)?
            .ok_or(ServerError::NotFound { resource: RESOURCE })?;

        tx.commit().await?;

        record.try_into()
    }

    /// Delete point `id`, returning its photo paths.
    pub async fn delete(&self, id: i64) -> Result<(Option<String>, Option<String>)> {
        sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"DELETE FROM points WHERE id = $1 RETURNING photo_in, photo_out"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::NotFound { resource: RESOURCE })
    }
}

/// Map the open-point unique index violation to a retryable conflict.
fn already_open(err: sqlx::Error) -> ServerError {
    if err
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
    {
        ServerError::Conflict("user already has an open point, retry the request".into())
    } else {
        err.into()
    }
}
