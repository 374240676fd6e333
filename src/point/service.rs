use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use chrono::Utc;

use super::{Point, PointPatch, PointRepository};
use crate::AppState;
use crate::database::bounded;
use crate::error::{Result, ServerError};
use crate::storage::{BlobStore, Upload};

/// Clock-in/clock-out request of one user.
#[derive(Debug, Clone)]
pub struct ClockRequest {
    pub user_id: String,
    pub location: Option<String>,
    pub photo: Option<Upload>,
}

/// Outcome of a toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggled {
    Opened(Point),
    Closed(Point),
}

impl Toggled {
    pub fn point(&self) -> &Point {
        match self {
            Toggled::Opened(point) | Toggled::Closed(point) => point,
        }
    }

    pub fn into_point(self) -> Point {
        match self {
            Toggled::Opened(point) | Toggled::Closed(point) => point,
        }
    }
}

/// Point manager.
#[derive(Clone)]
pub struct ClockLedger {
    pub repo: PointRepository,
    blobs: Arc<dyn BlobStore>,
    timeout: Duration,
}

impl ClockLedger {
    /// Create a new [`ClockLedger`].
    pub fn new(repo: PointRepository, blobs: Arc<dyn BlobStore>, timeout: Duration) -> Self {
        Self {
            repo,
            blobs,
            timeout,
        }
    }

    /// Open a point for the user if none is open, close it otherwise.
    ///
    /// The check and the mutation run in one transaction holding a per-user
    /// advisory lock. A photo written for a transition that does not commit
    /// is removed again.
    pub async fn toggle(&self, request: ClockRequest) -> Result<Toggled> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(ServerError::field(
                "user_id",
                "required",
                "user_id is required.",
            ));
        }
        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let mut written = None;
        let result = bounded(
            self.timeout,
            self.transition(user_id, location, request.photo.as_ref(), &mut written),
        )
        .await;

        match &result {
            Ok(toggled) => {
                let transition = match toggled {
                    Toggled::Opened(_) => "open",
                    Toggled::Closed(_) => "close",
                };
                metrics::counter!("points_toggled_total", "transition" => transition).increment(1);
                tracing::info!(user_id, point_id = toggled.point().id, transition, "point toggled");
            },
            Err(err) => {
                if let Some(path) = written {
                    if let Err(remove_err) = self.blobs.remove(&path).await {
                        tracing::warn!(%path, error = %remove_err, "orphaned photo left on storage");
                    }
                }
                tracing::debug!(user_id, error = %err, "toggle failed");
            },
        }

        result
    }

    async fn transition(
        &self,
        user_id: &str,
        location: Option<&str>,
        photo: Option<&Upload>,
        written: &mut Option<String>,
    ) -> Result<Toggled> {
        let mut tx = self.repo.begin().await?;

        PointRepository::lock_user(&mut tx, user_id).await?;
        let open = PointRepository::find_open(&mut tx, user_id).await?;

        let photo = match photo {
            Some(upload) => {
                let direction = if open.is_some() { "out" } else { "in" };
                let path = self.blobs.allocate(&["points", user_id, direction], upload);
                // Recorded first so a write cut short is still removed.
                *written = Some(path.clone());
                self.blobs.put(&path, upload).await?;
                Some(path)
            },
            None => None,
        };

        let now = Utc::now();
        let toggled = match open {
            None => Toggled::Opened(
                PointRepository::open(&mut tx, user_id, now, location, photo.as_deref()).await?,
            ),
            Some(id) => Toggled::Closed(
                PointRepository::close(&mut tx, id, now, location, photo.as_deref()).await?,
            ),
        };

        tx.commit().await?;
        Ok(toggled)
    }

    pub async fn list(&self) -> Result<Vec<Point>> {
        bounded(self.timeout, self.repo.list()).await
    }

    pub async fn get(&self, id: i64) -> Result<Point> {
        bounded(self.timeout, self.repo.find_by_id(id)).await
    }

    pub async fn update(&self, id: i64, patch: &PointPatch) -> Result<Point> {
        let point = bounded(self.timeout, self.repo.update(id, patch)).await?;
        tracing::info!(point_id = id, changes = patch.changes().len(), "point updated");
        Ok(point)
    }

    /// Delete point `id` and its photos.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let (photo_in, photo_out) = bounded(self.timeout, self.repo.delete(id)).await?;
        tracing::info!(point_id = id, "point deleted");

        for path in [photo_in, photo_out].into_iter().flatten() {
            if let Err(err) = self.blobs.remove(&path).await {
                tracing::warn!(%path, error = %err, "failed to remove photo of deleted point");
            }
        }

        Ok(())
    }
}

impl FromRef<AppState> for ClockLedger {
    fn from_ref(state: &AppState) -> ClockLedger {
        ClockLedger::new(
            PointRepository::new(state.db.postgres.clone()),
            Arc::clone(&state.blobs),
            state.db.timeout,
        )
    }
}
