//! Blob store for clock photos.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::fs;

use crate::error::{Result, ServerError};

/// Public prefix under which stored blobs are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Content types accepted for photos.
pub const ALLOWED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// An uploaded image whose content type is allowed.
#[derive(Debug, Clone)]
pub struct Upload {
    file_name: Option<String>,
    content_type: String,
    bytes: Bytes,
}

impl Upload {
    /// Create a new [`Upload`], rejecting unknown content types.
    pub fn new(
        file_name: Option<String>,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<Self> {
        let content_type = content_type.unwrap_or_default().trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ServerError::ForbiddenType { content_type });
        }

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Extension kept on disk. Falls back on the content type when the
    /// original name has none or an unusual one.
    fn extension(&self) -> &str {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= 5
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or(match self.content_type.as_str() {
                "image/png" => "png",
                _ => "jpg",
            })
    }
}

/// Storage accepting uploaded images at retrievable paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Public path a new blob below `prefix` will be written to.
    /// Nothing is written yet.
    fn allocate(&self, prefix: &[&str], upload: &Upload) -> String;

    /// Write `upload` at a path returned by [`BlobStore::allocate`].
    async fn put(&self, path: &str, upload: &Upload) -> Result<()>;

    /// Remove a blob at a path returned by [`BlobStore::allocate`].
    async fn remove(&self, path: &str) -> Result<()>;
}

/// Blob store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new [`LocalBlobStore`] rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Keep path segments inside their directory.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() { "_".to_owned() } else { cleaned }
}

/// Resolve a public path below `root`, refusing anything but plain segments.
fn resolve(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(
        path.strip_prefix(PUBLIC_PREFIX)
            .unwrap_or(path)
            .trim_start_matches('/'),
    );

    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ServerError::field("path", "path", "invalid blob path."));
    }

    Ok(root.join(relative))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn allocate(&self, prefix: &[&str], upload: &Upload) -> String {
        let segments = prefix.iter().map(|s| sanitize(s)).collect::<Vec<_>>();
        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), upload.extension());

        format!("{PUBLIC_PREFIX}/{}/{file_name}", segments.join("/"))
    }

    async fn put(&self, path: &str, upload: &Upload) -> Result<()> {
        let target = resolve(&self.root, path)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&target, &upload.bytes).await?;

        tracing::debug!(%path, size = upload.bytes.len(), "blob stored");
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        match fs::remove_file(resolve(&self.root, path)?).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
