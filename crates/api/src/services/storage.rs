//! Object storage for product images and transfer slips.
//!
//! Objects live under `{root}/{bucket}/{destination}` and are served
//! statically at `{base_url}/{bucket}/{destination}`.

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::ServerConfig;

/// Object storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("destination is invalid: {0}")]
    InvalidDestination(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bucket of named objects with public URLs.
pub trait ObjectStorage {
    /// Store `data` at `destination` and return its public URL.
    fn upload(
        &self,
        destination: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Remove the object at `destination`.
    fn delete(&self, destination: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Public URL of `destination`.
    fn public_url(&self, destination: &str) -> String;

    /// Inverse of [`Self::public_url`]; `None` for URLs this storage did not
    /// issue.
    fn destination_of(&self, url: &str) -> Option<String>;
}

/// Filesystem-backed storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
    base_url: String,
}

impl LocalStorage {
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.storage_dir.clone(),
            config.storage_bucket.clone(),
            config.base_url.clone(),
        )
    }

    /// Directory served as `/{bucket}`.
    #[must_use]
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Resolve `destination` inside the bucket, refusing anything that could
    /// escape it.
    fn resolve(&self, destination: &str) -> Result<PathBuf, StorageError> {
        let trimmed = destination.trim().trim_start_matches('/');
        let relative = Path::new(trimmed);
        let escapes = trimmed.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidDestination(destination.to_owned()));
        }
        Ok(self.bucket_dir().join(relative))
    }
}

impl ObjectStorage for LocalStorage {
    async fn upload(&self, destination: &str, data: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(destination)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::info!(destination, bytes = data.len(), "object stored");
        Ok(self.public_url(destination))
    }

    async fn delete(&self, destination: &str) -> Result<(), StorageError> {
        let path = self.resolve(destination)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(destination, "object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(destination.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, destination: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.bucket,
            destination.trim().trim_start_matches('/')
        )
    }

    fn destination_of(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", self.base_url, self.bucket);
        url.strip_prefix(&prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> LocalStorage {
        LocalStorage::new(root, "rishop", "http://localhost:3000/")
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let url = storage.upload("images/a.png", b"png").await.unwrap();
        assert_eq!(url, "http://localhost:3000/rishop/images/a.png");
        assert_eq!(
            std::fs::read(dir.path().join("rishop/images/a.png")).unwrap(),
            b"png"
        );

        storage.delete("images/a.png").await.unwrap();
        assert!(matches!(
            storage.delete("images/a.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_escaping_destination_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        for destination in ["../secrets", "images/../../x", "", "./a.png"] {
            assert!(matches!(
                storage.upload(destination, b"x").await,
                Err(StorageError::InvalidDestination(_))
            ));
        }
    }

    #[test]
    fn test_destination_of_own_urls_only() {
        let storage = storage(Path::new("/tmp"));
        let url = storage.public_url("slips/b.jpg");

        assert_eq!(storage.destination_of(&url).as_deref(), Some("slips/b.jpg"));
        assert_eq!(storage.destination_of("https://cdn.example.com/x.png"), None);
    }
}
