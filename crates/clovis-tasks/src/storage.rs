//! Object storage used by the workers.
//!
//! Paths are `/`-separated object names inside a single bucket. The worker
//! ships [`DirectoryStorage`], which maps the bucket onto a local directory
//! (a mounted bucket or a scratch directory); tests use
//! [`crate::fakes::MemoryStorage`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClovisError, Result};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Name of the bucket, used to build `gs://<bucket>/<path>` locations.
    fn bucket_name(&self) -> &str;

    /// Contents of the object at `path`, `None` when it does not exist.
    async fn download_as_string(&self, path: &str) -> Result<Option<String>>;

    async fn upload_string(&self, data: &str, path: &str) -> Result<()>;

    /// Upload a local file to `path`.
    async fn upload_file(&self, local: &Path, path: &str) -> Result<()>;
}

/// Join object name components with `/`, skipping empty ones.
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Full `gs://` location of an object.
pub fn cloud_location(bucket: &str, path: &str) -> String {
    format!("gs://{}/{}", bucket, path.trim_start_matches('/'))
}

/// [`Storage`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    bucket: String,
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(bucket: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        DirectoryStorage {
            bucket: bucket.into(),
            root: root.into(),
        }
    }

    fn object_path(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|c| c == "..") {
            return Err(ClovisError::Storage {
                path: path.to_string(),
                message: "object names may not contain '..'".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for DirectoryStorage {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn download_as_string(&self, path: &str) -> Result<Option<String>> {
        let target = self.object_path(path)?;
        match tokio::fs::read_to_string(&target).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClovisError::Io(e)),
        }
    }

    async fn upload_string(&self, data: &str, path: &str) -> Result<()> {
        let target = self.object_path(path)?;
        Self::ensure_parent(&target).await?;
        debug!(path = %path, bytes = data.len(), "uploading string");
        tokio::fs::write(&target, data).await?;
        Ok(())
    }

    async fn upload_file(&self, local: &Path, path: &str) -> Result<()> {
        let target = self.object_path(path)?;
        Self::ensure_parent(&target).await?;
        debug!(local = %local.display(), path = %path, "uploading file");
        tokio::fs::copy(local, &target)
            .await
            .map_err(|e| ClovisError::Storage {
                path: path.to_string(),
                message: format!("copy from {}: {e}", local.display()),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path_skips_empty_components() {
        assert_eq!(join_path(&["", "traces", "a.com", "0"]), "traces/a.com/0");
        assert_eq!(join_path(&["runs/x/", "/traces"]), "runs/x/traces");
    }

    #[test]
    fn test_cloud_location() {
        assert_eq!(
            cloud_location("bucket", "runs/traces/a/0"),
            "gs://bucket/runs/traces/a/0"
        );
    }

    #[tokio::test]
    async fn test_directory_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new("bucket", dir.path());

        assert_eq!(storage.download_as_string("a/b.json").await.unwrap(), None);
        storage.upload_string("{}", "a/b.json").await.unwrap();
        assert_eq!(
            storage.download_as_string("a/b.json").await.unwrap(),
            Some("{}".to_string())
        );

        let local = dir.path().join("local.log");
        std::fs::write(&local, "log").unwrap();
        storage.upload_file(&local, "logs/x.log").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("logs/x.log")).unwrap(),
            "log"
        );
    }

    #[tokio::test]
    async fn test_directory_storage_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new("bucket", dir.path());
        assert!(storage.upload_string("x", "../escape").await.is_err());
    }
}
