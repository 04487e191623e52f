/*!
Local filesystem blob store.
*/

use super::BlobStore;
use crate::model::StorageTier;
use crate::{RetainError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Blob store backed by a directory tree.
///
/// Every blob lives at `{base_dir}/{path}`; parent directories are created on
/// upload. Local disk is always HOT, so `request_thaw` is a no-op and the
/// "signed" URL is a plain `file://` URL.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }

    fn file_url(&self, path: &str) -> String {
        format!("file://{}", self.resolve(path).display())
    }

    async fn ensure_parent_dir(&self, full: &Path) -> Result<()> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RetainError::storage(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, _container: &str, path: &str, data: Bytes) -> Result<String> {
        let full = self.resolve(path);
        self.ensure_parent_dir(&full).await?;
        tokio::fs::write(&full, &data).await.map_err(|e| {
            RetainError::storage(format!("failed to write blob {}: {e}", full.display()))
        })?;
        Ok(self.file_url(path))
    }

    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let full = self.resolve(path);
        let data = tokio::fs::read(&full).await.map_err(|e| {
            RetainError::storage(format!("failed to read blob {}: {e}", full.display()))
        })?;
        Ok(Bytes::from(data))
    }

    async fn location_tier(&self, path: &str) -> Result<StorageTier> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(RetainError::storage(format!(
                "blob not found: {}",
                full.display()
            )));
        }
        Ok(StorageTier::Hot)
    }

    async fn request_thaw(&self, _path: &str) -> Result<()> {
        // Local disk has nothing to rehydrate.
        Ok(())
    }

    async fn signed_url(&self, path: &str, _expires_at: DateTime<Utc>) -> Result<String> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(RetainError::storage(format!(
                "blob not found: {}",
                full.display()
            )));
        }
        Ok(self.file_url(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_blob_roundtrip_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let url = store
            .upload(
                "archives",
                "audit-log/2025/01/batch.json.gz",
                Bytes::from_static(b"compressed"),
            )
            .await
            .unwrap();
        assert!(url.starts_with("file://"));

        let data = store.fetch("audit-log/2025/01/batch.json.gz").await.unwrap();
        assert_eq!(data.as_ref(), b"compressed");

        assert_eq!(
            store
                .location_tier("audit-log/2025/01/batch.json.gz")
                .await
                .unwrap(),
            StorageTier::Hot
        );
    }

    #[tokio::test]
    async fn test_local_blob_missing_path() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(store.fetch("nope.json.gz").await.is_err());
        assert!(store.location_tier("nope.json.gz").await.is_err());
        assert!(store
            .signed_url("nope.json.gz", Utc::now())
            .await
            .is_err());
    }
}
