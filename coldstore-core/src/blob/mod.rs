/*!
Blob store adapters for archived payloads.

The engine talks to object storage only through the [`BlobStore`] port:
upload, fetch, tier discovery, thaw requests and signed URLs. Adapters exist
for the local filesystem, an in-memory map (tests, CLI dry runs) and, behind
the `s3` feature, Amazon S3.
*/

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use crate::model::StorageTier;
use crate::{RetainError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub use local::LocalBlobStore;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;

/// Object storage abstraction.
///
/// `upload` returns a stable URL for the stored object; all other operations
/// address objects by the path that was uploaded.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its URL.
    async fn upload(&self, container: &str, path: &str, data: Bytes) -> Result<String>;

    /// Fetch a blob's bytes.
    async fn fetch(&self, path: &str) -> Result<Bytes>;

    /// Report which storage tier currently holds the blob.
    async fn location_tier(&self, path: &str) -> Result<StorageTier>;

    /// Ask the backend to begin rehydrating a cold blob. Non-blocking; the
    /// caller polls `location_tier` out of band.
    async fn request_thaw(&self, path: &str) -> Result<()>;

    /// Produce a time-limited access URL for the blob.
    async fn signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String>;
}

/// In-memory blob store.
///
/// Backs unit tests and CLI dry runs. The tier every blob reports is
/// configurable so cold-tier restore paths can be exercised without a cloud
/// backend; thaw requests are recorded for assertions.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    tier: StorageTier,
    thaw_requests: Mutex<Vec<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_tier(StorageTier::Hot)
    }

    /// A store whose blobs all report the given tier.
    pub fn with_tier(tier: StorageTier) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            tier,
            thaw_requests: Mutex::new(Vec::new()),
        }
    }

    /// Paths for which a thaw was requested, in order.
    pub fn thaw_requests(&self) -> Vec<String> {
        self.thaw_requests.lock().unwrap().clone()
    }

    /// Overwrite a stored blob in place. Test helper for corrupting payloads.
    pub fn put_raw(&self, path: &str, data: Bytes) {
        self.blobs.lock().unwrap().insert(path.to_string(), data);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, container: &str, path: &str, data: Bytes) -> Result<String> {
        self.blobs.lock().unwrap().insert(path.to_string(), data);
        Ok(format!("memory://{container}/{path}"))
    }

    async fn fetch(&self, path: &str) -> Result<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RetainError::storage(format!("blob not found: {path}")))
    }

    async fn location_tier(&self, path: &str) -> Result<StorageTier> {
        if !self.blobs.lock().unwrap().contains_key(path) {
            return Err(RetainError::storage(format!("blob not found: {path}")));
        }
        Ok(self.tier)
    }

    async fn request_thaw(&self, path: &str) -> Result<()> {
        if !self.blobs.lock().unwrap().contains_key(path) {
            return Err(RetainError::storage(format!("blob not found: {path}")));
        }
        self.thaw_requests.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String> {
        if !self.blobs.lock().unwrap().contains_key(path) {
            return Err(RetainError::storage(format!("blob not found: {path}")));
        }
        Ok(format!("memory://{path}?expires={}", expires_at.timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_roundtrip() {
        let store = MemoryBlobStore::new();
        let url = store
            .upload("archives", "audit-log/2025/01/a.json.gz", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(url, "memory://archives/audit-log/2025/01/a.json.gz");

        let fetched = store.fetch("audit-log/2025/01/a.json.gz").await.unwrap();
        assert_eq!(fetched.as_ref(), b"data");

        assert!(store.fetch("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_blob_tier_and_thaw() {
        let store = MemoryBlobStore::with_tier(StorageTier::Archive);
        store
            .upload("archives", "doc/x.json.gz", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert_eq!(
            store.location_tier("doc/x.json.gz").await.unwrap(),
            StorageTier::Archive
        );

        store.request_thaw("doc/x.json.gz").await.unwrap();
        assert_eq!(store.thaw_requests(), vec!["doc/x.json.gz".to_string()]);

        assert!(store.request_thaw("missing").await.is_err());
        assert!(store.location_tier("missing").await.is_err());
    }
}
