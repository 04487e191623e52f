/*!
Restore engine.

Makes an archived blob accessible again. HOT and COOL blobs come back within
the same call; the engine re-downloads the compressed bytes and re-verifies
the recorded checksum before declaring success. COLD and ARCHIVE blobs get a
thaw request fired at the backend and the restore stays IN_PROGRESS until
the backend finishes rehydration out of band.
*/

use crate::blob::BlobStore;
use crate::clock::Clock;
use crate::model::{ArchiveRecord, ArchiveStatus, RestoreRequest, RestoreStatus};
use crate::payload;
use crate::store::RetentionStore;
use crate::{RetainError, Result};
use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// How long a restored blob URL stays valid.
const RESTORE_ACCESS_HOURS: i64 = 24;

/// Fields for requesting a restore.
#[derive(Debug, Clone)]
pub struct RestoreInput {
    pub archive_record_id: Uuid,
    pub reason: String,
    pub notes: Option<String>,
}

/// Structured outcome of a restore request.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub request_id: Uuid,
    pub status: RestoreStatus,
    pub estimated_wait_secs: u64,
    pub actual_wait_secs: Option<u64>,
    pub restored_blob_url: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

/// Drives restore requests against the store and blob backend.
pub struct RestoreEngine {
    store: Arc<dyn RetentionStore>,
    blob: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl RestoreEngine {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        blob: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, blob, clock }
    }

    /// Request a restore of one archive record.
    ///
    /// Only ARCHIVED records are eligible; anything else (including a record
    /// already RESTORED or mid-restore) is a `State` error. The tier's wait
    /// table decides whether the call completes synchronously.
    pub async fn restore_from_archive(
        &self,
        input: RestoreInput,
        requested_by: impl Into<String>,
    ) -> Result<RestoreOutcome> {
        let mut archive = self.store.archive(input.archive_record_id).await?;
        if archive.status != ArchiveStatus::Archived {
            return Err(RetainError::state(format!(
                "archive record {} is {:?}, only ARCHIVED records can be restored",
                archive.id, archive.status
            )));
        }

        let tier = archive.storage_tier;
        let now = self.clock.now();
        let mut request = RestoreRequest {
            id: Uuid::new_v4(),
            archive_record_id: archive.id,
            reason: input.reason,
            notes: input.notes,
            requested_by: requested_by.into(),
            estimated_wait_secs: tier.restore_wait_secs(),
            actual_wait_secs: None,
            status: RestoreStatus::Pending,
            restored_blob_url: None,
            expires_at: None,
            error_message: None,
            created_at: now,
        };
        self.store.insert_restore(request.clone()).await?;

        archive.status = ArchiveStatus::Restoring;
        self.store.update_archive(archive.clone()).await?;

        info!(
            restore_id = %request.id,
            archive_id = %archive.id,
            tier = %tier,
            "Restore requested"
        );

        #[cfg(feature = "metrics")]
        crate::observability::RetainMetrics::global().record_restore_request();

        if tier.restores_synchronously() {
            self.restore_synchronously(&mut archive, &mut request).await
        } else {
            self.begin_thaw(&mut archive, &mut request).await
        }
    }

    /// HOT/COOL path: fetch, verify, hand out a time-limited URL.
    async fn restore_synchronously(
        &self,
        archive: &mut ArchiveRecord,
        request: &mut RestoreRequest,
    ) -> Result<RestoreOutcome> {
        match self.verify_and_sign(archive).await {
            Ok(url) => {
                let expires_at = self.clock.now() + Duration::hours(RESTORE_ACCESS_HOURS);
                request.status = RestoreStatus::Completed;
                request.actual_wait_secs = Some(0);
                request.restored_blob_url = Some(url.clone());
                request.expires_at = Some(expires_at);
                self.store.update_restore(request.clone()).await?;

                archive.status = ArchiveStatus::Restored;
                self.store.update_archive(archive.clone()).await?;

                info!(restore_id = %request.id, "Restore complete");
                Ok(RestoreOutcome {
                    request_id: request.id,
                    status: RestoreStatus::Completed,
                    estimated_wait_secs: request.estimated_wait_secs,
                    actual_wait_secs: Some(0),
                    restored_blob_url: Some(url),
                    expires_at: Some(expires_at),
                    error: None,
                })
            }
            Err(e) => self.fail(archive, request, e).await,
        }
    }

    /// COLD/ARCHIVE path: ask the backend to rehydrate and report IN_PROGRESS.
    async fn begin_thaw(
        &self,
        archive: &mut ArchiveRecord,
        request: &mut RestoreRequest,
    ) -> Result<RestoreOutcome> {
        let path = match archive.blob_path.clone() {
            Some(path) => path,
            None => {
                let e = RetainError::storage(format!(
                    "archive record {} has no blob path",
                    archive.id
                ));
                return self.fail(archive, request, e).await;
            }
        };

        if let Err(e) = self.blob.request_thaw(&path).await {
            return self.fail(archive, request, e).await;
        }

        request.status = RestoreStatus::InProgress;
        self.store.update_restore(request.clone()).await?;

        info!(
            restore_id = %request.id,
            wait_secs = request.estimated_wait_secs,
            "Rehydration requested, restore in progress"
        );
        Ok(RestoreOutcome {
            request_id: request.id,
            status: RestoreStatus::InProgress,
            estimated_wait_secs: request.estimated_wait_secs,
            actual_wait_secs: None,
            restored_blob_url: None,
            expires_at: None,
            error: None,
        })
    }

    /// Re-download the blob, check it against the recorded digest and sign a
    /// URL for it.
    async fn verify_and_sign(&self, archive: &ArchiveRecord) -> Result<String> {
        let path = archive.blob_path.as_deref().ok_or_else(|| {
            RetainError::storage(format!("archive record {} has no blob path", archive.id))
        })?;

        let bytes = self.blob.fetch(path).await?;
        if let Some(expected) = archive.checksum.as_deref() {
            payload::verify_checksum(&bytes, expected)?;
        }

        let expires_at = self.clock.now() + Duration::hours(RESTORE_ACCESS_HOURS);
        match self.blob.signed_url(path, expires_at).await {
            Ok(url) => Ok(url),
            // A backend without signing still exposes the stable URL.
            Err(_) => archive.blob_url.clone().ok_or_else(|| {
                RetainError::storage(format!("archive record {} has no blob URL", archive.id))
            }),
        }
    }

    /// Mark both the request and the archive record FAILED.
    async fn fail(
        &self,
        archive: &mut ArchiveRecord,
        request: &mut RestoreRequest,
        cause: RetainError,
    ) -> Result<RestoreOutcome> {
        let message = cause.to_string();
        error!(
            restore_id = %request.id,
            archive_id = %archive.id,
            error = %message,
            "Restore failed"
        );

        request.status = RestoreStatus::Failed;
        request.error_message = Some(message.clone());
        self.store.update_restore(request.clone()).await?;

        archive.status = ArchiveStatus::Failed;
        archive.error_message = Some(message.clone());
        self.store.update_archive(archive.clone()).await?;

        Ok(RestoreOutcome {
            request_id: request.id,
            status: RestoreStatus::Failed,
            estimated_wait_secs: request.estimated_wait_secs,
            actual_wait_secs: None,
            restored_blob_url: None,
            expires_at: None,
            error: Some(message),
        })
    }
}
