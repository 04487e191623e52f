/*!
Archive engine.

`run_archive_job` walks one policy's domain rows over a date range through
the full pipeline: serialize, compress, checksum, upload, record. The
ArchiveRecord is created in ARCHIVING before any I/O so that every failure
after that point lands on the record as FAILED with the captured message;
the caller always gets a structured [`ArchiveJobResult`] back. Only the
policy-not-found precondition and the same-policy concurrency guard surface
as `Err`.
*/

use crate::blob::BlobStore;
use crate::clock::Clock;
use crate::compression::CompressionAdapter;
use crate::model::{ArchiveRecord, ArchiveStatus, DateRange, RetentionPolicy, StorageTier};
use crate::payload::{self, ArchivePayload};
use crate::schedule;
use crate::source::SourceRegistry;
use crate::store::RetentionStore;
use crate::{RetainError, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Structured outcome of one archive job.
#[derive(Debug, Clone)]
pub struct ArchiveJobResult {
    pub success: bool,
    pub archive_id: Uuid,
    pub record_count: u64,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
    pub compression_ratio: f64,
    pub checksum: Option<String>,
    pub blob_url: Option<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Output of the fallible pipeline stage, folded into the record and result.
struct PipelineOutcome {
    record_count: u64,
    original_size_bytes: u64,
    compressed_size_bytes: u64,
    compression_ratio: f64,
    checksum: Option<String>,
    blob_url: Option<String>,
}

/// Releases the per-policy claim when the job ends, however it ends.
struct PolicyClaim<'a> {
    running: &'a Mutex<HashSet<Uuid>>,
    policy_id: Uuid,
}

impl<'a> PolicyClaim<'a> {
    fn take(running: &'a Mutex<HashSet<Uuid>>, policy_id: Uuid) -> Result<Self> {
        if !running.lock().unwrap().insert(policy_id) {
            return Err(RetainError::JobInProgress { policy_id });
        }
        Ok(Self { running, policy_id })
    }
}

impl Drop for PolicyClaim<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.policy_id);
    }
}

/// Runs archive jobs against the injected store, blob backend and sources.
pub struct ArchiveEngine {
    store: Arc<dyn RetentionStore>,
    blob: Arc<dyn BlobStore>,
    sources: Arc<SourceRegistry>,
    compressor: Arc<dyn CompressionAdapter>,
    clock: Arc<dyn Clock>,
    container: String,
    running: Mutex<HashSet<Uuid>>,
}

impl ArchiveEngine {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        blob: Arc<dyn BlobStore>,
        sources: Arc<SourceRegistry>,
        compressor: Arc<dyn CompressionAdapter>,
        clock: Arc<dyn Clock>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            blob,
            sources,
            compressor,
            clock,
            container: container.into(),
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Archive all rows of the policy's data type created within `range`.
    ///
    /// An empty range is a successful no-op job, not an error. A second call
    /// for the same policy while one is in flight fails fast with
    /// `JobInProgress` and writes nothing.
    pub async fn run_archive_job(
        &self,
        policy_id: Uuid,
        range: DateRange,
    ) -> Result<ArchiveJobResult> {
        range.validate()?;
        let policy = self.store.policy(policy_id).await?;
        let source = self.sources.get(policy.data_type)?;
        let _claim = PolicyClaim::take(&self.running, policy_id)?;

        let started = Instant::now();
        let now = self.clock.now();
        let mut record = ArchiveRecord {
            id: Uuid::new_v4(),
            policy_id,
            data_type: policy.data_type,
            source_table: source.table().to_string(),
            record_count: 0,
            range: range.clone(),
            storage_tier: StorageTier::Hot,
            blob_container: Some(self.container.clone()),
            blob_path: None,
            blob_url: None,
            original_size_bytes: 0,
            compressed_size_bytes: None,
            compression_ratio: None,
            checksum: None,
            status: ArchiveStatus::Archiving,
            error_message: None,
            created_at: now,
            archived_at: None,
        };
        self.store.insert_archive(record.clone()).await?;

        info!(
            archive_id = %record.id,
            policy_id = %policy_id,
            data_type = %policy.data_type,
            "Starting archive job"
        );

        match self.pipeline(&policy, &mut record).await {
            Ok(outcome) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.touch_policy_schedule(policy).await;

                info!(
                    archive_id = %record.id,
                    records = outcome.record_count,
                    original_bytes = outcome.original_size_bytes,
                    compressed_bytes = outcome.compressed_size_bytes,
                    duration_ms,
                    "Archive job complete"
                );

                #[cfg(feature = "metrics")]
                {
                    let metrics = crate::observability::RetainMetrics::global();
                    metrics.record_archive_job(true, outcome.compressed_size_bytes);
                    if outcome.record_count > 0 {
                        metrics.record_compression_ratio(outcome.compression_ratio);
                    }
                }

                Ok(ArchiveJobResult {
                    success: true,
                    archive_id: record.id,
                    record_count: outcome.record_count,
                    original_size_bytes: outcome.original_size_bytes,
                    compressed_size_bytes: outcome.compressed_size_bytes,
                    compression_ratio: outcome.compression_ratio,
                    checksum: outcome.checksum,
                    blob_url: outcome.blob_url,
                    duration_ms,
                    error: None,
                })
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                let message = e.to_string();
                error!(
                    archive_id = %record.id,
                    policy_id = %policy_id,
                    error = %message,
                    "Archive job failed"
                );

                record.status = ArchiveStatus::Failed;
                record.error_message = Some(message.clone());
                if let Err(update_err) = self.store.update_archive(record.clone()).await {
                    error!(
                        archive_id = %record.id,
                        error = %update_err,
                        "Failed to mark archive record as failed"
                    );
                }

                #[cfg(feature = "metrics")]
                crate::observability::RetainMetrics::global().record_archive_job(false, 0);

                Ok(ArchiveJobResult {
                    success: false,
                    archive_id: record.id,
                    record_count: 0,
                    original_size_bytes: 0,
                    compressed_size_bytes: 0,
                    compression_ratio: 0.0,
                    checksum: None,
                    blob_url: None,
                    duration_ms,
                    error: Some(message),
                })
            }
        }
    }

    /// The fallible stage: fetch, serialize, compress, hash, upload, finalize.
    async fn pipeline(
        &self,
        policy: &RetentionPolicy,
        record: &mut ArchiveRecord,
    ) -> Result<PipelineOutcome> {
        let source = self.sources.get(policy.data_type)?;
        let rows = source.fetch(&record.range).await?;

        if rows.is_empty() {
            record.status = ArchiveStatus::Archived;
            record.archived_at = Some(self.clock.now());
            self.store.update_archive(record.clone()).await?;
            return Ok(PipelineOutcome {
                record_count: 0,
                original_size_bytes: 0,
                compressed_size_bytes: 0,
                compression_ratio: 0.0,
                checksum: None,
                blob_url: None,
            });
        }

        let record_count = rows.len() as u64;
        let archive_payload = ArchivePayload::new(
            policy.data_type,
            record.source_table.clone(),
            record.range.clone(),
            rows,
        );

        // Serialization, compression and hashing are the CPU-bound steps;
        // keep them off the async executor.
        let compressor = Arc::clone(&self.compressor);
        let (original_size, compressed, digest) =
            tokio::task::spawn_blocking(move || -> Result<(u64, Vec<u8>, String)> {
                let raw = archive_payload.to_bytes()?;
                let compressed = compressor.compress(&raw)?;
                let digest = payload::checksum(&compressed);
                Ok((raw.len() as u64, compressed, digest))
            })
            .await
            .map_err(|e| RetainError::compression(format!("compression task panicked: {e}")))??;

        let compressed_size = compressed.len() as u64;
        let ratio = compressed_size as f64 / original_size as f64;

        let path = payload::blob_path(policy.data_type, self.clock.now(), record.id);
        let url = self
            .blob
            .upload(&self.container, &path, Bytes::from(compressed))
            .await?;

        // The backend decides where a fresh blob actually lands.
        match self.blob.location_tier(&path).await {
            Ok(tier) => record.storage_tier = tier,
            Err(e) => warn!(blob_path = %path, error = %e, "Could not read blob tier"),
        }

        record.record_count = record_count;
        record.original_size_bytes = original_size;
        record.compressed_size_bytes = Some(compressed_size);
        record.compression_ratio = Some(ratio);
        record.checksum = Some(digest.clone());
        record.blob_path = Some(path);
        record.blob_url = Some(url.clone());
        record.status = ArchiveStatus::Archived;
        record.archived_at = Some(self.clock.now());
        self.store.update_archive(record.clone()).await?;

        Ok(PipelineOutcome {
            record_count,
            original_size_bytes: original_size,
            compressed_size_bytes: compressed_size,
            compression_ratio: ratio,
            checksum: Some(digest),
            blob_url: Some(url),
        })
    }

    /// Record the completed run on the policy and roll its schedule forward.
    async fn touch_policy_schedule(&self, mut policy: RetentionPolicy) {
        let now = self.clock.now();
        policy.last_archive_at = Some(now);
        policy.next_archive_at = match policy.archive_schedule.as_deref() {
            Some(expr) => match schedule::next_run(expr, now) {
                Ok(next) => Some(next),
                Err(e) => {
                    warn!(policy_id = %policy.id, error = %e, "Invalid stored schedule");
                    None
                }
            },
            None => None,
        };
        policy.updated_at = now;
        if let Err(e) = self.store.update_policy(policy.clone()).await {
            warn!(policy_id = %policy.id, error = %e, "Failed to update policy schedule");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::compression::Gzip;
    use crate::blob::MemoryBlobStore;
    use crate::model::DataType;
    use crate::policy::{PolicyInput, PolicyManager};
    use crate::source::MemoryDataSource;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        blob: Arc<MemoryBlobStore>,
        source: Arc<MemoryDataSource>,
        clock: Arc<FixedClock>,
        engine: ArchiveEngine,
        policies: PolicyManager,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let blob = Arc::new(MemoryBlobStore::new());
        let source = Arc::new(MemoryDataSource::new(DataType::AuditLog, "audit_logs"));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        ));
        let mut sources = SourceRegistry::new();
        sources.register(source.clone());

        let engine = ArchiveEngine::new(
            store.clone(),
            blob.clone(),
            Arc::new(sources),
            Arc::new(Gzip::new()),
            clock.clone(),
            "archives",
        );
        let policies = PolicyManager::new(store.clone(), clock.clone());
        Fixture {
            store,
            blob,
            source,
            clock,
            engine,
            policies,
        }
    }

    fn january() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
        )
    }

    async fn make_policy(fx: &Fixture) -> Uuid {
        fx.policies
            .create_policy(
                PolicyInput {
                    name: "audit".into(),
                    description: None,
                    data_type: DataType::AuditLog,
                    hot_storage_days: 30,
                    warm_storage_days: 90,
                    cold_storage_days: 365,
                    deletion_protection: false,
                    require_approval: true,
                    min_approval_level: 1,
                    archive_schedule: Some("@daily".into()),
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    fn seed_rows(fx: &Fixture, count: usize) {
        for i in 0..count {
            fx.source.push(
                Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, i as u32 % 60).unwrap(),
                json!({ "event": "login", "seq": i }),
            );
        }
    }

    #[tokio::test]
    async fn test_archive_job_happy_path() {
        let fx = fixture();
        let policy_id = make_policy(&fx).await;
        seed_rows(&fx, 120);

        let result = fx.engine.run_archive_job(policy_id, january()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.record_count, 120);
        assert!(result.compressed_size_bytes <= result.original_size_bytes);
        assert!(result.compression_ratio < 1.0);
        let checksum = result.checksum.unwrap();
        assert_eq!(checksum.len(), 64);

        let record = fx.store.archive(result.archive_id).await.unwrap();
        assert_eq!(record.status, ArchiveStatus::Archived);
        assert_eq!(record.record_count, 120);
        assert_eq!(record.checksum.as_deref(), Some(checksum.as_str()));
        assert!(record.archived_at.is_some());

        // Blob content hashes back to the recorded checksum.
        let path = record.blob_path.unwrap();
        let blob_bytes = fx.blob.fetch(&path).await.unwrap();
        assert_eq!(payload::checksum(&blob_bytes), checksum);

        // Policy bookkeeping rolled forward.
        let policy = fx.store.policy(policy_id).await.unwrap();
        assert_eq!(policy.last_archive_at, Some(fx.clock.now()));
        assert!(policy.next_archive_at.unwrap() > fx.clock.now());
    }

    #[tokio::test]
    async fn test_empty_range_is_success_not_failure() {
        let fx = fixture();
        let policy_id = make_policy(&fx).await;

        let result = fx.engine.run_archive_job(policy_id, january()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.record_count, 0);
        assert_eq!(result.original_size_bytes, 0);
        assert!(result.checksum.is_none());

        let record = fx.store.archive(result.archive_id).await.unwrap();
        assert_eq!(record.status, ArchiveStatus::Archived);
        assert_eq!(record.record_count, 0);
        assert!(record.blob_path.is_none());
    }

    #[tokio::test]
    async fn test_missing_policy_is_an_error() {
        let fx = fixture();
        let err = fx
            .engine
            .run_archive_job(Uuid::new_v4(), january())
            .await
            .unwrap_err();
        assert!(matches!(err, RetainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_blob_paths_are_unique_per_record() {
        let fx = fixture();
        let policy_id = make_policy(&fx).await;
        seed_rows(&fx, 10);

        let first = fx.engine.run_archive_job(policy_id, january()).await.unwrap();
        let second = fx.engine.run_archive_job(policy_id, january()).await.unwrap();
        assert!(first.success && second.success);
        assert_ne!(first.archive_id, second.archive_id);

        let a = fx.store.archive(first.archive_id).await.unwrap();
        let b = fx.store.archive(second.archive_id).await.unwrap();
        assert_ne!(a.blob_path, b.blob_path);
        // Identical inputs compress to identical bytes and digests.
        assert_eq!(a.checksum, b.checksum);
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_before_any_write() {
        let fx = fixture();
        let policy_id = make_policy(&fx).await;
        let inverted = DateRange::new(january().end, january().start);

        assert!(fx
            .engine
            .run_archive_job(policy_id, inverted)
            .await
            .is_err());
        let records = fx
            .store
            .archives(&Default::default(), Default::default())
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
