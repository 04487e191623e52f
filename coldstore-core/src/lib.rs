/*!
# Coldstore Core Engine

Data retention and archival engine core library.

This crate provides lifecycle management for aging operational data:

- Retention policies with per-tier age thresholds and archive schedules
- Archive jobs that serialize, gzip and checksum domain rows into blob storage
- Tier-aware restore with synchronous and rehydration paths
- Approval-gated deletion with a mandatory backup archive before any destroy
- Storage metrics rollups with per-tier cost estimation

## Architecture

Infrastructure hangs off four ports so the engines stay backend-agnostic:
- [`blob::BlobStore`] for object storage (local filesystem, in-memory, S3)
- [`store::RetentionStore`] for the entity tables
- [`source::DataSource`] for the domain tables being retained
- [`clock::Clock`] for injected time

## Usage

```no_run
use coldstore_core::config::EngineConfig;
use coldstore_core::model::{DataType, DateRange};
use coldstore_core::policy::PolicyInput;
use coldstore_core::service::RetentionService;
use coldstore_core::source::{MemoryDataSource, SourceRegistry};
use coldstore_core::store::MemoryStore;
use chrono::{Duration, Utc};
use std::sync::Arc;

# async fn demo() -> coldstore_core::Result<()> {
let store = Arc::new(MemoryStore::new());
let mut sources = SourceRegistry::new();
sources.register(Arc::new(MemoryDataSource::new(DataType::AuditLog, "audit_logs")));

let service =
    RetentionService::from_config(&EngineConfig::memory(), store, Arc::new(sources)).await?;

let policy = service
    .policies
    .create_policy(
        PolicyInput {
            name: "audit retention".into(),
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
    .await?;

let range = DateRange::new(Utc::now() - Duration::days(90), Utc::now() - Duration::days(30));
let result = service.archive.run_archive_job(policy.id, range).await?;
assert!(result.success);
# Ok(())
# }
```
*/

pub mod archive;
pub mod blob;
pub mod clock;
pub mod compression;
pub mod config;
pub mod deletion;
pub mod error;
pub mod model;
pub mod observability;
pub mod payload;
pub mod policy;
pub mod restore;
pub mod schedule;
pub mod service;
pub mod source;
pub mod stats;
pub mod store;

pub use archive::{ArchiveEngine, ArchiveJobResult};
pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use compression::{CompressionAdapter, Gzip, NoCompression};
pub use config::{BlobBackend, EngineConfig};
pub use deletion::{DeletionInput, DeletionOutcome, DeletionWorkflow};
pub use error::{RetainError, Result};
pub use model::{
    ArchiveRecord, ArchiveStatus, DataType, DateRange, DeletionRequest, DeletionStatus,
    RestoreRequest, RestoreStatus, RetentionPolicy, StorageTier,
};
pub use payload::ArchivePayload;
pub use policy::{PolicyInput, PolicyManager, PolicyPatch};
pub use restore::{RestoreEngine, RestoreInput, RestoreOutcome};
pub use service::RetentionService;
pub use source::{DataSource, MemoryDataSource, SourceRegistry, SourceRow};
pub use stats::{MetricsAggregator, StorageMetrics};
pub use store::{MemoryStore, RetentionStore, StoreState};

#[cfg(feature = "s3")]
pub use blob::S3BlobStore;
