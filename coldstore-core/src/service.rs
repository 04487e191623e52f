/*!
Service facade wiring the engines to one store, blob backend and clock.

Most callers want all five surfaces (policies, archive, restore, deletion,
metrics) over the same backends; [`RetentionService`] bundles them, and
[`RetentionService::from_config`] builds the blob adapter from an
[`EngineConfig`].
*/

use crate::archive::ArchiveEngine;
use crate::blob::{BlobStore, LocalBlobStore, MemoryBlobStore};
use crate::clock::{Clock, SystemClock};
use crate::compression::Gzip;
use crate::config::{BlobBackend, EngineConfig};
use crate::deletion::DeletionWorkflow;
use crate::policy::PolicyManager;
use crate::restore::RestoreEngine;
use crate::source::SourceRegistry;
use crate::stats::MetricsAggregator;
use crate::store::RetentionStore;
use crate::{RetainError, Result};
use std::sync::Arc;

/// All engine surfaces over one shared store, blob backend and clock.
pub struct RetentionService {
    pub policies: PolicyManager,
    pub archive: Arc<ArchiveEngine>,
    pub restore: RestoreEngine,
    pub deletion: DeletionWorkflow,
    pub metrics: MetricsAggregator,
}

impl RetentionService {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        blob: Arc<dyn BlobStore>,
        sources: Arc<SourceRegistry>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        let compressor = Arc::new(Gzip::with_level(config.compression_level));
        let archive = Arc::new(ArchiveEngine::new(
            store.clone(),
            blob.clone(),
            sources.clone(),
            compressor,
            clock.clone(),
            config.container.clone(),
        ));
        Self {
            policies: PolicyManager::new(store.clone(), clock.clone()),
            restore: RestoreEngine::new(store.clone(), blob, clock.clone()),
            deletion: DeletionWorkflow::new(store.clone(), sources, archive.clone(), clock),
            metrics: MetricsAggregator::new(store),
            archive,
        }
    }

    /// Build a service over the backend named by the configuration, with the
    /// system clock.
    pub async fn from_config(
        config: &EngineConfig,
        store: Arc<dyn RetentionStore>,
        sources: Arc<SourceRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let blob = build_blob_store(config).await?;
        Ok(Self::new(
            store,
            blob,
            sources,
            Arc::new(SystemClock),
            config,
        ))
    }
}

async fn build_blob_store(config: &EngineConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        BlobBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        BlobBackend::Local => {
            let base = config.local_base_path.as_ref().ok_or_else(|| {
                RetainError::validation("Local backend requires a base path")
            })?;
            Ok(Arc::new(LocalBlobStore::new(base)))
        }
        #[cfg(feature = "s3")]
        BlobBackend::S3 => {
            let bucket = config.s3_bucket.as_deref().ok_or_else(|| {
                RetainError::validation("S3 backend requires a valid bucket name")
            })?;
            Ok(Arc::new(crate::blob::S3BlobStore::new(bucket).await?))
        }
        #[cfg(not(feature = "s3"))]
        BlobBackend::S3 => Err(RetainError::validation(
            "S3 backend requires the `s3` cargo feature",
        )),
    }
}
