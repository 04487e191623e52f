/*!
Observability infrastructure for the retention engine.

Structured logging setup plus, behind the `metrics` feature, Prometheus
counters and histograms for archive, deletion and restore activity.
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{RetainError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<RetainMetrics> = OnceLock::new();

/// Metrics collection for retention operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct RetainMetrics {
    pub archive_jobs_total: Counter,
    pub archive_jobs_failed: Counter,
    pub archived_bytes_total: Counter,
    pub compression_ratio: Histogram,

    pub deletions_executed_total: Counter,
    pub deleted_records_total: Counter,

    pub restore_requests_total: Counter,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl RetainMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let archive_jobs_total = Counter::new(
            "coldstore_archive_jobs_total",
            "Total archive jobs run",
        )
        .map_err(|e| RetainError::storage(format!("Failed to create archive_jobs_total: {e}")))?;

        let archive_jobs_failed = Counter::new(
            "coldstore_archive_jobs_failed",
            "Archive jobs that ended FAILED",
        )
        .map_err(|e| RetainError::storage(format!("Failed to create archive_jobs_failed: {e}")))?;

        let archived_bytes_total = Counter::new(
            "coldstore_archived_bytes_total",
            "Compressed bytes written to blob storage",
        )
        .map_err(|e| RetainError::storage(format!("Failed to create archived_bytes_total: {e}")))?;

        let compression_ratio = Histogram::with_opts(prometheus::HistogramOpts::new(
            "coldstore_compression_ratio",
            "Compressed size over original size per archive batch",
        ))
        .map_err(|e| RetainError::storage(format!("Failed to create compression_ratio: {e}")))?;

        let deletions_executed_total = Counter::new(
            "coldstore_deletions_executed_total",
            "Deletion requests executed to completion",
        )
        .map_err(|e| {
            RetainError::storage(format!("Failed to create deletions_executed_total: {e}"))
        })?;

        let deleted_records_total = Counter::new(
            "coldstore_deleted_records_total",
            "Domain rows permanently deleted",
        )
        .map_err(|e| {
            RetainError::storage(format!("Failed to create deleted_records_total: {e}"))
        })?;

        let restore_requests_total = Counter::new(
            "coldstore_restore_requests_total",
            "Restore requests created",
        )
        .map_err(|e| {
            RetainError::storage(format!("Failed to create restore_requests_total: {e}"))
        })?;

        for collector in [
            Box::new(archive_jobs_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(archive_jobs_failed.clone()),
            Box::new(archived_bytes_total.clone()),
            Box::new(compression_ratio.clone()),
            Box::new(deletions_executed_total.clone()),
            Box::new(deleted_records_total.clone()),
            Box::new(restore_requests_total.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| RetainError::storage(format!("Failed to register metric: {e}")))?;
        }

        Ok(Self {
            archive_jobs_total,
            archive_jobs_failed,
            archived_bytes_total,
            compression_ratio,
            deletions_executed_total,
            deleted_records_total,
            restore_requests_total,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    pub fn global() -> &'static RetainMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize retention metrics"))
    }

    /// Record one archive job outcome
    pub fn record_archive_job(&self, success: bool, compressed_bytes: u64) {
        self.archive_jobs_total.inc();
        if success {
            self.archived_bytes_total.inc_by(compressed_bytes as f64);
        } else {
            self.archive_jobs_failed.inc();
        }
    }

    /// Record the compression ratio of one archived batch
    pub fn record_compression_ratio(&self, ratio: f64) {
        self.compression_ratio.observe(ratio);
    }

    /// Record a completed deletion execution
    pub fn record_deletion(&self, deleted_records: u64) {
        self.deletions_executed_total.inc();
        self.deleted_records_total.inc_by(deleted_records as f64);
    }

    /// Record a restore request
    pub fn record_restore_request(&self) {
        self.restore_requests_total.inc();
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| RetainError::storage(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| RetainError::storage(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Initialize the global observability system.
///
/// Sets up structured JSON logging filtered by `RUST_LOG` (with a default
/// `coldstore=info` directive) and, when the `metrics` feature is on, the
/// global Prometheus registry.
pub fn init_observability() -> Result<()> {
    #[cfg(feature = "metrics")]
    RetainMetrics::global();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(false);

    let subscriber = TracingRegistry::default()
        .with(EnvFilter::from_default_env().add_directive("coldstore=info".parse().unwrap()))
        .with(fmt_layer);

    set_global_default(subscriber).map_err(|e| {
        RetainError::storage(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!("Coldstore observability initialized");
    Ok(())
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording_and_gathering() {
        let metrics = RetainMetrics::global();

        metrics.record_archive_job(true, 1024);
        metrics.record_archive_job(false, 0);
        metrics.record_compression_ratio(0.4);
        metrics.record_deletion(50);
        metrics.record_restore_request();

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("coldstore_archive_jobs_total"));
        assert!(text.contains("coldstore_deleted_records_total"));
    }
}
