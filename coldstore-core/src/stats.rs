/*!
Storage metrics rollup.

Read-only aggregation over the entity tables: per-tier and per-data-type
usage, status counts for each workflow, global compression savings and an
estimated monthly storage bill from the fixed per-tier price table.
*/

use crate::model::{
    ArchiveStatus, DataType, DeletionStatus, RestoreStatus, StorageTier,
};
use crate::store::{
    ArchiveFilter, DeletionFilter, Page, RestoreFilter, RetentionStore,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Usage rollup for one storage tier.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TierUsage {
    pub tier: StorageTier,
    pub archive_count: u64,
    pub record_count: u64,
    pub compressed_bytes: u64,
    /// `compressed_bytes / 1 GiB x` the tier's per-GB-month price.
    pub estimated_monthly_cost: f64,
}

/// Usage rollup for one data type.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DataTypeUsage {
    pub data_type: DataType,
    pub archive_count: u64,
    pub record_count: u64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

/// Archive record status counts.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ArchiveStats {
    pub total: u64,
    pub archived: u64,
    pub restored: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub latest_archived_at: Option<DateTime<Utc>>,
}

/// Deletion request status counts plus the destruction total.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct DeletionStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_deleted_records: u64,
}

/// Restore request status counts and average synchronous wait.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RestoreStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub mean_actual_wait_secs: Option<f64>,
}

/// Full storage metrics snapshot.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StorageMetrics {
    pub tiers: Vec<TierUsage>,
    pub data_types: Vec<DataTypeUsage>,
    pub archives: ArchiveStats,
    pub deletions: DeletionStats,
    pub restores: RestoreStats,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    /// `1 - compressed / original`; zero when nothing has been archived.
    pub compression_savings: f64,
    pub estimated_monthly_cost: f64,
}

/// Computes [`StorageMetrics`] from the store.
pub struct MetricsAggregator {
    store: Arc<dyn RetentionStore>,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn RetentionStore>) -> Self {
        Self { store }
    }

    pub async fn storage_metrics(&self) -> Result<StorageMetrics> {
        let everything = Page::new(0, usize::MAX);
        let archives = self
            .store
            .archives(&ArchiveFilter::default(), everything)
            .await?;
        let deletions = self
            .store
            .deletions(&DeletionFilter::default(), everything)
            .await?;
        let restores = self
            .store
            .restores(&RestoreFilter::default(), everything)
            .await?;

        let mut tiers: Vec<TierUsage> = [
            StorageTier::Hot,
            StorageTier::Cool,
            StorageTier::Cold,
            StorageTier::Archive,
        ]
        .iter()
        .map(|&tier| TierUsage {
            tier,
            archive_count: 0,
            record_count: 0,
            compressed_bytes: 0,
            estimated_monthly_cost: 0.0,
        })
        .collect();
        let mut data_types: Vec<DataTypeUsage> = DataType::all()
            .iter()
            .map(|&data_type| DataTypeUsage {
                data_type,
                archive_count: 0,
                record_count: 0,
                original_bytes: 0,
                compressed_bytes: 0,
            })
            .collect();

        let mut archive_stats = ArchiveStats::default();
        let mut total_original = 0u64;
        let mut total_compressed = 0u64;

        for record in &archives {
            archive_stats.total += 1;
            match record.status {
                ArchiveStatus::Archived => archive_stats.archived += 1,
                ArchiveStatus::Restored => archive_stats.restored += 1,
                ArchiveStatus::Failed => archive_stats.failed += 1,
                _ => archive_stats.in_flight += 1,
            }
            if let Some(at) = record.archived_at {
                if archive_stats.latest_archived_at.map_or(true, |l| at > l) {
                    archive_stats.latest_archived_at = Some(at);
                }
            }

            // Only batches that actually reached storage count toward usage.
            let compressed = match record.compressed_size_bytes {
                Some(bytes) => bytes,
                None => continue,
            };
            total_original += record.original_size_bytes;
            total_compressed += compressed;

            let tier = tiers
                .iter_mut()
                .find(|t| t.tier == record.storage_tier)
                .unwrap();
            tier.archive_count += 1;
            tier.record_count += record.record_count;
            tier.compressed_bytes += compressed;

            let usage = data_types
                .iter_mut()
                .find(|d| d.data_type == record.data_type)
                .unwrap();
            usage.archive_count += 1;
            usage.record_count += record.record_count;
            usage.original_bytes += record.original_size_bytes;
            usage.compressed_bytes += compressed;
        }

        let mut estimated_monthly_cost = 0.0;
        for tier in &mut tiers {
            tier.estimated_monthly_cost =
                tier.compressed_bytes as f64 / GIB * tier.tier.cost_per_gb_month();
            estimated_monthly_cost += tier.estimated_monthly_cost;
        }

        let mut deletion_stats = DeletionStats::default();
        for request in &deletions {
            deletion_stats.total += 1;
            match request.status {
                DeletionStatus::Pending => deletion_stats.pending += 1,
                DeletionStatus::Approved | DeletionStatus::Executing => {
                    deletion_stats.approved += 1
                }
                DeletionStatus::Rejected => deletion_stats.rejected += 1,
                DeletionStatus::Completed => deletion_stats.completed += 1,
                DeletionStatus::Failed => deletion_stats.failed += 1,
            }
            deletion_stats.total_deleted_records +=
                request.deleted_record_count.unwrap_or(0);
        }

        let mut restore_stats = RestoreStats::default();
        let mut wait_sum = 0u64;
        let mut wait_count = 0u64;
        for request in &restores {
            restore_stats.total += 1;
            match request.status {
                RestoreStatus::Pending => restore_stats.pending += 1,
                RestoreStatus::InProgress => restore_stats.in_progress += 1,
                RestoreStatus::Completed => restore_stats.completed += 1,
                RestoreStatus::Failed => restore_stats.failed += 1,
            }
            if let Some(wait) = request.actual_wait_secs {
                wait_sum += wait;
                wait_count += 1;
            }
        }
        if wait_count > 0 {
            restore_stats.mean_actual_wait_secs = Some(wait_sum as f64 / wait_count as f64);
        }

        let compression_savings = if total_original > 0 {
            1.0 - total_compressed as f64 / total_original as f64
        } else {
            0.0
        };

        Ok(StorageMetrics {
            tiers,
            data_types,
            archives: archive_stats,
            deletions: deletion_stats,
            restores: restore_stats,
            total_original_bytes: total_original,
            total_compressed_bytes: total_compressed,
            compression_savings,
            estimated_monthly_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveRecord, DateRange, DeletionRequest, RestoreRequest};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    fn archive(
        data_type: DataType,
        tier: StorageTier,
        original: u64,
        compressed: u64,
        records: u64,
        archived_day: u32,
    ) -> ArchiveRecord {
        ArchiveRecord {
            id: Uuid::new_v4(),
            policy_id: Uuid::new_v4(),
            data_type,
            source_table: "t".into(),
            record_count: records,
            range: DateRange::new(ts(1), ts(2)),
            storage_tier: tier,
            blob_container: None,
            blob_path: None,
            blob_url: None,
            original_size_bytes: original,
            compressed_size_bytes: Some(compressed),
            compression_ratio: Some(compressed as f64 / original as f64),
            checksum: None,
            status: ArchiveStatus::Archived,
            error_message: None,
            created_at: ts(archived_day),
            archived_at: Some(ts(archived_day)),
        }
    }

    #[tokio::test]
    async fn test_empty_store_rollup() {
        let store = Arc::new(MemoryStore::new());
        let metrics = MetricsAggregator::new(store)
            .storage_metrics()
            .await
            .unwrap();

        assert_eq!(metrics.archives.total, 0);
        assert_eq!(metrics.compression_savings, 0.0);
        assert_eq!(metrics.estimated_monthly_cost, 0.0);
        assert!(metrics.restores.mean_actual_wait_secs.is_none());
        assert_eq!(metrics.tiers.len(), 4);
        assert_eq!(metrics.data_types.len(), DataType::all().len());
    }

    #[tokio::test]
    async fn test_tier_and_type_rollup() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_archive(archive(
                DataType::AuditLog,
                StorageTier::Hot,
                1000,
                400,
                10,
                5,
            ))
            .await
            .unwrap();
        store
            .insert_archive(archive(
                DataType::AuditLog,
                StorageTier::Cold,
                2000,
                600,
                20,
                9,
            ))
            .await
            .unwrap();
        store
            .insert_archive(archive(
                DataType::Document,
                StorageTier::Hot,
                500,
                500,
                5,
                7,
            ))
            .await
            .unwrap();

        let metrics = MetricsAggregator::new(store)
            .storage_metrics()
            .await
            .unwrap();

        assert_eq!(metrics.total_original_bytes, 3500);
        assert_eq!(metrics.total_compressed_bytes, 1500);
        assert!((metrics.compression_savings - (1.0 - 1500.0 / 3500.0)).abs() < 1e-9);
        assert_eq!(metrics.archives.archived, 3);
        assert_eq!(metrics.archives.latest_archived_at, Some(ts(9)));

        let hot = metrics
            .tiers
            .iter()
            .find(|t| t.tier == StorageTier::Hot)
            .unwrap();
        assert_eq!(hot.archive_count, 2);
        assert_eq!(hot.compressed_bytes, 900);
        assert!(hot.estimated_monthly_cost > 0.0);

        let audit = metrics
            .data_types
            .iter()
            .find(|d| d.data_type == DataType::AuditLog)
            .unwrap();
        assert_eq!(audit.archive_count, 2);
        assert_eq!(audit.record_count, 30);
        assert_eq!(audit.original_bytes, 3000);
    }

    #[tokio::test]
    async fn test_deletion_and_restore_rollups() {
        let store = Arc::new(MemoryStore::new());

        let mut completed = DeletionRequest {
            id: Uuid::new_v4(),
            policy_id: Uuid::new_v4(),
            data_type: DataType::UsageLog,
            source_table: "usage_logs".into(),
            record_count: 50,
            range: DateRange::new(ts(1), ts(2)),
            reason: "cleanup".into(),
            notes: None,
            requested_by: "ops".into(),
            status: DeletionStatus::Completed,
            approved_by: Some("admin".into()),
            approved_at: Some(ts(3)),
            rejection_reason: None,
            executed_at: Some(ts(4)),
            deleted_record_count: Some(50),
            backup_archive_id: None,
            error_message: None,
            created_at: ts(2),
        };
        store.insert_deletion(completed.clone()).await.unwrap();
        completed.id = Uuid::new_v4();
        completed.status = DeletionStatus::Pending;
        completed.deleted_record_count = None;
        store.insert_deletion(completed).await.unwrap();

        let restore = RestoreRequest {
            id: Uuid::new_v4(),
            archive_record_id: Uuid::new_v4(),
            reason: "audit".into(),
            notes: None,
            requested_by: "legal".into(),
            estimated_wait_secs: 30,
            actual_wait_secs: Some(10),
            status: RestoreStatus::Completed,
            restored_blob_url: None,
            expires_at: None,
            error_message: None,
            created_at: ts(5),
        };
        store.insert_restore(restore).await.unwrap();

        let metrics = MetricsAggregator::new(store)
            .storage_metrics()
            .await
            .unwrap();
        assert_eq!(metrics.deletions.total, 2);
        assert_eq!(metrics.deletions.completed, 1);
        assert_eq!(metrics.deletions.pending, 1);
        assert_eq!(metrics.deletions.total_deleted_records, 50);

        assert_eq!(metrics.restores.completed, 1);
        assert_eq!(metrics.restores.mean_actual_wait_secs, Some(10.0));
    }
}
