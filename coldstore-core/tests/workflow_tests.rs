//! End-to-end workflow tests over the in-memory backends.
//!
//! Exercises the full lifecycle: policy creation, archival with compression
//! and checksums, restore from hot and cold tiers, the approval-gated
//! deletion flow with backup-before-delete, and the metrics rollup.

use chrono::{Duration, TimeZone, Utc};
use coldstore_core::{
    ArchiveEngine, ArchiveStatus, BlobStore, Clock, CompressionAdapter, DataType, DateRange,
    DeletionInput, DeletionStatus, DeletionWorkflow, FixedClock, Gzip, MemoryBlobStore,
    MemoryDataSource, MetricsAggregator, PolicyInput, PolicyManager, RestoreEngine, RestoreInput,
    RestoreStatus, RetainError, SourceRegistry, StorageTier,
};
use coldstore_core::store::{MemoryStore, RetentionStore};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

struct World {
    store: Arc<MemoryStore>,
    blob: Arc<MemoryBlobStore>,
    audit: Arc<MemoryDataSource>,
    clock: Arc<FixedClock>,
    policies: PolicyManager,
    archive: Arc<ArchiveEngine>,
    restore: RestoreEngine,
    deletion: DeletionWorkflow,
    metrics: MetricsAggregator,
}

fn world_with_tier(tier: StorageTier) -> World {
    let store = Arc::new(MemoryStore::new());
    let blob = Arc::new(MemoryBlobStore::with_tier(tier));
    let audit = Arc::new(MemoryDataSource::new(DataType::AuditLog, "audit_logs"));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
    ));

    let mut sources = SourceRegistry::new();
    sources.register(audit.clone());
    let sources = Arc::new(sources);

    let archive = Arc::new(ArchiveEngine::new(
        store.clone(),
        blob.clone(),
        sources.clone(),
        Arc::new(Gzip::new()),
        clock.clone(),
        "archives",
    ));
    World {
        policies: PolicyManager::new(store.clone(), clock.clone()),
        restore: RestoreEngine::new(store.clone(), blob.clone(), clock.clone()),
        deletion: DeletionWorkflow::new(store.clone(), sources, archive.clone(), clock.clone()),
        metrics: MetricsAggregator::new(store.clone()),
        store,
        blob,
        audit,
        clock,
        archive,
    }
}

fn world() -> World {
    world_with_tier(StorageTier::Hot)
}

fn january() -> DateRange {
    DateRange::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
    )
}

async fn audit_policy(world: &World, protected: bool, require_approval: bool) -> Uuid {
    world
        .policies
        .create_policy(
            PolicyInput {
                name: "audit retention".into(),
                description: Some("keep 30 days hot".into()),
                data_type: DataType::AuditLog,
                hot_storage_days: 30,
                warm_storage_days: 90,
                cold_storage_days: 365,
                deletion_protection: protected,
                require_approval,
                min_approval_level: 2,
                archive_schedule: Some("@daily".into()),
            },
            Some("compliance-bot".into()),
        )
        .await
        .unwrap()
        .id
}

fn seed_audit_rows(world: &World, count: usize) {
    for i in 0..count {
        let day = 1 + (i % 28) as u32;
        world.audit.push(
            Utc.with_ymd_and_hms(2025, 1, day, 10, 0, 0).unwrap(),
            json!({ "event": "login", "user": format!("u-{i}"), "seq": i }),
        );
    }
}

#[tokio::test]
async fn archive_then_hot_restore_roundtrip() {
    let world = world();
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 120);

    let result = world
        .archive
        .run_archive_job(policy_id, january())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.record_count, 120);
    assert!(result.compression_ratio < 1.0);

    world.clock.advance(Duration::days(3));
    let outcome = world
        .restore
        .restore_from_archive(
            RestoreInput {
                archive_record_id: result.archive_id,
                reason: "incident review".into(),
                notes: None,
            },
            "analyst",
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, RestoreStatus::Completed);
    assert_eq!(outcome.actual_wait_secs, Some(0));
    assert_eq!(
        outcome.expires_at,
        Some(world.clock.now() + Duration::hours(24))
    );

    let archive = world.store.archive(result.archive_id).await.unwrap();
    assert_eq!(archive.status, ArchiveStatus::Restored);
}

#[tokio::test]
async fn cold_restore_waits_for_rehydration() {
    let world = world_with_tier(StorageTier::Archive);
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 10);

    let result = world
        .archive
        .run_archive_job(policy_id, january())
        .await
        .unwrap();
    assert!(result.success);

    let record = world.store.archive(result.archive_id).await.unwrap();
    assert_eq!(record.storage_tier, StorageTier::Archive);

    let outcome = world
        .restore
        .restore_from_archive(
            RestoreInput {
                archive_record_id: result.archive_id,
                reason: "legal hold".into(),
                notes: None,
            },
            "legal",
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, RestoreStatus::InProgress);
    assert_eq!(outcome.estimated_wait_secs, 43_200);
    assert_eq!(world.blob.thaw_requests().len(), 1);

    // A second restore while the first is rehydrating is rejected.
    let err = world
        .restore
        .restore_from_archive(
            RestoreInput {
                archive_record_id: result.archive_id,
                reason: "again".into(),
                notes: None,
            },
            "legal",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RetainError::State(_)));
}

#[tokio::test]
async fn deletion_flow_backs_up_before_destroying() {
    let world = world();
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 50);

    let request = world
        .deletion
        .create_deletion_request(
            DeletionInput {
                policy_id,
                range: january(),
                reason: "retention window elapsed".into(),
                notes: None,
            },
            "ops",
        )
        .await
        .unwrap();
    assert_eq!(request.status, DeletionStatus::Pending);
    assert_eq!(request.record_count, 50);

    // Execution before approval is a hard error and touches nothing.
    let err = world.deletion.execute_deletion(request.id).await.unwrap_err();
    assert!(matches!(err, RetainError::State(_)));
    assert_eq!(world.audit.rows().len(), 50);

    world
        .deletion
        .approve_deletion_request(request.id, true, "compliance-lead", None)
        .await
        .unwrap();

    let outcome = world.deletion.execute_deletion(request.id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.deleted_record_count, 50);
    assert!(world.audit.rows().is_empty());

    // The backup archive holds exactly the destroyed rows.
    let backup = world
        .store
        .archive(outcome.backup_archive_id.unwrap())
        .await
        .unwrap();
    assert_eq!(backup.status, ArchiveStatus::Archived);
    assert_eq!(backup.record_count, 50);
    assert!(backup.checksum.is_some());
}

#[tokio::test]
async fn rejected_deletion_never_executes() {
    let world = world();
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 5);

    let request = world
        .deletion
        .create_deletion_request(
            DeletionInput {
                policy_id,
                range: january(),
                reason: "cleanup".into(),
                notes: None,
            },
            "ops",
        )
        .await
        .unwrap();
    let rejected = world
        .deletion
        .approve_deletion_request(request.id, false, "compliance-lead", Some("scope too wide".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, DeletionStatus::Rejected);

    let err = world.deletion.execute_deletion(request.id).await.unwrap_err();
    assert!(matches!(err, RetainError::State(_)));
    assert_eq!(world.audit.rows().len(), 5);
}

#[tokio::test]
async fn deletion_protection_blocks_at_request_time() {
    let world = world();
    let policy_id = audit_policy(&world, true, true).await;
    seed_audit_rows(&world, 5);

    let err = world
        .deletion
        .create_deletion_request(
            DeletionInput {
                policy_id,
                range: january(),
                reason: "cleanup".into(),
                notes: None,
            },
            "ops",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RetainError::PolicyViolation(_)));
}

#[tokio::test]
async fn policy_with_active_children_cannot_be_deleted() {
    let world = world();
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 10);

    world
        .deletion
        .create_deletion_request(
            DeletionInput {
                policy_id,
                range: january(),
                reason: "cleanup".into(),
                notes: None,
            },
            "ops",
        )
        .await
        .unwrap();

    // The PENDING deletion request pins the policy.
    let err = world.policies.delete_policy(policy_id).await.unwrap_err();
    assert!(matches!(err, RetainError::PolicyViolation(_)));
}

#[tokio::test]
async fn metrics_rollup_reflects_full_lifecycle() {
    let world = world();
    let policy_id = audit_policy(&world, false, false).await;
    seed_audit_rows(&world, 80);

    let archived = world
        .archive
        .run_archive_job(policy_id, january())
        .await
        .unwrap();

    world
        .restore
        .restore_from_archive(
            RestoreInput {
                archive_record_id: archived.archive_id,
                reason: "spot check".into(),
                notes: None,
            },
            "analyst",
        )
        .await
        .unwrap();

    let request = world
        .deletion
        .create_deletion_request(
            DeletionInput {
                policy_id,
                range: january(),
                reason: "cleanup".into(),
                notes: None,
            },
            "ops",
        )
        .await
        .unwrap();
    world.deletion.execute_deletion(request.id).await.unwrap();

    let metrics = world.metrics.storage_metrics().await.unwrap();
    // One user archive (now restored) plus the deletion's backup archive.
    assert_eq!(metrics.archives.total, 2);
    assert_eq!(metrics.archives.restored, 1);
    assert_eq!(metrics.archives.archived, 1);
    assert!(metrics.compression_savings > 0.0);
    assert!(metrics.estimated_monthly_cost > 0.0);
    assert_eq!(metrics.deletions.completed, 1);
    assert_eq!(metrics.deletions.total_deleted_records, 80);
    assert_eq!(metrics.restores.completed, 1);
    assert_eq!(metrics.restores.mean_actual_wait_secs, Some(0.0));

    let audit_usage = metrics
        .data_types
        .iter()
        .find(|d| d.data_type == DataType::AuditLog)
        .unwrap();
    assert_eq!(audit_usage.archive_count, 2);
    assert_eq!(audit_usage.record_count, 160);
}

#[tokio::test]
async fn archived_blob_decompresses_back_to_source_rows() {
    let world = world();
    let policy_id = audit_policy(&world, false, true).await;
    seed_audit_rows(&world, 17);

    let result = world
        .archive
        .run_archive_job(policy_id, january())
        .await
        .unwrap();
    let record = world.store.archive(result.archive_id).await.unwrap();

    let compressed = world
        .blob
        .fetch(record.blob_path.as_deref().unwrap())
        .await
        .unwrap();
    coldstore_core::payload::verify_checksum(&compressed, record.checksum.as_deref().unwrap())
        .unwrap();

    let raw = Gzip::new().decompress(&compressed).unwrap();
    let payload = coldstore_core::ArchivePayload::from_bytes(&raw).unwrap();
    assert_eq!(payload.data_type, DataType::AuditLog);
    assert_eq!(payload.record_count, 17);
    assert_eq!(payload.records.len(), 17);
    assert_eq!(payload.source_table, "audit_logs");
}
