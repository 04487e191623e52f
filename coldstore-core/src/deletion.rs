/*!
Approval-gated deletion workflow.

Deleting domain rows is the only destructive operation in the engine, so it
runs as a three-step workflow: a request is created (and counted), a second
party approves or rejects it, and execution first archives the affected rows
as a safety backup before touching the source table. Status transitions go
through the store's compare-and-swap primitive so two concurrent actors
cannot both win the same transition.
*/

use crate::archive::ArchiveEngine;
use crate::clock::Clock;
use crate::model::{DateRange, DeletionRequest, DeletionStatus};
use crate::source::SourceRegistry;
use crate::store::RetentionStore;
use crate::{RetainError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fields for creating a deletion request.
#[derive(Debug, Clone)]
pub struct DeletionInput {
    pub policy_id: Uuid,
    pub range: DateRange,
    pub reason: String,
    pub notes: Option<String>,
}

/// Structured outcome of one deletion execution.
#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    pub success: bool,
    pub deleted_record_count: u64,
    pub backup_archive_id: Option<Uuid>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Drives deletion requests from creation through approval to execution.
pub struct DeletionWorkflow {
    store: Arc<dyn RetentionStore>,
    sources: Arc<SourceRegistry>,
    archive: Arc<ArchiveEngine>,
    clock: Arc<dyn Clock>,
}

impl DeletionWorkflow {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        sources: Arc<SourceRegistry>,
        archive: Arc<ArchiveEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sources,
            archive,
            clock,
        }
    }

    /// Create a deletion request under a policy.
    ///
    /// Counts the affected rows up front so approvers see the blast radius.
    /// A policy with `deletion_protection` refuses outright; a policy without
    /// `require_approval` skips straight to APPROVED.
    pub async fn create_deletion_request(
        &self,
        input: DeletionInput,
        requested_by: impl Into<String>,
    ) -> Result<DeletionRequest> {
        input.range.validate()?;
        let policy = self.store.policy(input.policy_id).await?;
        if policy.deletion_protection {
            return Err(RetainError::policy_violation(format!(
                "policy {} has deletion protection enabled",
                policy.id
            )));
        }

        let source = self.sources.get(policy.data_type)?;
        let record_count = source.count(&input.range).await?;

        let now = self.clock.now();
        let (status, approved_at) = if policy.require_approval {
            (DeletionStatus::Pending, None)
        } else {
            (DeletionStatus::Approved, Some(now))
        };

        let request = DeletionRequest {
            id: Uuid::new_v4(),
            policy_id: policy.id,
            data_type: policy.data_type,
            source_table: source.table().to_string(),
            record_count,
            range: input.range,
            reason: input.reason,
            notes: input.notes,
            requested_by: requested_by.into(),
            status,
            approved_by: None,
            approved_at,
            rejection_reason: None,
            executed_at: None,
            deleted_record_count: None,
            backup_archive_id: None,
            error_message: None,
            created_at: now,
        };
        self.store.insert_deletion(request.clone()).await?;

        info!(
            deletion_id = %request.id,
            policy_id = %policy.id,
            records = record_count,
            status = ?request.status,
            "Created deletion request"
        );
        Ok(request)
    }

    /// Approve or reject a PENDING request. Any other state is a `State`
    /// error; of two concurrent decisions only one wins the swap.
    pub async fn approve_deletion_request(
        &self,
        id: Uuid,
        approve: bool,
        approver: impl Into<String>,
        rejection_reason: Option<String>,
    ) -> Result<DeletionRequest> {
        let mut request = self.store.deletion(id).await?;
        if request.status != DeletionStatus::Pending {
            return Err(RetainError::state(format!(
                "deletion request {} is {:?}, only PENDING requests can be decided",
                id, request.status
            )));
        }

        let now = self.clock.now();
        if approve {
            request.status = DeletionStatus::Approved;
            request.approved_by = Some(approver.into());
            request.approved_at = Some(now);
        } else {
            request.status = DeletionStatus::Rejected;
            request.approved_by = Some(approver.into());
            request.rejection_reason = rejection_reason;
        }

        let stored = self
            .store
            .update_deletion_if(DeletionStatus::Pending, request)
            .await?;
        info!(
            deletion_id = %id,
            approved = approve,
            "Deletion request decided"
        );
        Ok(stored)
    }

    /// Execute an APPROVED request: back up the affected rows, then delete.
    ///
    /// The backup archive id is recorded on the request before the delete
    /// runs, whatever the backup job reported, so the trail survives even a
    /// failed execution. Any error after the EXECUTING swap marks the request
    /// FAILED with the captured message and leaves the backup intact.
    pub async fn execute_deletion(&self, id: Uuid) -> Result<DeletionOutcome> {
        let request = self.store.deletion(id).await?;
        if request.status != DeletionStatus::Approved {
            return Err(RetainError::state(format!(
                "deletion request {} is {:?}, only APPROVED requests can be executed",
                id, request.status
            )));
        }

        let mut executing = request.clone();
        executing.status = DeletionStatus::Executing;
        let mut executing = self
            .store
            .update_deletion_if(DeletionStatus::Approved, executing)
            .await?;

        let started = Instant::now();
        info!(
            deletion_id = %id,
            policy_id = %executing.policy_id,
            records = executing.record_count,
            "Executing deletion"
        );

        match self.backup_and_delete(&mut executing).await {
            Ok(deleted) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                executing.status = DeletionStatus::Completed;
                executing.executed_at = Some(self.clock.now());
                executing.deleted_record_count = Some(deleted);
                let backup_archive_id = executing.backup_archive_id;
                self.store
                    .update_deletion_if(DeletionStatus::Executing, executing)
                    .await?;

                info!(
                    deletion_id = %id,
                    deleted,
                    duration_ms,
                    "Deletion complete"
                );

                #[cfg(feature = "metrics")]
                crate::observability::RetainMetrics::global().record_deletion(deleted);

                Ok(DeletionOutcome {
                    success: true,
                    deleted_record_count: deleted,
                    backup_archive_id,
                    duration_ms,
                    error: None,
                })
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                let message = e.to_string();
                error!(deletion_id = %id, error = %message, "Deletion failed");

                executing.status = DeletionStatus::Failed;
                executing.error_message = Some(message.clone());
                let backup_archive_id = executing.backup_archive_id;
                if let Err(update_err) = self
                    .store
                    .update_deletion_if(DeletionStatus::Executing, executing)
                    .await
                {
                    error!(
                        deletion_id = %id,
                        error = %update_err,
                        "Failed to mark deletion request as failed"
                    );
                }

                Ok(DeletionOutcome {
                    success: false,
                    deleted_record_count: 0,
                    backup_archive_id,
                    duration_ms,
                    error: Some(message),
                })
            }
        }
    }

    /// Run the safety backup, record its id, then delete the source rows.
    async fn backup_and_delete(&self, request: &mut DeletionRequest) -> Result<u64> {
        let backup = self
            .archive
            .run_archive_job(request.policy_id, request.range.clone())
            .await?;
        request.backup_archive_id = Some(backup.archive_id);
        if !backup.success {
            warn!(
                deletion_id = %request.id,
                backup_archive_id = %backup.archive_id,
                "Backup archive job reported failure, proceeding with recorded trail"
            );
        }

        let source = self.sources.get(request.data_type)?;
        source.delete(&request.range).await
    }
}
