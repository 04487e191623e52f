/*!
Retention policy management.
*/

use crate::clock::Clock;
use crate::model::{DataType, RetentionPolicy};
use crate::schedule;
use crate::store::{Page, PolicyFilter, RetentionStore};
use crate::Result;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Fields for creating a policy.
#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub hot_storage_days: u32,
    pub warm_storage_days: u32,
    pub cold_storage_days: u32,
    pub deletion_protection: bool,
    pub require_approval: bool,
    pub min_approval_level: u8,
    pub archive_schedule: Option<String>,
}

/// Partial update; only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct PolicyPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hot_storage_days: Option<u32>,
    pub warm_storage_days: Option<u32>,
    pub cold_storage_days: Option<u32>,
    pub deletion_protection: Option<bool>,
    pub require_approval: Option<bool>,
    pub min_approval_level: Option<u8>,
    pub archive_schedule: Option<String>,
    pub is_active: Option<bool>,
}

/// CRUD over retention policies.
pub struct PolicyManager {
    store: Arc<dyn RetentionStore>,
    clock: Arc<dyn Clock>,
}

impl PolicyManager {
    pub fn new(store: Arc<dyn RetentionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list_policies(
        &self,
        filter: &PolicyFilter,
        page: Page,
    ) -> Result<Vec<RetentionPolicy>> {
        self.store.policies(filter, page).await
    }

    pub async fn policy(&self, id: Uuid) -> Result<RetentionPolicy> {
        self.store.policy(id).await
    }

    /// Create a policy; computes `next_archive_at` from the schedule if set.
    pub async fn create_policy(
        &self,
        input: PolicyInput,
        created_by: Option<String>,
    ) -> Result<RetentionPolicy> {
        let now = self.clock.now();
        let next_archive_at = match &input.archive_schedule {
            Some(expr) => Some(schedule::next_run(expr, now)?),
            None => None,
        };

        let policy = RetentionPolicy {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            data_type: input.data_type,
            hot_storage_days: input.hot_storage_days,
            warm_storage_days: input.warm_storage_days,
            cold_storage_days: input.cold_storage_days,
            deletion_protection: input.deletion_protection,
            require_approval: input.require_approval,
            min_approval_level: input.min_approval_level,
            archive_schedule: input.archive_schedule,
            next_archive_at,
            last_archive_at: None,
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        };

        info!(
            policy_id = %policy.id,
            data_type = %policy.data_type,
            "Created retention policy"
        );
        self.store.insert_policy(policy.clone()).await?;
        Ok(policy)
    }

    /// Apply a partial update. A changed schedule recomputes `next_archive_at`.
    pub async fn update_policy(&self, id: Uuid, patch: PolicyPatch) -> Result<RetentionPolicy> {
        let mut policy = self.store.policy(id).await?;
        let now = self.clock.now();

        if let Some(name) = patch.name {
            policy.name = name;
        }
        if let Some(description) = patch.description {
            policy.description = Some(description);
        }
        if let Some(days) = patch.hot_storage_days {
            policy.hot_storage_days = days;
        }
        if let Some(days) = patch.warm_storage_days {
            policy.warm_storage_days = days;
        }
        if let Some(days) = patch.cold_storage_days {
            policy.cold_storage_days = days;
        }
        if let Some(protection) = patch.deletion_protection {
            policy.deletion_protection = protection;
        }
        if let Some(approval) = patch.require_approval {
            policy.require_approval = approval;
        }
        if let Some(level) = patch.min_approval_level {
            policy.min_approval_level = level;
        }
        if let Some(active) = patch.is_active {
            policy.is_active = active;
        }
        if let Some(expr) = patch.archive_schedule {
            policy.next_archive_at = Some(schedule::next_run(&expr, now)?);
            policy.archive_schedule = Some(expr);
        }
        policy.updated_at = now;

        self.store.update_policy(policy.clone()).await?;
        Ok(policy)
    }

    /// Delete the policy unless archive or deletion children are mid-flight.
    pub async fn delete_policy(&self, id: Uuid) -> Result<()> {
        self.store.remove_policy_if_idle(id).await?;
        info!(policy_id = %id, "Deleted retention policy");
        Ok(())
    }
}
