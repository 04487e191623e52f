/*!
In-memory retention store.

All four entity tables live in one mutex-guarded [`StoreState`], which also
serializes the atomic primitives. The state is serde-serializable so the CLI
can persist it as a JSON file between invocations.
*/

use super::{ArchiveFilter, DeletionFilter, Page, PolicyFilter, RestoreFilter, RetentionStore};
use crate::model::{
    ArchiveRecord, DeletionRequest, DeletionStatus, RestoreRequest, RetentionPolicy,
};
use crate::{RetainError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Serializable snapshot of the four entity tables.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StoreState {
    pub policies: BTreeMap<Uuid, RetentionPolicy>,
    pub archives: BTreeMap<Uuid, ArchiveRecord>,
    pub deletions: BTreeMap<Uuid, DeletionRequest>,
    pub restores: BTreeMap<Uuid, RestoreRequest>,
}

/// Mutex-guarded in-memory implementation of [`RetentionStore`].
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_state(StoreState::default())
    }

    /// Rehydrate from a previously exported state.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Export a snapshot of the current state.
    pub fn state(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T>(mut rows: Vec<T>, page: Page) -> Vec<T> {
    if page.offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..page.offset);
    rows.truncate(page.limit);
    rows
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn insert_policy(&self, policy: RetentionPolicy) -> Result<()> {
        self.state.lock().unwrap().policies.insert(policy.id, policy);
        Ok(())
    }

    async fn policy(&self, id: Uuid) -> Result<RetentionPolicy> {
        self.state
            .lock()
            .unwrap()
            .policies
            .get(&id)
            .cloned()
            .ok_or_else(|| RetainError::not_found("retention policy", id))
    }

    async fn policies(&self, filter: &PolicyFilter, page: Page) -> Result<Vec<RetentionPolicy>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<RetentionPolicy> = state
            .policies
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(paginate(rows, page))
    }

    async fn update_policy(&self, policy: RetentionPolicy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.policies.contains_key(&policy.id) {
            return Err(RetainError::not_found("retention policy", policy.id));
        }
        state.policies.insert(policy.id, policy);
        Ok(())
    }

    async fn remove_policy_if_idle(&self, id: Uuid) -> Result<()> {
        // Guard and delete under one lock; see the trait contract.
        let mut state = self.state.lock().unwrap();
        if !state.policies.contains_key(&id) {
            return Err(RetainError::not_found("retention policy", id));
        }

        let active_archives = state
            .archives
            .values()
            .filter(|a| a.policy_id == id && a.status.is_active())
            .count();
        let active_deletions = state
            .deletions
            .values()
            .filter(|d| d.policy_id == id && d.status.is_active())
            .count();
        if active_archives > 0 || active_deletions > 0 {
            return Err(RetainError::policy_violation(format!(
                "policy {id} has {active_archives} active archive(s) and \
                 {active_deletions} active deletion request(s)"
            )));
        }

        state.policies.remove(&id);
        Ok(())
    }

    async fn insert_archive(&self, record: ArchiveRecord) -> Result<()> {
        self.state.lock().unwrap().archives.insert(record.id, record);
        Ok(())
    }

    async fn archive(&self, id: Uuid) -> Result<ArchiveRecord> {
        self.state
            .lock()
            .unwrap()
            .archives
            .get(&id)
            .cloned()
            .ok_or_else(|| RetainError::not_found("archive record", id))
    }

    async fn archives(&self, filter: &ArchiveFilter, page: Page) -> Result<Vec<ArchiveRecord>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<ArchiveRecord> = state
            .archives
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.created_at);
        Ok(paginate(rows, page))
    }

    async fn update_archive(&self, record: ArchiveRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.archives.contains_key(&record.id) {
            return Err(RetainError::not_found("archive record", record.id));
        }
        state.archives.insert(record.id, record);
        Ok(())
    }

    async fn insert_deletion(&self, request: DeletionRequest) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .deletions
            .insert(request.id, request);
        Ok(())
    }

    async fn deletion(&self, id: Uuid) -> Result<DeletionRequest> {
        self.state
            .lock()
            .unwrap()
            .deletions
            .get(&id)
            .cloned()
            .ok_or_else(|| RetainError::not_found("deletion request", id))
    }

    async fn deletions(&self, filter: &DeletionFilter, page: Page) -> Result<Vec<DeletionRequest>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<DeletionRequest> = state
            .deletions
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.created_at);
        Ok(paginate(rows, page))
    }

    async fn update_deletion_if(
        &self,
        expected: DeletionStatus,
        updated: DeletionRequest,
    ) -> Result<DeletionRequest> {
        let mut state = self.state.lock().unwrap();
        let current = state
            .deletions
            .get(&updated.id)
            .ok_or_else(|| RetainError::not_found("deletion request", updated.id))?;
        if current.status != expected {
            return Err(RetainError::state(format!(
                "deletion request {} is {:?}, expected {:?}",
                updated.id, current.status, expected
            )));
        }
        state.deletions.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn insert_restore(&self, request: RestoreRequest) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .restores
            .insert(request.id, request);
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<RestoreRequest> {
        self.state
            .lock()
            .unwrap()
            .restores
            .get(&id)
            .cloned()
            .ok_or_else(|| RetainError::not_found("restore request", id))
    }

    async fn restores(&self, filter: &RestoreFilter, page: Page) -> Result<Vec<RestoreRequest>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<RestoreRequest> = state
            .restores
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(paginate(rows, page))
    }

    async fn update_restore(&self, request: RestoreRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.restores.contains_key(&request.id) {
            return Err(RetainError::not_found("restore request", request.id));
        }
        state.restores.insert(request.id, request);
        Ok(())
    }
}
