/*!
Persistence port for the four retention entities.

The engine only touches the relational store through [`RetentionStore`]:
typed CRUD over policies, archive records, deletion requests and restore
requests, plus two atomic primitives the state machines rely on:

- `remove_policy_if_idle` folds the "no active children" guard and the delete
  into one serialized call, so the check-then-delete race cannot occur;
- `update_deletion_if` is a compare-and-swap on the deletion status, so two
  concurrent transitions on the same request cannot both succeed.
*/

pub mod memory;

use crate::model::{
    ArchiveRecord, ArchiveStatus, DataType, DeletionRequest, DeletionStatus, RestoreRequest,
    RestoreStatus, RetentionPolicy,
};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::{MemoryStore, StoreState};

/// Offset/limit pagination for listing surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Filter for policy listings.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub data_type: Option<DataType>,
    pub is_active: Option<bool>,
}

impl PolicyFilter {
    pub fn matches(&self, policy: &RetentionPolicy) -> bool {
        self.data_type.map_or(true, |dt| policy.data_type == dt)
            && self.is_active.map_or(true, |a| policy.is_active == a)
    }
}

/// Filter for archive record listings.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    pub policy_id: Option<Uuid>,
    pub data_type: Option<DataType>,
    pub status: Option<ArchiveStatus>,
}

impl ArchiveFilter {
    pub fn matches(&self, record: &ArchiveRecord) -> bool {
        self.policy_id.map_or(true, |id| record.policy_id == id)
            && self.data_type.map_or(true, |dt| record.data_type == dt)
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Filter for deletion request listings.
#[derive(Debug, Clone, Default)]
pub struct DeletionFilter {
    pub policy_id: Option<Uuid>,
    pub status: Option<DeletionStatus>,
}

impl DeletionFilter {
    pub fn matches(&self, request: &DeletionRequest) -> bool {
        self.policy_id.map_or(true, |id| request.policy_id == id)
            && self.status.map_or(true, |s| request.status == s)
    }
}

/// Filter for restore request listings.
#[derive(Debug, Clone, Default)]
pub struct RestoreFilter {
    pub archive_record_id: Option<Uuid>,
    pub status: Option<RestoreStatus>,
}

impl RestoreFilter {
    pub fn matches(&self, request: &RestoreRequest) -> bool {
        self.archive_record_id
            .map_or(true, |id| request.archive_record_id == id)
            && self.status.map_or(true, |s| request.status == s)
    }
}

/// Typed CRUD over the four entity tables.
///
/// Implementations must serialize `remove_policy_if_idle` and
/// `update_deletion_if` against concurrent writers (single mutex here, a
/// transaction or optimistic version check in a SQL implementation).
#[async_trait]
pub trait RetentionStore: Send + Sync {
    // Policies
    async fn insert_policy(&self, policy: RetentionPolicy) -> Result<()>;
    async fn policy(&self, id: Uuid) -> Result<RetentionPolicy>;
    async fn policies(&self, filter: &PolicyFilter, page: Page) -> Result<Vec<RetentionPolicy>>;
    async fn update_policy(&self, policy: RetentionPolicy) -> Result<()>;
    /// Delete the policy unless any referencing archive record or deletion
    /// request is in a non-terminal state; `PolicyViolation` otherwise.
    async fn remove_policy_if_idle(&self, id: Uuid) -> Result<()>;

    // Archive records
    async fn insert_archive(&self, record: ArchiveRecord) -> Result<()>;
    async fn archive(&self, id: Uuid) -> Result<ArchiveRecord>;
    async fn archives(&self, filter: &ArchiveFilter, page: Page) -> Result<Vec<ArchiveRecord>>;
    async fn update_archive(&self, record: ArchiveRecord) -> Result<()>;

    // Deletion requests
    async fn insert_deletion(&self, request: DeletionRequest) -> Result<()>;
    async fn deletion(&self, id: Uuid) -> Result<DeletionRequest>;
    async fn deletions(&self, filter: &DeletionFilter, page: Page) -> Result<Vec<DeletionRequest>>;
    /// Replace the request iff its stored status equals `expected`;
    /// `State` error otherwise. Returns the stored row after the swap.
    async fn update_deletion_if(
        &self,
        expected: DeletionStatus,
        updated: DeletionRequest,
    ) -> Result<DeletionRequest>;

    // Restore requests
    async fn insert_restore(&self, request: RestoreRequest) -> Result<()>;
    async fn restore(&self, id: Uuid) -> Result<RestoreRequest>;
    async fn restores(&self, filter: &RestoreFilter, page: Page) -> Result<Vec<RestoreRequest>>;
    async fn update_restore(&self, request: RestoreRequest) -> Result<()>;
}
