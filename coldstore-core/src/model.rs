/*!
Entity definitions and state machines for the retention engine.

Four entities drive the engine: [`RetentionPolicy`] governs one data
category, [`ArchiveRecord`] is the permanent trail of one archival batch,
[`DeletionRequest`] gates destructive deletion behind approval, and
[`RestoreRequest`] tracks making an archived blob accessible again.
*/

use crate::{RetainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Enumerated category of retainable data.
///
/// Each variant maps to one underlying domain table via the source registry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    AuditLog,
    ChangeHistory,
    UsageLog,
    UserSession,
    Document,
    Notification,
}

impl DataType {
    /// Stable slug used in blob paths and CLI arguments.
    pub fn slug(&self) -> &'static str {
        match self {
            DataType::AuditLog => "audit-log",
            DataType::ChangeHistory => "change-history",
            DataType::UsageLog => "usage-log",
            DataType::UserSession => "user-session",
            DataType::Document => "document",
            DataType::Notification => "notification",
        }
    }

    /// All known data types.
    pub fn all() -> &'static [DataType] {
        &[
            DataType::AuditLog,
            DataType::ChangeHistory,
            DataType::UsageLog,
            DataType::UserSession,
            DataType::Document,
            DataType::Notification,
        ]
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DataType {
    type Err = RetainError;

    fn from_str(s: &str) -> Result<Self> {
        DataType::all()
            .iter()
            .copied()
            .find(|dt| dt.slug() == s)
            .ok_or_else(|| RetainError::validation(format!("unknown data type: {s}")))
    }
}

/// Storage tier of an archived blob.
///
/// Restore latency increases and storage cost decreases from HOT to ARCHIVE.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageTier {
    Hot,
    Cool,
    Cold,
    Archive,
}

impl StorageTier {
    /// Fixed lookup table for the estimated restore wait in seconds.
    pub fn restore_wait_secs(&self) -> u64 {
        match self {
            StorageTier::Hot => 0,
            StorageTier::Cool => 30,
            StorageTier::Cold => 60,
            StorageTier::Archive => 43_200,
        }
    }

    /// Whether restoring from this tier completes within the same call.
    pub fn restores_synchronously(&self) -> bool {
        matches!(self, StorageTier::Hot | StorageTier::Cool)
    }

    /// Estimated storage cost in USD per GB-month.
    pub fn cost_per_gb_month(&self) -> f64 {
        match self {
            StorageTier::Hot => 0.0184,
            StorageTier::Cool => 0.01,
            StorageTier::Cold => 0.002,
            StorageTier::Archive => 0.00099,
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageTier::Hot => "HOT",
            StorageTier::Cool => "COOL",
            StorageTier::Cold => "COLD",
            StorageTier::Archive => "ARCHIVE",
        };
        f.write_str(s)
    }
}

/// Archive record lifecycle.
///
/// `Pending -> Archiving -> {Archived | Failed}`, then
/// `Archived -> Restoring -> {Restored | Failed}`. A failed record is never
/// mutated back; a retry creates a new record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveStatus {
    Pending,
    Archiving,
    Archived,
    Restoring,
    Restored,
    Failed,
}

impl ArchiveStatus {
    /// True while the record is mid-transition (blocks policy deletion).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ArchiveStatus::Pending | ArchiveStatus::Archiving | ArchiveStatus::Restoring
        )
    }

    /// True once the record can no longer transition on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArchiveStatus::Restored | ArchiveStatus::Failed)
    }
}

/// Deletion request lifecycle.
///
/// `Pending -> {Approved | Rejected}`, `Approved -> Executing ->
/// {Completed | Failed}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionStatus {
    Pending,
    Approved,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl DeletionStatus {
    /// True while the request is mid-transition (blocks policy deletion).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeletionStatus::Pending | DeletionStatus::Executing
        )
    }

    /// True once the request can no longer transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeletionStatus::Rejected | DeletionStatus::Completed | DeletionStatus::Failed
        )
    }
}

/// Restore request lifecycle: `Pending/InProgress -> {Completed | Failed}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Closed date range over record creation timestamps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Ensure the range is not inverted.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(RetainError::validation(format!(
                "date range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Inclusive containment test.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Governs retention for one logical data category.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub data_type: DataType,

    /// Per-tier age thresholds in days.
    pub hot_storage_days: u32,
    pub warm_storage_days: u32,
    pub cold_storage_days: u32,

    /// When set, no deletion request may be created under this policy.
    pub deletion_protection: bool,
    /// When set, deletion requests start PENDING and need a second party.
    pub require_approval: bool,
    pub min_approval_level: u8,

    /// Optional cron-like expression, see the `schedule` module.
    pub archive_schedule: Option<String>,
    pub next_archive_at: Option<DateTime<Utc>>,
    pub last_archive_at: Option<DateTime<Utc>>,

    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One archival batch. Never deleted; it is the permanent audit/backup trail.
///
/// `compressed_size_bytes` and `checksum` are only set once the record
/// reaches ARCHIVED.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub data_type: DataType,
    pub source_table: String,
    pub record_count: u64,
    pub range: DateRange,

    pub storage_tier: StorageTier,
    pub blob_container: Option<String>,
    pub blob_path: Option<String>,
    pub blob_url: Option<String>,

    pub original_size_bytes: u64,
    pub compressed_size_bytes: Option<u64>,
    /// Compressed size divided by original size.
    pub compression_ratio: Option<f64>,
    /// SHA-256 hex digest of the compressed payload.
    pub checksum: Option<String>,

    pub status: ArchiveStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// A proposal to permanently remove domain rows in a date range.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeletionRequest {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub data_type: DataType,
    pub source_table: String,
    /// Affected row count computed at request-creation time.
    pub record_count: u64,
    pub range: DateRange,

    pub reason: String,
    pub notes: Option<String>,
    pub requested_by: String,

    pub status: DeletionStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub executed_at: Option<DateTime<Utc>>,
    pub deleted_record_count: Option<u64>,
    /// Safety backup produced before the destructive delete.
    pub backup_archive_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A proposal to make an archived blob accessible again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RestoreRequest {
    pub id: Uuid,
    pub archive_record_id: Uuid,
    pub reason: String,
    pub notes: Option<String>,
    pub requested_by: String,

    /// Derived from the archive's storage tier via the fixed wait table.
    pub estimated_wait_secs: u64,
    pub actual_wait_secs: Option<u64>,

    pub status: RestoreStatus,
    pub restored_blob_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tier_wait_table() {
        assert_eq!(StorageTier::Hot.restore_wait_secs(), 0);
        assert_eq!(StorageTier::Cool.restore_wait_secs(), 30);
        assert_eq!(StorageTier::Cold.restore_wait_secs(), 60);
        assert_eq!(StorageTier::Archive.restore_wait_secs(), 43_200);

        assert!(StorageTier::Hot.restores_synchronously());
        assert!(StorageTier::Cool.restores_synchronously());
        assert!(!StorageTier::Cold.restores_synchronously());
        assert!(!StorageTier::Archive.restores_synchronously());
    }

    #[test]
    fn test_tier_costs_decrease_with_coldness() {
        assert!(StorageTier::Hot.cost_per_gb_month() > StorageTier::Cool.cost_per_gb_month());
        assert!(StorageTier::Cool.cost_per_gb_month() > StorageTier::Cold.cost_per_gb_month());
        assert!(StorageTier::Cold.cost_per_gb_month() > StorageTier::Archive.cost_per_gb_month());
    }

    #[test]
    fn test_data_type_slug_roundtrip() {
        for dt in DataType::all() {
            assert_eq!(dt.slug().parse::<DataType>().unwrap(), *dt);
        }
        assert!("no-such-type".parse::<DataType>().is_err());
    }

    #[test]
    fn test_data_type_serde_tag() {
        let json = serde_json::to_string(&DataType::AuditLog).unwrap();
        assert_eq!(json, "\"AUDIT_LOG\"");
        let json = serde_json::to_string(&StorageTier::Cool).unwrap();
        assert_eq!(json, "\"COOL\"");
    }

    #[test]
    fn test_date_range_validation() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();

        let range = DateRange::new(start, end);
        assert!(range.validate().is_ok());
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));

        let inverted = DateRange::new(end, start);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_active_statuses_block_policy_deletion() {
        assert!(ArchiveStatus::Pending.is_active());
        assert!(ArchiveStatus::Archiving.is_active());
        assert!(ArchiveStatus::Restoring.is_active());
        assert!(!ArchiveStatus::Archived.is_active());
        assert!(!ArchiveStatus::Restored.is_active());
        assert!(!ArchiveStatus::Failed.is_active());

        assert!(DeletionStatus::Pending.is_active());
        assert!(DeletionStatus::Executing.is_active());
        assert!(!DeletionStatus::Completed.is_active());
        assert!(!DeletionStatus::Rejected.is_active());
    }
}
