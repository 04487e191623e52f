/*!
Archive payload container, checksums and blob path derivation.

An archive batch is serialized into a self-describing JSON container before
compression; the SHA-256 checksum is computed over the *compressed* bytes so
a blob can be verified without decompressing it.
*/

use crate::model::{DataType, DateRange};
use crate::{RetainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Current payload format version for compatibility tracking.
pub const PAYLOAD_FORMAT_VERSION: u8 = 1;

/// Self-describing container for one archived batch of domain rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArchivePayload {
    pub format_version: u8,
    pub data_type: DataType,
    pub source_table: String,
    pub range: DateRange,
    pub record_count: u64,
    pub records: Vec<serde_json::Value>,
}

impl ArchivePayload {
    pub fn new(
        data_type: DataType,
        source_table: impl Into<String>,
        range: DateRange,
        records: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            format_version: PAYLOAD_FORMAT_VERSION,
            data_type,
            source_table: source_table.into(),
            range,
            record_count: records.len() as u64,
            records,
        }
    }

    /// Serialize to the canonical byte form that gets compressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a decompressed payload, rejecting incompatible format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let payload: ArchivePayload = serde_json::from_slice(bytes)?;
        if payload.format_version > PAYLOAD_FORMAT_VERSION {
            return Err(RetainError::validation(format!(
                "unsupported payload format version {} (current: {})",
                payload.format_version, PAYLOAD_FORMAT_VERSION
            )));
        }
        Ok(payload)
    }
}

/// SHA-256 hex digest of the given bytes.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Verify bytes against a recorded checksum.
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = checksum(data);
    if actual == expected {
        Ok(())
    } else {
        Err(RetainError::IntegrityCheckFailed {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Deterministic blob path for an archive record.
///
/// Format: `{data_type_slug}/{YYYY}/{MM}/{record_id}.json.gz`
pub fn blob_path(data_type: DataType, at: DateTime<Utc>, record_id: Uuid) -> String {
    format!(
        "{}/{}/{record_id}.json.gz",
        data_type.slug(),
        at.format("%Y/%m")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
        )
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = ArchivePayload::new(
            DataType::AuditLog,
            "audit_logs",
            range(),
            vec![json!({"action": "login"}), json!({"action": "logout"})],
        );
        assert_eq!(payload.record_count, 2);

        let bytes = payload.to_bytes().unwrap();
        let parsed = ArchivePayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_payload_rejects_future_format() {
        let mut payload = ArchivePayload::new(DataType::Document, "documents", range(), vec![]);
        payload.format_version = PAYLOAD_FORMAT_VERSION + 1;
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert!(ArchivePayload::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_checksum_is_deterministic_sha256() {
        let digest = checksum(b"test data");
        assert_eq!(
            digest,
            "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9"
        );
        assert_eq!(digest.len(), 64);
        assert_eq!(checksum(b"test data"), digest);
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let digest = checksum(b"payload");
        assert!(verify_checksum(b"payload", &digest).is_ok());

        let err = verify_checksum(b"tampered", &digest).unwrap_err();
        assert!(matches!(
            err,
            RetainError::IntegrityCheckFailed { .. }
        ));
    }

    #[test]
    fn test_blob_path_layout() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 30, 0).unwrap();
        let id = Uuid::new_v4();
        let path = blob_path(DataType::UserSession, at, id);
        assert_eq!(path, format!("user-session/2025/03/{id}.json.gz"));
    }
}
