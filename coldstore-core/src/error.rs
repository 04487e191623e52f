/*!
Error types for the coldstore core engine.
*/

use thiserror::Error;
use uuid::Uuid;

/// Result type used throughout the coldstore core.
pub type Result<T> = std::result::Result<T, RetainError>;

/// Errors that can occur during retention, archival and restore operations.
#[derive(Error, Debug)]
pub enum RetainError {
    /// I/O errors during blob or state file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression/decompression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Checksum mismatch between the recorded and the recomputed digest
    #[error("Integrity check failed: expected checksum {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    /// A referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation forbidden by a retention policy flag or guard
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Operation attempted from a disallowed state-machine state
    #[error("Invalid state: {0}")]
    State(String),

    /// Blob store errors (upload, fetch, thaw)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors on inputs or schedule expressions
    #[error("Validation error: {0}")]
    Validation(String),

    /// An archive job for the same policy is already in flight
    #[error("Archive job already running for policy {policy_id}")]
    JobInProgress { policy_id: Uuid },
}

impl RetainError {
    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new policy violation error
    pub fn policy_violation<S: Into<String>>(msg: S) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// Create a new invalid-state error
    pub fn state<S: Into<String>>(msg: S) -> Self {
        Self::State(msg.into())
    }

    /// Create a new not-found error for an entity table
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
