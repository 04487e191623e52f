//! Configuration for blob backend selection and engine settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Enumeration of supported blob backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobBackend {
    /// Local filesystem storage
    Local,
    /// Amazon S3 cloud storage
    S3,
    /// In-memory storage (tests, dry runs)
    Memory,
}

/// Configuration for the archive engine and its blob backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The blob backend to use
    pub backend: BlobBackend,
    /// Logical container (bucket or directory) archives are written under
    pub container: String,
    /// Base path for local storage (required for the Local backend)
    pub local_base_path: Option<PathBuf>,
    /// S3 bucket name (required for the S3 backend)
    pub s3_bucket: Option<String>,
    /// Gzip compression level, 0-9
    pub compression_level: u32,
}

impl EngineConfig {
    /// Default configuration backed by the local filesystem.
    pub fn default_local(base_path: impl Into<PathBuf>) -> Self {
        EngineConfig {
            backend: BlobBackend::Local,
            container: "archives".to_string(),
            local_base_path: Some(base_path.into()),
            s3_bucket: None,
            compression_level: 6,
        }
    }

    /// S3-backed configuration for the given bucket.
    pub fn s3_with_bucket(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        EngineConfig {
            backend: BlobBackend::S3,
            container: bucket.clone(),
            local_base_path: None,
            s3_bucket: Some(bucket),
            compression_level: 6,
        }
    }

    /// In-memory configuration, useful for tests and dry runs.
    pub fn memory() -> Self {
        EngineConfig {
            backend: BlobBackend::Memory,
            container: "archives".to_string(),
            local_base_path: None,
            s3_bucket: None,
            compression_level: 6,
        }
    }

    /// Parse a storage URI into a configuration.
    ///
    /// Supports formats:
    /// - `s3://bucket-name` for S3 storage
    /// - `/local/path` or `./relative/path` for local storage
    /// - `memory://` for in-memory storage
    pub fn from_uri(uri: &str) -> crate::Result<EngineConfig> {
        if let Some(s3_part) = uri.strip_prefix("s3://") {
            let bucket = s3_part.split('/').next().unwrap_or("");
            if bucket.is_empty() {
                return Err(crate::RetainError::validation(
                    "Invalid S3 URI: missing bucket name",
                ));
            }
            Ok(EngineConfig::s3_with_bucket(bucket))
        } else if uri.starts_with("memory://") {
            Ok(EngineConfig::memory())
        } else {
            Ok(EngineConfig::default_local(uri))
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.compression_level > 9 {
            return Err(crate::RetainError::validation(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }
        match self.backend {
            BlobBackend::S3 => {
                if self.s3_bucket.as_deref().unwrap_or("").is_empty() {
                    return Err(crate::RetainError::validation(
                        "S3 backend requires a valid bucket name",
                    ));
                }
            }
            BlobBackend::Local => {
                if self.local_base_path.is_none() {
                    return Err(crate::RetainError::validation(
                        "Local backend requires a base path",
                    ));
                }
            }
            BlobBackend::Memory => {}
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_local_config() {
        let config = EngineConfig::default_local("/var/lib/coldstore");
        assert_eq!(config.backend, BlobBackend::Local);
        assert_eq!(
            config.local_base_path,
            Some(PathBuf::from("/var/lib/coldstore"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_uri_s3() {
        let config = EngineConfig::from_uri("s3://retention-archives").unwrap();
        assert_eq!(config.backend, BlobBackend::S3);
        assert_eq!(config.s3_bucket, Some("retention-archives".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_uri_invalid_s3() {
        let result = EngineConfig::from_uri("s3://");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("missing bucket name"));
    }

    #[test]
    fn test_from_uri_local_and_memory() {
        let config = EngineConfig::from_uri("./archives").unwrap();
        assert_eq!(config.backend, BlobBackend::Local);

        let config = EngineConfig::from_uri("memory://").unwrap();
        assert_eq!(config.backend, BlobBackend::Memory);
    }

    #[test]
    fn test_validate_rejects_bad_inputs() {
        let mut config = EngineConfig::s3_with_bucket("bucket");
        config.s3_bucket = Some(String::new());
        assert!(config.validate().is_err());

        let mut config = EngineConfig::memory();
        config.compression_level = 12;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default_local("/tmp");
        config.local_base_path = None;
        assert!(config.validate().is_err());
    }
}
