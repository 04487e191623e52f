/*!
Compression adapters for archive payloads.

Archive blobs are gzip-compressed by default; the adapter trait keeps the
engine decoupled from the algorithm so tests can run without compression.
*/

use crate::{RetainError, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

/// Compression abstraction for archive payload bytes.
pub trait CompressionAdapter: Send + Sync {
    /// Compress the input data.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress previously compressed data.
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>>;

    /// Name of the algorithm, recorded alongside archived blobs.
    fn algorithm_name(&self) -> &str;
}

/// Gzip (DEFLATE) compression.
#[derive(Debug, Clone)]
pub struct Gzip {
    level: Compression,
}

impl Gzip {
    /// Default compression level (6).
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Explicit compression level, 0 (store) through 9 (maximum).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }

    /// Fast compression (level 1), for large low-entropy batches.
    pub fn fast() -> Self {
        Self::with_level(1)
    }

    /// Maximum compression (level 9).
    pub fn max() -> Self {
        Self::with_level(9)
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for Gzip {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(data)
            .map_err(|e| RetainError::compression(format!("gzip write failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| RetainError::compression(format!("gzip finish failed: {e}")))
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(compressed);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| RetainError::compression(format!("gzip decompress failed: {e}")))?;
        Ok(out)
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}

/// Passthrough adapter for tests and pre-compressed payloads.
#[derive(Debug, Clone, Default)]
pub struct NoCompression;

impl NoCompression {
    pub fn new() -> Self {
        Self
    }
}

impl CompressionAdapter for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }

    fn algorithm_name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip_shrinks_repetitive_json() {
        let gzip = Gzip::new();
        let original = br#"{"event":"login","user":"u-1","ok":true}"#.repeat(50);

        let compressed = gzip.compress(&original).unwrap();
        assert!(compressed.len() < original.len());

        let restored = gzip.decompress(&compressed).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_gzip_levels_roundtrip() {
        let data = b"audit log entries compress well ".repeat(30);

        for gzip in [Gzip::fast(), Gzip::new(), Gzip::max()] {
            let compressed = gzip.compress(&data).unwrap();
            assert_eq!(gzip.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_gzip_rejects_garbage() {
        let gzip = Gzip::new();
        assert!(gzip.decompress(b"definitely not gzip").is_err());
    }

    #[test]
    fn test_no_compression_passthrough() {
        let none = NoCompression::new();
        let data = b"raw bytes";
        assert_eq!(none.compress(data).unwrap(), data);
        assert_eq!(none.decompress(data).unwrap(), data);
        assert_eq!(none.algorithm_name(), "none");
        assert_eq!(Gzip::new().algorithm_name(), "gzip");
    }
}
