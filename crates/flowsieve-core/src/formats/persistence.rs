//! # Persistence Format
//!
//! Binary encoding of durable cache entries.
//!
//! Format: Header (5 bytes) + postcard-serialized `StoredEntry`.
//! - 4 bytes: Magic ("FSVC")
//! - 1 byte: Format version
//!
//! The result itself travels as JSON text inside the postcard payload, so
//! entries stay readable by any consumer that understands JSON results.
//!
//! ## Validation
//!
//! Size and header are checked before the payload is decoded.

use crate::cache::CacheEntry;
use crate::{FlowError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum accepted size of an encoded entry.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every encoded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), FlowError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(FlowError::invalid("invalid magic bytes in cache entry"));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(FlowError::invalid(format!(
                "unsupported cache entry format version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FlowError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FlowError::invalid("cache entry header too short"));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENTRY ENCODING
// =============================================================================

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    version: Option<String>,
    payload: String,
}

/// Encode a cache entry (header + payload).
pub fn entry_to_bytes(entry: &CacheEntry) -> Result<Vec<u8>, FlowError> {
    let stored = StoredEntry {
        version: entry.version().map(str::to_string),
        payload: serde_json::to_string(entry.result())
            .map_err(|e| FlowError::SerializationError(e.to_string()))?,
    };
    let payload =
        postcard::to_stdvec(&stored).map_err(|e| FlowError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a cache entry.
///
/// # Errors
/// - `InvalidInput` for oversized data or a wrong header
/// - `DeserializationError` for a corrupt payload
pub fn entry_from_bytes(bytes: &[u8]) -> Result<CacheEntry, FlowError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(FlowError::invalid(format!(
            "cache entry of {} bytes exceeds maximum {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let stored: StoredEntry = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        FlowError::DeserializationError(format!("failed to decode cache entry: {}", e))
    })?;
    let result = serde_json::from_str(&stored.payload)
        .map_err(|e| FlowError::DeserializationError(e.to_string()))?;

    Ok(CacheEntry::new(result, stored.version.as_deref()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
    }

    #[test]
    fn versioned_entry_survives_encoding() {
        let entry = CacheEntry::new(json!({"nodes": [1, 2], "ratio": 0.5}), Some("4"));
        let bytes = entry_to_bytes(&entry).expect("encode");
        assert_eq!(&bytes[0..4], primitives::MAGIC_BYTES);
        assert_eq!(entry_from_bytes(&bytes).expect("decode"), entry);
    }

    #[test]
    fn encoding_is_stable() {
        let entry = CacheEntry::new(json!([1, 2, 3]), None);
        let first = entry_to_bytes(&entry).expect("encode");
        let second = entry_to_bytes(&entry_from_bytes(&first).expect("decode")).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(entry_from_bytes(&bytes), Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn future_format_version_rejected() {
        let mut bytes = entry_to_bytes(&CacheEntry::Raw(json!(1))).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(matches!(entry_from_bytes(&bytes), Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let bytes = entry_to_bytes(&CacheEntry::Raw(json!("abc"))).expect("encode");
        let result = entry_from_bytes(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(FlowError::DeserializationError(_))));
    }

    #[test]
    fn short_data_rejected() {
        assert!(entry_from_bytes(b"FSV").is_err());
    }
}
