//! # Caches
//!
//! Two stores back the task orchestrator:
//!
//! - The **durable cache** keeps finished results per base entity (usually
//!   an OCEL file name). Entries survive restarts and are removed only by
//!   explicit invalidation.
//! - The **ephemeral cache** keeps short-lived coordination records: job
//!   leases and preliminary payloads. Its conditional writes are atomic,
//!   which is what guarantees a single dispatch per job.
//!
//! Both are injected as trait objects so backends can be swapped.

mod memory;

pub use memory::{MemoryDurableCache, MemoryEphemeralCache};

use crate::FlowError;
use serde_json::Value;

// =============================================================================
// DURABLE ENTRIES
// =============================================================================

/// A finished result as stored in the durable cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// A result stored without a schema version.
    Raw(Value),
    /// A result tagged with the schema version it was produced under.
    Versioned { result: Value, version: String },
}

impl CacheEntry {
    /// Wrap `result`, tagging it with `version` when one is given.
    #[must_use]
    pub fn new(result: Value, version: Option<&str>) -> Self {
        match version {
            Some(version) => Self::Versioned {
                result,
                version: version.to_string(),
            },
            None => Self::Raw(result),
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Raw(_) => None,
            Self::Versioned { version, .. } => Some(version),
        }
    }

    #[must_use]
    pub fn result(&self) -> &Value {
        match self {
            Self::Raw(result) | Self::Versioned { result, .. } => result,
        }
    }

    /// The stored result if it satisfies `version_hint`.
    ///
    /// Without a hint any entry matches. With a hint only an entry tagged
    /// with exactly that version matches; anything else counts as a miss.
    #[must_use]
    pub fn result_for(&self, version_hint: Option<&str>) -> Option<&Value> {
        match version_hint {
            None => Some(self.result()),
            Some(hint) if self.version() == Some(hint) => Some(self.result()),
            Some(_) => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Value {
        match self {
            Self::Raw(result) | Self::Versioned { result, .. } => result,
        }
    }
}

// =============================================================================
// CACHE TRAITS
// =============================================================================

/// Long-term store of finished results, partitioned by base entity.
pub trait DurableCache: Send + Sync {
    fn get(&self, entity: &str, key: &str) -> Result<Option<CacheEntry>, FlowError>;

    fn set(&self, entity: &str, key: &str, entry: &CacheEntry) -> Result<(), FlowError>;

    /// Remove every entry of `entity`, returning how many were removed.
    fn invalidate(&self, entity: &str) -> Result<usize, FlowError>;

    /// Number of entries across all entities.
    fn len(&self) -> Result<usize, FlowError>;

    fn is_empty(&self) -> Result<bool, FlowError> {
        Ok(self.len()? == 0)
    }
}

/// Short-lived coordination store with atomic conditional writes.
pub trait EphemeralCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, FlowError>;

    fn set(&self, key: &str, value: Value) -> Result<(), FlowError>;

    /// Store `value` only if `key` is vacant. Returns whether it was stored.
    fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, FlowError>;

    /// Replace the value of `key` only if it currently equals `expected`.
    /// Returns whether it was replaced.
    fn compare_and_swap(&self, key: &str, expected: &Value, new: Value) -> Result<bool, FlowError>;

    /// Remove `key`. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool, FlowError>;

    /// Remove `key` only if it currently equals `expected`. Returns whether
    /// it was removed.
    fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, FlowError>;
}
