//! # redb-backed Durable Cache
//!
//! Finished results persisted in a redb embedded database:
//! - ACID transactions, one per operation
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Entries live in one table keyed `(entity, key)`. Keys of one entity are
//! contiguous, so invalidating an entity is a single range scan.

use crate::cache::{CacheEntry, DurableCache};
use crate::formats::{entry_from_bytes, entry_to_bytes};
use crate::FlowError;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Table for results: (entity, key) -> encoded `CacheEntry`
const RESULTS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("results");

/// A durable cache stored in a redb database file.
pub struct RedbCache {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbCache {
    /// Open or create a cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let db = Database::create(path.as_ref()).map_err(|e| FlowError::IoError(e.to_string()))?;

        // Initialize the table if it doesn't exist
        let write_txn = db
            .begin_write()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(RESULTS)
                .map_err(|e| FlowError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| FlowError::IoError(e.to_string()))?;

        debug!(path = %path.as_ref().display(), "opened durable cache");
        Ok(Self {
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<bool, FlowError> {
        self.db
            .compact()
            .map_err(|e| FlowError::IoError(e.to_string()))
    }
}

impl DurableCache for RedbCache {
    fn get(&self, entity: &str, key: &str) -> Result<Option<CacheEntry>, FlowError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(RESULTS)
            .map_err(|e| FlowError::IoError(e.to_string()))?;

        match table
            .get((entity, key))
            .map_err(|e| FlowError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(entry_from_bytes(data.value())?)),
            None => Ok(None),
        }
    }

    fn set(&self, entity: &str, key: &str, entry: &CacheEntry) -> Result<(), FlowError> {
        let bytes = entry_to_bytes(entry)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(RESULTS)
                .map_err(|e| FlowError::IoError(e.to_string()))?;
            table
                .insert((entity, key), bytes.as_slice())
                .map_err(|e| FlowError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        Ok(())
    }

    fn invalidate(&self, entity: &str) -> Result<usize, FlowError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        let removed = {
            let mut table = write_txn
                .open_table(RESULTS)
                .map_err(|e| FlowError::IoError(e.to_string()))?;

            let mut keys = Vec::new();
            for entry in table
                .range((entity, "")..)
                .map_err(|e| FlowError::IoError(e.to_string()))?
            {
                let (stored, _) = entry.map_err(|e| FlowError::IoError(e.to_string()))?;
                let (owner, key) = stored.value();
                if owner != entity {
                    break;
                }
                keys.push(key.to_string());
            }

            for key in &keys {
                table
                    .remove((entity, key.as_str()))
                    .map_err(|e| FlowError::IoError(e.to_string()))?;
            }
            keys.len()
        };
        write_txn
            .commit()
            .map_err(|e| FlowError::IoError(e.to_string()))?;

        debug!(entity, removed, "invalidated durable entries");
        Ok(removed)
    }

    fn len(&self) -> Result<usize, FlowError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(RESULTS)
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        let count = table
            .len()
            .map_err(|e| FlowError::IoError(e.to_string()))?;
        Ok(count as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
