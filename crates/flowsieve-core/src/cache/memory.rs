//! In-process cache backends.
//!
//! Each backend guards a single `BTreeMap` with one mutex, so every
//! operation, conditional writes included, is atomic with respect to the
//! others. A poisoned lock is recovered, as every write is a single map
//! operation.

use super::{CacheEntry, DurableCache, EphemeralCache};
use crate::FlowError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Durable cache held in memory; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryDurableCache {
    entries: Mutex<BTreeMap<(String, String), CacheEntry>>,
}

impl MemoryDurableCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableCache for MemoryDurableCache {
    fn get(&self, entity: &str, key: &str) -> Result<Option<CacheEntry>, FlowError> {
        Ok(lock(&self.entries)
            .get(&(entity.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, entity: &str, key: &str, entry: &CacheEntry) -> Result<(), FlowError> {
        lock(&self.entries).insert((entity.to_string(), key.to_string()), entry.clone());
        Ok(())
    }

    fn invalidate(&self, entity: &str) -> Result<usize, FlowError> {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(owner, _), _| owner != entity);
        Ok(before - entries.len())
    }

    fn len(&self) -> Result<usize, FlowError> {
        Ok(lock(&self.entries).len())
    }
}

/// Ephemeral cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryEphemeralCache {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryEphemeralCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EphemeralCache for MemoryEphemeralCache {
    fn get(&self, key: &str) -> Result<Option<Value>, FlowError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), FlowError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, FlowError> {
        let mut values = lock(&self.values);
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value);
        Ok(true)
    }

    fn compare_and_swap(&self, key: &str, expected: &Value, new: Value) -> Result<bool, FlowError> {
        let mut values = lock(&self.values);
        match values.get_mut(key) {
            Some(current) if current == expected => {
                *current = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> Result<bool, FlowError> {
        Ok(lock(&self.values).remove(key).is_some())
    }

    fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, FlowError> {
        let mut values = lock(&self.values);
        if values.get(key) != Some(expected) {
            return Ok(false);
        }
        values.remove(key);
        Ok(true)
    }
}
