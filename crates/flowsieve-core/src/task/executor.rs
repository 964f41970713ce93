//! # Job Execution Seam
//!
//! The orchestrator never runs computations itself. It hands a
//! [`JobRequest`] to a [`JobExecutor`] and later polls the returned
//! [`JobHandle`]. Running jobs publish partial results through a
//! [`PreliminarySink`].

use super::definition::TaskName;
use crate::FlowError;
use crate::cache::EphemeralCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque identifier of a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub u64);

/// A unit of work handed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub task_name: TaskName,
    pub args: Vec<Value>,
    /// Ephemeral key the job may publish preliminary results under.
    pub preliminary_key: String,
}

/// Outcome of polling a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    Pending,
    Succeeded(Value),
    Failed(String),
    /// The executor has no record of the handle: it was already collected
    /// and forgotten, or the executor restarted.
    Unknown,
}

/// Runs jobs in the background.
///
/// Handles stay pollable until `forget` is called, so a finished result
/// can be collected by whichever caller polls first.
pub trait JobExecutor: Send + Sync {
    fn dispatch(&self, request: JobRequest) -> Result<JobHandle, FlowError>;

    /// Unknown handles are reported as `Unknown`.
    fn poll(&self, handle: JobHandle) -> Result<JobPoll, FlowError>;

    /// Drop the bookkeeping of a job. Unknown handles are ignored.
    fn forget(&self, handle: JobHandle);
}

// =============================================================================
// JOB CONTEXT
// =============================================================================

/// Writes a running job's partial result to the ephemeral cache.
#[derive(Clone)]
pub struct PreliminarySink {
    cache: Arc<dyn EphemeralCache>,
    key: String,
}

impl PreliminarySink {
    #[must_use]
    pub fn new(cache: Arc<dyn EphemeralCache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the published preliminary result.
    pub fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), FlowError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| FlowError::SerializationError(e.to_string()))?;
        self.cache.set(&self.key, value)
    }
}

impl std::fmt::Debug for PreliminarySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreliminarySink")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What a job body sees while it runs.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub task_name: TaskName,
    pub args: Vec<Value>,
    pub preliminary: PreliminarySink,
}

impl JobContext {
    /// String argument at `index`.
    pub fn str_arg(&self, index: usize) -> Result<&str, FlowError> {
        self.args
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| missing_arg(&self.task_name, index, "a string"))
    }

    /// Numeric argument at `index`.
    pub fn f64_arg(&self, index: usize) -> Result<f64, FlowError> {
        self.args
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing_arg(&self.task_name, index, "a number"))
    }
}

fn missing_arg(task_name: &TaskName, index: usize, expected: &str) -> FlowError {
    FlowError::invalid(format!(
        "argument {} of task {} must be {}",
        index, task_name, expected
    ))
}

// =============================================================================
// CLOCK
// =============================================================================

/// Time source for lease bookkeeping.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
