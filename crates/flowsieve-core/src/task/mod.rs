//! # Cached Tasks
//!
//! Expensive computations (graph discovery, alignments, performance
//! metrics) run as background jobs. Their results are persisted in the
//! durable cache, and concurrent requests for the same task share a single
//! job.

mod definition;
mod executor;
pub mod keys;
mod orchestrator;
mod status;

pub use definition::{TaskDefinition, TaskFingerprint, TaskKind, TaskName, canonical_args};
pub use executor::{
    Clock, JobContext, JobExecutor, JobHandle, JobPoll, JobRequest, PreliminarySink, SystemClock,
};
pub use orchestrator::{JobLease, TaskOrchestrator};
pub use status::TaskStatus;
