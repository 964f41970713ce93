//! # Worker Pool
//!
//! Runs orchestrator jobs on tokio's blocking threads. A semaphore bounds
//! how many jobs compute at once; the rest wait for a permit. Outcomes stay
//! in the registry until the orchestrator collects and forgets them.

use flowsieve_core::task::TaskName;
use flowsieve_core::{
    EphemeralCache, FlowError, JobContext, JobExecutor, JobHandle, JobPoll, JobRequest,
    PreliminarySink,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// The computation behind a task name.
pub trait JobRunner: Send + Sync {
    fn run(&self, ctx: &JobContext) -> Result<Value, FlowError>;
}

type Registry = Mutex<BTreeMap<u64, JobPoll>>;

fn lock(registry: &Registry) -> MutexGuard<'_, BTreeMap<u64, JobPoll>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bounded pool of blocking workers.
pub struct WorkerPool {
    runtime: Handle,
    permits: Arc<Semaphore>,
    registry: Arc<Registry>,
    next_id: AtomicU64,
    ephemeral: Arc<dyn EphemeralCache>,
    runner: Arc<dyn JobRunner>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Create a pool running at most `workers` jobs at once on `runtime`.
    pub fn new(
        runtime: Handle,
        workers: usize,
        ephemeral: Arc<dyn EphemeralCache>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            registry: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(0),
            ephemeral,
            runner,
        }
    }

    /// Number of jobs whose outcome has not been collected.
    #[must_use]
    pub fn tracked_jobs(&self) -> usize {
        lock(&self.registry).len()
    }
}

impl JobExecutor for WorkerPool {
    fn dispatch(&self, request: JobRequest) -> Result<JobHandle, FlowError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.registry).insert(id, JobPoll::Pending);

        let ctx = JobContext {
            preliminary: PreliminarySink::new(
                Arc::clone(&self.ephemeral),
                request.preliminary_key,
            ),
            task_name: request.task_name,
            args: request.args,
        };
        let task_name: TaskName = ctx.task_name.clone();
        let permits = Arc::clone(&self.permits);
        let registry = Arc::clone(&self.registry);
        let runner = Arc::clone(&self.runner);

        self.runtime.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(permit) => {
                    debug!(job = id, task = %task_name, "job started");
                    let joined = tokio::task::spawn_blocking(move || runner.run(&ctx)).await;
                    drop(permit);
                    match joined {
                        Ok(Ok(result)) => JobPoll::Succeeded(result),
                        Ok(Err(e)) => JobPoll::Failed(e.to_string()),
                        Err(e) => JobPoll::Failed(format!("job aborted: {}", e)),
                    }
                }
                Err(_) => JobPoll::Failed("worker pool closed".to_string()),
            };

            if let JobPoll::Failed(reason) = &outcome {
                warn!(job = id, task = %task_name, %reason, "job failed");
            }
            // A forgotten job has no slot left to fill.
            if let Some(slot) = lock(&registry).get_mut(&id) {
                *slot = outcome;
            }
        });

        Ok(JobHandle(id))
    }

    fn poll(&self, handle: JobHandle) -> Result<JobPoll, FlowError> {
        Ok(lock(&self.registry)
            .get(&handle.0)
            .cloned()
            .unwrap_or(JobPoll::Unknown))
    }

    fn forget(&self, handle: JobHandle) {
        lock(&self.registry).remove(&handle.0);
    }
}
