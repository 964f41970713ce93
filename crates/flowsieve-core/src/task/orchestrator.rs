//! # Task Orchestrator
//!
//! Runs each task at most once and serves the result from the durable cache
//! afterwards. A request moves a task through these states:
//!
//! 1. durable hit (with a matching version) => `Done`
//! 2. no lease => reserve the lease atomically, dispatch, `Running`
//! 3. lease held, job pending => `Running` with the preliminary payload
//! 4. lease held, job succeeded => persist, release lease, `Done`
//! 5. lease held, job failed => release lease, `Failed`
//! 6. lease held, job unknown to the executor => `Done` if another caller
//!    already persisted the result, otherwise the lease is reclaimed
//!
//! Only the caller that wins the reservation dispatches. A lease older
//! than the configured TTL is reclaimed and its job dispatched again.
//! Leases are released only if they still hold the value the caller read,
//! so a late caller never removes a newer lease.

use super::definition::TaskDefinition;
use super::executor::{Clock, JobExecutor, JobHandle, JobPoll, JobRequest, SystemClock};
use super::status::TaskStatus;
use crate::FlowError;
use crate::cache::{CacheEntry, DurableCache, EphemeralCache};
use crate::primitives::DEFAULT_LEASE_TTL_SECS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ephemeral record of an in-flight job.
///
/// `handle` is `None` between the reservation and the dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLease {
    pub handle: Option<JobHandle>,
    pub leased_at_ms: u64,
}

/// Coordinates cached task execution.
pub struct TaskOrchestrator {
    durable: Arc<dyn DurableCache>,
    ephemeral: Arc<dyn EphemeralCache>,
    executor: Arc<dyn JobExecutor>,
    clock: Arc<dyn Clock>,
    lease_ttl_ms: Option<u64>,
}

impl std::fmt::Debug for TaskOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOrchestrator")
            .field("lease_ttl_ms", &self.lease_ttl_ms)
            .finish_non_exhaustive()
    }
}

impl TaskOrchestrator {
    #[must_use]
    pub fn new(
        durable: Arc<dyn DurableCache>,
        ephemeral: Arc<dyn EphemeralCache>,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            executor,
            clock: Arc::new(SystemClock),
            lease_ttl_ms: Some(DEFAULT_LEASE_TTL_SECS.saturating_mul(1000)),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lease lifetime in seconds; `0` keeps leases forever.
    #[must_use]
    pub fn with_lease_ttl_secs(mut self, secs: u64) -> Self {
        self.lease_ttl_ms = (secs > 0).then(|| secs.saturating_mul(1000));
        self
    }

    #[must_use]
    pub fn durable(&self) -> &Arc<dyn DurableCache> {
        &self.durable
    }

    /// The durable result of `def`, if one with a matching version exists.
    pub fn cached(&self, def: &TaskDefinition) -> Result<Option<Value>, FlowError> {
        let entry = self.durable.get(&def.base_entity, &def.durable_key)?;
        Ok(entry.and_then(|entry| {
            let hit = entry.result_for(def.result_version.as_deref()).is_some();
            if !hit {
                debug!(
                    entity = %def.base_entity,
                    key = %def.durable_key,
                    stored = ?entry.version(),
                    expected = ?def.result_version,
                    "stale durable entry"
                );
            }
            hit.then(|| entry.into_result())
        }))
    }

    /// Advance one task and report its state.
    pub fn run_task(&self, def: &TaskDefinition) -> Result<TaskStatus<Value>, FlowError> {
        if !def.refresh
            && let Some(result) = self.cached(def)?
        {
            return Ok(TaskStatus::done(result));
        }

        let handle_key = def.handle_key();
        let Some(raw) = self.ephemeral.get(&handle_key)? else {
            return self.start(def);
        };
        let lease: JobLease = serde_json::from_value(raw.clone()).map_err(|e| {
            FlowError::DeserializationError(format!("lease {}: {}", handle_key, e))
        })?;

        let Some(handle) = lease.handle else {
            if self.is_stale(&lease) {
                return self.reclaim(def, &raw, None, "expired reservation");
            }
            return self.running(def);
        };

        match self.executor.poll(handle)? {
            JobPoll::Succeeded(result) => {
                let entry = CacheEntry::new(result.clone(), def.result_version.as_deref());
                self.durable
                    .set(&def.base_entity, &def.durable_key, &entry)?;
                self.release(def, &raw)?;
                self.executor.forget(handle);
                info!(entity = %def.base_entity, task = %def.task_name, "task finished");
                Ok(TaskStatus::done(result))
            }
            JobPoll::Failed(reason) => {
                self.release(def, &raw)?;
                self.executor.forget(handle);
                warn!(entity = %def.base_entity, task = %def.task_name, %reason, "task failed");
                Ok(TaskStatus::Failed)
            }
            JobPoll::Pending if self.is_stale(&lease) => {
                self.reclaim(def, &raw, Some(handle), "expired lease")
            }
            JobPoll::Pending => self.running(def),
            JobPoll::Unknown => self.vanished(def, &raw, handle),
        }
    }

    /// Advance every task of a group and combine their states.
    ///
    /// Any failure fails the group. When every member is done the result is
    /// an object of member results. Otherwise the group is running and its
    /// preliminary object holds, per member, the final result if done, else
    /// its preliminary payload or null.
    pub fn run_group(
        &self,
        defs: &BTreeMap<String, TaskDefinition>,
    ) -> Result<TaskStatus<Value>, FlowError> {
        let mut statuses = Vec::with_capacity(defs.len());
        for (key, def) in defs {
            statuses.push((key, self.run_task(def)?));
        }

        if statuses.iter().any(|(_, status)| status.is_failed()) {
            return Ok(TaskStatus::Failed);
        }
        let all_done = statuses.iter().all(|(_, status)| status.is_done());

        let mut combined = Map::new();
        for (key, status) in statuses {
            let value = match status {
                TaskStatus::Done { result } => result,
                TaskStatus::Running { preliminary } => preliminary.unwrap_or(Value::Null),
                TaskStatus::Failed => Value::Null,
            };
            combined.insert(key.clone(), value);
        }

        if all_done {
            Ok(TaskStatus::done(Value::Object(combined)))
        } else {
            Ok(TaskStatus::running(Some(Value::Object(combined))))
        }
    }

    // =========================================================================
    // LEASES
    // =========================================================================

    fn start(&self, def: &TaskDefinition) -> Result<TaskStatus<Value>, FlowError> {
        let reservation = self.reservation()?;
        if !self
            .ephemeral
            .set_if_absent(&def.handle_key(), reservation.clone())?
        {
            debug!(task = %def.task_name, "lease taken by a concurrent request");
            return self.running(def);
        }
        self.dispatch_reserved(def, &reservation)
    }

    fn reclaim(
        &self,
        def: &TaskDefinition,
        stale: &Value,
        old_handle: Option<JobHandle>,
        reason: &str,
    ) -> Result<TaskStatus<Value>, FlowError> {
        let reservation = self.reservation()?;
        if !self
            .ephemeral
            .compare_and_swap(&def.handle_key(), stale, reservation.clone())?
        {
            return self.running(def);
        }
        if let Some(handle) = old_handle {
            self.executor.forget(handle);
        }
        warn!(entity = %def.base_entity, task = %def.task_name, reason, "reclaiming lease");
        self.dispatch_reserved(def, &reservation)
    }

    /// The executor no longer knows the leased job. Either another caller
    /// collected it, or the executor lost it.
    fn vanished(
        &self,
        def: &TaskDefinition,
        raw: &Value,
        handle: JobHandle,
    ) -> Result<TaskStatus<Value>, FlowError> {
        if let Some(result) = self.cached(def)? {
            self.release(def, raw)?;
            return Ok(TaskStatus::done(result));
        }
        if self.ephemeral.get(&def.handle_key())?.is_none() {
            // Collected as a failure by another caller.
            return Ok(TaskStatus::Failed);
        }
        debug!(task = %def.task_name, job = handle.0, "leased job unknown to the executor");
        self.reclaim(def, raw, None, "job lost by the executor")
    }

    fn dispatch_reserved(
        &self,
        def: &TaskDefinition,
        reservation: &Value,
    ) -> Result<TaskStatus<Value>, FlowError> {
        let handle_key = def.handle_key();
        let request = JobRequest {
            task_name: def.task_name.clone(),
            args: def.args.clone(),
            preliminary_key: def.preliminary_key(),
        };
        let handle = match self.executor.dispatch(request) {
            Ok(handle) => handle,
            Err(e) => {
                self.ephemeral.delete_if(&handle_key, reservation)?;
                return Err(e);
            }
        };

        let lease = lease_value(&JobLease {
            handle: Some(handle),
            leased_at_ms: self.clock.now_ms(),
        })?;
        if !self
            .ephemeral
            .compare_and_swap(&handle_key, reservation, lease)?
        {
            let hazard = FlowError::ConcurrencyHazard(format!(
                "lease {} changed while dispatching job {}",
                handle_key, handle.0
            ));
            warn!(%hazard);
            self.executor.forget(handle);
            return self.running(def);
        }

        info!(entity = %def.base_entity, task = %def.task_name, job = handle.0, "task dispatched");
        self.running(def)
    }

    fn reservation(&self) -> Result<Value, FlowError> {
        lease_value(&JobLease {
            handle: None,
            leased_at_ms: self.clock.now_ms(),
        })
    }

    fn is_stale(&self, lease: &JobLease) -> bool {
        self.lease_ttl_ms
            .is_some_and(|ttl| self.clock.now_ms().saturating_sub(lease.leased_at_ms) >= ttl)
    }

    fn running(&self, def: &TaskDefinition) -> Result<TaskStatus<Value>, FlowError> {
        Ok(TaskStatus::running(
            self.ephemeral.get(&def.preliminary_key())?,
        ))
    }

    /// Drop the lease and its preliminary payload if the lease still holds
    /// `lease`.
    fn release(&self, def: &TaskDefinition, lease: &Value) -> Result<(), FlowError> {
        if self.ephemeral.delete_if(&def.handle_key(), lease)? {
            self.ephemeral.delete(&def.preliminary_key())?;
        } else {
            debug!(task = %def.task_name, "lease replaced before release");
        }
        Ok(())
    }
}

fn lease_value(lease: &JobLease) -> Result<Value, FlowError> {
    serde_json::to_value(lease).map_err(|e| FlowError::SerializationError(e.to_string()))
}
