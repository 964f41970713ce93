//! # Task Catalogue
//!
//! Definitions of the cacheable tasks and the job bodies that compute them.
//!
//! | task                  | base entity      | per object type |
//! |-----------------------|------------------|-----------------|
//! | `create_dfg`          | process log      | no              |
//! | `compute_alignments`  | conformance log  | yes             |
//! | `performance_metrics` | metrics log      | yes             |

use flowsieve_core::primitives::{
    ALIGNMENTS_RESULT_VERSION, GRAPH_RESULT_VERSION, PERFORMANCE_RESULT_VERSION,
};
use flowsieve_core::task::keys;
use flowsieve_core::{
    AlignmentEngine, DfgAligner, DirectlyFollowsGraph, DurableCache, EdgeDurationEngine,
    FlowError, JobContext, LogProjection, PerformanceEngine, TaskDefinition, TaskKind, TaskName,
    TraceAlignment, align_traces, discover,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::worker::JobRunner;

/// Trace variants aligned between two preliminary publications.
const ALIGNMENT_BATCH: usize = 25;

// =============================================================================
// DEFINITIONS
// =============================================================================

/// Discover the graph of `ocel`.
#[must_use]
pub fn graph_task(ocel: &str, refresh: bool) -> TaskDefinition {
    TaskDefinition::new(ocel, TaskName::new(TaskKind::CreateDfg), vec![json!(ocel)])
        .with_durable_key(keys::graph_key())
        .with_version(GRAPH_RESULT_VERSION)
        .refreshing(refresh)
}

/// Align each object type of `conformance_ocel` against the process graph
/// of `process_ocel` filtered at `threshold`.
#[must_use]
pub fn alignment_tasks(
    process_ocel: &str,
    conformance_ocel: &str,
    threshold: f64,
    object_types: &[String],
) -> BTreeMap<String, TaskDefinition> {
    per_type(
        TaskKind::ComputeAlignments,
        process_ocel,
        conformance_ocel,
        threshold,
        object_types,
        keys::alignments_key,
        ALIGNMENTS_RESULT_VERSION,
    )
}

/// Edge durations of each object type of `metrics_ocel`, replayed on its
/// alignments against the process graph.
#[must_use]
pub fn performance_tasks(
    process_ocel: &str,
    metrics_ocel: &str,
    threshold: f64,
    object_types: &[String],
) -> BTreeMap<String, TaskDefinition> {
    per_type(
        TaskKind::PerformanceMetrics,
        process_ocel,
        metrics_ocel,
        threshold,
        object_types,
        keys::performance_key,
        PERFORMANCE_RESULT_VERSION,
    )
}

fn per_type(
    kind: TaskKind,
    process_ocel: &str,
    target_ocel: &str,
    threshold: f64,
    object_types: &[String],
    durable_key: fn(&str, f64, &str) -> String,
    version: &str,
) -> BTreeMap<String, TaskDefinition> {
    object_types
        .iter()
        .map(|object_type| {
            let name = TaskName::new(kind)
                .with("process", process_ocel)
                .with("threshold", threshold.to_string())
                .with("object_type", object_type.as_str());
            let args = vec![
                json!(process_ocel),
                json!(target_ocel),
                json!(threshold),
                json!(object_type),
            ];
            let def = TaskDefinition::new(target_ocel, name, args)
                .with_durable_key(durable_key(process_ocel, threshold, object_type))
                .with_version(version);
            (object_type.clone(), def)
        })
        .collect()
}

// =============================================================================
// JOB BODIES
// =============================================================================

/// Runs every task kind against one projection and durable cache.
pub struct Catalogue {
    projection: Arc<dyn LogProjection>,
    durable: Arc<dyn DurableCache>,
    aligner: Arc<dyn AlignmentEngine>,
    performance: Arc<dyn PerformanceEngine>,
}

impl Catalogue {
    pub fn new(projection: Arc<dyn LogProjection>, durable: Arc<dyn DurableCache>) -> Self {
        Self {
            projection,
            durable,
            aligner: Arc::new(DfgAligner::new()),
            performance: Arc::new(EdgeDurationEngine),
        }
    }

    fn create_dfg(&self, ctx: &JobContext) -> Result<Value, FlowError> {
        let ocel = ctx.str_arg(0)?;
        let graph = discover(self.projection.as_ref(), ocel, |partial, done, total| {
            debug!(ocel, done, total, "publishing partial graph");
            publish(ctx, partial);
        })?;
        to_value(&graph)
    }

    fn compute_alignments(&self, ctx: &JobContext) -> Result<Value, FlowError> {
        let (process, conformance, threshold, object_type) = per_type_args(ctx)?;

        let graph: DirectlyFollowsGraph = self.stored(
            process,
            &keys::graph_key(),
            GRAPH_RESULT_VERSION,
            "process graph",
        )?;
        let model = graph.filter(object_type, threshold).ok_or_else(|| {
            FlowError::NotFound(format!(
                "object type '{}' in the graph of '{}'",
                object_type, process
            ))
        })?;

        let traces = self.projection.project_traces(conformance, object_type)?;
        let mut aligned: Vec<TraceAlignment> = Vec::with_capacity(traces.len());
        for batch in traces.chunks(ALIGNMENT_BATCH) {
            aligned.extend(align_traces(self.aligner.as_ref(), &model, batch));
            if aligned.len() < traces.len() {
                publish(ctx, &aligned);
            }
        }
        to_value(&aligned)
    }

    fn performance_metrics(&self, ctx: &JobContext) -> Result<Value, FlowError> {
        let (process, metrics, threshold, object_type) = per_type_args(ctx)?;

        let alignments: Vec<TraceAlignment> = self.stored(
            metrics,
            &keys::alignments_key(process, threshold, object_type),
            ALIGNMENTS_RESULT_VERSION,
            "alignments",
        )?;
        let cases = self.projection.project_cases(metrics, object_type)?;
        to_value(&self.performance.measure(&cases, &alignments)?)
    }

    /// A finished prerequisite from the durable cache.
    fn stored<T: DeserializeOwned>(
        &self,
        entity: &str,
        key: &str,
        version: &str,
        what: &str,
    ) -> Result<T, FlowError> {
        let entry = self
            .durable
            .get(entity, key)?
            .ok_or_else(|| FlowError::NotFound(format!("{} of '{}'", what, entity)))?;
        let result = entry.result_for(Some(version)).ok_or_else(|| {
            FlowError::NotFound(format!("{} of '{}' (stale version)", what, entity))
        })?;
        serde_json::from_value(result.clone())
            .map_err(|e| FlowError::DeserializationError(format!("{}: {}", what, e)))
    }
}

impl JobRunner for Catalogue {
    fn run(&self, ctx: &JobContext) -> Result<Value, FlowError> {
        match ctx.task_name.kind() {
            TaskKind::CreateDfg => self.create_dfg(ctx),
            TaskKind::ComputeAlignments => self.compute_alignments(ctx),
            TaskKind::PerformanceMetrics => self.performance_metrics(ctx),
        }
    }
}

fn per_type_args(ctx: &JobContext) -> Result<(&str, &str, f64, &str), FlowError> {
    Ok((
        ctx.str_arg(0)?,
        ctx.str_arg(1)?,
        ctx.f64_arg(2)?,
        ctx.str_arg(3)?,
    ))
}

/// Best effort: a lost preliminary only delays what the client sees.
fn publish<T: Serialize + ?Sized>(ctx: &JobContext, payload: &T) {
    if let Err(e) = ctx.preliminary.publish(payload) {
        warn!(key = ctx.preliminary.key(), error = %e, "could not publish preliminary result");
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, FlowError> {
    serde_json::to_value(value).map_err(|e| FlowError::SerializationError(e.to_string()))
}
