//! # API Endpoint Handlers
//!
//! The orchestrator and the log projection block on file and database I/O,
//! so each request does its work on a blocking thread.

use super::{
    AppState,
    types::{
        AlignmentsQuery, ApiError, DfgQuery, HealthResponse, InvalidateQuery, InvalidateResponse,
        PerformanceQuery, check_threshold,
    },
};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use flowsieve_core::{DirectlyFollowsGraph, FlowError, LogProjection, TaskStatus};
use serde_json::Value;

use crate::jobs::{alignment_tasks, graph_task, performance_tasks};
use crate::projection::JsonLogProjection;

type Status = Json<TaskStatus<Value>>;

/// Run `work` on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ApiError::Flow(FlowError::ExternalFailure(format!("request aborted: {}", e)))
    })?
}

fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    extracted
        .map(|Query(query)| query)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// Directly-follows graph of `ocel`.
pub async fn dfg_handler(
    State(state): State<AppState>,
    params: Result<Query<DfgQuery>, QueryRejection>,
) -> Result<Status, ApiError> {
    let params = query(params)?;
    blocking(move || {
        state.projection.resolve(&params.ocel)?;
        let def = graph_task(&params.ocel, params.refresh);
        Ok(Json(state.orchestrator.run_task(&def)?))
    })
    .await
}

// =============================================================================
// CONFORMANCE AND PERFORMANCE
// =============================================================================

/// Alignments of every object type of the conformance log shared with the
/// process graph.
pub async fn alignments_handler(
    State(state): State<AppState>,
    params: Result<Query<AlignmentsQuery>, QueryRejection>,
) -> Result<Status, ApiError> {
    let params = query(params)?;
    let threshold = check_threshold(params.threshold)?;
    blocking(move || {
        let types = shared_types(&state, &params.process_ocel, &params.conformance_ocel)?;
        let defs = alignment_tasks(
            &params.process_ocel,
            &params.conformance_ocel,
            threshold,
            &types,
        );
        Ok(Json(state.orchestrator.run_group(&defs)?))
    })
    .await
}

/// Edge durations of the metrics log, measured along its alignments.
///
/// The alignments of the metrics log are computed first; until they are
/// done the performance task reports running without a payload.
pub async fn performance_handler(
    State(state): State<AppState>,
    params: Result<Query<PerformanceQuery>, QueryRejection>,
) -> Result<Status, ApiError> {
    let params = query(params)?;
    let threshold = check_threshold(params.threshold)?;
    blocking(move || {
        let types = shared_types(&state, &params.process_ocel, &params.metrics_ocel)?;

        let alignments = alignment_tasks(
            &params.process_ocel,
            &params.metrics_ocel,
            threshold,
            &types,
        );
        let status = match state.orchestrator.run_group(&alignments)? {
            TaskStatus::Done { .. } => {
                let defs = performance_tasks(
                    &params.process_ocel,
                    &params.metrics_ocel,
                    threshold,
                    &types,
                );
                state.orchestrator.run_group(&defs)?
            }
            TaskStatus::Running { .. } => TaskStatus::running(None),
            TaskStatus::Failed => TaskStatus::Failed,
        };
        Ok(Json(status))
    })
    .await
}

/// Object types of the stored process graph that also occur in `target`.
fn shared_types(state: &AppState, process: &str, target: &str) -> Result<Vec<String>, ApiError> {
    state.projection.resolve(process)?;
    state.projection.resolve(target)?;

    let graph = state
        .orchestrator
        .cached(&graph_task(process, false))?
        .ok_or_else(|| {
            FlowError::NotFound(format!("the graph of '{}' has not been computed", process))
        })?;
    let graph: DirectlyFollowsGraph = serde_json::from_value(graph)
        .map_err(|e| FlowError::DeserializationError(format!("graph of '{}': {}", process, e)))?;

    let target_types = state.projection.object_types(target)?;
    Ok(graph
        .object_types()
        .filter(|object_type| target_types.iter().any(|t| t == object_type))
        .map(str::to_string)
        .collect())
}

// =============================================================================
// CACHE
// =============================================================================

/// Drop every stored result computed from `ocel`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    params: Result<Query<InvalidateQuery>, QueryRejection>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let params = query(params)?;
    JsonLogProjection::check_name(&params.ocel)?;
    blocking(move || {
        let removed = state.orchestrator.durable().invalidate(&params.ocel)?;
        tracing::info!(ocel = %params.ocel, removed, "invalidated stored results");
        Ok(Json(InvalidateResponse { removed }))
    })
    .await
}
