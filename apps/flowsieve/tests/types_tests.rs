//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use flowsieve::api::{
    AlignmentsQuery, ApiError, DfgQuery, ErrorResponse, HealthResponse, InvalidateResponse,
    PerformanceQuery,
};
use flowsieve::projection::PathError;
use flowsieve_core::{FlowError, TaskStatus};
use serde_json::{Value, json};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// QUERY TESTS
// =============================================================================

#[test]
fn test_dfg_query_refresh_defaults_to_false() {
    let query: DfgQuery = serde_json::from_value(json!({"ocel": "p2p.json"})).unwrap();
    assert_eq!(query.ocel, "p2p.json");
    assert!(!query.refresh);

    let query: DfgQuery =
        serde_json::from_value(json!({"ocel": "p2p.json", "refresh": true})).unwrap();
    assert!(query.refresh);
}

#[test]
fn test_alignments_query_requires_every_field() {
    let query: AlignmentsQuery = serde_json::from_value(json!({
        "process_ocel": "p2p.json",
        "conformance_ocel": "check.json",
        "threshold": 0.25
    }))
    .unwrap();
    assert_eq!(query.conformance_ocel, "check.json");
    assert_eq!(query.threshold, 0.25);

    let missing = serde_json::from_value::<AlignmentsQuery>(json!({"process_ocel": "p2p.json"}));
    assert!(missing.is_err());
}

#[test]
fn test_performance_query_fields() {
    let query: PerformanceQuery = serde_json::from_value(json!({
        "process_ocel": "p2p.json",
        "metrics_ocel": "p2p.json",
        "threshold": 1
    }))
    .unwrap();
    assert_eq!(query.metrics_ocel, "p2p.json");
    assert_eq!(query.threshold, 1.0);
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_task_status_wire_shapes() {
    let running: TaskStatus<Value> = TaskStatus::running(None);
    assert_eq!(
        serde_json::to_value(&running).unwrap(),
        json!({"status": "running", "preliminary": null})
    );

    let done = TaskStatus::done(json!({"order": []}));
    assert_eq!(
        serde_json::to_value(&done).unwrap(),
        json!({"status": "done", "result": {"order": []}})
    );

    let failed: TaskStatus<Value> = TaskStatus::Failed;
    assert_eq!(serde_json::to_value(&failed).unwrap(), json!({"status": "failed"}));
}

#[test]
fn test_invalidate_response_serialization() {
    let json = serde_json::to_string(&InvalidateResponse { removed: 3 }).unwrap();
    assert_eq!(json, r#"{"removed":3}"#);
}

// =============================================================================
// ERROR TESTS
// =============================================================================

#[test]
fn test_error_body_carries_message() {
    let err = ApiError::from(PathError::Missing("p2p.json".into()));
    let body = ErrorResponse {
        error: err.to_string(),
    };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({"error": "log file 'p2p.json' not found"})
    );
}

#[test]
fn test_flow_errors_keep_their_status() {
    assert_eq!(
        ApiError::from(FlowError::NotFound("graph".into())).status().as_u16(),
        404
    );
    assert_eq!(
        ApiError::from(FlowError::SerializationError("x".into())).status().as_u16(),
        500
    );
}
