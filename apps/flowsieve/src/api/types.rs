//! # API Request/Response Types
//!
//! Query strings, JSON bodies and the error type of the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flowsieve_core::FlowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projection::PathError;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// `GET /pm/dfg`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfgQuery {
    pub ocel: String,
    /// Recompute even when a stored graph exists.
    #[serde(default)]
    pub refresh: bool,
}

/// `GET /pm/alignments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentsQuery {
    pub process_ocel: String,
    pub conformance_ocel: String,
    pub threshold: f64,
}

/// `GET /pm/performance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceQuery {
    pub process_ocel: String,
    pub metrics_ocel: String,
    pub threshold: f64,
}

/// `DELETE /cache`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateQuery {
    pub ocel: String,
}

/// Number of durable entries removed by `DELETE /cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

/// Filtering thresholds are fractions of the trace population.
pub fn check_threshold(threshold: f64) -> Result<f64, ApiError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ApiError::BadRequest(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A request that could not be answered with a task status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Path(PathError::Traversal(_)) => StatusCode::FORBIDDEN,
            Self::Path(PathError::Missing(_)) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Flow(FlowError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Flow(FlowError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Flow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
