//! # flowsieve HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /pm/dfg?ocel=` - Directly-follows graph of a log
//! - `GET /pm/alignments?process_ocel=&conformance_ocel=&threshold=` - Alignments
//! - `GET /pm/performance?process_ocel=&metrics_ocel=&threshold=` - Edge durations
//! - `DELETE /cache?ocel=` - Drop the stored results of a log
//!
//! Every `/pm` endpoint answers immediately with a task status; clients poll
//! until it reads `done` or `failed`.
//!
//! ## Configuration (Environment Variables)
//!
//! - `FLOWSIEVE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

pub use handlers::{
    alignments_handler, dfg_handler, health_handler, invalidate_handler, performance_handler,
};
pub use types::{
    AlignmentsQuery, ApiError, DfgQuery, ErrorResponse, HealthResponse, InvalidateQuery,
    InvalidateResponse, PerformanceQuery, check_threshold,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get},
};
use flowsieve_core::{EphemeralCache, FlowError, MemoryEphemeralCache, TaskOrchestrator};
use std::sync::Arc;
use tokio::runtime::Handle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::jobs::Catalogue;
use crate::projection::JsonLogProjection;
use crate::worker::WorkerPool;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the orchestrator and the logs it reads.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TaskOrchestrator>,
    pub projection: Arc<JsonLogProjection>,
}

impl AppState {
    /// Wire stores, worker pool and orchestrator as `config` describes.
    ///
    /// Jobs are spawned on `runtime`.
    pub fn new(config: &ServerConfig, runtime: Handle) -> Result<Self, FlowError> {
        let projection = Arc::new(JsonLogProjection::new(&config.data_dir));
        let durable = config.open_durable()?;
        let ephemeral: Arc<dyn EphemeralCache> = Arc::new(MemoryEphemeralCache::new());

        let catalogue = Catalogue::new(projection.clone(), Arc::clone(&durable));
        let pool = WorkerPool::new(
            runtime,
            config.workers,
            Arc::clone(&ephemeral),
            Arc::new(catalogue),
        );
        let orchestrator = TaskOrchestrator::new(durable, ephemeral, Arc::new(pool))
            .with_lease_ttl_secs(config.lease_ttl_secs);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            projection,
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `FLOWSIEVE_CORS_ORIGINS`:
/// - If "*": allows all origins
/// - If not set: localhost only
/// - Otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("FLOWSIEVE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (FLOWSIEVE_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: allowing origin {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: no valid origins in FLOWSIEVE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: FLOWSIEVE_CORS_ORIGINS not set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/pm/dfg", get(handlers::dfg_handler))
        .route("/pm/alignments", get(handlers::alignments_handler))
        .route("/pm/performance", get(handlers::performance_handler))
        .route("/cache", delete(handlers::invalidate_handler))
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl-C.
pub async fn run_server(config: &ServerConfig) -> Result<(), FlowError> {
    let state = AppState::new(config, Handle::current())?;
    let router = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FlowError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(
        %addr,
        backend = %config.backend,
        workers = config.workers,
        data_dir = %config.data_dir.display(),
        "flowsieve HTTP server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| FlowError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
