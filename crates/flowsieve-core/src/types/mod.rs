//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the flowsieve engine:
//! - Graph identifiers (`Edge`, `EventId`, `ObjectType`)
//! - Projected input (`ProjectedTrace`, `ProjectedCase`, `CaseEvent`)
//! - Error types (`FlowError`)
//!
//! ## Determinism Guarantees
//!
//! Every key type implements `Ord` so it can live in a `BTreeMap`/`BTreeSet`,
//! which keeps iteration order (and therefore output) reproducible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Object type of a process entity (e.g. `"order"`, `"item"`).
pub type ObjectType = String;

/// Identifier of an event in the object-centric log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

/// A directly-follows edge between two activity labels.
///
/// Edges are scoped to one object type; the type is carried by the map the
/// edge is stored in, never by the edge itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    /// Create a new edge.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

// =============================================================================
// PROJECTED INPUT
// =============================================================================

/// One variant of a single-object-type projection of the log.
///
/// `count` process objects followed exactly `activities`. When present,
/// `event_ids[i]` lists the OCEL events behind step `i` across all of those
/// objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedTrace {
    pub activities: Vec<String>,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ids: Option<Vec<Vec<EventId>>>,
}

impl ProjectedTrace {
    /// Create a trace without event identifiers.
    #[must_use]
    pub fn new<S: Into<String>>(activities: impl IntoIterator<Item = S>, count: u64) -> Self {
        Self {
            activities: activities.into_iter().map(Into::into).collect(),
            count,
            event_ids: None,
        }
    }

    /// Attach per-step event identifiers.
    #[must_use]
    pub fn with_event_ids(mut self, event_ids: Vec<Vec<EventId>>) -> Self {
        self.event_ids = Some(event_ids);
        self
    }
}

/// A single event of a projected case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseEvent {
    #[serde(rename = "id")]
    pub event_id: EventId,
    pub activity: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// One process object and its ordered events, as seen by one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedCase {
    pub object_id: String,
    pub events: Vec<CaseEvent>,
}

impl ProjectedCase {
    /// The activity sequence of this case.
    pub fn activities(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.iter().map(|e| e.activity.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the flowsieve engine.
///
/// - No silent failures
/// - Use `Result<T, FlowError>` for fallible operations
/// - The engine never retries; retrying is left to the polling client
#[derive(Debug, Error)]
pub enum FlowError {
    /// The input (traces, counts, cached payload) is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A requested base entity or prerequisite result does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator (worker, projection, engine) reported a failure.
    #[error("External failure: {0}")]
    ExternalFailure(String),

    /// Two requests raced on the same job registration.
    #[error("Concurrency hazard: {0}")]
    ConcurrencyHazard(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl FlowError {
    /// Shorthand for `FlowError::InvalidInput`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

// =============================================================================
// TESTS
// =============================================================================
