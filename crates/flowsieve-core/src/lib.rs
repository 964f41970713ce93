//! # flowsieve-core
//!
//! The deterministic threshold engine for flowsieve - THE LOGIC.
//!
//! Given the traces of an object-centric event log, this crate builds one
//! directly-follows graph per object type and annotates every edge, node
//! and trace with the counts it keeps under each filtering threshold. A
//! client can then filter the graph at any threshold in `[0, 1]` without
//! recomputation.
//!
//! ## Layers
//!
//! - `builder` → `reduction` → `merge` → `assembler`: graph discovery
//! - `conformance`, `performance`: analyses against a filtered graph
//! - `cache`, `storage`, `formats`: durable and ephemeral result stores
//! - `task`: cached, single-dispatch execution of the above
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Deterministic output: `BTreeMap` only, stable sorts
//! - Event log access, job execution and caches are injected traits

// =============================================================================
// MODULES
// =============================================================================

pub mod assembler;
pub mod builder;
pub mod cache;
pub mod conformance;
pub mod discovery;
pub mod formats;
pub mod merge;
pub mod performance;
pub mod primitives;
pub mod projection;
pub mod reduction;
pub mod series;
pub mod storage;
pub mod task;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CaseEvent, Edge, EventId, FlowError, ObjectType, ProjectedCase, ProjectedTrace};

// =============================================================================
// RE-EXPORTS: Discovery
// =============================================================================

pub use assembler::{
    DirectlyFollowsGraph, FilteredDfg, GraphEdge, GraphNode, GraphTrace, TypeGraph, assemble,
};
pub use builder::{DfgBuilder, DfgTotals, EdgeTotal, WrappedTrace};
pub use discovery::{assemble_types, discover, discover_traces, discover_type};
pub use merge::merge_node_counts;
pub use projection::{LogProjection, MemoryProjection, variants_from_cases};
pub use reduction::{TraceThreshold, TypeReduction, reduce};
pub use series::{CountSeparator, CountSeries};

// =============================================================================
// RE-EXPORTS: Analyses
// =============================================================================

pub use conformance::{
    Alignment, AlignmentEngine, AlignmentMove, DfgAligner, TraceAlignment, align_traces,
};
pub use performance::{EdgeDurationEngine, EdgeDurations, PerformanceEngine, PerformanceMetrics};

// =============================================================================
// RE-EXPORTS: Caching and Tasks
// =============================================================================

pub use cache::{
    CacheEntry, DurableCache, EphemeralCache, MemoryDurableCache, MemoryEphemeralCache,
};
pub use formats::{PersistenceHeader, entry_from_bytes, entry_to_bytes};
pub use storage::RedbCache;
pub use task::{
    JobContext, JobExecutor, JobHandle, JobPoll, JobRequest, PreliminarySink, TaskDefinition,
    TaskKind, TaskName, TaskOrchestrator, TaskStatus,
};
