//! # Engine Primitives
//!
//! Hardcoded runtime constants for the flowsieve engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Changing any of the `*_RESULT_VERSION` constants makes every cached result
//! of that kind stale, which forces a transparent recomputation.

/// Sentinel activity that precedes every trace.
pub const START_TOKEN: &str = "|FLOWSIEVE_START|";

/// Sentinel activity that terminates every trace.
pub const END_TOKEN: &str = "|FLOWSIEVE_END|";

/// Upper bound of the last separator in every count series.
///
/// It lies above every reachable threshold, so the entry it closes holds the
/// unfiltered total.
pub const SENTINEL_UPPER_BOUND: f64 = 1.01;

/// Magic bytes for the durable cache entry format header.
pub const MAGIC_BYTES: &[u8; 4] = b"FSVC";

/// Current durable cache entry format version.
///
/// Increment this when making breaking changes to the entry encoding.
pub const FORMAT_VERSION: u8 = 1;

/// Schema version of discovered graph results.
pub const GRAPH_RESULT_VERSION: &str = "4";

/// Schema version of alignment results.
pub const ALIGNMENTS_RESULT_VERSION: &str = "2";

/// Schema version of performance metric results.
pub const PERFORMANCE_RESULT_VERSION: &str = "2";

/// Default lease lifetime of an in-flight job, in seconds.
///
/// A job still pending after this long is considered stuck and may be
/// re-dispatched by the next poll.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 1800;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of an activity label in bytes.
pub const MAX_ACTIVITY_LENGTH: usize = 1024;

/// Maximum number of activities in a single trace.
pub const MAX_TRACE_LENGTH: usize = 100_000;

/// Maximum number of activities a single alignment search will consider.
///
/// Longer traces are reported as unaligned instead of exhausting memory.
pub const MAX_ALIGNMENT_TRACE_LENGTH: usize = 2_000;
