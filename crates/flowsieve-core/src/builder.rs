//! # DFG Builder
//!
//! Turns the projected traces of one object type into directly-follows
//! totals.
//!
//! - Validate every trace before counting
//! - Wrap each activity sequence with START/END
//! - Merge traces that share an activity sequence
//! - Count edges and nodes per occurrence, attribute each trace to an edge once

use crate::primitives::{END_TOKEN, MAX_ACTIVITY_LENGTH, MAX_TRACE_LENGTH, START_TOKEN};
use crate::{Edge, EventId, FlowError, ProjectedTrace};
use std::collections::BTreeMap;

// =============================================================================
// BUILDER OUTPUT
// =============================================================================

/// A trace bracketed by the START and END sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedTrace {
    /// Activities including both sentinels.
    pub actions: Vec<String>,
    /// Number of process objects following this trace.
    pub count: u64,
    /// Per-action event ids; the sentinels carry empty lists.
    pub event_ids: Option<Vec<Vec<EventId>>>,
    /// Index into `DfgTotals::edges` for every step of the trace.
    pub edge_ids: Vec<usize>,
}

/// Total traversal count of one edge and the traces that traverse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTotal {
    pub edge: Edge,
    /// Traversals, counting repeated occurrences within a trace.
    pub total: u64,
    /// Indices into `DfgTotals::traces`, each trace at most once.
    pub traces: Vec<usize>,
}

/// Directly-follows totals of one object type.
#[derive(Debug, Clone, Default)]
pub struct DfgTotals {
    /// Distinct wrapped traces in first-seen order.
    pub traces: Vec<WrappedTrace>,
    /// Edges in first-seen order.
    pub edges: Vec<EdgeTotal>,
    /// Node occurrences weighted by trace count.
    pub node_totals: BTreeMap<String, u64>,
    /// Number of process objects across all traces.
    pub total_objects: u64,
    edge_index: BTreeMap<Edge, usize>,
}

impl DfgTotals {
    /// Position of `edge` in `edges`.
    #[must_use]
    pub fn edge_position(&self, edge: &Edge) -> Option<usize> {
        self.edge_index.get(edge).copied()
    }

    /// Total traversal count of `edge`.
    #[must_use]
    pub fn edge_total(&self, edge: &Edge) -> Option<u64> {
        self.edge_position(edge).map(|idx| self.edges[idx].total)
    }

    /// The traces traversing `edge`.
    pub fn traces_through<'a>(&'a self, edge: &Edge) -> impl Iterator<Item = &'a WrappedTrace> {
        self.edge_position(edge)
            .into_iter()
            .flat_map(move |idx| self.edges[idx].traces.iter().map(|&t| &self.traces[t]))
    }

    fn intern_edge(&mut self, edge: Edge) -> usize {
        if let Some(&idx) = self.edge_index.get(&edge) {
            return idx;
        }
        let idx = self.edges.len();
        self.edge_index.insert(edge.clone(), idx);
        self.edges.push(EdgeTotal {
            edge,
            total: 0,
            traces: Vec::new(),
        });
        idx
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds `DfgTotals` from projected traces.
pub struct DfgBuilder;

impl DfgBuilder {
    /// Validate a projected trace.
    ///
    /// A trace is valid if:
    /// - It has at least one and at most `MAX_TRACE_LENGTH` activities
    /// - Its count is positive
    /// - No label is empty, oversized, or a sentinel token
    /// - Event ids, when present, have one entry per activity
    pub fn validate(trace: &ProjectedTrace) -> Result<(), FlowError> {
        if trace.activities.is_empty() {
            return Err(FlowError::invalid("trace has no activities"));
        }
        if trace.activities.len() > MAX_TRACE_LENGTH {
            return Err(FlowError::invalid(format!(
                "trace length {} exceeds maximum {}",
                trace.activities.len(),
                MAX_TRACE_LENGTH
            )));
        }
        if trace.count == 0 {
            return Err(FlowError::invalid("trace count must be positive"));
        }
        for activity in &trace.activities {
            if activity.is_empty() {
                return Err(FlowError::invalid("activity label is empty"));
            }
            if activity.len() > MAX_ACTIVITY_LENGTH {
                return Err(FlowError::invalid(format!(
                    "activity label length {} exceeds maximum {}",
                    activity.len(),
                    MAX_ACTIVITY_LENGTH
                )));
            }
            if activity == START_TOKEN || activity == END_TOKEN {
                return Err(FlowError::invalid(format!(
                    "activity label '{}' is reserved",
                    activity
                )));
            }
        }
        if let Some(ids) = &trace.event_ids
            && ids.len() != trace.activities.len()
        {
            return Err(FlowError::invalid(format!(
                "trace has {} activities but {} event id lists",
                trace.activities.len(),
                ids.len()
            )));
        }
        Ok(())
    }

    /// Count edges and nodes of one object type.
    ///
    /// # Errors
    /// Returns `FlowError::InvalidInput` if any trace fails validation.
    pub fn build(traces: &[ProjectedTrace]) -> Result<DfgTotals, FlowError> {
        for trace in traces {
            Self::validate(trace)?;
        }

        let mut totals = DfgTotals::default();
        for trace in Self::merge_variants(traces) {
            let trace_idx = totals.traces.len();
            let mut edge_ids = Vec::with_capacity(trace.actions.len().saturating_sub(1));

            for step in trace.actions.windows(2) {
                let edge_idx = totals.intern_edge(Edge::new(&step[0], &step[1]));
                let entry = &mut totals.edges[edge_idx];
                entry.total = entry.total.saturating_add(trace.count);
                // A looping trace traverses the same edge repeatedly.
                if entry.traces.last() != Some(&trace_idx) {
                    entry.traces.push(trace_idx);
                }
                edge_ids.push(edge_idx);
            }

            for action in &trace.actions {
                let node_total = totals.node_totals.entry(action.clone()).or_default();
                *node_total = node_total.saturating_add(trace.count);
            }

            totals.total_objects = totals.total_objects.saturating_add(trace.count);
            totals.traces.push(WrappedTrace { edge_ids, ..trace });
        }

        Ok(totals)
    }

    /// Wrap traces with sentinels and merge those sharing an activity sequence.
    fn merge_variants(traces: &[ProjectedTrace]) -> Vec<WrappedTrace> {
        let mut merged: Vec<WrappedTrace> = Vec::with_capacity(traces.len());
        let mut seen: BTreeMap<&[String], usize> = BTreeMap::new();

        for trace in traces {
            if let Some(&idx) = seen.get(trace.activities.as_slice()) {
                let existing = &mut merged[idx];
                existing.count = existing.count.saturating_add(trace.count);
                existing.event_ids = match (existing.event_ids.take(), &trace.event_ids) {
                    (Some(mut known), Some(extra)) => {
                        for (slot, ids) in known.iter_mut().skip(1).zip(extra) {
                            slot.extend(ids.iter().copied());
                        }
                        Some(known)
                    }
                    _ => None,
                };
                continue;
            }

            seen.insert(trace.activities.as_slice(), merged.len());
            merged.push(WrappedTrace {
                actions: wrap(&trace.activities),
                count: trace.count,
                event_ids: trace.event_ids.as_ref().map(|ids| {
                    let mut wrapped = Vec::with_capacity(ids.len() + 2);
                    wrapped.push(Vec::new());
                    wrapped.extend(ids.iter().cloned());
                    wrapped.push(Vec::new());
                    wrapped
                }),
                edge_ids: Vec::new(),
            });
        }

        merged
    }
}

/// Bracket an activity sequence with the START and END sentinels.
#[must_use]
pub fn wrap(activities: &[String]) -> Vec<String> {
    let mut wrapped = Vec::with_capacity(activities.len() + 2);
    wrapped.push(START_TOKEN.to_string());
    wrapped.extend(activities.iter().cloned());
    wrapped.push(END_TOKEN.to_string());
    wrapped
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_type_a() -> Vec<ProjectedTrace> {
        vec![
            ProjectedTrace::new(["a", "b", "c"], 10),
            ProjectedTrace::new(["a", "b"], 5),
        ]
    }

    #[test]
    fn validate_rejects_empty_trace() {
        let trace = ProjectedTrace::new(Vec::<String>::new(), 1);
        assert!(matches!(
            DfgBuilder::validate(&trace),
            Err(FlowError::InvalidInput(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_count() {
        assert!(DfgBuilder::validate(&ProjectedTrace::new(["a"], 0)).is_err());
    }

    #[test]
    fn validate_rejects_sentinel_label() {
        assert!(DfgBuilder::validate(&ProjectedTrace::new([START_TOKEN], 1)).is_err());
    }

    #[test]
    fn validate_rejects_event_id_length_mismatch() {
        let trace = ProjectedTrace::new(["a", "b"], 1).with_event_ids(vec![vec![EventId(1)]]);
        assert!(DfgBuilder::validate(&trace).is_err());
    }

    #[test]
    fn counts_edges_and_nodes() {
        let totals = DfgBuilder::build(&simple_type_a()).expect("build");

        assert_eq!(totals.total_objects, 15);
        assert_eq!(totals.node_totals["a"], 15);
        assert_eq!(totals.node_totals["b"], 15);
        assert_eq!(totals.node_totals["c"], 10);
        assert_eq!(totals.node_totals[START_TOKEN], 15);
        assert_eq!(totals.edge_total(&Edge::new("a", "b")), Some(15));
        assert_eq!(totals.edge_total(&Edge::new("b", "c")), Some(10));
        assert_eq!(totals.edge_total(&Edge::new("b", END_TOKEN)), Some(5));
    }

    #[test]
    fn attributes_traces_to_edges() {
        let totals = DfgBuilder::build(&simple_type_a()).expect("build");

        let through_ab: Vec<_> = totals
            .traces_through(&Edge::new("a", "b"))
            .map(|t| t.count)
            .collect();
        assert_eq!(through_ab, vec![10, 5]);

        let through_bc: Vec<_> = totals
            .traces_through(&Edge::new("b", "c"))
            .map(|t| t.actions.clone())
            .collect();
        assert_eq!(through_bc, vec![wrap(&["a".into(), "b".into(), "c".into()])]);
    }

    #[test]
    fn single_activity_trace_has_two_edges() {
        let totals = DfgBuilder::build(&[ProjectedTrace::new(["x"], 2)]).expect("build");
        assert_eq!(totals.edges.len(), 2);
        assert_eq!(totals.edge_total(&Edge::new(START_TOKEN, "x")), Some(2));
        assert_eq!(totals.edge_total(&Edge::new("x", END_TOKEN)), Some(2));
    }

    #[test]
    fn looping_trace_is_attributed_once() {
        let totals = DfgBuilder::build(&[ProjectedTrace::new(["a", "a", "a"], 1)]).expect("build");
        assert_eq!(totals.node_totals["a"], 3);
        assert_eq!(totals.edge_total(&Edge::new("a", "a")), Some(2));
        assert_eq!(totals.traces_through(&Edge::new("a", "a")).count(), 1);
    }

    #[test]
    fn alternating_loop_counts_each_direction() {
        let totals =
            DfgBuilder::build(&[ProjectedTrace::new(["a", "b", "a", "b"], 1)]).expect("build");
        assert_eq!(totals.edge_total(&Edge::new("a", "b")), Some(2));
        assert_eq!(totals.edge_total(&Edge::new("b", "a")), Some(1));
        assert_eq!(totals.traces_through(&Edge::new("b", "a")).count(), 1);
    }

    #[test]
    fn duplicate_sequences_are_merged() {
        let traces = vec![
            ProjectedTrace::new(["a", "b"], 2)
                .with_event_ids(vec![vec![EventId(1), EventId(2)], vec![EventId(3), EventId(4)]]),
            ProjectedTrace::new(["a", "b"], 1)
                .with_event_ids(vec![vec![EventId(5)], vec![EventId(6)]]),
        ];
        let totals = DfgBuilder::build(&traces).expect("build");

        assert_eq!(totals.traces.len(), 1);
        assert_eq!(totals.traces[0].count, 3);
        let ids = totals.traces[0].event_ids.as_ref().expect("ids");
        assert_eq!(ids[1], vec![EventId(1), EventId(2), EventId(5)]);
        assert!(ids[0].is_empty());
        assert!(ids[3].is_empty());
    }

    #[test]
    fn edges_keep_first_seen_order() {
        let totals = DfgBuilder::build(&simple_type_a()).expect("build");
        let order: Vec<_> = totals.edges.iter().map(|e| e.edge.clone()).collect();
        assert_eq!(
            order,
            vec![
                Edge::new(START_TOKEN, "a"),
                Edge::new("a", "b"),
                Edge::new("b", "c"),
                Edge::new("c", END_TOKEN),
                Edge::new("b", END_TOKEN),
            ]
        );
    }
}
