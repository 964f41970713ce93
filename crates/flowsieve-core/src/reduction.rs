//! # Threshold Reduction
//!
//! Computes, for every edge and node of one object type, the count series
//! over thresholds, plus the threshold at which each trace appears.
//!
//! Edges are visited from least to most frequent. Visiting an edge removes
//! every trace still traversing it; after each pass the fraction of objects
//! left becomes the threshold of a new separator for everything touched.
//! Counting from the top down means the graph is computed once for all
//! thresholds.

use crate::builder::DfgTotals;
use crate::series::CountSeries;
use crate::{Edge, FlowError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The threshold from which a trace is shown, with its object count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceThreshold {
    pub count: u64,
    pub threshold: f64,
}

impl TraceThreshold {
    #[must_use]
    pub const fn new(count: u64, threshold: f64) -> Self {
        Self { count, threshold }
    }

    /// Whether the trace is shown at `threshold`.
    #[must_use]
    pub fn is_present_at(&self, threshold: f64) -> bool {
        self.threshold <= threshold
    }
}

/// Count series of one object type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReduction {
    pub edge_counts: BTreeMap<Edge, CountSeries>,
    pub node_counts: BTreeMap<String, CountSeries>,
    /// Parallel to `DfgTotals::traces`.
    pub trace_thresholds: Vec<TraceThreshold>,
}

/// Reduce builder totals to count series.
///
/// Ties between equally frequent edges are broken by first-seen order, so
/// the result is deterministic for a given trace order. Which of two tied
/// edges disappears first follows that order.
///
/// # Errors
/// Returns `FlowError::InvalidInput` if the totals hold no objects.
pub fn reduce(totals: &DfgTotals) -> Result<TypeReduction, FlowError> {
    if totals.total_objects == 0 {
        return Err(FlowError::invalid("cannot reduce a graph without objects"));
    }

    let mut edge_series: Vec<CountSeries> = totals
        .edges
        .iter()
        .map(|e| CountSeries::unfiltered(e.total))
        .collect();
    let mut edge_running: Vec<u64> = totals.edges.iter().map(|e| e.total).collect();

    let mut node_series: BTreeMap<&str, CountSeries> = totals
        .node_totals
        .iter()
        .map(|(node, total)| (node.as_str(), CountSeries::unfiltered(*total)))
        .collect();
    let mut node_running: BTreeMap<&str, u64> = totals
        .node_totals
        .iter()
        .map(|(node, total)| (node.as_str(), *total))
        .collect();

    let mut order: Vec<usize> = (0..totals.edges.len()).collect();
    order.sort_by_key(|&idx| totals.edges[idx].total);

    let mut removed = vec![false; totals.traces.len()];
    let mut thresholds: Vec<Option<TraceThreshold>> = vec![None; totals.traces.len()];
    let mut remaining = totals.total_objects;

    for edge_idx in order {
        let mut touched_edges: BTreeSet<usize> = BTreeSet::new();
        let mut touched_nodes: BTreeSet<&str> = BTreeSet::new();
        let mut removed_in_pass: Vec<usize> = Vec::new();

        for &trace_idx in &totals.edges[edge_idx].traces {
            if removed[trace_idx] {
                continue;
            }
            removed[trace_idx] = true;
            removed_in_pass.push(trace_idx);

            let trace = &totals.traces[trace_idx];
            for &step in &trace.edge_ids {
                edge_running[step] = edge_running[step].saturating_sub(trace.count);
                touched_edges.insert(step);
            }
            for action in &trace.actions {
                if let Some(running) = node_running.get_mut(action.as_str()) {
                    *running = running.saturating_sub(trace.count);
                }
                touched_nodes.insert(action.as_str());
            }
            remaining = remaining.saturating_sub(trace.count);
        }

        if removed_in_pass.is_empty() {
            continue;
        }

        let threshold = ratio(remaining, totals.total_objects);
        for step in touched_edges {
            edge_series[step].prepend(threshold, edge_running[step]);
        }
        for node in touched_nodes {
            if let (Some(series), Some(running)) =
                (node_series.get_mut(node), node_running.get(node))
            {
                series.prepend(threshold, *running);
            }
        }
        for trace_idx in removed_in_pass {
            thresholds[trace_idx] = Some(TraceThreshold::new(
                totals.traces[trace_idx].count,
                threshold,
            ));
        }
    }

    // Every trace has at least two edges, so every trace was removed above.
    let trace_thresholds = thresholds
        .into_iter()
        .zip(&totals.traces)
        .map(|(slot, trace)| slot.unwrap_or(TraceThreshold::new(trace.count, 0.0)))
        .collect();

    Ok(TypeReduction {
        edge_counts: totals
            .edges
            .iter()
            .map(|e| e.edge.clone())
            .zip(edge_series)
            .collect(),
        node_counts: node_series
            .into_iter()
            .map(|(node, series)| (node.to_string(), series))
            .collect(),
        trace_thresholds,
    })
}

#[allow(clippy::float_arithmetic)]
fn ratio(remaining: u64, total: u64) -> f64 {
    remaining as f64 / total as f64
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectedTrace;
    use crate::builder::DfgBuilder;
    use crate::primitives::{END_TOKEN, START_TOKEN};
    use crate::series::CountSeparator;

    fn reduce_traces(traces: &[ProjectedTrace]) -> TypeReduction {
        let totals = DfgBuilder::build(traces).expect("build");
        reduce(&totals).expect("reduce")
    }

    fn pairs(series: &CountSeries) -> Vec<(f64, u64)> {
        series.iter().map(|s| (s.upper_bound, s.instance_count)).collect()
    }

    #[test]
    fn least_frequent_edge_removes_its_trace_first() {
        let reduction = reduce_traces(&[
            ProjectedTrace::new(["a", "b", "c"], 10),
            ProjectedTrace::new(["a", "b"], 5),
        ]);

        let two_thirds = ratio(10, 15);
        assert_eq!(
            pairs(&reduction.edge_counts[&Edge::new("b", END_TOKEN)]),
            vec![(two_thirds, 0), (1.01, 5)]
        );
        assert_eq!(
            pairs(&reduction.edge_counts[&Edge::new("b", "c")]),
            vec![(0.0, 0), (1.01, 10)]
        );
        assert_eq!(
            pairs(&reduction.edge_counts[&Edge::new("a", "b")]),
            vec![(0.0, 0), (two_thirds, 10), (1.01, 15)]
        );
        assert_eq!(
            reduction.trace_thresholds,
            vec![TraceThreshold::new(10, 0.0), TraceThreshold::new(5, two_thirds)]
        );
    }

    #[test]
    fn node_series_follow_trace_removal() {
        let reduction = reduce_traces(&[
            ProjectedTrace::new(["a", "b", "c"], 10),
            ProjectedTrace::new(["a", "b"], 5),
        ]);

        let two_thirds = ratio(10, 15);
        assert_eq!(
            pairs(&reduction.node_counts["b"]),
            vec![(0.0, 0), (two_thirds, 10), (1.01, 15)]
        );
        assert_eq!(pairs(&reduction.node_counts["c"]), vec![(0.0, 0), (1.01, 10)]);
        assert_eq!(reduction.node_counts[START_TOKEN].total(), 15);
    }

    #[test]
    fn single_trace_collapses_to_zero_and_total() {
        let reduction = reduce_traces(&[ProjectedTrace::new(["x"], 4)]);
        for series in reduction.edge_counts.values() {
            assert_eq!(
                series.as_slice(),
                &[CountSeparator::new(0.0, 0), CountSeparator::new(1.01, 4)]
            );
        }
        assert_eq!(reduction.trace_thresholds, vec![TraceThreshold::new(4, 0.0)]);
    }

    #[test]
    fn empty_totals_are_rejected() {
        let totals = DfgBuilder::build(&[]).expect("build");
        assert!(matches!(reduce(&totals), Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn every_series_starts_at_zero_and_is_monotone() {
        let reduction = reduce_traces(&[
            ProjectedTrace::new(["a", "b", "a", "c"], 3),
            ProjectedTrace::new(["a", "c"], 7),
            ProjectedTrace::new(["b"], 1),
            ProjectedTrace::new(["c", "c", "b"], 2),
        ]);

        for series in reduction.edge_counts.values().chain(reduction.node_counts.values()) {
            assert_eq!(series.as_slice()[0].instance_count, 0);
            assert!(series.is_monotone());
        }
    }

    #[test]
    fn tie_order_only_moves_tied_edges() {
        let forward = reduce_traces(&[
            ProjectedTrace::new(["a", "b"], 2),
            ProjectedTrace::new(["a", "c"], 2),
        ]);
        let backward = reduce_traces(&[
            ProjectedTrace::new(["a", "c"], 2),
            ProjectedTrace::new(["a", "b"], 2),
        ]);

        // The first-seen of two equally frequent branches is removed first.
        assert_eq!(forward.edge_counts[&Edge::new("a", "b")].count_at(0.25), 0);
        assert_eq!(backward.edge_counts[&Edge::new("a", "b")].count_at(0.25), 2);

        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_eq!(
                forward.node_counts["a"].count_at(t),
                backward.node_counts["a"].count_at(t)
            );
        }
        for t in [0.5, 0.75, 1.0] {
            for (edge, series) in &forward.edge_counts {
                assert_eq!(series.count_at(t), backward.edge_counts[edge].count_at(t));
            }
        }
    }

    #[test]
    fn reduction_is_deterministic() {
        let traces = [
            ProjectedTrace::new(["a", "b"], 2),
            ProjectedTrace::new(["a", "c"], 2),
            ProjectedTrace::new(["c", "b"], 2),
        ];
        assert_eq!(reduce_traces(&traces), reduce_traces(&traces));
    }

    #[test]
    fn presence_is_inclusive() {
        let threshold = TraceThreshold::new(1, 0.5);
        assert!(threshold.is_present_at(0.5));
        assert!(!threshold.is_present_at(0.49));
    }
}
