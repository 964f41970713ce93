//! # Cross-Type Node Merge
//!
//! Counts the distinct OCEL events at each node across every object type.
//!
//! An event is admitted at a node from the lowest threshold at which any
//! trace containing it there is shown. An event shared by several object
//! types is therefore counted once, at its earliest admission.

use crate::builder::DfgTotals;
use crate::reduction::TraceThreshold;
use crate::series::{CountSeparator, CountSeries};
use crate::primitives::SENTINEL_UPPER_BOUND;
use crate::{EventId, FlowError};
use std::collections::BTreeMap;

/// Admission thresholds collected for one node.
#[derive(Debug, Default)]
struct NodeAdmissions {
    events: BTreeMap<EventId, f64>,
    /// Occurrences from traces without event ids: `(threshold, weight)`.
    anonymous: Vec<(f64, u64)>,
}

impl NodeAdmissions {
    fn admit(&mut self, event: EventId, threshold: f64) {
        self.events
            .entry(event)
            .and_modify(|known| *known = known.min(threshold))
            .or_insert(threshold);
    }

    fn into_series(self) -> Result<CountSeries, FlowError> {
        let mut admissions: Vec<(f64, u64)> = self
            .events
            .into_values()
            .map(|threshold| (threshold, 1))
            .chain(self.anonymous)
            .collect();
        if admissions.is_empty() {
            return Ok(CountSeries::unfiltered(0));
        }
        admissions.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Admission thresholds are lower bounds; a query at `t` sees every
        // event admitted at or below `t`, so each bound closes the previous
        // cumulative count.
        let mut separators: Vec<CountSeparator> = Vec::new();
        let mut cumulative = 0u64;
        for (threshold, weight) in admissions {
            if separators.last().map(|s| s.upper_bound) != Some(threshold) {
                separators.push(CountSeparator::new(threshold, cumulative));
            }
            cumulative = cumulative.saturating_add(weight);
        }
        separators.push(CountSeparator::new(SENTINEL_UPPER_BOUND, cumulative));

        CountSeries::from_separators(separators)
    }
}

/// Merge the event counts of every node across object types.
///
/// Each item pairs the totals of one object type with the trace thresholds
/// computed for it (parallel to `DfgTotals::traces`). Every node of every
/// type gets a series; nodes without events hold `[(1.01, 0)]`.
///
/// # Errors
/// Returns `FlowError::InvalidInput` if a thresholds slice does not match
/// its traces.
pub fn merge_node_counts<'a, I>(types: I) -> Result<BTreeMap<String, CountSeries>, FlowError>
where
    I: IntoIterator<Item = (&'a DfgTotals, &'a [TraceThreshold])>,
{
    let mut nodes: BTreeMap<&'a str, NodeAdmissions> = BTreeMap::new();

    for (totals, thresholds) in types {
        if thresholds.len() != totals.traces.len() {
            return Err(FlowError::invalid(format!(
                "{} trace thresholds for {} traces",
                thresholds.len(),
                totals.traces.len()
            )));
        }

        for node in totals.node_totals.keys() {
            nodes.entry(node.as_str()).or_default();
        }

        for (trace, threshold) in totals.traces.iter().zip(thresholds) {
            match &trace.event_ids {
                Some(event_ids) => {
                    for (action, ids) in trace.actions.iter().zip(event_ids) {
                        let admissions = nodes.entry(action.as_str()).or_default();
                        for &event in ids {
                            admissions.admit(event, threshold.threshold);
                        }
                    }
                }
                None => {
                    // Sentinels carry no events.
                    let inner = trace
                        .actions
                        .iter()
                        .skip(1)
                        .take(trace.actions.len().saturating_sub(2));
                    for action in inner {
                        nodes
                            .entry(action.as_str())
                            .or_default()
                            .anonymous
                            .push((threshold.threshold, trace.count));
                    }
                }
            }
        }
    }

    nodes
        .into_iter()
        .map(|(node, admissions)| Ok((node.to_string(), admissions.into_series()?)))
        .collect()
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

    fn traced(activities: &[&str], ids: &[u64]) -> ProjectedTrace {
        ProjectedTrace::new(activities.iter().copied(), 1)
            .with_event_ids(ids.iter().map(|&id| vec![EventId(id)]).collect())
    }

    fn series(pairs: &[(f64, u64)]) -> CountSeries {
        CountSeries::from_separators(pairs.iter().copied().map(CountSeparator::from).collect())
            .expect("valid series")
    }

    #[test]
    fn events_shared_by_types_count_once() {
        let one = DfgBuilder::build(&[
            traced(&["a", "b", "d"], &[1, 2, 4]),
            traced(&["a", "c", "d"], &[1, 3, 4]),
        ])
        .expect("build one");
        let two = DfgBuilder::build(&[
            traced(&["a", "b", "d"], &[1, 2, 4]),
            traced(&["a", "e", "e", "d"], &[1, 5, 6, 4]),
        ])
        .expect("build two");
        let three =
            DfgBuilder::build(&[traced(&["a", "c", "d"], &[1, 7, 4])]).expect("build three");

        let one_thresholds = [TraceThreshold::new(1, 0.25), TraceThreshold::new(1, 0.75)];
        let two_thresholds = [TraceThreshold::new(1, 0.25), TraceThreshold::new(1, 0.5)];
        let three_thresholds = [TraceThreshold::new(1, 0.9)];

        let merged = merge_node_counts([
            (&one, &one_thresholds[..]),
            (&two, &two_thresholds[..]),
            (&three, &three_thresholds[..]),
        ])
        .expect("merge");

        assert_eq!(merged[START_TOKEN], series(&[(1.01, 0)]));
        assert_eq!(merged[END_TOKEN], series(&[(1.01, 0)]));
        assert_eq!(merged["a"], series(&[(0.25, 0), (1.01, 1)]));
        assert_eq!(merged["b"], series(&[(0.25, 0), (1.01, 1)]));
        assert_eq!(merged["c"], series(&[(0.75, 0), (0.9, 1), (1.01, 2)]));
        assert_eq!(merged["d"], series(&[(0.25, 0), (1.01, 1)]));
        assert_eq!(merged["e"], series(&[(0.5, 0), (1.01, 2)]));
    }

    #[test]
    fn traces_without_event_ids_count_occurrences() {
        let totals = DfgBuilder::build(&[
            ProjectedTrace::new(["a", "a"], 3),
            ProjectedTrace::new(["a"], 2),
        ])
        .expect("build");
        let thresholds = [TraceThreshold::new(3, 0.0), TraceThreshold::new(2, 0.6)];

        let merged = merge_node_counts([(&totals, &thresholds[..])]).expect("merge");
        assert_eq!(merged["a"], series(&[(0.0, 0), (0.6, 6), (1.01, 8)]));
        assert_eq!(merged[START_TOKEN], series(&[(1.01, 0)]));
    }

    #[test]
    fn mismatched_thresholds_are_rejected() {
        let totals = DfgBuilder::build(&[ProjectedTrace::new(["a"], 1)]).expect("build");
        assert!(matches!(
            merge_node_counts([(&totals, &[][..])]),
            Err(FlowError::InvalidInput(_))
        ));
    }
}
