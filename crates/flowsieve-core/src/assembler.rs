//! # Graph Assembler
//!
//! Combines the per-type reductions and the merged node counts into the
//! global `DirectlyFollowsGraph` served to clients.
//!
//! ## Layout
//!
//! - Node indices: START = 0, END = 1, remaining labels lexicographic
//! - Trace catalogue: unique wrapped sequences, by object type then
//!   first-seen order, each annotated per type with `(count, threshold)`
//! - Subgraphs: one edge list per object type, ordered by
//!   `(source index, target index)`
//! - `thresholds`: every distinct bound below the sentinel, ascending

use crate::builder::DfgTotals;
use crate::primitives::{END_TOKEN, SENTINEL_UPPER_BOUND, START_TOKEN};
use crate::reduction::{TraceThreshold, TypeReduction};
use crate::series::CountSeries;
use crate::ObjectType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPH TYPES
// =============================================================================

/// The threshold-filterable graph across all object types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectlyFollowsGraph {
    pub thresholds: Vec<f64>,
    pub traces: Vec<GraphTrace>,
    pub nodes: Vec<GraphNode>,
    pub subgraphs: BTreeMap<ObjectType, Vec<GraphEdge>>,
}

/// A catalogue entry: node indices of a wrapped trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTrace {
    pub actions: Vec<usize>,
    pub thresholds: BTreeMap<ObjectType, TraceThreshold>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    /// Per-type count series.
    pub counts: BTreeMap<ObjectType, CountSeries>,
    /// Distinct OCEL events across all types.
    #[serde(rename = "ocelCounts")]
    pub ocel_counts: CountSeries,
    /// Catalogue indices of every trace visiting this node.
    pub traces: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub counts: CountSeries,
    /// Catalogue indices of this type's traces traversing the edge.
    pub traces: Vec<usize>,
}

/// Builder output and reduction of one object type.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    pub object_type: ObjectType,
    pub totals: DfgTotals,
    pub reduction: TypeReduction,
}

// =============================================================================
// ASSEMBLY
// =============================================================================

/// Assemble the global graph.
///
/// `ocel_counts` is the output of `merge_node_counts` for the same types.
#[must_use]
pub fn assemble(
    types: &[TypeGraph],
    ocel_counts: &BTreeMap<String, CountSeries>,
) -> DirectlyFollowsGraph {
    let mut ordered: Vec<&TypeGraph> = types.iter().collect();
    ordered.sort_by(|a, b| a.object_type.cmp(&b.object_type));

    let node_indices = index_nodes(&ordered);

    // Trace catalogue
    let mut traces: Vec<GraphTrace> = Vec::new();
    let mut catalogue: BTreeMap<&[String], usize> = BTreeMap::new();
    let mut local_to_global: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for graph in &ordered {
        let mut mapping = Vec::with_capacity(graph.totals.traces.len());
        for (trace, threshold) in graph
            .totals
            .traces
            .iter()
            .zip(&graph.reduction.trace_thresholds)
        {
            let idx = *catalogue.entry(trace.actions.as_slice()).or_insert_with(|| {
                traces.push(GraphTrace {
                    actions: trace
                        .actions
                        .iter()
                        .filter_map(|a| node_indices.get(a.as_str()).copied())
                        .collect(),
                    thresholds: BTreeMap::new(),
                });
                traces.len() - 1
            });
            traces[idx]
                .thresholds
                .insert(graph.object_type.clone(), *threshold);
            mapping.push(idx);
        }
        local_to_global.insert(graph.object_type.as_str(), mapping);
    }

    // Per-type subgraphs
    let mut subgraphs: BTreeMap<ObjectType, Vec<GraphEdge>> = BTreeMap::new();
    for graph in &ordered {
        let mapping = local_to_global
            .get(graph.object_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut edges: Vec<GraphEdge> = graph
            .totals
            .edges
            .iter()
            .filter_map(|total| {
                let counts = graph.reduction.edge_counts.get(&total.edge)?;
                Some(GraphEdge {
                    source: *node_indices.get(total.edge.source.as_str())?,
                    target: *node_indices.get(total.edge.target.as_str())?,
                    counts: counts.clone(),
                    traces: total
                        .traces
                        .iter()
                        .filter_map(|&local| mapping.get(local).copied())
                        .collect(),
                })
            })
            .collect();
        edges.sort_by_key(|edge| (edge.source, edge.target));
        subgraphs.insert(graph.object_type.clone(), edges);
    }

    // Nodes
    let mut node_traces: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); node_indices.len()];
    for (trace_idx, trace) in traces.iter().enumerate() {
        for &node in &trace.actions {
            node_traces[node].insert(trace_idx);
        }
    }
    let mut labels: Vec<&str> = vec![""; node_indices.len()];
    for (&label, &idx) in &node_indices {
        labels[idx] = label;
    }
    let nodes: Vec<GraphNode> = labels
        .into_iter()
        .zip(node_traces)
        .map(|(label, visiting)| GraphNode {
            label: label.to_string(),
            counts: ordered
                .iter()
                .filter_map(|graph| {
                    let series = graph.reduction.node_counts.get(label)?;
                    Some((graph.object_type.clone(), series.clone()))
                })
                .collect(),
            ocel_counts: ocel_counts
                .get(label)
                .cloned()
                .unwrap_or_else(|| CountSeries::unfiltered(0)),
            traces: visiting.into_iter().collect(),
        })
        .collect();

    let thresholds = collect_thresholds(&nodes, &subgraphs, &traces);

    DirectlyFollowsGraph {
        thresholds,
        traces,
        nodes,
        subgraphs,
    }
}

/// START = 0, END = 1, then every other label in lexicographic order.
fn index_nodes<'a>(types: &[&'a TypeGraph]) -> BTreeMap<&'a str, usize> {
    let labels: BTreeSet<&str> = types
        .iter()
        .copied()
        .flat_map(|graph| graph.totals.node_totals.keys().map(String::as_str))
        .filter(|label| *label != START_TOKEN && *label != END_TOKEN)
        .collect();

    let mut indices = BTreeMap::new();
    if types.is_empty() {
        return indices;
    }
    indices.insert(START_TOKEN, 0);
    indices.insert(END_TOKEN, 1);
    for label in labels {
        let next = indices.len();
        indices.insert(label, next);
    }
    indices
}

fn collect_thresholds(
    nodes: &[GraphNode],
    subgraphs: &BTreeMap<ObjectType, Vec<GraphEdge>>,
    traces: &[GraphTrace],
) -> Vec<f64> {
    let node_bounds = nodes.iter().flat_map(|node| {
        node.counts
            .values()
            .chain(std::iter::once(&node.ocel_counts))
            .flat_map(CountSeries::breakpoints)
    });
    let edge_bounds = subgraphs
        .values()
        .flatten()
        .flat_map(|edge| edge.counts.breakpoints());
    let trace_bounds = traces
        .iter()
        .flat_map(|trace| trace.thresholds.values().map(|t| t.threshold));

    let mut bounds: Vec<f64> = node_bounds
        .chain(edge_bounds)
        .chain(trace_bounds)
        .filter(|bound| *bound < SENTINEL_UPPER_BOUND)
        .collect();
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();
    bounds
}

// =============================================================================
// FILTERING
// =============================================================================

/// The DFG of one object type as shown at one threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredDfg {
    /// Visible node labels, in graph index order.
    pub labels: Vec<String>,
    /// Visible edges, indexing into `labels`.
    pub edges: BTreeSet<(usize, usize)>,
}

impl FilteredDfg {
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    #[must_use]
    pub fn start(&self) -> Option<usize> {
        self.index_of(START_TOKEN)
    }

    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.index_of(END_TOKEN)
    }

    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .range((node, 0)..=(node, usize::MAX))
            .map(|&(_, target)| target)
    }

    #[must_use]
    pub fn has_edge(&self, source: usize, target: usize) -> bool {
        self.edges.contains(&(source, target))
    }
}

impl DirectlyFollowsGraph {
    /// Object types present in the graph.
    pub fn object_types(&self) -> impl Iterator<Item = &str> {
        self.subgraphs.keys().map(String::as_str)
    }

    /// Index of the node labelled `label`.
    #[must_use]
    pub fn node_index(&self, label: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.label == label)
    }

    /// The DFG of `object_type` visible at `threshold`.
    ///
    /// Returns `None` if the type is not part of the graph.
    #[must_use]
    pub fn filter(&self, object_type: &str, threshold: f64) -> Option<FilteredDfg> {
        let edges = self.subgraphs.get(object_type)?;

        let mut reindex: BTreeMap<usize, usize> = BTreeMap::new();
        let mut labels = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            let visible = node
                .counts
                .get(object_type)
                .is_some_and(|series| series.is_visible_at(threshold));
            if visible {
                reindex.insert(idx, labels.len());
                labels.push(node.label.clone());
            }
        }

        let edges = edges
            .iter()
            .filter(|edge| edge.counts.is_visible_at(threshold))
            .filter_map(|edge| Some((*reindex.get(&edge.source)?, *reindex.get(&edge.target)?)))
            .collect();

        Some(FilteredDfg { labels, edges })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DfgBuilder, wrap};
    use crate::merge::merge_node_counts;
    use crate::reduction::reduce;
    use crate::ProjectedTrace;

    fn type_graph(object_type: &str, traces: &[ProjectedTrace]) -> TypeGraph {
        let totals = DfgBuilder::build(traces).expect("build");
        let reduction = reduce(&totals).expect("reduce");
        TypeGraph {
            object_type: object_type.to_string(),
            totals,
            reduction,
        }
    }

    fn simple_types() -> Vec<TypeGraph> {
        vec![
            type_graph(
                "type_b",
                &[
                    ProjectedTrace::new(["a", "b", "c"], 4),
                    ProjectedTrace::new(["b", "c"], 3),
                    ProjectedTrace::new(["a", "c"], 1),
                ],
            ),
            type_graph(
                "type_a",
                &[
                    ProjectedTrace::new(["a", "b", "c"], 10),
                    ProjectedTrace::new(["a", "b"], 5),
                ],
            ),
        ]
    }

    fn assemble_simple() -> DirectlyFollowsGraph {
        let types = simple_types();
        let ocel = merge_node_counts(
            types
                .iter()
                .map(|g| (&g.totals, g.reduction.trace_thresholds.as_slice())),
        )
        .expect("merge");
        assemble(&types, &ocel)
    }

    fn labels_of(graph: &DirectlyFollowsGraph, trace: &GraphTrace) -> Vec<String> {
        trace
            .actions
            .iter()
            .map(|&i| graph.nodes[i].label.clone())
            .collect()
    }

    #[test]
    fn sentinels_lead_node_order() {
        let graph = assemble_simple();
        let labels: Vec<_> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec![START_TOKEN, END_TOKEN, "a", "b", "c"]);
    }

    #[test]
    fn catalogue_is_deduplicated_across_types() {
        let graph = assemble_simple();
        assert_eq!(graph.traces.len(), 4);

        let shared = &graph.traces[0];
        assert_eq!(
            labels_of(&graph, shared),
            wrap(&["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(shared.thresholds.len(), 2);
        assert_eq!(shared.thresholds["type_a"].count, 10);
        assert_eq!(shared.thresholds["type_b"].count, 4);
    }

    #[test]
    fn edges_reference_their_traces() {
        let graph = assemble_simple();
        let b = graph.node_index("b").expect("b");
        let end = graph.node_index(END_TOKEN).expect("end");

        let edge = graph.subgraphs["type_a"]
            .iter()
            .find(|e| e.source == b && e.target == end)
            .expect("b -> end");
        assert_eq!(edge.traces.len(), 1);
        assert_eq!(
            labels_of(&graph, &graph.traces[edge.traces[0]]),
            wrap(&["a".into(), "b".into()])
        );
    }

    #[test]
    fn subgraph_edges_are_sorted() {
        let graph = assemble_simple();
        for edges in graph.subgraphs.values() {
            let keys: Vec<_> = edges.iter().map(|e| (e.source, e.target)).collect();
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            assert_eq!(keys, sorted);
        }
    }

    #[test]
    fn thresholds_exclude_sentinel_and_are_sorted() {
        let graph = assemble_simple();
        assert!(graph.thresholds.iter().all(|t| *t < SENTINEL_UPPER_BOUND));
        assert!(graph.thresholds.windows(2).all(|w| w[0] < w[1]));
        assert!(graph.thresholds.contains(&0.0));
    }

    #[test]
    fn json_round_trip_keeps_counts() {
        let types = simple_types();
        let graph = assemble_simple();
        let json = serde_json::to_string(&graph).expect("serialize");
        assert!(json.contains("\"ocelCounts\""));

        let parsed: DirectlyFollowsGraph = serde_json::from_str(&json).expect("deserialize");
        for graph_type in &types {
            for edge in &parsed.subgraphs[&graph_type.object_type] {
                let key = crate::Edge::new(
                    parsed.nodes[edge.source].label.clone(),
                    parsed.nodes[edge.target].label.clone(),
                );
                assert_eq!(edge.counts, graph_type.reduction.edge_counts[&key]);
            }
        }
    }

    #[test]
    fn filter_keeps_only_visible_elements() {
        let graph = assemble_simple();

        let low = graph.filter("type_a", 0.0).expect("type_a");
        assert_eq!(low.labels, vec![START_TOKEN, END_TOKEN, "a", "b", "c"]);
        let b = low.index_of("b").expect("b");
        let end = low.end().expect("end");
        assert!(!low.has_edge(b, end));

        let high = graph.filter("type_a", 1.0).expect("type_a");
        let b = high.index_of("b").expect("b");
        let end = high.end().expect("end");
        assert!(high.has_edge(b, end));
        assert_eq!(high.successors(b).count(), 2);
    }

    #[test]
    fn filter_shows_series_without_leading_zero() {
        let node = |label: &str| GraphNode {
            label: label.to_string(),
            counts: BTreeMap::from([("order".to_string(), CountSeries::unfiltered(3))]),
            ocel_counts: CountSeries::unfiltered(0),
            traces: vec![0],
        };
        let edge = |source, target| GraphEdge {
            source,
            target,
            counts: CountSeries::unfiltered(3),
            traces: vec![0],
        };
        let graph = DirectlyFollowsGraph {
            thresholds: Vec::new(),
            traces: Vec::new(),
            nodes: vec![node(START_TOKEN), node(END_TOKEN), node("a")],
            subgraphs: BTreeMap::from([("order".to_string(), vec![edge(0, 2), edge(2, 1)])]),
        };

        for threshold in [0.0, 0.5, 1.0] {
            let filtered = graph.filter("order", threshold).expect("order");
            assert_eq!(filtered.labels, vec![START_TOKEN, END_TOKEN, "a"]);
            assert_eq!(filtered.edges, BTreeSet::from([(0, 2), (2, 1)]));
        }
    }

    #[test]
    fn filter_of_unknown_type_is_none() {
        assert!(assemble_simple().filter("missing", 1.0).is_none());
    }

    #[test]
    fn empty_input_yields_empty_graph() {
        let graph = assemble(&[], &BTreeMap::new());
        assert_eq!(graph, DirectlyFollowsGraph::default());
    }
}
