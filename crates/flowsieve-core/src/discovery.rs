//! # Discovery Pipeline
//!
//! Builder → Reduction → Merge → Assembler, one object type at a time.
//!
//! After each object type the graph assembled so far is handed to a
//! progress callback, which lets a running job publish a preliminary
//! result while the remaining types are still being processed.

use crate::assembler::{DirectlyFollowsGraph, TypeGraph, assemble};
use crate::builder::DfgBuilder;
use crate::merge::merge_node_counts;
use crate::projection::LogProjection;
use crate::reduction::reduce;
use crate::{FlowError, ObjectType, ProjectedTrace};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Build and reduce the DFG of one object type.
pub fn discover_type(
    object_type: impl Into<ObjectType>,
    traces: &[ProjectedTrace],
) -> Result<TypeGraph, FlowError> {
    let totals = DfgBuilder::build(traces)?;
    let reduction = reduce(&totals)?;
    Ok(TypeGraph {
        object_type: object_type.into(),
        totals,
        reduction,
    })
}

/// Merge node counts and assemble the global graph of `types`.
pub fn assemble_types(types: &[TypeGraph]) -> Result<DirectlyFollowsGraph, FlowError> {
    let ocel_counts = merge_node_counts(
        types
            .iter()
            .map(|graph| (&graph.totals, graph.reduction.trace_thresholds.as_slice())),
    )?;
    Ok(assemble(types, &ocel_counts))
}

/// Discover the graph of already projected traces.
///
/// Object types without traces are left out of the graph.
pub fn discover_traces(
    traces_by_type: &BTreeMap<ObjectType, Vec<ProjectedTrace>>,
) -> Result<DirectlyFollowsGraph, FlowError> {
    let types = traces_by_type
        .iter()
        .filter(|(_, traces)| !traces.is_empty())
        .map(|(object_type, traces)| discover_type(object_type.clone(), traces))
        .collect::<Result<Vec<_>, _>>()?;
    assemble_types(&types)
}

/// Discover the graph of the log `ocel`.
///
/// `on_progress` receives the partial graph after every object type along
/// with the number of types done and the number of types in the log.
pub fn discover<P, F>(
    projection: &P,
    ocel: &str,
    mut on_progress: F,
) -> Result<DirectlyFollowsGraph, FlowError>
where
    P: LogProjection + ?Sized,
    F: FnMut(&DirectlyFollowsGraph, usize, usize),
{
    let object_types = projection.object_types(ocel)?;
    let total = object_types.len();
    let mut types: Vec<TypeGraph> = Vec::with_capacity(total);

    for (done, object_type) in object_types.into_iter().enumerate() {
        let traces = projection.project_traces(ocel, &object_type)?;
        if traces.is_empty() {
            debug!(ocel, object_type = %object_type, "object type has no traces, skipping");
        } else {
            debug!(
                ocel,
                object_type = %object_type,
                variants = traces.len(),
                "reducing object type"
            );
            types.push(discover_type(object_type, &traces)?);
        }
        let partial = assemble_types(&types)?;
        on_progress(&partial, done + 1, total);
    }

    let graph = assemble_types(&types)?;
    info!(
        ocel,
        object_types = graph.subgraphs.len(),
        nodes = graph.nodes.len(),
        traces = graph.traces.len(),
        "discovered directly-follows graph"
    );
    Ok(graph)
}
