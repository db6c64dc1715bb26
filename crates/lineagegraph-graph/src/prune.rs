use lineagegraph_core::RenderGraph;
use std::collections::{HashMap, HashSet};

/// Drop edges that reference a node or column handle missing from the graph.
///
/// Runs last in the pipeline; every other stage may leave such edges behind.
pub fn prune_dangling_edges(mut graph: RenderGraph) -> RenderGraph {
    let handles: HashMap<&str, HashSet<&str>> = graph
        .nodes
        .iter()
        .map(|node| {
            (
                node.id.as_str(),
                node.payload.columns().iter().map(|c| c.id.as_str()).collect(),
            )
        })
        .collect();

    let resolves = |node: &str, handle: Option<&str>| match (handles.get(node), handle) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(columns), Some(handle)) => columns.contains(handle),
    };

    let before = graph.edges.len();
    graph.edges.retain(|edge| {
        let keep = resolves(&edge.source, edge.source_handle.as_deref())
            && resolves(&edge.target, edge.target_handle.as_deref());
        if !keep {
            tracing::trace!(edge = %edge.id, source = %edge.source, target = %edge.target, "Pruned dangling edge");
        }
        keep
    });

    let pruned = before - graph.edges.len();
    if pruned > 0 {
        tracing::debug!(pruned, remaining = graph.edges.len(), "Pruned dangling edges");
    }
    graph
}
