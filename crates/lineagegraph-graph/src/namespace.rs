use lineagegraph_core::{NamespaceFilterState, NodePayload, RenderGraph, RenderNode};
use std::collections::HashSet;

/// A missing dimension never excludes a node.
fn dimension_allows(allowed: &[String], value: Option<&str>) -> bool {
    match value {
        _ if allowed.is_empty() => true,
        None => true,
        Some(value) => allowed.iter().any(|a| a.eq_ignore_ascii_case(value)),
    }
}

fn is_visible(node: &RenderNode, filter: &NamespaceFilterState) -> bool {
    match &node.payload {
        NodePayload::Table(data) if data.kind.is_relation() => {
            dimension_allows(&filter.schemas, data.schema.as_deref())
                && dimension_allows(&filter.databases, data.database.as_deref())
        }
        _ => true,
    }
}

/// Scope a graph to the schemas and databases in `filter`.
///
/// Script and Output nodes are always kept. Edges lose their place only when
/// an endpoint node is dropped; no transitive reconnection happens.
pub fn filter_by_namespace(graph: RenderGraph, filter: &NamespaceFilterState) -> RenderGraph {
    if !filter.is_active() {
        return graph;
    }

    let (nodes, dropped): (Vec<RenderNode>, Vec<RenderNode>) =
        graph.nodes.into_iter().partition(|node| is_visible(node, filter));
    if dropped.is_empty() {
        return RenderGraph {
            nodes,
            edges: graph.edges,
        };
    }

    let dropped_ids: HashSet<&str> = dropped.iter().map(|n| n.id.as_str()).collect();
    let edges = graph
        .edges
        .into_iter()
        .filter(|e| !dropped_ids.contains(e.source.as_str()) && !dropped_ids.contains(e.target.as_str()))
        .collect::<Vec<_>>();

    tracing::debug!(
        kept = nodes.len(),
        dropped = dropped.len(),
        edges = edges.len(),
        "Applied namespace filter"
    );
    RenderGraph { nodes, edges }
}
