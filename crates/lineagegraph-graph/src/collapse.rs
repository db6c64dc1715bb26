use lineagegraph_core::{CollapseOverrideSet, NodePayload, RenderEdge, RenderGraph};
use std::collections::{HashMap, HashSet};

/// Displayed collapse state: the view default, flipped when `id` is overridden.
pub fn is_collapsed(id: &str, view_default: bool, overrides: &CollapseOverrideSet) -> bool {
    view_default ^ overrides.contains(id)
}

/// Re-anchor edges touching collapsed nodes.
///
/// A handle naming a column owned by a collapsed node is cleared so the edge
/// attaches to the node itself. Edges that become identical afterwards are
/// merged, keeping the first id.
pub fn remap_collapsed_handles(graph: RenderGraph) -> RenderGraph {
    let collapsed: HashMap<&str, HashSet<&str>> = graph
        .nodes
        .iter()
        .filter_map(|node| match &node.payload {
            NodePayload::Table(data) if data.is_collapsed => Some((
                node.id.as_str(),
                data.columns.iter().map(|c| c.id.as_str()).collect(),
            )),
            _ => None,
        })
        .collect();

    if collapsed.is_empty() {
        return graph;
    }

    let clear = |node: &str, handle: &Option<String>| -> Option<String> {
        match (handle, collapsed.get(node)) {
            (Some(h), Some(columns)) if columns.contains(h.as_str()) => None,
            _ => handle.clone(),
        }
    };

    let mut edges: Vec<RenderEdge> = Vec::with_capacity(graph.edges.len());
    let mut slots: HashMap<(String, Option<String>, String, Option<String>), usize> =
        HashMap::new();

    for edge in &graph.edges {
        let source_handle = clear(&edge.source, &edge.source_handle);
        let target_handle = clear(&edge.target, &edge.target_handle);
        let key = (
            edge.source.clone(),
            source_handle.clone(),
            edge.target.clone(),
            target_handle.clone(),
        );
        if let Some(&slot) = slots.get(&key) {
            let kept = &mut edges[slot];
            kept.is_derived |= edge.is_derived;
            if kept.expression.is_none() {
                kept.expression = edge.expression.clone();
            }
            continue;
        }
        slots.insert(key, edges.len());
        edges.push(RenderEdge {
            source_handle,
            target_handle,
            ..edge.clone()
        });
    }

    RenderGraph {
        nodes: graph.nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineagegraph_core::{ColumnEntry, NodeKind, RenderNode, TableNodeData};

    fn table(id: &str, columns: &[&str], collapsed: bool) -> RenderNode {
        RenderNode {
            id: id.to_string(),
            payload: NodePayload::Table(TableNodeData {
                label: id.to_string(),
                kind: NodeKind::Table,
                qualified_name: None,
                schema: None,
                database: None,
                columns: columns
                    .iter()
                    .map(|c| ColumnEntry {
                        id: c.to_string(),
                        name: c.to_string(),
                        expression: None,
                    })
                    .collect(),
                is_base_table: false,
                is_highlighted: false,
                is_selected: false,
                is_collapsed: collapsed,
                join_type: None,
                join_condition: None,
                source_name: None,
                statement_index: 0,
            }),
        }
    }

    #[test]
    fn xor_truth_table() {
        let empty = CollapseOverrideSet::new();
        let with_id = CollapseOverrideSet::new().with("n");
        assert!(is_collapsed("n", true, &empty));
        assert!(!is_collapsed("n", true, &with_id));
        assert!(!is_collapsed("n", false, &empty));
        assert!(is_collapsed("n", false, &with_id));
    }

    #[test]
    fn collapsed_source_handles_are_cleared_and_merged() {
        let graph = RenderGraph {
            nodes: vec![table("a", &["a.x", "a.y"], true), table("b", &["b.x", "b.y"], false)],
            edges: vec![
                RenderEdge::new("e1", "a", "b").with_handles(Some("a.x".into()), Some("b.x".into())),
                RenderEdge::new("e2", "a", "b").with_handles(Some("a.y".into()), Some("b.x".into())),
                RenderEdge::new("e3", "a", "b").with_handles(Some("a.y".into()), Some("b.y".into())),
            ],
        };

        let remapped = remap_collapsed_handles(graph);
        assert_eq!(remapped.edges.len(), 2);
        assert_eq!(remapped.edges[0].id, "e1");
        assert_eq!(remapped.edges[0].source_handle, None);
        assert_eq!(remapped.edges[0].target_handle.as_deref(), Some("b.x"));
        assert_eq!(remapped.edges[1].id, "e3");
    }

    #[test]
    fn collapsed_on_both_ends_yields_single_line() {
        let graph = RenderGraph {
            nodes: vec![table("a", &["a.x", "a.y"], true), table("b", &["b.x"], true)],
            edges: vec![
                RenderEdge::new("e1", "a", "b").with_handles(Some("a.x".into()), Some("b.x".into())),
                RenderEdge::new("e2", "a", "b").with_handles(Some("a.y".into()), Some("b.x".into())),
            ],
        };
        let remapped = remap_collapsed_handles(graph);
        assert_eq!(remapped.edges.len(), 1);
        assert_eq!(remapped.edges[0].source_handle, None);
        assert_eq!(remapped.edges[0].target_handle, None);
    }

    #[test]
    fn handles_of_other_nodes_are_untouched() {
        let graph = RenderGraph {
            nodes: vec![table("a", &["a.x"], true), table("b", &["b.x"], false)],
            edges: vec![RenderEdge::new("e1", "b", "a").with_handles(Some("b.x".into()), Some("ghost".into()))],
        };
        let remapped = remap_collapsed_handles(graph);
        assert_eq!(remapped.edges[0].source_handle.as_deref(), Some("b.x"));
        assert_eq!(remapped.edges[0].target_handle.as_deref(), Some("ghost"));
    }
}
