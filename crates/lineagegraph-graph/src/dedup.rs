use lineagegraph_core::{EdgeKind, LineageEdge, NodeKind, OUTPUT_NODE_ID};
use std::collections::{HashMap, HashSet};

use crate::output::OutputSynthesis;
use crate::ownership::StatementIndex;

/// One data_flow/derivation relationship with both endpoints resolved to a
/// render node. `*_column` is `None` when the endpoint is a bare table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConnection<'a> {
    pub id: String,
    pub source_node: &'a str,
    pub target_node: &'a str,
    pub source_column: Option<&'a str>,
    pub target_column: Option<&'a str>,
    pub is_derived: bool,
    pub expression: Option<&'a str>,
    /// Operation label of the originating flow edge.
    pub operation: Option<&'a str>,
}

/// Deduplicated relation-to-relation edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePairEdge<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub is_derived: bool,
    pub connection_count: usize,
}

impl TablePairEdge<'_> {
    pub fn id(&self) -> String {
        format!("{}->{}", self.source, self.target)
    }
}

type Endpoint<'a> = (&'a str, Option<&'a str>);

struct Resolver<'s, 'a> {
    index: &'s StatementIndex<'a>,
    synthesis: &'s OutputSynthesis<'a>,
}

impl<'a> Resolver<'_, 'a> {
    fn endpoint(&self, id: &str) -> Option<Endpoint<'a>> {
        let node = self.index.node(id)?;
        match node.kind {
            NodeKind::Table | NodeKind::Cte | NodeKind::View => Some((node.id.as_str(), None)),
            NodeKind::Column => {
                if let Some(owner) = self.index.owner_of(&node.id) {
                    Some((owner, Some(node.id.as_str())))
                } else if self.synthesis.is_orphan(&node.id) {
                    Some((OUTPUT_NODE_ID, Some(node.id.as_str())))
                } else {
                    None
                }
            }
            NodeKind::Script | NodeKind::Output => None,
        }
    }

    fn target_expression(&self, column: Option<&str>) -> Option<&'a str> {
        column
            .and_then(|id| self.index.node(id))
            .and_then(|node| node.expression.as_deref())
            .filter(|expr| !expr.trim().is_empty())
    }
}

/// Resolve every flow edge of a statement into render-node connections.
///
/// Self-loops (both ends on the same render node) are dropped. Edges into a
/// pass-through column are bridged to every resolvable endpoint reachable
/// through pass-through columns only.
pub fn resolve_connections<'a>(
    index: &StatementIndex<'a>,
    synthesis: &OutputSynthesis<'a>,
) -> Vec<ColumnConnection<'a>> {
    let resolver = Resolver { index, synthesis };

    let mut pass_through_out: HashMap<&str, Vec<&LineageEdge>> = HashMap::new();
    for edge in index.flow_edges() {
        if synthesis.is_pass_through(&edge.from_id) {
            pass_through_out.entry(edge.from_id.as_str()).or_default().push(edge);
        }
    }

    let mut connections = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut push = |connection: ColumnConnection<'a>| {
        if connection.source_node == connection.target_node {
            return;
        }
        if seen_ids.insert(connection.id.clone()) {
            connections.push(connection);
        }
    };

    for edge in index.flow_edges() {
        if synthesis.is_pass_through(&edge.from_id) {
            continue;
        }
        let Some((source_node, source_column)) = resolver.endpoint(&edge.from_id) else {
            tracing::trace!(edge = %edge.id, "Skipping flow edge with unresolvable source");
            continue;
        };
        let derived = edge.kind == EdgeKind::Derivation;
        let expression = edge.expression.as_deref().filter(|e| !e.trim().is_empty());
        let operation = non_blank(edge.operation.as_deref());

        if !synthesis.is_pass_through(&edge.to_id) {
            let Some((target_node, target_column)) = resolver.endpoint(&edge.to_id) else {
                tracing::trace!(edge = %edge.id, "Skipping flow edge with unresolvable target");
                continue;
            };
            let target_expression = resolver.target_expression(target_column);
            push(ColumnConnection {
                id: edge.id.clone(),
                source_node,
                target_node,
                source_column,
                target_column,
                is_derived: derived || target_expression.is_some(),
                expression: expression.or(target_expression),
                operation,
            });
            continue;
        }

        let mut visited: HashSet<&str> = HashSet::from([edge.to_id.as_str()]);
        let mut stack = vec![(edge.to_id.as_str(), derived, expression)];
        while let Some((column, derived, expression)) = stack.pop() {
            let Some(next_edges) = pass_through_out.get(column) else {
                continue;
            };
            for &next in next_edges {
                let hop_derived = derived || next.kind == EdgeKind::Derivation;
                let hop_expression =
                    expression.or(next.expression.as_deref().filter(|e| !e.trim().is_empty()));
                if synthesis.is_pass_through(&next.to_id) {
                    if visited.insert(next.to_id.as_str()) {
                        stack.push((next.to_id.as_str(), hop_derived, hop_expression));
                    }
                    continue;
                }
                let Some((target_node, target_column)) = resolver.endpoint(&next.to_id) else {
                    continue;
                };
                let target_expression = resolver.target_expression(target_column);
                push(ColumnConnection {
                    id: format!("{}~{}", edge.id, next.id),
                    source_node,
                    target_node,
                    source_column,
                    target_column,
                    is_derived: hop_derived || target_expression.is_some(),
                    expression: hop_expression.or(target_expression),
                    operation: operation.or(non_blank(next.operation.as_deref())),
                });
            }
        }
    }

    connections
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Collapse connections to one edge per ordered (source, target) pair, in
/// first-seen order.
pub fn dedup_table_pairs<'a>(connections: &[ColumnConnection<'a>]) -> Vec<TablePairEdge<'a>> {
    let mut slots: HashMap<(&str, &str), usize> = HashMap::new();
    let mut pairs: Vec<TablePairEdge<'a>> = Vec::new();

    for connection in connections {
        let key = (connection.source_node, connection.target_node);
        match slots.get(&key) {
            Some(&slot) => {
                let pair = &mut pairs[slot];
                pair.is_derived |= connection.is_derived;
                pair.connection_count += 1;
            }
            None => {
                slots.insert(key, pairs.len());
                pairs.push(TablePairEdge {
                    source: connection.source_node,
                    target: connection.target_node,
                    is_derived: connection.is_derived,
                    connection_count: 1,
                });
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{pass_through_columns, synthesize_output};
    use lineagegraph_core::{LineageNode, StatementLineageUnit};

    fn synthesize<'a>(index: &StatementIndex<'a>) -> OutputSynthesis<'a> {
        synthesize_output(index, &pass_through_columns(std::slice::from_ref(index.unit())))
    }

    fn owned(unit: StatementLineageUnit, table: &str, column: &str) -> StatementLineageUnit {
        unit.with_node(LineageNode::column(column, column)).with_edge(LineageEdge::new(
            format!("own:{}", column),
            table,
            column,
            EdgeKind::Ownership,
        ))
    }

    fn join_select() -> StatementLineageUnit {
        let unit = StatementLineageUnit::new(0, None)
            .with_node(LineageNode::table("a", "a"))
            .with_node(LineageNode::table("b", "b"))
            .with_node(LineageNode::column("out.x", "x"))
            .with_node(LineageNode::column("out.y", "y").with_expression("a.y + b.y"));
        let unit = owned(unit, "a", "a.x");
        let unit = owned(unit, "a", "a.y");
        let unit = owned(unit, "b", "b.y");
        unit.with_edge(LineageEdge::new("f1", "a.x", "out.x", EdgeKind::DataFlow))
            .with_edge(LineageEdge::new("f2", "a.y", "out.y", EdgeKind::DataFlow))
            .with_edge(LineageEdge::new("f3", "b.y", "out.y", EdgeKind::Derivation))
    }

    #[test]
    fn orphan_targets_resolve_to_output() {
        let unit = join_select();
        let index = StatementIndex::new(&unit);
        let synthesis = synthesize(&index);
        let connections = resolve_connections(&index, &synthesis);

        assert_eq!(connections.len(), 3);
        assert!(connections.iter().all(|c| c.target_node == OUTPUT_NODE_ID));
        assert!(!connections[0].is_derived);
        assert!(connections[1].is_derived, "target expression marks derivation");
        assert_eq!(connections[1].expression, Some("a.y + b.y"));
    }

    #[test]
    fn table_pairs_are_deduplicated() {
        let unit = join_select();
        let index = StatementIndex::new(&unit);
        let synthesis = synthesize(&index);
        let connections = resolve_connections(&index, &synthesis);
        let pairs = dedup_table_pairs(&connections);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].id(), format!("a->{}", OUTPUT_NODE_ID));
        assert_eq!(pairs[0].connection_count, 2);
        assert_eq!(pairs[1].source, "b");
        assert!(pairs[1].is_derived);
    }

    #[test]
    fn pass_through_columns_are_bridged() {
        let unit = StatementLineageUnit::new(0, None)
            .with_node(LineageNode::table("src", "src"))
            .with_node(LineageNode::table("tgt", "tgt"))
            .with_node(LineageNode::column("p1", "p1"))
            .with_node(LineageNode::column("p2", "p2"));
        let unit = owned(unit, "src", "src.a");
        let unit = owned(unit, "tgt", "tgt.a");
        let unit = unit
            .with_edge(LineageEdge::new("f1", "src.a", "p1", EdgeKind::DataFlow))
            .with_edge(LineageEdge::new("f2", "p1", "p2", EdgeKind::Derivation).with_expression("p1 * 2"))
            .with_edge(LineageEdge::new("f3", "p2", "p1", EdgeKind::DataFlow))
            .with_edge(LineageEdge::new("f4", "p2", "tgt.a", EdgeKind::DataFlow));

        let index = StatementIndex::new(&unit);
        let synthesis = synthesize(&index);
        assert!(synthesis.node.is_none());

        let connections = resolve_connections(&index, &synthesis);
        assert_eq!(connections.len(), 1);
        let bridged = &connections[0];
        assert_eq!(bridged.id, "f1~f4");
        assert_eq!((bridged.source_node, bridged.target_node), ("src", "tgt"));
        assert_eq!(bridged.source_column, Some("src.a"));
        assert_eq!(bridged.target_column, Some("tgt.a"));
        assert!(bridged.is_derived);
        assert_eq!(bridged.expression, Some("p1 * 2"));
    }

    #[test]
    fn self_loops_are_dropped() {
        let unit = StatementLineageUnit::new(0, None).with_node(LineageNode::table("t", "t"));
        let unit = owned(unit, "t", "t.a");
        let unit = owned(unit, "t", "t.b");
        let unit = unit.with_edge(LineageEdge::new("f", "t.a", "t.b", EdgeKind::DataFlow));

        let index = StatementIndex::new(&unit);
        let synthesis = synthesize(&index);
        assert!(resolve_connections(&index, &synthesis).is_empty());
    }

    #[test]
    fn bare_table_endpoints_have_no_columns() {
        let unit = StatementLineageUnit::new(0, None)
            .with_node(LineageNode::table("src", "src"))
            .with_node(LineageNode::table("tgt", "tgt"))
            .with_edge(LineageEdge::new("f", "src", "tgt", EdgeKind::DataFlow));

        let index = StatementIndex::new(&unit);
        let synthesis = synthesize(&index);
        let connections = resolve_connections(&index, &synthesis);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source_column, None);
        assert_eq!(connections[0].target_column, None);
    }
}
