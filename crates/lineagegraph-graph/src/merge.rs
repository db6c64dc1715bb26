use lineagegraph_core::StatementLineageUnit;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Unify several statement units into one.
///
/// Nodes are keyed by id and the first occurrence wins, except that join
/// metadata from a later unit overwrites the earlier node's join fields.
/// Edges are keyed by id; later duplicates are dropped. Provenance of the
/// merged unit is taken from the first input.
pub fn merge_statements(units: &[StatementLineageUnit]) -> Cow<'_, StatementLineageUnit> {
    match units {
        [] => Cow::Owned(StatementLineageUnit::default()),
        [single] => Cow::Borrowed(single),
        [first, ..] => {
            let mut merged = StatementLineageUnit::new(first.statement_index, first.source_name.clone())
                .with_statement_type(first.statement_type);
            let mut node_slots: HashMap<&str, usize> = HashMap::new();
            let mut seen_edges: HashSet<&str> = HashSet::new();

            for unit in units {
                for node in &unit.nodes {
                    match node_slots.get(node.id.as_str()) {
                        Some(&slot) => {
                            if node.has_join_metadata() {
                                let existing = &mut merged.nodes[slot];
                                existing.join_type = node.join_type.clone();
                                existing.join_condition = node.join_condition.clone();
                            }
                        }
                        None => {
                            node_slots.insert(node.id.as_str(), merged.nodes.len());
                            merged.nodes.push(node.clone());
                        }
                    }
                }
                for edge in &unit.edges {
                    if seen_edges.insert(edge.id.as_str()) {
                        merged.edges.push(edge.clone());
                    }
                }
            }

            tracing::debug!(
                units = units.len(),
                nodes = merged.nodes.len(),
                edges = merged.edges.len(),
                "Merged statement lineage"
            );
            Cow::Owned(merged)
        }
    }
}
