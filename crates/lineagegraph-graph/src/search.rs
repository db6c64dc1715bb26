use lineagegraph_core::{NodeKind, NodePayload, RenderNode, ViewMode};
use std::collections::HashSet;

/// Case-insensitive substring match. An empty needle never matches.
pub fn matches_term(term: &str, text: &str) -> bool {
    let needle = term.trim();
    !needle.is_empty() && text.to_lowercase().contains(&needle.to_lowercase())
}

/// Resolve a search term to the element ids to highlight in `view_mode`.
///
/// - column view: matching column ids, or every column id of a table whose
///   label matches
/// - table view: ids of table/cte/view nodes whose label matches
/// - script and hybrid views: ids of script or table nodes whose label matches
pub fn find_search_match_ids(term: &str, nodes: &[RenderNode], view_mode: ViewMode) -> HashSet<String> {
    let mut matches = HashSet::new();
    if term.trim().is_empty() {
        return matches;
    }

    for node in nodes {
        match (view_mode, &node.payload) {
            (ViewMode::Column, NodePayload::Table(data)) => {
                if data.kind.is_relation() && matches_term(term, &data.label) {
                    matches.extend(data.columns.iter().map(|c| c.id.clone()));
                } else {
                    matches.extend(
                        data.columns
                            .iter()
                            .filter(|c| matches_term(term, &c.name))
                            .map(|c| c.id.clone()),
                    );
                }
            }
            (ViewMode::Table, NodePayload::Table(data)) => {
                if data.kind.is_relation() && matches_term(term, &data.label) {
                    matches.insert(node.id.clone());
                }
            }
            (ViewMode::Script | ViewMode::Hybrid, payload) => {
                let searchable = matches!(payload.kind(), NodeKind::Script) || payload.kind().is_relation();
                if searchable && matches_term(term, payload.label()) {
                    matches.insert(node.id.clone());
                }
            }
            (ViewMode::Column | ViewMode::Table, NodePayload::Script(_)) => {}
        }
    }

    matches
}
