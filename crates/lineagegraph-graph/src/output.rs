use lineagegraph_core::{LineageNode, NodeKind, StatementLineageUnit, OUTPUT_NODE_ID, OUTPUT_NODE_LABEL};
use std::collections::HashSet;

use crate::ownership::StatementIndex;

/// How a statement's unowned columns are surfaced.
///
/// Unowned columns are orphans routed to the synthetic Output node, unless
/// the statement they belong to writes into a physical table. In that case
/// they are pass-through projection columns: flows are bridged across them
/// and they never reach Output.
#[derive(Debug)]
pub struct OutputSynthesis<'a> {
    pub node: Option<LineageNode>,
    pub orphans: Vec<&'a LineageNode>,
    pub pass_through: Vec<&'a LineageNode>,
    orphan_ids: HashSet<&'a str>,
    pass_through_ids: HashSet<&'a str>,
}

impl<'a> OutputSynthesis<'a> {
    pub fn is_orphan(&self, column_id: &str) -> bool {
        self.orphan_ids.contains(column_id)
    }

    pub fn is_pass_through(&self, column_id: &str) -> bool {
        self.pass_through_ids.contains(column_id)
    }
}

/// Unowned column ids of every unit that writes a physical table, decided
/// statement by statement before the units are merged.
pub fn pass_through_columns(units: &[StatementLineageUnit]) -> HashSet<&str> {
    let mut ids = HashSet::new();
    for unit in units {
        let index = StatementIndex::new(unit);
        if !index.has_physical_write_target() {
            continue;
        }
        let unowned = index.unowned_columns();
        tracing::debug!(
            statement = unit.statement_index,
            columns = unowned.len(),
            "Statement writes a physical table; bridging unowned projection columns"
        );
        ids.extend(unowned.into_iter().map(|c| c.id.as_str()));
    }
    ids
}

/// Split the unowned columns of `index` into pass-through columns (ids in
/// `pass_through`) and orphans. An Output node exists iff an orphan does.
pub fn synthesize_output<'a>(index: &StatementIndex<'a>, pass_through: &HashSet<&str>) -> OutputSynthesis<'a> {
    let (bridged, orphans): (Vec<&'a LineageNode>, Vec<&'a LineageNode>) = index
        .unowned_columns()
        .into_iter()
        .partition(|c| pass_through.contains(c.id.as_str()));

    let node = (!orphans.is_empty()).then(|| {
        let unit = index.unit();
        let mut node = LineageNode::new(OUTPUT_NODE_ID, NodeKind::Output, OUTPUT_NODE_LABEL);
        node.statement_index = unit.statement_index;
        node.source_name = unit.source_name.clone();
        node
    });

    OutputSynthesis {
        node,
        orphan_ids: orphans.iter().map(|c| c.id.as_str()).collect(),
        pass_through_ids: bridged.iter().map(|c| c.id.as_str()).collect(),
        orphans,
        pass_through: bridged,
    }
}
