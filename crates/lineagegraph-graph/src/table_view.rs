use lineagegraph_core::{
    CollapseOverrideSet, ColumnEntry, EdgeKind, LineageNode, NodePayload, RenderEdge, RenderGraph,
    RenderNode, StatementLineageUnit, TableNodeData,
};

use crate::collapse::is_collapsed;
use crate::dedup::{dedup_table_pairs, resolve_connections, ColumnConnection};
use crate::merge::merge_statements;
use crate::output::{pass_through_columns, synthesize_output, OutputSynthesis};
use crate::ownership::StatementIndex;
use crate::search::matches_term;

/// Per-build inputs shared by the table and column builders.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'o> {
    pub selected_id: Option<&'o str>,
    pub search_term: &'o str,
    pub overrides: &'o CollapseOverrideSet,
    pub default_collapsed: bool,
}

/// Table-level graph over the merged units: one node per table/cte/view
/// (plus Output when there are orphan columns) and one edge per distinct
/// (source, target) pair.
pub fn build_table_view(units: &[StatementLineageUnit], ctx: ViewContext<'_>) -> RenderGraph {
    let unit = merge_statements(units);
    let index = StatementIndex::new(&unit);
    let synthesis = synthesize_output(&index, &pass_through_columns(units));
    let connections = resolve_connections(&index, &synthesis);

    let edges = dedup_table_pairs(&connections)
        .into_iter()
        .map(|pair| {
            let mut edge = RenderEdge::new(pair.id(), pair.source, pair.target).with_kind(
                if pair.is_derived {
                    EdgeKind::Derivation
                } else {
                    EdgeKind::DataFlow
                },
            );
            edge.is_derived = pair.is_derived;
            edge
        })
        .collect::<Vec<_>>();

    let graph = RenderGraph {
        nodes: relation_nodes(&index, &synthesis, ctx),
        edges,
    };
    tracing::debug!(
        statement = unit.statement_index,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Built table view"
    );
    graph
}

/// Column-level graph: same nodes as the table view, one edge per resolved
/// column connection with handles naming the column ids.
pub fn build_column_view(units: &[StatementLineageUnit], ctx: ViewContext<'_>) -> RenderGraph {
    let unit = merge_statements(units);
    let index = StatementIndex::new(&unit);
    let synthesis = synthesize_output(&index, &pass_through_columns(units));
    let connections = resolve_connections(&index, &synthesis);

    let edges = connections.iter().map(column_edge).collect::<Vec<_>>();
    let graph = RenderGraph {
        nodes: relation_nodes(&index, &synthesis, ctx),
        edges,
    };
    tracing::debug!(
        statement = unit.statement_index,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Built column view"
    );
    graph
}

fn column_edge(connection: &ColumnConnection<'_>) -> RenderEdge {
    let kind = if connection.is_derived {
        EdgeKind::Derivation
    } else {
        EdgeKind::DataFlow
    };
    // A bare table on either end makes this a plain table-to-table edge.
    let handles = match (connection.source_column, connection.target_column) {
        (Some(source), Some(target)) => (Some(source.to_string()), Some(target.to_string())),
        _ => (None, None),
    };
    let mut edge = RenderEdge::new(
        connection.id.clone(),
        connection.source_node,
        connection.target_node,
    )
    .with_handles(handles.0, handles.1)
    .with_kind(kind);
    edge.is_derived = connection.is_derived;
    edge.expression = connection.expression.map(str::to_string);
    edge.label = connection.operation.map(str::to_string);
    edge
}

fn relation_nodes(
    index: &StatementIndex<'_>,
    synthesis: &OutputSynthesis<'_>,
    ctx: ViewContext<'_>,
) -> Vec<RenderNode> {
    let mut nodes: Vec<RenderNode> = index
        .relations()
        .iter()
        .map(|relation| table_node(relation, index.owned_columns(&relation.id), ctx))
        .collect();

    if let Some(output) = &synthesis.node {
        nodes.push(table_node(output, &synthesis.orphans, ctx));
    }
    nodes
}

fn table_node(node: &LineageNode, columns: &[&LineageNode], ctx: ViewContext<'_>) -> RenderNode {
    let is_highlighted = matches_term(ctx.search_term, &node.label)
        || columns.iter().any(|c| matches_term(ctx.search_term, &c.label));
    let is_selected = ctx
        .selected_id
        .is_some_and(|selected| selected == node.id || columns.iter().any(|c| c.id == selected));

    RenderNode {
        id: node.id.clone(),
        payload: NodePayload::Table(TableNodeData {
            label: node.label.clone(),
            kind: node.kind,
            qualified_name: node.qualified_name.clone(),
            schema: node.schema.clone(),
            database: node.database.clone(),
            columns: columns
                .iter()
                .map(|c| ColumnEntry {
                    id: c.id.clone(),
                    name: c.label.clone(),
                    expression: c.expression.clone(),
                })
                .collect(),
            // CTEs and views without join context never get base-table styling.
            is_base_table: node.has_join_metadata(),
            is_highlighted,
            is_selected,
            is_collapsed: is_collapsed(&node.id, ctx.default_collapsed, ctx.overrides),
            join_type: node.join_type.clone(),
            join_condition: node.join_condition.clone(),
            source_name: node.source_name.clone(),
            statement_index: node.statement_index,
        }),
    }
}
