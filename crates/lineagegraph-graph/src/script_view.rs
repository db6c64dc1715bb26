use lineagegraph_core::{
    CollapseOverrideSet, LineageNode, NodeKind, NodePayload, RenderEdge, RenderGraph, RenderNode,
    ScriptNodeData, StatementLineageUnit, TableNodeData,
};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::collapse::is_collapsed;
use crate::ownership::StatementIndex;
use crate::search::matches_term;

/// Grouping key for statements that carry no source name.
pub const UNNAMED_SCRIPT: &str = "<unnamed>";

#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'o> {
    pub selected_id: Option<&'o str>,
    pub search_term: &'o str,
    pub overrides: &'o CollapseOverrideSet,
    pub default_collapsed: bool,
    /// Shared table names listed on a script edge before "+N more".
    pub label_cap: usize,
}

pub fn script_node_id(source_name: &str) -> String {
    format!("script:{}", source_name)
}

pub fn table_node_id(table_key: &str) -> String {
    format!("table:{}", table_key)
}

#[derive(Debug)]
struct TableRef<'a> {
    key: String,
    node: &'a LineageNode,
}

#[derive(Debug)]
struct ScriptSummary<'a> {
    source_name: String,
    statement_count: usize,
    reads: Vec<TableRef<'a>>,
    writes: Vec<TableRef<'a>>,
}

impl ScriptSummary<'_> {
    fn id(&self) -> String {
        script_node_id(&self.source_name)
    }

    fn read_keys(&self) -> Vec<String> {
        self.reads.iter().map(|t| t.key.clone()).collect()
    }

    fn write_keys(&self) -> Vec<String> {
        self.writes.iter().map(|t| t.key.clone()).collect()
    }
}

/// Maps unqualified table names onto qualified names seen anywhere in the run.
struct TableResolver {
    qualified: Vec<String>,
}

impl TableResolver {
    fn new(units: &[StatementLineageUnit]) -> Self {
        let mut seen = HashSet::new();
        let mut qualified = Vec::new();
        for node in units.iter().flat_map(|u| u.nodes.iter()) {
            if is_script_table(node) && node.table_key().contains('.') && seen.insert(node.table_key()) {
                qualified.push(node.table_key().to_string());
            }
        }
        Self { qualified }
    }

    /// First match wins when several qualified names share the suffix.
    fn resolve(&self, key: &str) -> String {
        if key.contains('.') {
            return key.to_string();
        }
        let suffix = format!(".{}", key.to_lowercase());
        let candidates: Vec<&String> = self
            .qualified
            .iter()
            .filter(|q| q.to_lowercase().ends_with(&suffix))
            .collect();
        match candidates.as_slice() {
            [] => key.to_string(),
            [only] => (*only).clone(),
            [first, ..] => {
                warn!(
                    table = key,
                    candidates = ?candidates,
                    chosen = %first,
                    "Ambiguous short table name; using first qualified match"
                );
                (*first).clone()
            }
        }
    }
}

/// CTEs are statement-local and never link scripts.
fn is_script_table(node: &LineageNode) -> bool {
    matches!(node.kind, NodeKind::Table | NodeKind::View)
}

fn push_unique<'a>(refs: &mut Vec<TableRef<'a>>, key: String, node: &'a LineageNode) {
    if !refs.iter().any(|r| r.key == key) {
        refs.push(TableRef { key, node });
    }
}

/// A table is written when a flow edge targets it or one of its columns, or
/// when a table-creation statement defines it without reading from it.
fn classify_unit<'a>(unit: &'a StatementLineageUnit) -> (Vec<&'a LineageNode>, Vec<&'a LineageNode>) {
    let index = StatementIndex::new(unit);
    let mut written = Vec::new();
    let mut read = Vec::new();

    for table in index.relations().iter().filter(|n| is_script_table(n)) {
        let id = table.id.as_str();
        let touches = |endpoint: &str| endpoint == id || index.owner_of(endpoint) == Some(id);
        let targeted = index.flow_edges().any(|e| touches(&e.to_id));
        let sourced = index.flow_edges().any(|e| touches(&e.from_id));

        if targeted || (unit.statement_type.is_table_creation() && !sourced) {
            written.push(*table);
        } else {
            read.push(*table);
        }
    }
    (written, read)
}

fn summarize_scripts(units: &[StatementLineageUnit]) -> Vec<ScriptSummary<'_>> {
    let resolver = TableResolver::new(units);
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut scripts: Vec<ScriptSummary<'_>> = Vec::new();

    for unit in units {
        let name = unit.source_name.as_deref().unwrap_or(UNNAMED_SCRIPT);
        let slot = *slots.entry(name).or_insert_with(|| {
            scripts.push(ScriptSummary {
                source_name: name.to_string(),
                statement_count: 0,
                reads: Vec::new(),
                writes: Vec::new(),
            });
            scripts.len() - 1
        });

        let (written, read) = classify_unit(unit);
        let script = &mut scripts[slot];
        script.statement_count += 1;
        for node in written {
            push_unique(&mut script.writes, resolver.resolve(node.table_key()), node);
        }
        for node in read {
            push_unique(&mut script.reads, resolver.resolve(node.table_key()), node);
        }
    }
    scripts
}

fn script_node(script: &ScriptSummary<'_>, ctx: ScriptContext<'_>) -> RenderNode {
    let id = script.id();
    RenderNode {
        payload: NodePayload::Script(ScriptNodeData {
            label: script.source_name.clone(),
            source_name: script.source_name.clone(),
            statement_count: script.statement_count,
            tables_read: script.read_keys(),
            tables_written: script.write_keys(),
            is_highlighted: matches_term(ctx.search_term, &script.source_name),
            is_selected: ctx.selected_id == Some(id.as_str()),
        }),
        id,
    }
}

fn shared_tables_label(shared: &[&str], cap: usize) -> String {
    let shown = shared.iter().take(cap).copied().collect::<Vec<_>>().join(", ");
    if shared.len() > cap {
        format!("{} +{} more", shown, shared.len() - cap)
    } else {
        shown
    }
}

/// Script-to-script graph: producer -> consumer when a table written by the
/// producer is read by the consumer.
pub fn build_script_view(units: &[StatementLineageUnit], ctx: ScriptContext<'_>) -> RenderGraph {
    let scripts = summarize_scripts(units);
    let nodes: Vec<RenderNode> = scripts.iter().map(|s| script_node(s, ctx)).collect();

    let mut edges = Vec::new();
    for producer in &scripts {
        for consumer in &scripts {
            if producer.source_name == consumer.source_name {
                continue;
            }
            let shared: Vec<&str> = producer
                .writes
                .iter()
                .filter(|w| consumer.reads.iter().any(|r| r.key == w.key))
                .map(|w| w.key.as_str())
                .collect();
            if shared.is_empty() {
                continue;
            }
            let (source, target) = (producer.id(), consumer.id());
            edges.push(
                RenderEdge::new(format!("{}->{}", source, target), source, target)
                    .with_label(shared_tables_label(&shared, ctx.label_cap.max(1))),
            );
        }
    }

    tracing::debug!(scripts = nodes.len(), edges = edges.len(), "Built script view");
    RenderGraph { nodes, edges }
}

/// Scripts plus one node per distinct table, with script -> table write
/// edges and table -> script read edges. A writer's provenance wins over
/// readers for the table node payload.
pub fn build_hybrid_view(units: &[StatementLineageUnit], ctx: ScriptContext<'_>) -> RenderGraph {
    let scripts = summarize_scripts(units);
    let mut nodes: Vec<RenderNode> = scripts.iter().map(|s| script_node(s, ctx)).collect();

    // key -> (provenance node, owning script, written)
    let mut tables: HashMap<&str, (&LineageNode, &str, bool)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for script in &scripts {
        for table in &script.writes {
            match tables.get_mut(table.key.as_str()) {
                Some(entry) if !entry.2 => *entry = (table.node, script.source_name.as_str(), true),
                Some(_) => {}
                None => {
                    order.push(table.key.as_str());
                    tables.insert(table.key.as_str(), (table.node, script.source_name.as_str(), true));
                }
            }
        }
        for table in &script.reads {
            if !tables.contains_key(table.key.as_str()) {
                order.push(table.key.as_str());
                tables.insert(table.key.as_str(), (table.node, script.source_name.as_str(), false));
            }
        }
    }

    for key in &order {
        let (node, script_name, _) = tables[key];
        nodes.push(hybrid_table_node(key, node, script_name, ctx));
    }

    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    for script in &scripts {
        let script_id = script.id();
        for table in &script.writes {
            let table_id = table_node_id(&table.key);
            let id = format!("{}->{}", script_id, table_id);
            if seen.insert(id.clone()) {
                edges.push(RenderEdge::new(id, script_id.clone(), table_id));
            }
        }
        for table in &script.reads {
            let table_id = table_node_id(&table.key);
            let id = format!("{}->{}", table_id, script_id);
            if seen.insert(id.clone()) {
                edges.push(RenderEdge::new(id, table_id, script_id.clone()));
            }
        }
    }

    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "Built hybrid view");
    RenderGraph { nodes, edges }
}

fn hybrid_table_node(
    key: &str,
    node: &LineageNode,
    script_name: &str,
    ctx: ScriptContext<'_>,
) -> RenderNode {
    let id = table_node_id(key);
    let qualified_name = node
        .qualified_name
        .clone()
        .or_else(|| key.contains('.').then(|| key.to_string()));
    RenderNode {
        payload: NodePayload::Table(TableNodeData {
            label: node.label.clone(),
            kind: node.kind,
            qualified_name,
            schema: node.schema.clone(),
            database: node.database.clone(),
            columns: Vec::new(),
            is_base_table: false,
            is_highlighted: matches_term(ctx.search_term, &node.label) || matches_term(ctx.search_term, key),
            is_selected: ctx.selected_id == Some(id.as_str()),
            is_collapsed: is_collapsed(&id, ctx.default_collapsed, ctx.overrides),
            join_type: None,
            join_condition: None,
            source_name: Some(node.source_name.clone().unwrap_or_else(|| script_name.to_string())),
            statement_index: node.statement_index,
        }),
        id,
    }
}
