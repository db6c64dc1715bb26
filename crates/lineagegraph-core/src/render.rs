use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{EdgeKind, NodeId, NodeKind};

/// Reserved id of the synthetic node collecting unowned projection columns.
pub const OUTPUT_NODE_ID: &str = "virtual:output";
pub const OUTPUT_NODE_LABEL: &str = "Output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Table,
    Column,
    Script,
    Hybrid,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewMode::Table => "table",
            ViewMode::Column => "column",
            ViewMode::Script => "script",
            ViewMode::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(ViewMode::Table),
            "column" => Ok(ViewMode::Column),
            "script" => Ok(ViewMode::Script),
            "hybrid" => Ok(ViewMode::Hybrid),
            other => Err(format!(
                "unknown view mode: {}. Must be one of: table, column, script, hybrid",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnEntry {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableNodeData {
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub columns: Vec<ColumnEntry>,
    pub is_base_table: bool,
    pub is_highlighted: bool,
    pub is_selected: bool,
    pub is_collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub statement_index: usize,
}

impl TableNodeData {
    pub fn owns_column(&self, column_id: &str) -> bool {
        self.columns.iter().any(|c| c.id == column_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptNodeData {
    pub label: String,
    pub source_name: String,
    pub statement_count: usize,
    pub tables_read: Vec<String>,
    pub tables_written: Vec<String>,
    pub is_highlighted: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    Table(TableNodeData),
    Script(ScriptNodeData),
}

impl NodePayload {
    pub fn label(&self) -> &str {
        match self {
            NodePayload::Table(data) => &data.label,
            NodePayload::Script(data) => &data.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Table(data) => data.kind,
            NodePayload::Script(_) => NodeKind::Script,
        }
    }

    pub fn columns(&self) -> &[ColumnEntry] {
        match self {
            NodePayload::Table(data) => &data.columns,
            NodePayload::Script(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: NodeId,
    pub payload: NodePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: EdgeKind,
    pub is_derived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl RenderEdge {
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            label: None,
            kind: EdgeKind::DataFlow,
            is_derived: false,
            expression: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<NodeId>, target_handle: Option<NodeId>) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Column-level anchor when present, bare node id otherwise.
    pub fn source_endpoint(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(&self.source)
    }

    pub fn target_endpoint(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(&self.target)
    }
}

/// Logical node/edge sets for one view mode. Positions are assigned downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderGraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

impl RenderGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_output_node(&self) -> bool {
        self.nodes.iter().any(|n| n.id == OUTPUT_NODE_ID)
    }

    /// Ordered (source, target) pairs, ignoring handles.
    pub fn node_pairs(&self) -> BTreeSet<(NodeId, NodeId)> {
        self.edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }
}

/// Node ids whose collapse state differs from the view default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CollapseOverrideSet(BTreeSet<NodeId>);

impl CollapseOverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn with(mut self, id: impl Into<NodeId>) -> Self {
        self.0.insert(id.into());
        self
    }

    /// Returns a new set with `id` toggled; the receiver is left untouched.
    pub fn toggled(&self, id: &str) -> Self {
        let mut next = self.0.clone();
        if !next.remove(id) {
            next.insert(id.to_string());
        }
        Self(next)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<NodeId>> FromIterator<S> for CollapseOverrideSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Inclusion lists for schema and database. Both empty disables filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NamespaceFilterState {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
}

impl NamespaceFilterState {
    pub fn new(schemas: Vec<String>, databases: Vec<String>) -> Self {
        Self { schemas, databases }
    }

    pub fn is_active(&self) -> bool {
        !self.schemas.is_empty() || !self.databases.is_empty()
    }
}
