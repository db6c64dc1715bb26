use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{LineageError, Result};

/// Stable within one analysis run; never reused across runs.
pub type NodeId = String;
pub type EdgeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Table,
    Cte,
    View,
    Column,
    Script,
    Output,
}

impl NodeKind {
    /// Kinds that own columns and render as a table card.
    pub fn is_relation(self) -> bool {
        matches!(self, NodeKind::Table | NodeKind::Cte | NodeKind::View)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Table => "table",
            NodeKind::Cte => "cte",
            NodeKind::View => "view",
            NodeKind::Column => "column",
            NodeKind::Script => "script",
            NodeKind::Output => "output",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Ownership,
    DataFlow,
    Derivation,
    JoinDependency,
}

impl EdgeKind {
    /// Data movement between columns or tables, as opposed to structure.
    pub fn is_flow(self) -> bool {
        matches!(self, EdgeKind::DataFlow | EdgeKind::Derivation)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Ownership => "ownership",
            EdgeKind::DataFlow => "data_flow",
            EdgeKind::Derivation => "derivation",
            EdgeKind::JoinDependency => "join_dependency",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ownership" => Ok(EdgeKind::Ownership),
            "data_flow" | "dataflow" => Ok(EdgeKind::DataFlow),
            "derivation" => Ok(EdgeKind::Derivation),
            "join_dependency" => Ok(EdgeKind::JoinDependency),
            other => Err(format!("unknown edge kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    CreateTable,
    CreateTableAs,
    CreateView,
    #[default]
    #[serde(other)]
    Other,
}

impl StatementType {
    pub fn is_table_creation(self) -> bool {
        matches!(self, StatementType::CreateTable | StatementType::CreateTableAs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "catalog")]
    pub database: Option<String>,
    /// Only set on table/cte nodes that participate in a join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,
    /// Computing expression of a derived column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default)]
    pub statement_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl LineageNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            qualified_name: None,
            schema: None,
            database: None,
            join_type: None,
            join_condition: None,
            expression: None,
            statement_index: 0,
            source_name: None,
        }
    }

    pub fn table(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Table, label)
    }

    pub fn column(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Column, label)
    }

    pub fn with_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.qualified_name = Some(name.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_join(mut self, join_type: impl Into<String>, condition: Option<String>) -> Self {
        self.join_type = Some(join_type.into());
        self.join_condition = condition;
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_provenance(mut self, source_name: impl Into<String>, statement_index: usize) -> Self {
        self.source_name = Some(source_name.into());
        self.statement_index = statement_index;
        self
    }

    pub fn has_join_metadata(&self) -> bool {
        self.join_type.is_some() || self.join_condition.is_some()
    }

    /// Name used to identify the same physical table across statements.
    pub fn table_key(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    pub id: EdgeId,
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl LineageEdge {
    pub fn new(
        id: impl Into<EdgeId>,
        from_id: impl Into<NodeId>,
        to_id: impl Into<NodeId>,
        kind: EdgeKind,
    ) -> Self {
        Self {
            id: id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            kind,
            expression: None,
            operation: None,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatementLineageUnit {
    #[serde(default)]
    pub statement_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default)]
    pub statement_type: StatementType,
    #[serde(default)]
    pub nodes: Vec<LineageNode>,
    #[serde(default)]
    pub edges: Vec<LineageEdge>,
}

impl StatementLineageUnit {
    pub fn new(statement_index: usize, source_name: Option<String>) -> Self {
        Self {
            statement_index,
            source_name,
            ..Default::default()
        }
    }

    pub fn with_statement_type(mut self, statement_type: StatementType) -> Self {
        self.statement_type = statement_type;
        self
    }

    pub fn with_node(mut self, node: LineageNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: LineageEdge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Rejects a column with more than one incoming ownership edge.
    pub fn validate(&self) -> Result<()> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for edge in self.edges.iter().filter(|e| e.kind == EdgeKind::Ownership) {
            if let Some(previous) = owners.insert(edge.to_id.as_str(), edge.from_id.as_str()) {
                if previous != edge.from_id {
                    return Err(LineageError::InvalidInput(format!(
                        "column {} owned by both {} and {} in statement {}",
                        edge.to_id, previous, edge.from_id, self.statement_index
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitsDocument {
    Bare(Vec<StatementLineageUnit>),
    Wrapped { statements: Vec<StatementLineageUnit> },
}

/// Accepts either a bare array of units or an object with a `statements` array.
pub fn units_from_json(json: &str) -> Result<Vec<StatementLineageUnit>> {
    let units = match serde_json::from_str::<UnitsDocument>(json)? {
        UnitsDocument::Bare(units) => units,
        UnitsDocument::Wrapped { statements } => statements,
    };
    for unit in &units {
        unit.validate()?;
    }
    Ok(units)
}

pub fn units_from_path(path: &Path) -> Result<Vec<StatementLineageUnit>> {
    let content = std::fs::read_to_string(path)?;
    units_from_json(&content)
}
