use lineagegraph_core::{EdgeKind, LineageEdge, LineageNode, NodeKind, StatementLineageUnit};
use std::collections::HashMap;

/// Read-only lookup tables over one statement unit.
pub struct StatementIndex<'a> {
    unit: &'a StatementLineageUnit,
    nodes: HashMap<&'a str, &'a LineageNode>,
    relations: Vec<&'a LineageNode>,
    columns: Vec<&'a LineageNode>,
    owned: HashMap<&'a str, Vec<&'a LineageNode>>,
    owner_of: HashMap<&'a str, &'a str>,
}

impl<'a> StatementIndex<'a> {
    pub fn new(unit: &'a StatementLineageUnit) -> Self {
        let mut nodes = HashMap::with_capacity(unit.nodes.len());
        let mut relations = Vec::new();
        let mut columns = Vec::new();

        for node in &unit.nodes {
            if nodes.insert(node.id.as_str(), node).is_some() {
                continue;
            }
            match node.kind {
                NodeKind::Table | NodeKind::Cte | NodeKind::View => relations.push(node),
                NodeKind::Column => columns.push(node),
                NodeKind::Script | NodeKind::Output => {}
            }
        }

        let mut owned: HashMap<&str, Vec<&LineageNode>> = HashMap::new();
        let mut owner_of: HashMap<&str, &str> = HashMap::new();
        for edge in unit.edges.iter().filter(|e| e.kind == EdgeKind::Ownership) {
            let (Some(parent), Some(column)) = (
                nodes.get(edge.from_id.as_str()).copied(),
                nodes.get(edge.to_id.as_str()).copied(),
            ) else {
                continue;
            };
            if !parent.kind.is_relation() || column.kind != NodeKind::Column {
                continue;
            }
            if owner_of.contains_key(column.id.as_str()) {
                continue;
            }
            owner_of.insert(column.id.as_str(), parent.id.as_str());
            owned.entry(parent.id.as_str()).or_default().push(column);
        }

        Self {
            unit,
            nodes,
            relations,
            columns,
            owned,
            owner_of,
        }
    }

    pub fn unit(&self) -> &'a StatementLineageUnit {
        self.unit
    }

    pub fn node(&self, id: &str) -> Option<&'a LineageNode> {
        self.nodes.get(id).copied()
    }

    /// Table, cte and view nodes in input order.
    pub fn relations(&self) -> &[&'a LineageNode] {
        &self.relations
    }

    pub fn columns(&self) -> &[&'a LineageNode] {
        &self.columns
    }

    pub fn owned_columns(&self, relation_id: &str) -> &[&'a LineageNode] {
        self.owned.get(relation_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owner_of(&self, column_id: &str) -> Option<&'a str> {
        self.owner_of.get(column_id).copied()
    }

    /// Columns with no ownership edge, in input order.
    pub fn unowned_columns(&self) -> Vec<&'a LineageNode> {
        self.columns
            .iter()
            .filter(|c| !self.owner_of.contains_key(c.id.as_str()))
            .copied()
            .collect()
    }

    pub fn flow_edges(&self) -> impl Iterator<Item = &'a LineageEdge> + '_ {
        self.unit.edges.iter().filter(|e| e.kind.is_flow())
    }

    /// True when a physical `table` node receives data, either directly or
    /// through one of its owned columns.
    pub fn has_physical_write_target(&self) -> bool {
        self.flow_edges().any(|edge| {
            let target = match self.node(&edge.to_id) {
                Some(node) => node,
                None => return false,
            };
            match target.kind {
                NodeKind::Table => edge.kind == EdgeKind::DataFlow,
                NodeKind::Column => self
                    .owner_of(&target.id)
                    .and_then(|owner| self.node(owner))
                    .is_some_and(|owner| owner.kind == NodeKind::Table),
                _ => false,
            }
        })
    }
}
