use lineagegraph_core::RenderEdge;
use std::collections::{HashMap, HashSet, VecDeque};

/// Configuration for impact traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Maximum number of edge hops per direction (None for unlimited)
    pub max_depth: Option<usize>,
}

impl TraversalConfig {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Downstream,
    Upstream,
}

/// Elements reached from one start id, split by direction. Neither set
/// contains the start id itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpactResult {
    pub start: String,
    pub upstream: HashSet<String>,
    pub downstream: HashSet<String>,
}

impl ImpactResult {
    /// Start id plus everything reached in either direction.
    pub fn connected(&self) -> HashSet<String> {
        let mut all: HashSet<String> = self.upstream.union(&self.downstream).cloned().collect();
        all.insert(self.start.clone());
        all
    }
}

/// Forward and backward adjacency over render edges, built once and shared by
/// every query. Endpoints are column handles when present, node ids otherwise.
pub struct ImpactIndex<'a> {
    forward: HashMap<&'a str, Vec<&'a RenderEdge>>,
    backward: HashMap<&'a str, Vec<&'a RenderEdge>>,
    node_forward: HashMap<&'a str, Vec<&'a RenderEdge>>,
    node_backward: HashMap<&'a str, Vec<&'a RenderEdge>>,
    edges: HashMap<&'a str, &'a RenderEdge>,
}

impl<'a> ImpactIndex<'a> {
    pub fn new(edges: &'a [RenderEdge]) -> Self {
        let mut index = Self {
            forward: HashMap::new(),
            backward: HashMap::new(),
            node_forward: HashMap::new(),
            node_backward: HashMap::new(),
            edges: HashMap::with_capacity(edges.len()),
        };
        for edge in edges {
            index.edges.entry(edge.id.as_str()).or_insert(edge);
            index.forward.entry(edge.source_endpoint()).or_default().push(edge);
            index.backward.entry(edge.target_endpoint()).or_default().push(edge);
            index.node_forward.entry(edge.source.as_str()).or_default().push(edge);
            index.node_backward.entry(edge.target.as_str()).or_default().push(edge);
        }
        index
    }

    /// Run the downstream and upstream searches from `start`, which may be a
    /// node id, a column handle or an edge id.
    pub fn impact(&self, start: &str, config: &TraversalConfig) -> ImpactResult {
        ImpactResult {
            start: start.to_string(),
            downstream: self.search(start, Direction::Downstream, config),
            upstream: self.search(start, Direction::Upstream, config),
        }
    }

    pub fn connected(&self, start: &str) -> HashSet<String> {
        self.impact(start, &TraversalConfig::default()).connected()
    }

    pub fn connected_multiple<S: AsRef<str>>(&self, starts: &[S]) -> HashSet<String> {
        starts
            .iter()
            .flat_map(|start| self.connected(start.as_ref()))
            .collect()
    }

    fn adjacent(&self, endpoint: &str, direction: Direction) -> &[&'a RenderEdge] {
        let map = match direction {
            Direction::Downstream => &self.forward,
            Direction::Upstream => &self.backward,
        };
        map.get(endpoint).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges leaving `start` in `direction`: those anchored on it as an
    /// endpoint plus, for a node id, every edge whose node end is `start`
    /// whatever its handles.
    fn adjacent_to_start(&self, start: &str, direction: Direction) -> Vec<&'a RenderEdge> {
        let by_node = match direction {
            Direction::Downstream => &self.node_forward,
            Direction::Upstream => &self.node_backward,
        };
        let mut seen: HashSet<&'a str> = HashSet::new();
        self.adjacent(start, direction)
            .iter()
            .chain(by_node.get(start).into_iter().flatten())
            .copied()
            .filter(|&edge| seen.insert(edge.id.as_str()))
            .collect()
    }

    fn search(&self, start: &str, direction: Direction, config: &TraversalConfig) -> HashSet<String> {
        let far_end = |edge: &'a RenderEdge| match direction {
            Direction::Downstream => edge.target_endpoint(),
            Direction::Upstream => edge.source_endpoint(),
        };

        let mut reached: HashSet<String> = HashSet::new();
        if config.max_depth == Some(0) {
            return reached;
        }
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

        if let Some(&edge) = self.edges.get(start) {
            let next = far_end(edge);
            if visited.insert(next) {
                reached.insert(next.to_string());
                queue.push_back((next, 1));
            }
        } else {
            for edge in self.adjacent_to_start(start, direction) {
                reached.insert(edge.id.clone());
                let next = far_end(edge);
                if visited.insert(next) {
                    reached.insert(next.to_string());
                    queue.push_back((next, 1));
                }
            }
        }

        while let Some((endpoint, depth)) = queue.pop_front() {
            if config.max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for &edge in self.adjacent(endpoint, direction) {
                reached.insert(edge.id.clone());
                let next = far_end(edge);
                if visited.insert(next) {
                    reached.insert(next.to_string());
                    queue.push_back((next, depth + 1));
                }
            }
        }

        reached.remove(start);
        reached
    }
}

/// Ids of every node, handle and edge connected to `start` in either direction.
pub fn find_connected_elements(start: &str, edges: &[RenderEdge]) -> HashSet<String> {
    ImpactIndex::new(edges).connected(start)
}

/// Union of [`find_connected_elements`] over several start ids, sharing one index.
pub fn find_connected_elements_multiple<S: AsRef<str>>(starts: &[S], edges: &[RenderEdge]) -> HashSet<String> {
    ImpactIndex::new(edges).connected_multiple(starts)
}
