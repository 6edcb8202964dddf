use std::collections::VecDeque;

use fxhash::{FxHashMap, FxHashSet};

use super::super::types::{DagIndex, DagNode, Edge, EdgeType, NodeType, PathInfo};
use super::super::Dag;

/// Edge types that count as evidence for their target.
const EVIDENCE_EDGES: &[EdgeType] = &[
    EdgeType::EvidenceSupport,
    EdgeType::ResultSupports,
    EdgeType::StatisticalLink,
    EdgeType::ValidationMethod,
];

impl Dag {
    /// Strength of a single edge: recorded confidence, else the type default.
    pub(crate) fn edge_strength(&self, source: DagIndex, edge: &Edge) -> f64 {
        self.node(source)
            .and_then(|n| n.relationship(edge.edge_type, edge.target))
            .map_or_else(|| edge.edge_type.default_weight(), |m| m.confidence)
    }

    fn path_info(&self, nodes: &[DagIndex], edges: &[(DagIndex, &Edge)]) -> PathInfo {
        let ids: Vec<String> = nodes
            .iter()
            .filter_map(|n| self.id_of(*n).map(str::to_string))
            .collect();
        let strength = edges.iter().map(|(s, e)| self.edge_strength(*s, e)).product();
        let mut description = ids.first().cloned().unwrap_or_default();
        for ((_, edge), id) in edges.iter().zip(ids.iter().skip(1)) {
            description.push_str(&format!(" -[{}]-> {}", edge.edge_type, id));
        }
        PathInfo {
            nodes: ids,
            edges: edges.iter().map(|(_, e)| e.edge_type).collect(),
            strength,
            description,
        }
    }

    /// Every simple path of at most `max_depth` edges, strongest first.
    pub fn find_all_paths(&self, source: &str, target: &str, max_depth: usize) -> Vec<PathInfo> {
        let (start, goal) = match (self.lookup(source), self.lookup(target)) {
            (Some(s), Some(t)) if self.node(s).is_some() && self.node(t).is_some() => (s, t),
            _ => return Vec::new(),
        };
        if max_depth == 0 {
            return Vec::new();
        }

        let mut paths = Vec::new();
        let mut nodes = vec![start];
        let mut edges: Vec<(DagIndex, &Edge)> = Vec::new();
        let mut iters: Vec<std::vec::IntoIter<&Edge>> =
            vec![self.live_edges(start).collect::<Vec<_>>().into_iter()];

        while let Some(iter) = iters.last_mut() {
            let current = nodes[nodes.len() - 1];
            match iter.next() {
                Some(edge) => {
                    if nodes.contains(&edge.target) {
                        continue;
                    }
                    if edge.target == goal {
                        nodes.push(goal);
                        edges.push((current, edge));
                        paths.push(self.path_info(&nodes, &edges));
                        nodes.pop();
                        edges.pop();
                        continue;
                    }
                    if edges.len() + 1 < max_depth {
                        nodes.push(edge.target);
                        edges.push((current, edge));
                        iters.push(self.live_edges(edge.target).collect::<Vec<_>>().into_iter());
                    }
                }
                None => {
                    iters.pop();
                    if !edges.is_empty() {
                        edges.pop();
                        nodes.pop();
                    }
                }
            }
        }

        paths.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.nodes.len().cmp(&b.nodes.len()))
        });
        paths
    }

    /// Fewest-edges path, breadth first.
    pub fn shortest_path(&self, source: &str, target: &str) -> Option<PathInfo> {
        let start = self.lookup(source).filter(|s| self.node(*s).is_some())?;
        let goal = self.lookup(target).filter(|t| self.node(*t).is_some())?;
        if start == goal {
            return Some(self.path_info(&[start], &[]));
        }

        let mut previous: FxHashMap<DagIndex, (DagIndex, &Edge)> = FxHashMap::default();
        let mut queue = VecDeque::from([start]);
        let mut seen = FxHashSet::default();
        seen.insert(start);
        while let Some(next) = queue.pop_front() {
            for edge in self.live_edges(next) {
                if !seen.insert(edge.target) {
                    continue;
                }
                previous.insert(edge.target, (next, edge));
                if edge.target == goal {
                    let mut nodes = vec![goal];
                    let mut edges = Vec::new();
                    let mut cursor = goal;
                    while let Some((prev, edge)) = previous.get(&cursor) {
                        edges.push((*prev, *edge));
                        nodes.push(*prev);
                        cursor = *prev;
                    }
                    nodes.reverse();
                    edges.reverse();
                    return Some(self.path_info(&nodes, &edges));
                }
                queue.push_back(edge.target);
            }
        }
        None
    }

    /// Targets of the node's outgoing edges of one type.
    pub fn find_connected_nodes(&self, id: &str, edge_type: EdgeType) -> Vec<&DagNode> {
        let idx = match self.lookup(id) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        self.live_edges(idx)
            .filter(|e| e.edge_type == edge_type)
            .filter_map(|e| self.node(e.target))
            .collect()
    }

    pub fn find_nodes_by_type(&self, node_type: NodeType) -> Vec<&DagNode> {
        self.nodes()
            .map(|(_, n)| n)
            .filter(|n| n.node_type == node_type)
            .collect()
    }

    /// Chains of MethodologyFlow edges, one per starting step, each in
    /// flow order.
    pub fn track_methodology_flow(&self) -> Vec<Vec<String>> {
        let flows = |idx: DagIndex| {
            self.live_edges(idx)
                .filter(|e| e.edge_type == EdgeType::MethodologyFlow)
                .map(|e| e.target)
                .collect::<Vec<_>>()
        };
        let starts: Vec<DagIndex> = self
            .indices()
            .filter(|idx| !flows(*idx).is_empty())
            .filter(|idx| {
                !self
                    .live_incoming(*idx)
                    .any(|e| e.edge_type == EdgeType::MethodologyFlow)
            })
            .collect();

        starts
            .into_iter()
            .map(|start| {
                let mut chain = Vec::new();
                let mut seen = FxHashSet::default();
                let mut queue = VecDeque::from([start]);
                while let Some(step) = queue.pop_front() {
                    if !seen.insert(step) {
                        continue;
                    }
                    chain.extend(self.id_of(step).map(str::to_string));
                    queue.extend(flows(step));
                }
                chain
            })
            .collect()
    }

    /// Transitive sources of evidence edges into `id`, nearest first.
    pub fn find_supporting_evidence(&self, id: &str) -> Vec<&DagNode> {
        let start = match self.lookup(id) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        let mut found = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(next) = queue.pop_front() {
            for edge in self.live_incoming(next) {
                if EVIDENCE_EDGES.contains(&edge.edge_type) && seen.insert(edge.source) {
                    found.extend(self.node(edge.source));
                    queue.push_back(edge.source);
                }
            }
        }
        found
    }
}
