//! Link-analysis scores.
//!
//! ```text
//! C(v) = (1-d)/N + d * Σ C(u) / outdegree(u)
//!                      u→v
//! ```
//!
//! Iteration stops when the total absolute change drops below the
//! tolerance or the iteration cap is hit.

use fxhash::FxHashSet;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::super::types::{DagIndex, NodeType};
use super::super::Dag;
use crate::core::options::AnalysisOptions;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityResult {
    /// Score per node id, in graph insertion order
    pub scores: IndexMap<String, f64>,
    pub iterations: usize,
    /// Total absolute change in the last iteration
    pub delta: f64,
    pub converged: bool,
}

impl CentralityResult {
    pub fn score(&self, id: &str) -> f64 {
        self.scores.get(id).copied().unwrap_or(0.0)
    }

    pub fn max_score(&self) -> f64 {
        self.scores.values().copied().fold(0.0, f64::max)
    }
}

/// A node connecting otherwise separate parts of the paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgingConcept {
    pub id: String,
    pub node_type: NodeType,
    pub score: f64,
    pub neighbor_types: usize,
}

impl Dag {
    pub fn centrality(&self) -> CentralityResult {
        self.centrality_with(&AnalysisOptions::default())
    }

    pub fn centrality_with(&self, options: &AnalysisOptions) -> CentralityResult {
        let live: Vec<DagIndex> = self.indices().collect();
        let n = live.len();
        if n == 0 {
            return CentralityResult {
                scores: IndexMap::new(),
                iterations: 0,
                delta: 0.0,
                converged: true,
            };
        }

        let slots = self.capacity();
        let out_degree: Vec<usize> = (0..slots)
            .map(|i| self.live_edges(DagIndex(i)).count())
            .collect();
        let initial = 1.0 / n as f64;
        let mut scores = vec![0.0f64; slots];
        for idx in &live {
            scores[idx.0] = initial;
        }

        let base = (1.0 - options.damping) / n as f64;
        let mut iterations = 0;
        let mut delta = f64::INFINITY;
        while iterations < options.max_iterations {
            iterations += 1;
            let mut next = vec![0.0f64; slots];
            for idx in &live {
                let inflow: f64 = self
                    .live_incoming(*idx)
                    .map(|e| scores[e.source.0] / out_degree[e.source.0].max(1) as f64)
                    .sum();
                next[idx.0] = base + options.damping * inflow;
            }
            delta = live.iter().map(|idx| (next[idx.0] - scores[idx.0]).abs()).sum();
            scores = next;
            if delta < options.tolerance {
                break;
            }
        }

        debug!(iterations, delta, "centrality computed");
        CentralityResult {
            scores: live
                .iter()
                .filter_map(|idx| self.id_of(*idx).map(|id| (id.to_string(), scores[idx.0])))
                .collect(),
            iterations,
            delta,
            converged: delta < options.tolerance,
        }
    }

    /// Nodes sorted by centrality, boosted by any semantic importance.
    pub fn rank_nodes_by_importance(&self) -> Vec<(String, f64)> {
        let centrality = self.centrality();
        let mut ranked: Vec<(String, f64)> = self
            .nodes()
            .map(|(_, node)| {
                let boost = node.semantic.as_ref().map_or(0.0, |s| s.importance);
                (node.id.clone(), centrality.score(&node.id) * (1.0 + boost))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Score = normalized centrality × distinct neighbour types × local
    /// density, keeping scores at or above the threshold.
    pub fn find_bridging_concepts(&self, options: &AnalysisOptions) -> Vec<BridgingConcept> {
        let centrality = self.centrality_with(options);
        let max = centrality.max_score();
        let n = self.len();
        if n < 2 || max <= 0.0 {
            return Vec::new();
        }

        let mut bridges: Vec<BridgingConcept> = self
            .nodes()
            .filter_map(|(idx, node)| {
                let neighbors: Vec<DagIndex> = self
                    .live_edges(idx)
                    .map(|e| e.target)
                    .chain(self.live_incoming(idx).map(|e| e.source))
                    .collect();
                let types: FxHashSet<NodeType> = neighbors
                    .iter()
                    .filter_map(|i| self.node(*i).map(|n| n.node_type))
                    .collect();
                let density = (neighbors.len() as f64 / (n - 1) as f64).min(1.0);
                let score = centrality.score(&node.id) / max * types.len() as f64 * density;
                (score >= options.bridging_threshold).then(|| BridgingConcept {
                    id: node.id.clone(),
                    node_type: node.node_type,
                    score,
                    neighbor_types: types.len(),
                })
            })
            .collect();
        bridges.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        bridges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeType;

    fn hub_graph() -> Dag {
        let mut dag = Dag::new();
        let hub = dag.add_node("hub", NodeType::Section, "hub");
        for i in 0..4 {
            let leaf = dag.add_node(format!("leaf{}", i), NodeType::Section, "leaf");
            dag.add_edge(leaf, hub, EdgeType::ArgumentFlow, None).unwrap();
        }
        dag
    }

    #[test]
    fn test_hub_outranks_leaves_and_converges() {
        let result = hub_graph().centrality();
        assert!(result.converged);
        assert!(result.delta < 1e-6);
        for i in 0..4 {
            assert!(result.score("hub") > result.score(&format!("leaf{}", i)));
        }
    }

    #[test]
    fn test_iteration_cap_respected() {
        let options = AnalysisOptions {
            max_iterations: 1,
            tolerance: 0.0,
            ..AnalysisOptions::default()
        };
        let result = hub_graph().centrality_with(&options);
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_empty_graph() {
        let result = Dag::new().centrality();
        assert!(result.scores.is_empty());
        assert!(result.converged);
    }

    #[test]
    fn test_bridge_between_types() {
        let mut dag = Dag::new();
        let bridge = dag.add_node("bridge", NodeType::Section, "Method");
        let text = dag.add_node("t", NodeType::Text, "text");
        let fig = dag.add_node("f", NodeType::Figure, "fig");
        let cite = dag.add_node("citation:x", NodeType::Citation, "x");
        dag.add_edge(text, bridge, EdgeType::ConceptDependency, None).unwrap();
        dag.add_edge(fig, bridge, EdgeType::ResultSupports, None).unwrap();
        dag.add_edge(bridge, cite, EdgeType::Citation, None).unwrap();

        let bridges = dag.find_bridging_concepts(&AnalysisOptions::default());
        assert_eq!(bridges[0].id, "bridge");
        assert_eq!(bridges[0].neighbor_types, 3);
        assert!(bridges.iter().all(|b| b.id != "t"));
    }
}
