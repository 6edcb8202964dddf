use fxhash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use super::super::types::DagIndex;
use super::super::Dag;

/// Outcome of [`Dag::validate`]. Errors are broken invariants; warnings
/// are structural oddities that are legal in a best-effort graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Dag {
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (id, idx) in self.index_entries() {
            if self.node(idx).is_none() {
                report.errors.push(format!("index entry '{}' points at removed slot {}", id, idx));
            }
        }

        for (idx, node) in self.nodes() {
            for edge in node.outgoing() {
                if self.node(edge.target).is_none() {
                    report.errors.push(format!(
                        "{} edge from '{}' points at removed node {}",
                        edge.edge_type, node.id, edge.target
                    ));
                }
            }
            if node.outgoing().iter().any(|e| e.target == idx) {
                report.errors.push(format!("node '{}' links to itself", node.id));
            }
        }

        if let Some(node) = self.hierarchical_cycle() {
            report.errors.push(format!(
                "hierarchical edges form a cycle through '{}'",
                self.id_of(node).unwrap_or("?")
            ));
        }

        let roots: Vec<DagIndex> = self
            .indices()
            .filter(|idx| self.live_incoming(*idx).next().is_none())
            .collect();
        if roots.is_empty() && !self.is_empty() {
            report.warnings.push("graph has no root node".to_string());
        }
        let reached = self.reachable_from(&roots);
        for (idx, node) in self.nodes() {
            if !reached.contains(&idx) {
                report.warnings.push(format!("node '{}' is unreachable from any root", node.id));
            }
        }

        let components = self.weakly_connected_components();
        if components.len() > 1 {
            report
                .warnings
                .push(format!("graph has {} disconnected components", components.len()));
        }

        debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated graph"
        );
        report
    }

    /// A node on a hierarchical cycle, if any. `add_edge` prevents these;
    /// this exists to audit graphs assembled by other means.
    pub fn hierarchical_cycle(&self) -> Option<DagIndex> {
        // 0 = unvisited, 1 = on the current path, 2 = finished
        let mut color = vec![0u8; self.capacity()];
        for start in self.indices() {
            if color[start.index()] != 0 {
                continue;
            }
            let mut stack: Vec<(DagIndex, Vec<DagIndex>)> =
                vec![(start, self.hierarchical_children(start).collect())];
            color[start.index()] = 1;
            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                match pending.pop() {
                    Some(child) => match color[child.index()] {
                        0 => {
                            color[child.index()] = 1;
                            let next = self.hierarchical_children(child).collect();
                            stack.push((child, next));
                        }
                        1 => return Some(child),
                        _ => {}
                    },
                    None => {
                        color[node.index()] = 2;
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    pub(crate) fn reachable_from(&self, roots: &[DagIndex]) -> FxHashSet<DagIndex> {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<DagIndex> = roots.to_vec();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            stack.extend(self.live_edges(next).map(|e| e.target));
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Dag, EdgeType, NodeType};

    #[test]
    fn test_clean_tree_is_valid() {
        let mut dag = Dag::new();
        let doc = dag.add_node("document", NodeType::Document, "document");
        let sec = dag.add_node("s", NodeType::Section, "Intro");
        dag.add_edge(doc, sec, EdgeType::Hierarchical, None).unwrap();
        let report = dag.validate();
        assert!(report.is_valid(), "{:?}", report);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_dangling_edge_is_an_error() {
        let mut dag = Dag::new();
        let a = dag.add_node("a", NodeType::Section, "A");
        let b = dag.add_node("b", NodeType::Section, "B");
        dag.add_edge(a, b, EdgeType::Hierarchical, None).unwrap();
        dag.remove_node("b");
        let report = dag.validate();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("removed node"));
    }

    #[test]
    fn test_disconnected_and_unreachable_warnings() {
        let mut dag = Dag::new();
        dag.add_node("a", NodeType::Text, "a");
        let b = dag.add_node("b", NodeType::Section, "b");
        let c = dag.add_node("c", NodeType::Section, "c");
        dag.add_edge(b, c, EdgeType::ArgumentFlow, None).unwrap();
        dag.add_edge(c, b, EdgeType::CounterArgument, None).unwrap();
        let report = dag.validate();
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("'b' is unreachable")));
        assert!(report.warnings.iter().any(|w| w.contains("2 disconnected components")));
    }
}
