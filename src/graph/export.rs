//! GraphViz and JSON renderings of the graph, plus a plain-text dump.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use fxhash::FxHashSet;
use serde::Serialize;
use tracing::{info, warn};

use super::types::{DagIndex, DagNode, EdgeType, NodeType, RelationshipMetadata, SemanticInfo};
use super::Dag;
use crate::utils::error::ExportError;
use crate::utils::text::truncate_chars;

const LABEL_LEN: usize = 40;

const METHODOLOGY_EDGES: &[EdgeType] = &[
    EdgeType::MethodologyFlow,
    EdgeType::ResultSupports,
    EdgeType::ExperimentalSetup,
    EdgeType::ValidationMethod,
];

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeGraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeGraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RelationshipMetadata>,
}

/// Serializable snapshot of every live node and edge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<KnowledgeGraphNode>,
    pub edges: Vec<KnowledgeGraphEdge>,
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace(['\n', '\r'], " ")
}

fn dot_label(node: &DagNode) -> String {
    let text = if node.content.trim().is_empty() { &node.id } else { &node.content };
    escape(&truncate_chars(text.trim(), LABEL_LEN))
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| {
        warn!(path = %path.display(), %source, "export failed");
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

impl Dag {
    /// Whole graph as GraphViz, one cluster per node type.
    pub fn to_dot(&self) -> String {
        let all: Vec<DagIndex> = self.indices().collect();
        self.render_dot("texgraph", &all, |_| true)
    }

    /// Only the nodes and edges that describe how the method flows into
    /// results and validation.
    pub fn methodology_dot(&self) -> String {
        let mut involved = Vec::new();
        let mut seen = FxHashSet::default();
        for (idx, _) in self.nodes() {
            for edge in self.live_edges(idx).filter(|e| METHODOLOGY_EDGES.contains(&e.edge_type)) {
                for n in [idx, edge.target] {
                    if seen.insert(n) {
                        involved.push(n);
                    }
                }
            }
        }
        self.render_dot("methodology", &involved, |edge| METHODOLOGY_EDGES.contains(&edge))
    }

    fn render_dot(
        &self,
        name: &str,
        nodes: &[DagIndex],
        keep: impl Fn(EdgeType) -> bool,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", name);
        out.push_str("  rankdir=TB;\n  node [shape=box, fontname=\"Helvetica\"];\n");

        for node_type in NodeType::ALL {
            let members: Vec<&DagNode> = nodes
                .iter()
                .filter_map(|idx| self.node(*idx))
                .filter(|n| n.node_type == node_type)
                .collect();
            if members.is_empty() {
                continue;
            }
            let _ = writeln!(out, "  subgraph cluster_{} {{", node_type);
            let _ = writeln!(out, "    label=\"{}\";", node_type);
            for node in members {
                let _ = writeln!(
                    out,
                    "    \"{}\" [label=\"{}\"];",
                    escape(&node.id),
                    dot_label(node)
                );
            }
            out.push_str("  }\n");
        }

        let included: FxHashSet<DagIndex> = nodes.iter().copied().collect();
        for idx in nodes {
            let source = match self.node(*idx) {
                Some(n) => n,
                None => continue,
            };
            for edge in self.live_edges(*idx) {
                if !keep(edge.edge_type) || !included.contains(&edge.target) {
                    continue;
                }
                let Some(target) = self.node(edge.target) else { continue };
                let _ = writeln!(
                    out,
                    "  \"{}\" -> \"{}\" [{}, label=\"{}\"];",
                    escape(&source.id),
                    escape(&target.id),
                    edge.edge_type.dot_style(),
                    edge.edge_type
                );
            }
        }
        out.push_str("}\n");
        out
    }

    pub fn to_knowledge_graph(&self) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::default();
        for (idx, node) in self.nodes() {
            graph.nodes.push(KnowledgeGraphNode {
                id: node.id.clone(),
                node_type: node.node_type,
                content: node.content.clone(),
                semantic: node.semantic.clone(),
            });
            for edge in self.live_edges(idx) {
                let Some(target) = self.id_of(edge.target) else { continue };
                graph.edges.push(KnowledgeGraphEdge {
                    source: node.id.clone(),
                    target: target.to_string(),
                    edge_type: edge.edge_type,
                    label: edge.label.clone(),
                    metadata: node.relationship(edge.edge_type, edge.target).cloned(),
                });
            }
        }
        graph
    }

    pub fn knowledge_graph_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(&self.to_knowledge_graph())?)
    }

    pub fn write_dot(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        write_file(path, &self.to_dot())?;
        info!(path = %path.display(), nodes = self.len(), "wrote dot graph");
        Ok(())
    }

    pub fn write_knowledge_graph(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        write_file(path, &self.knowledge_graph_json()?)?;
        info!(path = %path.display(), nodes = self.len(), "wrote knowledge graph");
        Ok(())
    }

    /// Indented outline of the hierarchy from every root, with the
    /// non-hierarchical edges of each node listed beneath it.
    pub fn dump_structure(&self) -> String {
        let mut out = String::new();
        let roots: Vec<DagIndex> = self
            .indices()
            .filter(|idx| !self.live_incoming(*idx).any(|e| e.edge_type.is_hierarchical()))
            .collect();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<(DagIndex, usize)> = roots.into_iter().rev().map(|r| (r, 0)).collect();

        while let Some((idx, depth)) = stack.pop() {
            let Some(node) = self.node(idx) else { continue };
            let indent = "  ".repeat(depth);
            if !seen.insert(idx) {
                let _ = writeln!(out, "{}{} (see above)", indent, node.id);
                continue;
            }
            let _ = writeln!(out, "{}{} [{}] {}", indent, node.id, node.node_type, dot_label(node));
            for edge in self.live_edges(idx).filter(|e| !e.edge_type.is_hierarchical()) {
                if let Some(target) = self.id_of(edge.target) {
                    let _ = writeln!(out, "{}  -> {} {}", indent, edge.edge_type, target);
                }
            }
            let children: Vec<DagIndex> = self.hierarchical_children(idx).collect();
            stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dag {
        let mut dag = Dag::new();
        let doc = dag.add_node("document", NodeType::Document, "");
        let method = dag.add_node("m", NodeType::Section, "Method \"v2\"");
        let results = dag.add_node("r", NodeType::Section, "Results");
        let cite = dag.add_node("citation:k", NodeType::Citation, "k");
        dag.add_edge(doc, method, EdgeType::Hierarchical, None).unwrap();
        dag.add_edge(doc, results, EdgeType::Hierarchical, None).unwrap();
        let meta = RelationshipMetadata::new(0.6, "titles");
        dag.add_edge_with_metadata(method, results, EdgeType::MethodologyFlow, None, meta)
            .unwrap();
        dag.add_edge(method, cite, EdgeType::Citation, Some("cite".into())).unwrap();
        dag
    }

    #[test]
    fn test_dot_clusters_and_escaping() {
        let dot = sample().to_dot();
        assert!(dot.starts_with("digraph texgraph {"));
        assert!(dot.contains("subgraph cluster_Section {"));
        assert!(dot.contains("\"m\" [label=\"Method \\\"v2\\\"\"];"));
        assert!(dot.contains(
            "\"m\" -> \"citation:k\" [color=blue, style=dashed, label=\"Citation\"];"
        ));
    }

    #[test]
    fn test_methodology_dot_filters_edges() {
        let dot = sample().methodology_dot();
        assert!(dot.contains("\"m\" -> \"r\""));
        assert!(!dot.contains("citation:k"));
        assert!(!dot.contains("cluster_Document"));
    }

    #[test]
    fn test_knowledge_graph_json() {
        let dag = sample();
        let kg = dag.to_knowledge_graph();
        assert_eq!(kg.nodes.len(), 4);
        assert_eq!(kg.edges.len(), 4);
        let value: serde_json::Value =
            serde_json::from_str(&dag.knowledge_graph_json().unwrap()).unwrap();
        let flow = value["edges"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["type"] == "MethodologyFlow")
            .unwrap();
        assert_eq!(flow["metadata"]["confidence"], 0.6);
        assert!(value["nodes"][0].get("semantic").is_none());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let err = sample().write_dot("/nonexistent/dir/graph.dot").unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn test_dump_structure() {
        let dump = sample().dump_structure();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "document [Document] document");
        assert_eq!(lines[1], "  m [Section] Method \\\"v2\\\"");
        assert_eq!(lines[2], "    -> MethodologyFlow r");
        assert_eq!(lines[3], "    -> Citation citation:k");
        assert_eq!(lines[4], "  r [Section] Results");
        assert_eq!(lines.len(), 6);
    }
}
