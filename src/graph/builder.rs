//! AST → graph mirroring.

use tracing::{debug, info, warn};

use super::types::{DagIndex, EdgeType, NodeType};
use super::Dag;
use crate::core::ast::{Ast, AstKind, AstNode, NodeId};
use crate::core::options::ParseOptions;
use crate::core::vocabulary::{base_name, section_level, CITATION_COMMANDS};
use crate::utils::error::{Diagnostic, EdgeRejection};
use crate::utils::text::{collapse_whitespace, split_command, strip_latex};

/// Id of the graph node mirroring the AST root.
pub const DOCUMENT_ID: &str = "document";

/// Graph id for a mirrored AST node.
pub fn node_id(id: NodeId) -> String {
    format!("node-{}", id.index())
}

/// Graph id for a bibliography entry or cited work.
pub fn citation_id(key: &str) -> String {
    format!("citation:{}", key.trim())
}

/// Builds a [`Dag`] from a parsed [`Ast`] and sets the AST back-links.
pub struct GraphBuilder {
    graph: Dag,
    diagnostics: Vec<Diagnostic>,
    nest_sections: bool,
}

impl GraphBuilder {
    pub fn new(options: &ParseOptions) -> Self {
        GraphBuilder {
            graph: Dag::new(),
            diagnostics: Vec::new(),
            nest_sections: options.nest_sections,
        }
    }

    pub fn build(mut self, ast: &mut Ast) -> (Dag, Vec<Diagnostic>) {
        let root = ast.root();
        let doc = self.graph.add_node(DOCUMENT_ID, NodeType::Document, "document");
        self.graph.link_ast(doc, root);
        ast.set_dag_node(root, doc);

        self.mirror(ast);
        self.link_citations_and_references(ast);

        info!(
            nodes = self.graph.len(),
            edges = self.graph.edge_count(),
            "built semantic graph"
        );
        (self.graph, self.diagnostics)
    }

    /// Mirror every attached node, container by container.
    fn mirror(&mut self, ast: &mut Ast) {
        let mut containers = vec![ast.root()];
        while let Some(container) = containers.pop() {
            let parent_dag = match ast.dag_node(container) {
                Some(idx) => idx,
                None => continue,
            };
            // (level, graph node) of the sections open in this container
            let mut open_sections: Vec<(u8, DagIndex)> = Vec::new();
            let children = ast.children(container).to_vec();
            for child in children {
                let idx = self.mirror_node(ast, child);
                self.link(parent_dag, idx, EdgeType::Hierarchical, None);

                if self.nest_sections {
                    let level = match ast[child].kind {
                        AstKind::Section => ast[child].name.as_deref().and_then(section_level),
                        _ => None,
                    };
                    match level {
                        Some(level) => {
                            while open_sections.last().map_or(false, |(l, _)| *l >= level) {
                                open_sections.pop();
                            }
                            if let Some((_, section)) = open_sections.last() {
                                self.link(*section, idx, EdgeType::Hierarchical, None);
                            }
                            open_sections.push((level, idx));
                        }
                        None => {
                            if let Some((_, section)) = open_sections.last() {
                                self.link(*section, idx, EdgeType::Hierarchical, None);
                            }
                        }
                    }
                }

                if !ast.children(child).is_empty() {
                    containers.push(child);
                }
            }
        }
    }

    fn mirror_node(&mut self, ast: &mut Ast, id: NodeId) -> DagIndex {
        let node = &ast[id];
        let node_type = NodeType::from_ast(node.kind, node.name.as_deref());
        let graph_id = match node.kind {
            AstKind::Citation => citation_key(node).map(|k| citation_id(&k)),
            _ => None,
        }
        .unwrap_or_else(|| node_id(id));
        let content = sanitized_content(node);
        let idx = self.graph.add_node(graph_id, node_type, content);
        if self.graph.node(idx).map_or(false, |n| n.ast_node().is_none()) {
            self.graph.link_ast(idx, id);
        }
        ast.set_dag_node(id, idx);
        idx
    }

    /// Citation edges for `\cite`-family commands and reference edges for
    /// resolved labels.
    fn link_citations_and_references(&mut self, ast: &Ast) {
        for id in ast.ids() {
            let node = &ast[id];
            if node.kind != AstKind::Reference {
                continue;
            }
            let source = match node.dag_node() {
                Some(idx) => idx,
                None => continue,
            };
            let command = node.name.as_deref().map(base_name).unwrap_or("");

            if CITATION_COMMANDS.contains(command) {
                for key in citation_keys(node) {
                    let target =
                        self.graph.add_node(citation_id(&key), NodeType::Citation, key.clone());
                    self.link(source, target, EdgeType::Citation, Some(command.to_string()));
                }
                continue;
            }

            for target_ast in node.references() {
                let target = match ast.dag_node(*target_ast) {
                    Some(idx) => idx,
                    None => {
                        warn!(
                            reference = %id,
                            target = %target_ast,
                            "reference target was never attached"
                        );
                        continue;
                    }
                };
                let target_type = match self.graph.node(target) {
                    Some(n) => n.node_type,
                    None => continue,
                };
                let edge = reference_edge(target_type);
                self.link(source, target, edge, Some(command.to_string()));
            }
        }
    }

    fn link(&mut self, source: DagIndex, target: DagIndex, edge: EdgeType, label: Option<String>) {
        if source == target {
            return;
        }
        if let Err(rejection) = self.graph.add_edge(source, target, edge, label) {
            self.reject(rejection);
        }
    }

    fn reject(&mut self, rejection: EdgeRejection) {
        if rejection.is_duplicate() {
            debug!(%rejection, "edge already present");
        } else {
            warn!(%rejection, "edge rejected");
        }
        self.diagnostics.push(Diagnostic::from_edge_rejection(&rejection));
    }
}

/// Build the graph for `ast` with the given options.
pub fn build_from_ast(ast: &mut Ast, options: &ParseOptions) -> (Dag, Vec<Diagnostic>) {
    GraphBuilder::new(options).build(ast)
}

/// Reference edge matching the target's type.
pub(crate) fn reference_edge(target: NodeType) -> EdgeType {
    match target {
        NodeType::Figure => EdgeType::FigureReference,
        NodeType::Table => EdgeType::TableReference,
        NodeType::Equation | NodeType::Math => EdgeType::EquationReference,
        _ => EdgeType::CrossReference,
    }
}

pub(crate) fn citation_key(node: &AstNode) -> Option<String> {
    split_command(&node.content)
        .and_then(|parts| parts.first_arg().map(|k| k.trim().to_string()))
        .filter(|k| !k.is_empty())
}

pub(crate) fn citation_keys(node: &AstNode) -> Vec<String> {
    split_command(&node.content)
        .and_then(|parts| parts.first_arg().map(str::to_string))
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Human-readable graph content for an AST node.
fn sanitized_content(node: &AstNode) -> String {
    let name = node.name.as_deref().unwrap_or("");
    match node.kind {
        AstKind::Document => "document".to_string(),
        AstKind::Math | AstKind::EnvironmentContent => collapse_whitespace(&node.content),
        AstKind::Environment | AstKind::Abstract | AstKind::Bibliography => name.to_string(),
        AstKind::Label | AstKind::Reference | AstKind::Citation => split_command(&node.content)
            .and_then(|parts| parts.first_arg().map(|a| collapse_whitespace(a)))
            .unwrap_or_else(|| name.to_string()),
        AstKind::Section
        | AstKind::Text
        | AstKind::Command
        | AstKind::Author
        | AstKind::Affiliation => {
            let stripped = strip_latex(&node.content);
            if stripped.is_empty() {
                name.to_string()
            } else {
                stripped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse;

    fn build(source: &str) -> (Ast, Dag, Vec<Diagnostic>) {
        let mut doc = parse(source);
        let (graph, diagnostics) = build_from_ast(&mut doc.ast, &ParseOptions::default());
        (doc.ast, graph, diagnostics)
    }

    #[test]
    fn test_every_attached_node_is_mirrored() {
        let (ast, graph, _) = build(r"\section{Intro}Hello $x$ \textbf{bold}");
        for id in ast.descendants(ast.root()) {
            let idx = ast.dag_node(id).expect("back-link set");
            assert_eq!(graph.node(idx).unwrap().ast_node(), Some(id));
        }
        let section = graph.get("node-1").unwrap();
        assert_eq!(section.node_type, NodeType::Section);
        assert_eq!(section.content, "Intro");
        let bold = graph.nodes().find(|(_, n)| n.node_type == NodeType::Command).unwrap().1;
        assert_eq!(bold.content, "bold");
    }

    #[test]
    fn test_citation_node_and_edge() {
        let (_, graph, _) = build(r"Text \cite{foo}");
        let cite = graph.lookup("citation:foo").unwrap();
        assert_eq!(graph.node(cite).unwrap().content, "foo");
        let incoming: Vec<_> = graph
            .live_incoming(cite)
            .filter(|e| e.edge_type == EdgeType::Citation)
            .collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(graph.node(incoming[0].source).unwrap().node_type, NodeType::Reference);
    }

    #[test]
    fn test_bibitem_shares_citation_node() {
        let (_, graph, _) = build(
            r"See \cite{knuth84,lamport}. \begin{thebibliography}{9}\bibitem{knuth84} Knuth.\end{thebibliography}",
        );
        let knuth = graph.lookup("citation:knuth84").unwrap();
        assert!(graph.node(knuth).unwrap().ast_node().is_some());
        assert!(graph.contains("citation:lamport"));
        let citations = graph
            .live_incoming(knuth)
            .filter(|e| e.edge_type == EdgeType::Citation)
            .count();
        assert_eq!(citations, 1);
    }

    #[test]
    fn test_reference_edges_by_target_type() {
        let (_, graph, _) = build(
            r"\begin{figure}\caption{C}\label{fig:a}\end{figure}\begin{equation}x\label{eq:1}\end{equation}See \ref{fig:a} and \eqref{eq:1}.",
        );
        let edges: Vec<EdgeType> = graph
            .nodes()
            .filter(|(_, n)| n.node_type == NodeType::Reference)
            .flat_map(|(idx, _)| graph.live_edges(idx).map(|e| e.edge_type).collect::<Vec<_>>())
            .collect();
        assert!(edges.contains(&EdgeType::FigureReference));
        assert!(edges.contains(&EdgeType::EquationReference));
    }

    #[test]
    fn test_content_nested_under_sections() {
        let (ast, graph, _) = build(r"\section{A}one\subsection{B}two\section{C}three");
        let ids: Vec<NodeId> = ast.children(ast.root()).to_vec();
        let dag = |i: usize| ast.dag_node(ids[i]).unwrap();
        let children = |i: usize| graph.hierarchical_children(dag(i)).collect::<Vec<_>>();
        assert_eq!(children(0), vec![dag(1), dag(2)]);
        assert_eq!(children(2), vec![dag(3)]);
        assert_eq!(children(4), vec![dag(5)]);
    }

    #[test]
    fn test_nesting_can_be_disabled() {
        let mut doc = parse(r"\section{A}one");
        let options = ParseOptions {
            nest_sections: false,
            ..ParseOptions::default()
        };
        let (graph, _) = build_from_ast(&mut doc.ast, &options);
        let section = doc.ast.dag_node(doc.ast.children(doc.ast.root())[0]).unwrap();
        assert_eq!(graph.hierarchical_children(section).count(), 0);
    }
}
