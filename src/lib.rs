//! # texgraph
//!
//! LaTeX research-paper processing: a mode-stack parser producing an arena
//! AST, a typed semantic graph mirrored from it, and a validated traversal
//! state machine that turns both into chunks, a structured document and
//! author/affiliation entities.
//!
//! ## Pipeline
//!
//! ```text
//! source → Lexer → Parser → Ast + SymbolTable
//!                              │
//!                              ▼
//!                     build_from_ast → Dag
//!                              │
//!                              ▼
//!          Traversal::run → chunks + StructuredDocument + entities
//! ```
//!
//! ## Example
//!
//! ```
//! use texgraph::{process, ParseOptions};
//!
//! let out = process(r"\section{Intro}Hello $x+1$ world.", &ParseOptions::default());
//! assert_eq!(out.chunks.len(), 1);
//! assert_eq!(out.document.content.len(), 4);
//! ```

pub mod core;
pub mod graph;
pub mod ner;
pub mod traversal;
pub mod utils;

pub use crate::core::{
    parse, parse_with_options, AnalysisOptions, Ast, AstKind, AstNode, MathValidation, NodeId,
    ParseOptions, ParsedDocument, SymbolTable,
};
pub use graph::{build_from_ast, Dag, DagIndex, EdgeType, NodeType};
pub use ner::Ner;
pub use texgraph_ir::{Fragment, MathDisplay, Metadata, StructuredDocument};
pub use traversal::{chunk_document, FsmState, Traversal, TraversalOutput};
pub use utils::error::{Diagnostic, DiagnosticKind, DiagnosticSeverity, ExportError};

use tracing::info;

/// Everything produced for one document.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub ast: Ast,
    pub symbols: SymbolTable,
    pub graph: Dag,
    pub chunks: Vec<String>,
    pub document: StructuredDocument,
    /// Parser, graph and traversal diagnostics, in that order
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessedDocument {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The structured document as pretty-printed JSON.
    pub fn document_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

/// Parse `source`, build its graph and run the traversal.
pub fn process(source: &str, options: &ParseOptions) -> ProcessedDocument {
    let ParsedDocument {
        mut ast,
        symbols,
        mut diagnostics,
    } = parse_with_options(source, options.clone());
    let (mut graph, graph_diagnostics) = build_from_ast(&mut ast, options);
    diagnostics.extend(graph_diagnostics);

    let output = Traversal::new(options.clone()).run(&ast, &mut graph);
    diagnostics.extend(output.diagnostics);

    info!(
        ast_nodes = ast.len(),
        graph_nodes = graph.len(),
        chunks = output.chunks.len(),
        diagnostics = diagnostics.len(),
        "processed document"
    );
    ProcessedDocument {
        ast,
        symbols,
        graph,
        chunks: output.chunks,
        document: output.document,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_collects_every_stage() {
        let out = process(r"\section{A}See \ref{nowhere}. \cite{k}", &ParseOptions::default());
        assert!(out.graph.contains("citation:k"));
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedLabel));
        assert!(!out.has_errors());
        assert!(out.document_json().unwrap().contains("\"type\": \"reference\""));
    }
}
