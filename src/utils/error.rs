//! Error handling for texgraph
//!
//! Every validated mutation in the crate returns one of the error enums
//! below instead of panicking; callers decide whether to log, record a
//! [`Diagnostic`] and continue, or propagate. Nothing here is fatal to a
//! whole-document run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::ast::{AstKind, NodeId};
use crate::graph::{EdgeType, NodeType};
use crate::traversal::FsmState;

// =============================================================================
// Layer errors
// =============================================================================

/// Failure while scanning a command argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Expected '{expected}' but found end of input (argument opened at byte {offset})")]
    Unterminated { expected: char, offset: usize },
    #[error("Expected '{expected}' but found '{found}' at byte {offset}")]
    Unexpected {
        expected: char,
        found: char,
        offset: usize,
    },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::Unterminated { offset, .. } | LexError::Unexpected { offset, .. } => *offset,
        }
    }
}

/// Why an AST mutation was refused. The tree is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} cannot be its own child")]
    SelfLink(NodeId),
    #[error("the document root cannot be attached as a child")]
    RootAsChild,
    #[error("node {child} is already owned by node {parent}")]
    AlreadyAttached { child: NodeId, parent: NodeId },
    #[error("{child:?} is not allowed inside {parent:?}")]
    Disallowed { parent: AstKind, child: AstKind },
}

/// Why a DAG edge insertion was refused. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeRejection {
    #[error("node '{0}' does not exist")]
    UnknownNode(String),
    #[error("node '{0}' has been removed")]
    RemovedNode(String),
    #[error("node '{0}' cannot link to itself")]
    SelfLink(String),
    #[error("{edge:?} is not allowed from {source_type:?} to {target_type:?}")]
    Incompatible {
        source_type: NodeType,
        target_type: NodeType,
        edge: EdgeType,
    },
    #[error("edge {edge:?} from '{source_id}' to '{target}' already exists")]
    Duplicate {
        source_id: String,
        target: String,
        edge: EdgeType,
    },
    #[error("hierarchical edge from '{source_id}' to '{target}' would create a cycle")]
    Cycle { source_id: String, target: String },
}

impl EdgeRejection {
    /// Duplicates are expected when several passes link the same pair.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, EdgeRejection::Duplicate { .. })
    }
}

/// Failure raised by the traversal state machine for a single node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: FsmState, to: FsmState },
    #[error("{kind:?} node is not valid in state {state:?}")]
    InvalidStructure { state: FsmState, kind: AstKind },
    #[error("unknown node type {0:?} for traversal")]
    UnknownNodeType(AstKind),
}

/// Failure while writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Informational, e.g. an edge that already existed
    Info,
    /// A construct was skipped or repaired
    Warning,
    /// A node or edge could not be produced at all
    Error,
}

/// What kind of problem a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Lexing,
    InvalidContent,
    RejectedChild,
    DepthLimit,
    DuplicateLabel,
    UnresolvedLabel,
    RejectedEdge,
    InvalidTransition,
    InvalidStructure,
    EntityPairing,
    Export,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Lexing => "lexing",
            DiagnosticKind::InvalidContent => "invalid content",
            DiagnosticKind::RejectedChild => "rejected child",
            DiagnosticKind::DepthLimit => "depth limit",
            DiagnosticKind::DuplicateLabel => "duplicate label",
            DiagnosticKind::UnresolvedLabel => "unresolved label",
            DiagnosticKind::RejectedEdge => "rejected edge",
            DiagnosticKind::InvalidTransition => "invalid transition",
            DiagnosticKind::InvalidStructure => "invalid structure",
            DiagnosticKind::EntityPairing => "entity pairing",
            DiagnosticKind::Export => "export",
        };
        write!(f, "{}", s)
    }
}

/// A non-fatal problem found while processing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Byte offset into the source, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            offset: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, kind, message)
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, kind, message)
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Info, kind, message)
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Diagnostic for a refused DAG edge. Duplicates are informational.
    pub fn from_edge_rejection(rejection: &EdgeRejection) -> Self {
        if rejection.is_duplicate() {
            Self::info(DiagnosticKind::RejectedEdge, rejection.to_string())
        } else {
            Self::warning(DiagnosticKind::RejectedEdge, rejection.to_string())
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        };
        match self.offset {
            Some(offset) => write!(
                f,
                "{}[{}] at byte {}: {}",
                level, self.kind, offset, self.message
            ),
            None => write!(f, "{}[{}]: {}", level, self.kind, self.message),
        }
    }
}

/// Format diagnostics for display, one per line, skipping those below `min`.
pub fn format_diagnostics(diagnostics: &[Diagnostic], min: DiagnosticSeverity) -> String {
    diagnostics
        .iter()
        .filter(|d| d.severity >= min)
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_names_expected_char() {
        let err = LexError::Unterminated {
            expected: '}',
            offset: 8,
        };
        assert!(err.to_string().contains("Expected '}'"));
        assert_eq!(err.offset(), 8);
    }

    #[test]
    fn test_duplicate_edges_are_informational() {
        let dup = EdgeRejection::Duplicate {
            source_id: "a".into(),
            target: "b".into(),
            edge: EdgeType::Citation,
        };
        assert_eq!(Diagnostic::from_edge_rejection(&dup).severity, DiagnosticSeverity::Info);

        let cycle = EdgeRejection::Cycle {
            source_id: "a".into(),
            target: "b".into(),
        };
        assert_eq!(Diagnostic::from_edge_rejection(&cycle).severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn test_format_diagnostics_filters_by_severity() {
        let diags = vec![
            Diagnostic::info(DiagnosticKind::RejectedEdge, "noise"),
            Diagnostic::warning(DiagnosticKind::UnresolvedLabel, "missing fig:1").at(42),
        ];
        let out = format_diagnostics(&diags, DiagnosticSeverity::Warning);
        assert_eq!(out, "warning[unresolved label] at byte 42: missing fig:1");
    }
}
