//! Utility modules
//!
//! - Error types and diagnostics
//! - Text helpers for command arguments, braces and identifiers

pub mod error;
pub mod text;

pub use error::{format_diagnostics, Diagnostic, DiagnosticKind, DiagnosticSeverity};
