//! Processing options.
//!
//! Both structs deserialize from TOML tables (`[parse]`, `[analysis]`), and
//! any field left out falls back to its default.

use serde::Deserialize;

// =============================================================================
// Parse / Traversal Options
// =============================================================================

/// What to do with a Math node whose content is not delimited math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MathValidation {
    /// Keep the node as Math and record a diagnostic
    #[default]
    Log,
    /// Demote the node to Text and record a diagnostic
    Reclassify,
}

/// Options for parsing and traversal
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Maximum environment nesting before bodies are skipped
    /// Default: 256
    pub max_depth: usize,

    /// Policy for malformed math content
    /// Default: Log
    pub math_validation: MathValidation,

    /// Fold in nodes reachable through DAG hierarchical links while walking
    /// Default: true
    pub follow_graph_links: bool,

    /// Nest content under the innermost open section when building the graph
    /// Default: true
    pub nest_sections: bool,

    /// Run the CRF tagger over author block text
    /// Default: false
    pub use_crf: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 256,
            math_validation: MathValidation::Log,
            follow_graph_links: true,
            nest_sections: true,
            use_crf: false,
        }
    }
}

impl ParseOptions {
    /// Create new options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow nesting limit, demote malformed math
    pub fn strict() -> Self {
        Self {
            max_depth: 32,
            math_validation: MathValidation::Reclassify,
            ..Self::default()
        }
    }

    /// Tree-only walk with the statistical tagger enabled
    pub fn lenient() -> Self {
        Self {
            max_depth: 1024,
            follow_graph_links: false,
            use_crf: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// Analysis Options
// =============================================================================

/// Parameters for the graph analyses
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Damping factor for centrality
    pub damping: f64,
    /// Iteration cap for centrality
    pub max_iterations: usize,
    /// Convergence threshold on total absolute change
    pub tolerance: f64,
    /// Minimum score for a bridging concept
    pub bridging_threshold: f64,
    /// Number of themes returned
    pub theme_limit: usize,
    /// Number of most-cited works returned
    pub top_citations: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
            bridging_threshold: 0.5,
            theme_limit: 20,
            top_citations: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ParseOptions::new();
        assert_eq!(opts.max_depth, 256);
        assert_eq!(opts.math_validation, MathValidation::Log);
        assert!(opts.follow_graph_links);

        let analysis = AnalysisOptions::default();
        assert_eq!(analysis.damping, 0.85);
        assert_eq!(analysis.max_iterations, 100);
    }

    #[test]
    fn test_presets() {
        assert_eq!(ParseOptions::strict().math_validation, MathValidation::Reclassify);
        assert!(!ParseOptions::lenient().follow_graph_links);
    }

    #[test]
    fn test_partial_deserialize() {
        let opts: ParseOptions =
            serde_json::from_str(r#"{"max_depth": 8, "math_validation": "reclassify"}"#).unwrap();
        assert_eq!(opts.max_depth, 8);
        assert_eq!(opts.math_validation, MathValidation::Reclassify);
        assert!(opts.nest_sections);
    }
}
