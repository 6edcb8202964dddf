//! Read-only analyses over a built [`Dag`](super::Dag).
//!
//! Everything here skips dangling edges and removed nodes. The only
//! mutating entry points are [`Dag::annotate_semantics`](super::Dag::annotate_semantics)
//! and [`Dag::infer_section_relationships`](super::Dag::infer_section_relationships),
//! which add annotations and inferred edges through the validated API.

mod centrality;
mod citations;
mod components;
mod paths;
mod reasoning;
mod structure;
mod themes;
mod validation;

pub use centrality::{BridgingConcept, CentralityResult};
pub use citations::CitationAnalysis;
pub use structure::{PaperStructure, SectionRole};
pub use themes::Theme;
pub use validation::ValidationReport;

pub(crate) use themes::content_words;
