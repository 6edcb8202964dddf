//! Static edge compatibility table.
//!
//! An edge of type `E` from a node of type `S` to a node of type `T` is
//! accepted only if some rule lists `E` for `(S, T)`. Hierarchical edges are
//! accepted between any two types.

use fxhash::FxHashMap;
use lazy_static::lazy_static;

use super::types::{EdgeType, NodeType};

/// One row of the compatibility table.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRule {
    pub sources: &'static [NodeType],
    pub targets: &'static [NodeType],
    pub edges: &'static [EdgeType],
    pub description: &'static str,
}

use EdgeType as E;
use NodeType as N;

/// Content-bearing node types that take part in semantic relationships.
const CONTENT: &[NodeType] = &[
    N::Section,
    N::Abstract,
    N::Text,
    N::Environment,
    N::Figure,
    N::Table,
    N::Equation,
    N::Math,
];

const CITING: &[NodeType] = &[
    N::Document,
    N::Section,
    N::Abstract,
    N::Text,
    N::Environment,
    N::Figure,
    N::Table,
    N::Reference,
    N::Command,
];

const SEMANTIC: &[EdgeType] = &[
    E::ConceptDependency,
    E::MethodologyFlow,
    E::DataDependency,
    E::ResultSupports,
    E::Definition,
    E::Assumption,
    E::FutureWork,
    E::AlternativeApproach,
    E::Limitation,
    E::ExperimentalSetup,
    E::CausalLink,
    E::StatisticalLink,
    E::ValidationMethod,
    E::ComparisonLink,
    E::MainContribution,
    E::SubContribution,
    E::NoveltyLink,
    E::TimelineLink,
    E::ArgumentFlow,
    E::EvidenceSupport,
    E::CounterArgument,
    E::ApplicationDomain,
    E::ImpactMeasure,
    E::SocialImpact,
    E::CrossReference,
];

pub static RULES: &[EdgeRule] = &[
    EdgeRule {
        sources: &[N::Author],
        targets: &[N::Affiliation],
        edges: &[E::AuthorAffiliation, E::InstitutionalLink],
        description: "author belongs to an institution",
    },
    EdgeRule {
        sources: &[N::Author],
        targets: &[N::Author],
        edges: &[E::TeamCollaboration],
        description: "co-authorship",
    },
    EdgeRule {
        sources: &[N::Affiliation],
        targets: &[N::Affiliation],
        edges: &[E::InstitutionalLink],
        description: "institutional hierarchy",
    },
    EdgeRule {
        sources: &[N::Author],
        targets: &[N::Document, N::Section, N::Abstract, N::Text, N::Figure, N::Table],
        edges: &[E::AuthorContribution, E::AuthorMetadata],
        description: "author wrote part of the paper",
    },
    EdgeRule {
        sources: CITING,
        targets: &[N::Citation],
        edges: &[
            E::Citation,
            E::RelatedWork,
            E::PriorWork,
            E::AlternativeApproach,
            E::ComparisonLink,
            E::BenchmarkReference,
        ],
        description: "content cites prior work",
    },
    EdgeRule {
        sources: &[N::Citation],
        targets: &[N::Citation],
        edges: &[E::Citation, E::VersionHistory],
        description: "bibliography entries referencing each other",
    },
    EdgeRule {
        sources: &[N::Reference, N::Text, N::Section, N::Command],
        targets: &[N::Figure],
        edges: &[E::FigureReference, E::CrossReference],
        description: "reference to a figure",
    },
    EdgeRule {
        sources: &[N::Reference, N::Text, N::Section, N::Command],
        targets: &[N::Table],
        edges: &[E::TableReference, E::CrossReference],
        description: "reference to a table",
    },
    EdgeRule {
        sources: &[N::Reference, N::Text, N::Section, N::Command],
        targets: &[N::Equation, N::Math],
        edges: &[E::EquationReference, E::CrossReference],
        description: "reference to an equation",
    },
    EdgeRule {
        sources: &[N::Reference, N::Command],
        targets: &[N::Section, N::Abstract, N::Text, N::Environment, N::Reference, N::Citation],
        edges: &[E::CrossReference],
        description: "reference to a labelled element",
    },
    EdgeRule {
        sources: CONTENT,
        targets: CONTENT,
        edges: SEMANTIC,
        description: "argument structure between content",
    },
    EdgeRule {
        sources: &[N::Equation, N::Math, N::Environment],
        targets: &[N::Equation, N::Math, N::Environment],
        edges: &[
            E::VariableRelation,
            E::TheoremDependency,
            E::ProofStep,
            E::Definition,
            E::Assumption,
            E::ConceptDependency,
        ],
        description: "mathematical dependency",
    },
    EdgeRule {
        sources: CONTENT,
        targets: &[N::Command, N::Citation],
        edges: &[
            E::DatasetUsage,
            E::CodeReference,
            E::SupplementaryLink,
            E::ReproducibilityInfo,
            E::BenchmarkReference,
        ],
        description: "external resource",
    },
    EdgeRule {
        sources: &[N::Document],
        targets: &[N::Document],
        edges: &[E::VersionHistory, E::RevisionHistory, E::PeerReviewLink],
        description: "document revisions",
    },
    EdgeRule {
        sources: &[N::Document, N::Section, N::Abstract],
        targets: &[N::Section, N::Text, N::Abstract, N::Document],
        edges: &[E::PeerReviewLink, E::QualityMetric, E::RevisionHistory],
        description: "review annotations",
    },
];

lazy_static! {
    static ref TABLE: FxHashMap<(NodeType, NodeType), Vec<EdgeType>> = {
        let mut table: FxHashMap<(NodeType, NodeType), Vec<EdgeType>> = FxHashMap::default();
        for rule in RULES {
            for source in rule.sources {
                for target in rule.targets {
                    let entry = table.entry((*source, *target)).or_default();
                    for edge in rule.edges {
                        if !entry.contains(edge) {
                            entry.push(*edge);
                        }
                    }
                }
            }
        }
        table
    };
}

/// Edge types allowed from `source` to `target`, excluding the universal
/// Hierarchical fallback.
pub fn allowed_edges(source: NodeType, target: NodeType) -> &'static [EdgeType] {
    TABLE.get(&(source, target)).map(Vec::as_slice).unwrap_or(&[])
}

pub fn is_compatible(source: NodeType, target: NodeType, edge: EdgeType) -> bool {
    edge.is_hierarchical() || allowed_edges(source, target).contains(&edge)
}
