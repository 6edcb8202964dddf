//! Node, edge and annotation types of the semantic graph.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::ast::{AstKind, NodeId};

/// Index of a node slot in a [`super::Dag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DagIndex(pub(crate) usize);

impl DagIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

// =============================================================================
// Node types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeType {
    Document,
    Section,
    Author,
    Abstract,
    Affiliation,
    Citation,
    Reference,
    Figure,
    Table,
    Equation,
    Environment,
    Text,
    Command,
    Math,
    Unknown,
}

impl NodeType {
    pub const ALL: [NodeType; 15] = [
        NodeType::Document,
        NodeType::Section,
        NodeType::Author,
        NodeType::Abstract,
        NodeType::Affiliation,
        NodeType::Citation,
        NodeType::Reference,
        NodeType::Figure,
        NodeType::Table,
        NodeType::Equation,
        NodeType::Environment,
        NodeType::Text,
        NodeType::Command,
        NodeType::Math,
        NodeType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Document => "Document",
            NodeType::Section => "Section",
            NodeType::Author => "Author",
            NodeType::Abstract => "Abstract",
            NodeType::Affiliation => "Affiliation",
            NodeType::Citation => "Citation",
            NodeType::Reference => "Reference",
            NodeType::Figure => "Figure",
            NodeType::Table => "Table",
            NodeType::Equation => "Equation",
            NodeType::Environment => "Environment",
            NodeType::Text => "Text",
            NodeType::Command => "Command",
            NodeType::Math => "Math",
            NodeType::Unknown => "Unknown",
        }
    }

    /// Graph type for an AST node, refined by environment name.
    pub fn from_ast(kind: AstKind, name: Option<&str>) -> NodeType {
        let env = name.map(|n| n.trim_end_matches('*'));
        match kind {
            AstKind::Document => NodeType::Document,
            AstKind::Section | AstKind::Bibliography => NodeType::Section,
            AstKind::Command => NodeType::Command,
            AstKind::Environment => match env {
                Some("figure") | Some("subfigure") | Some("wrapfigure") => NodeType::Figure,
                Some("table") | Some("tabular") | Some("tabularx") => NodeType::Table,
                _ => NodeType::Environment,
            },
            AstKind::Math => match env {
                Some(_) => NodeType::Equation,
                None => NodeType::Math,
            },
            AstKind::Text | AstKind::EnvironmentContent => NodeType::Text,
            AstKind::Label | AstKind::Reference => NodeType::Reference,
            AstKind::Author => NodeType::Author,
            AstKind::Affiliation => NodeType::Affiliation,
            AstKind::Abstract => NodeType::Abstract,
            AstKind::Citation => NodeType::Citation,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Edge types
// =============================================================================

/// Grouping of edge types used for styling and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeFamily {
    Structural,
    Citation,
    Reference,
    Semantic,
    ResearchContext,
    DataResource,
    Domain,
    Validation,
    Contribution,
    Temporal,
    Argument,
    Collaboration,
    Impact,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EdgeType {
    // Structural
    Hierarchical,
    // Citation and reference
    Citation,
    CrossReference,
    FigureReference,
    TableReference,
    EquationReference,
    // Authorship metadata
    AuthorAffiliation,
    AuthorMetadata,
    // Semantic
    ConceptDependency,
    MethodologyFlow,
    DataDependency,
    ResultSupports,
    TheoremDependency,
    ProofStep,
    Definition,
    Assumption,
    // Research context
    RelatedWork,
    PriorWork,
    FutureWork,
    AlternativeApproach,
    Limitation,
    // Data and resources
    DatasetUsage,
    CodeReference,
    SupplementaryLink,
    ReproducibilityInfo,
    // Domain
    ExperimentalSetup,
    VariableRelation,
    StatisticalLink,
    CausalLink,
    // Validation
    ValidationMethod,
    ComparisonLink,
    BenchmarkReference,
    // Contribution
    MainContribution,
    SubContribution,
    NoveltyLink,
    // Temporal
    VersionHistory,
    TimelineLink,
    // Argument
    ArgumentFlow,
    EvidenceSupport,
    CounterArgument,
    // Collaboration
    AuthorContribution,
    TeamCollaboration,
    InstitutionalLink,
    // Impact
    ApplicationDomain,
    ImpactMeasure,
    SocialImpact,
    // Review
    PeerReviewLink,
    RevisionHistory,
    QualityMetric,
}

impl EdgeType {
    pub fn family(self) -> EdgeFamily {
        use EdgeType::*;
        match self {
            Hierarchical => EdgeFamily::Structural,
            Citation => EdgeFamily::Citation,
            CrossReference | FigureReference | TableReference | EquationReference => {
                EdgeFamily::Reference
            }
            AuthorAffiliation | AuthorMetadata | AuthorContribution | TeamCollaboration
            | InstitutionalLink => EdgeFamily::Collaboration,
            ConceptDependency
            | MethodologyFlow
            | DataDependency
            | ResultSupports
            | TheoremDependency
            | ProofStep
            | Definition
            | Assumption => EdgeFamily::Semantic,
            RelatedWork | PriorWork | FutureWork | AlternativeApproach | Limitation => {
                EdgeFamily::ResearchContext
            }
            DatasetUsage | CodeReference | SupplementaryLink | ReproducibilityInfo => {
                EdgeFamily::DataResource
            }
            ExperimentalSetup | VariableRelation | StatisticalLink | CausalLink => {
                EdgeFamily::Domain
            }
            ValidationMethod | ComparisonLink | BenchmarkReference => EdgeFamily::Validation,
            MainContribution | SubContribution | NoveltyLink => EdgeFamily::Contribution,
            VersionHistory | TimelineLink => EdgeFamily::Temporal,
            ArgumentFlow | EvidenceSupport | CounterArgument => EdgeFamily::Argument,
            ApplicationDomain | ImpactMeasure | SocialImpact => EdgeFamily::Impact,
            PeerReviewLink | RevisionHistory | QualityMetric => EdgeFamily::Review,
        }
    }

    pub fn is_hierarchical(self) -> bool {
        self == EdgeType::Hierarchical
    }

    /// Default strength of a relationship when no metadata is recorded.
    pub fn default_weight(self) -> f64 {
        match self.family() {
            EdgeFamily::Structural => 1.0,
            EdgeFamily::Citation | EdgeFamily::Reference => 0.9,
            EdgeFamily::Semantic | EdgeFamily::Argument | EdgeFamily::Contribution => 0.8,
            EdgeFamily::Validation | EdgeFamily::Domain => 0.7,
            _ => 0.6,
        }
    }

    /// GraphViz `color,style` attributes.
    pub fn dot_style(self) -> &'static str {
        match self.family() {
            EdgeFamily::Structural => "color=black",
            EdgeFamily::Citation => "color=blue, style=dashed",
            EdgeFamily::Reference => "color=darkgreen, style=dotted",
            EdgeFamily::Collaboration => "color=purple",
            EdgeFamily::Semantic => "color=orange",
            EdgeFamily::ResearchContext => "color=steelblue, style=dashed",
            EdgeFamily::DataResource => "color=brown",
            EdgeFamily::Domain => "color=goldenrod",
            EdgeFamily::Validation => "color=forestgreen, style=bold",
            EdgeFamily::Contribution => "color=red, style=bold",
            EdgeFamily::Temporal => "color=gray, style=dashed",
            EdgeFamily::Argument => "color=crimson",
            EdgeFamily::Impact => "color=darkorange, style=dotted",
            EdgeFamily::Review => "color=slategray, style=dotted",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// Edges and annotations
// =============================================================================

/// Outgoing edge. `target` is non-owning and may dangle after a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: DagIndex,
    pub edge_type: EdgeType,
    pub label: Option<String>,
}

/// Mirror of an [`Edge`] stored on its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEdge {
    pub source: DagIndex,
    pub edge_type: EdgeType,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SemanticInfo {
    pub concept_type: String,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub importance: f64,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Provenance of a typed relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipMetadata {
    pub confidence: f64,
    pub evidence: String,
    pub context: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl RelationshipMetadata {
    pub fn new(confidence: f64, evidence: impl Into<String>) -> Self {
        RelationshipMetadata {
            confidence: confidence.clamp(0.0, 1.0),
            evidence: evidence.into(),
            context: String::new(),
            properties: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A graph node.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub id: String,
    pub node_type: NodeType,
    pub content: String,
    pub(crate) outgoing: Vec<Edge>,
    pub(crate) incoming: Vec<IncomingEdge>,
    pub(crate) ast_node: Option<NodeId>,
    pub semantic: Option<SemanticInfo>,
    pub(crate) relationships: Vec<((EdgeType, DagIndex), RelationshipMetadata)>,
}

impl DagNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, content: impl Into<String>) -> Self {
        DagNode {
            id: id.into(),
            node_type,
            content: content.into(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            ast_node: None,
            semantic: None,
            relationships: Vec::new(),
        }
    }

    pub fn outgoing(&self) -> &[Edge] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[IncomingEdge] {
        &self.incoming
    }

    pub fn ast_node(&self) -> Option<NodeId> {
        self.ast_node
    }

    pub fn has_edge(&self, target: DagIndex, edge_type: EdgeType) -> bool {
        self.outgoing
            .iter()
            .any(|e| e.target == target && e.edge_type == edge_type)
    }

    pub fn relationship(
        &self,
        edge_type: EdgeType,
        target: DagIndex,
    ) -> Option<&RelationshipMetadata> {
        self.relationships
            .iter()
            .find(|(key, _)| *key == (edge_type, target))
            .map(|(_, meta)| meta)
    }

    pub(crate) fn set_relationship(
        &mut self,
        edge_type: EdgeType,
        target: DagIndex,
        meta: RelationshipMetadata,
    ) {
        match self.relationships.iter_mut().find(|(key, _)| *key == (edge_type, target)) {
            Some((_, existing)) => *existing = meta,
            None => self.relationships.push(((edge_type, target), meta)),
        }
    }
}

/// Change notification delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    Added,
    Removed,
    Modified,
}

/// A path between two nodes with an aggregate strength.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathInfo {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeType>,
    pub strength: f64,
    pub description: String,
}
