//! Paper-level structure: section roles, inferred relationships between
//! sections, and per-node semantic annotation.

use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::super::types::{DagIndex, EdgeType, NodeType, RelationshipMetadata, SemanticInfo};
use super::super::Dag;
use super::themes::content_words;
use crate::core::options::AnalysisOptions;

/// Rhetorical role of a section, guessed from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionRole {
    Introduction,
    RelatedWork,
    Methodology,
    Experiments,
    Results,
    Discussion,
    Limitations,
    FutureWork,
    Conclusion,
    Other,
}

impl SectionRole {
    pub fn classify(title: &str) -> SectionRole {
        let t = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
        if has(&["introduction", "motivation", "overview"]) {
            SectionRole::Introduction
        } else if has(&["related work", "background", "prior work", "literature"]) {
            SectionRole::RelatedWork
        } else if has(&["limitation", "threats to validity"]) {
            SectionRole::Limitations
        } else if has(&["future work", "outlook", "open problems"]) {
            SectionRole::FutureWork
        } else if has(&["method", "approach", "model", "algorithm", "framework", "design"]) {
            SectionRole::Methodology
        } else if has(&["experiment", "evaluation", "setup", "implementation"]) {
            SectionRole::Experiments
        } else if has(&["result", "findings", "analysis", "ablation"]) {
            SectionRole::Results
        } else if has(&["discussion"]) {
            SectionRole::Discussion
        } else if has(&["conclusion", "summary", "concluding"]) {
            SectionRole::Conclusion
        } else {
            SectionRole::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SectionRole::Introduction => "introduction",
            SectionRole::RelatedWork => "related-work",
            SectionRole::Methodology => "methodology",
            SectionRole::Experiments => "experiments",
            SectionRole::Results => "results",
            SectionRole::Discussion => "discussion",
            SectionRole::Limitations => "limitations",
            SectionRole::FutureWork => "future-work",
            SectionRole::Conclusion => "conclusion",
            SectionRole::Other => "other",
        }
    }
}

/// Summary of how a paper is put together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaperStructure {
    pub outline: Vec<(String, SectionRole)>,
    pub main_contributions: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub methodology_steps: Vec<String>,
    pub critical_assumptions: Vec<String>,
    /// Share of each key theme, summing to 1
    pub topic_distribution: IndexMap<String, f64>,
}

const INFERRED_CONFIDENCE: f64 = 0.6;

impl Dag {
    fn sections_with_roles(&self) -> Vec<(DagIndex, SectionRole)> {
        self.nodes()
            .filter(|(_, n)| n.node_type == NodeType::Section)
            .map(|(idx, n)| (idx, SectionRole::classify(&n.content)))
            .collect()
    }

    fn contents(&self, nodes: impl IntoIterator<Item = DagIndex>) -> Vec<String> {
        let mut seen = FxHashSet::default();
        nodes
            .into_iter()
            .filter(|idx| seen.insert(*idx))
            .filter_map(|idx| self.node(idx).map(|n| n.content.clone()))
            .collect()
    }

    fn edge_endpoints(&self, types: &[EdgeType]) -> Vec<(DagIndex, DagIndex)> {
        self.nodes()
            .flat_map(|(idx, _)| {
                self.live_edges(idx)
                    .filter(|e| types.contains(&e.edge_type))
                    .map(move |e| (idx, e.target))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Link sections by their rhetorical roles: methodology sections form
    /// a flow, results support the conclusion, limitations lead to future
    /// work, and related-work sections mark the citations they discuss.
    /// Returns the number of edges added.
    pub fn infer_section_relationships(&mut self) -> usize {
        let sections = self.sections_with_roles();
        let first = |role: SectionRole| sections.iter().find(|(_, r)| *r == role).map(|(i, _)| *i);
        let all = |roles: &[SectionRole]| -> Vec<DagIndex> {
            sections
                .iter()
                .filter(|(_, r)| roles.contains(r))
                .map(|(i, _)| *i)
                .collect()
        };

        let mut planned: Vec<(DagIndex, DagIndex, EdgeType)> = Vec::new();

        let flow = all(&[SectionRole::Methodology, SectionRole::Experiments]);
        for pair in flow.windows(2) {
            planned.push((pair[0], pair[1], EdgeType::MethodologyFlow));
        }
        if let (Some(intro), Some(method)) = (first(SectionRole::Introduction), flow.first()) {
            planned.push((intro, *method, EdgeType::ArgumentFlow));
        }
        let results = all(&[SectionRole::Results, SectionRole::Experiments]);
        let first_result = results.iter().find(|r| !flow.contains(r));
        if let (Some(last_step), Some(result)) = (flow.last(), first_result) {
            planned.push((*last_step, *result, EdgeType::MethodologyFlow));
        }
        for conclusion in all(&[SectionRole::Conclusion]) {
            for result in &results {
                planned.push((*result, conclusion, EdgeType::ResultSupports));
            }
            if let Some(discussion) = first(SectionRole::Discussion) {
                planned.push((discussion, conclusion, EdgeType::ArgumentFlow));
            }
        }
        let anchor = first(SectionRole::Results)
            .or_else(|| first(SectionRole::Discussion))
            .or_else(|| first(SectionRole::Conclusion));
        for limitation in all(&[SectionRole::Limitations]) {
            if let Some(anchor) = anchor {
                planned.push((anchor, limitation, EdgeType::Limitation));
            }
            for future in all(&[SectionRole::FutureWork]) {
                planned.push((limitation, future, EdgeType::FutureWork));
            }
        }
        for related in all(&[SectionRole::RelatedWork]) {
            for cited in self.citations_under(related) {
                planned.push((related, cited, EdgeType::RelatedWork));
            }
        }

        let mut added = 0;
        for (source, target, edge) in planned {
            if source == target {
                continue;
            }
            let evidence = format!(
                "section roles {} -> {}",
                self.id_of(source).unwrap_or("?"),
                self.id_of(target).unwrap_or("?")
            );
            let meta = RelationshipMetadata::new(INFERRED_CONFIDENCE, evidence)
                .with_property("inferred", true);
            let existed = self.has_edge(source, target, edge);
            match self.add_edge_with_metadata(source, target, edge, None, meta) {
                Ok(()) if !existed => added += 1,
                Ok(()) => {}
                Err(rejection) => debug!(%rejection, "inferred edge rejected"),
            }
        }
        debug!(added, "inferred section relationships");
        added
    }

    /// Citation nodes cited anywhere below `section` in the hierarchy.
    fn citations_under(&self, section: DagIndex) -> Vec<DagIndex> {
        let mut found = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![section];
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            for edge in self.live_edges(next) {
                if edge.edge_type.is_hierarchical() {
                    stack.push(edge.target);
                } else if edge.edge_type == EdgeType::Citation && !found.contains(&edge.target) {
                    found.push(edge.target);
                }
            }
        }
        found
    }

    pub fn analyze_paper_structure(&self, options: &AnalysisOptions) -> PaperStructure {
        let sections = self.sections_with_roles();
        let mut contributions: Vec<DagIndex> = self
            .edge_endpoints(&[EdgeType::MainContribution, EdgeType::SubContribution])
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        contributions.extend(
            sections
                .iter()
                .filter(|(idx, _)| {
                    self.node(*idx)
                        .map_or(false, |n| n.content.to_lowercase().contains("contribution"))
                })
                .map(|(idx, _)| *idx),
        );

        let evidence = self
            .edge_endpoints(&[EdgeType::EvidenceSupport, EdgeType::ResultSupports])
            .into_iter()
            .map(|(s, _)| s);
        let assumptions = self
            .edge_endpoints(&[EdgeType::Assumption])
            .into_iter()
            .map(|(_, t)| t);

        let mut methodology: Vec<String> = self
            .track_methodology_flow()
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(&id).map(|n| n.content.clone()))
            .collect();
        if methodology.is_empty() {
            methodology = self.contents(
                sections
                    .iter()
                    .filter(|(_, r)| *r == SectionRole::Methodology)
                    .map(|(i, _)| *i),
            );
        }

        let themes = self.extract_key_themes(options.theme_limit);
        let total: f64 = themes.iter().map(|t| t.score).sum();
        let topic_distribution = if total > 0.0 {
            themes.into_iter().map(|t| (t.word, t.score / total)).collect()
        } else {
            IndexMap::new()
        };

        PaperStructure {
            outline: sections
                .iter()
                .filter_map(|(idx, role)| self.node(*idx).map(|n| (n.content.clone(), *role)))
                .collect(),
            main_contributions: self.contents(contributions),
            supporting_evidence: self.contents(evidence),
            methodology_steps: methodology,
            critical_assumptions: self.contents(assumptions),
            topic_distribution,
        }
    }

    /// Attach a [`SemanticInfo`] to every node: concept type, top keywords,
    /// the key themes it mentions, and normalized centrality as importance.
    pub fn annotate_semantics(&mut self, options: &AnalysisOptions) {
        let centrality = self.centrality_with(options);
        let max = centrality.max_score();
        let themes: FxHashSet<String> = self
            .extract_key_themes(options.theme_limit)
            .into_iter()
            .map(|t| t.word)
            .collect();

        let annotations: Vec<(DagIndex, SemanticInfo)> = self
            .nodes()
            .map(|(idx, node)| {
                let concept_type = match node.node_type {
                    NodeType::Section => SectionRole::classify(&node.content).as_str().to_string(),
                    other => other.as_str().to_lowercase(),
                };
                let mut counts: FxHashMap<String, usize> = FxHashMap::default();
                for word in content_words(&node.content) {
                    *counts.entry(word).or_default() += 1;
                }
                let mut keywords: Vec<(String, usize)> = counts.into_iter().collect();
                keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let keywords: Vec<String> = keywords.into_iter().take(5).map(|(w, _)| w).collect();
                let topics = keywords.iter().filter(|w| themes.contains(*w)).cloned().collect();

                let mut properties = serde_json::Map::new();
                let degree = self.live_edges(idx).count() + self.live_incoming(idx).count();
                properties.insert("degree".to_string(), serde_json::Value::from(degree));
                let importance = if max > 0.0 { centrality.score(&node.id) / max } else { 0.0 };
                (
                    idx,
                    SemanticInfo {
                        concept_type,
                        keywords,
                        topics,
                        importance,
                        properties,
                    },
                )
            })
            .collect();

        for (idx, info) in annotations {
            self.set_semantic(idx, info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::ParseOptions;
    use crate::core::parser::parse;
    use crate::graph::GraphBuilder;

    const PAPER: &str = r"\section{Introduction}We study parsing.
\section{Related Work}Parsing was studied in \cite{earley70}.
\section{Method}We parse with a graph.
\section{Experiments}We run on arXiv.
\section{Results}Parsing improves.
\section{Limitations}Only English.
\section{Future Work}More languages.
\section{Conclusion}Graphs help parsing.";

    fn graph() -> Dag {
        let mut doc = parse(PAPER);
        GraphBuilder::new(&ParseOptions::default()).build(&mut doc.ast).0
    }

    #[test]
    fn test_section_roles() {
        assert_eq!(SectionRole::classify("2 Related Work"), SectionRole::RelatedWork);
        assert_eq!(SectionRole::classify("Our Approach"), SectionRole::Methodology);
        assert_eq!(SectionRole::classify("Experimental Setup"), SectionRole::Experiments);
        assert_eq!(SectionRole::classify("Acknowledgements"), SectionRole::Other);
    }

    #[test]
    fn test_inferred_relationships() {
        let mut dag = graph();
        let added = dag.infer_section_relationships();
        assert!(added >= 6);
        let flows = dag.track_methodology_flow();
        let contents: Vec<String> = flows[0]
            .iter()
            .map(|id| dag.get(id).unwrap().content.clone())
            .collect();
        assert_eq!(contents, vec!["Method", "Experiments", "Results"]);
        assert!(dag.identify_research_gaps().is_empty());
        let related = dag.find_nodes_by_type(NodeType::Section)[1].id.clone();
        assert_eq!(
            dag.find_connected_nodes(&related, EdgeType::RelatedWork)[0].id,
            "citation:earley70"
        );

        assert_eq!(dag.infer_section_relationships(), 0);
    }

    #[test]
    fn test_structure_and_annotation() {
        let mut dag = graph();
        dag.infer_section_relationships();
        let options = AnalysisOptions::default();
        let structure = dag.analyze_paper_structure(&options);
        assert_eq!(structure.outline.len(), 8);
        assert_eq!(structure.outline[2], ("Method".to_string(), SectionRole::Methodology));
        assert_eq!(structure.methodology_steps, vec!["Method", "Experiments", "Results"]);
        assert!(structure.supporting_evidence.contains(&"Results".to_string()));
        let total: f64 = structure.topic_distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-9);

        dag.annotate_semantics(&options);
        let method = dag.nodes().find(|(_, n)| n.content == "Method").unwrap().1;
        let info = method.semantic.as_ref().unwrap();
        assert_eq!(info.concept_type, "methodology");
        assert!(info.importance > 0.0 && info.importance <= 1.0);
    }
}
