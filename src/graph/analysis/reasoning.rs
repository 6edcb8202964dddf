//! Consistency checks over the argument structure of a paper. Every check
//! returns human-readable findings; an empty list means nothing was found.

use fxhash::FxHashSet;
use indexmap::IndexMap;

use super::super::types::{DagIndex, DagNode, EdgeType, NodeType};
use super::super::Dag;
use super::structure::SectionRole;
use crate::utils::text::truncate_chars;

const LABEL_LEN: usize = 40;

const COMPANIONS: &[&[EdgeType]] = &[
    &[EdgeType::DataDependency],
    &[EdgeType::MethodologyFlow],
    &[EdgeType::ResultSupports, EdgeType::EvidenceSupport],
    &[EdgeType::ValidationMethod],
];

fn label(node: &DagNode) -> String {
    if node.content.is_empty() {
        node.id.clone()
    } else {
        truncate_chars(&node.content, LABEL_LEN)
    }
}

impl Dag {
    fn has_incoming(&self, idx: DagIndex, types: &[EdgeType]) -> bool {
        self.live_incoming(idx).any(|e| types.contains(&e.edge_type))
    }

    fn has_outgoing(&self, idx: DagIndex, types: &[EdgeType]) -> bool {
        self.live_edges(idx).any(|e| types.contains(&e.edge_type))
    }

    fn targets_of(&self, edge_type: EdgeType) -> Vec<DagIndex> {
        let mut seen = FxHashSet::default();
        self.nodes()
            .flat_map(|(idx, _)| self.live_edges(idx).collect::<Vec<_>>())
            .filter(|e| e.edge_type == edge_type)
            .map(|e| e.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// For each concept with ConceptDependency or Definition edges, every
    /// concept it transitively depends on. Cycles are cut at the first
    /// revisit.
    pub fn build_concept_hierarchy(&self) -> IndexMap<String, Vec<String>> {
        const DEPENDENCY: &[EdgeType] = &[EdgeType::ConceptDependency, EdgeType::Definition];
        let deps = |idx: DagIndex| -> Vec<DagIndex> {
            self.live_edges(idx)
                .filter(|e| DEPENDENCY.contains(&e.edge_type))
                .map(|e| e.target)
                .collect()
        };

        let mut done: IndexMap<DagIndex, Vec<DagIndex>> = IndexMap::new();
        let roots: Vec<DagIndex> = self.indices().filter(|idx| !deps(*idx).is_empty()).collect();
        for root in &roots {
            let mut in_progress = FxHashSet::default();
            let mut stack = vec![(*root, false)];
            while let Some((node, expanded)) = stack.pop() {
                if expanded {
                    in_progress.remove(&node);
                    let mut closure: Vec<DagIndex> = Vec::new();
                    for dep in deps(node) {
                        let inherited = done.get(&dep).cloned().unwrap_or_default();
                        for d in std::iter::once(dep).chain(inherited) {
                            if d != node && !closure.contains(&d) {
                                closure.push(d);
                            }
                        }
                    }
                    done.insert(node, closure);
                    continue;
                }
                if done.contains_key(&node) || !in_progress.insert(node) {
                    continue;
                }
                stack.push((node, true));
                for dep in deps(node) {
                    if !done.contains_key(&dep) && !in_progress.contains(&dep) {
                        stack.push((dep, false));
                    }
                }
            }
        }

        roots
            .iter()
            .filter_map(|root| {
                let id = self.id_of(*root)?.to_string();
                let closure = done
                    .get(root)?
                    .iter()
                    .filter_map(|d| self.id_of(*d).map(str::to_string))
                    .collect();
                Some((id, closure))
            })
            .collect()
    }

    /// Companion edge groups a methodology section or claim is expected to
    /// touch, in either direction, that are absent for `idx`.
    fn missing_companions(&self, idx: DagIndex) -> Vec<String> {
        COMPANIONS
            .iter()
            .filter(|group| !self.has_outgoing(idx, group) && !self.has_incoming(idx, group))
            .map(|group| group.iter().map(EdgeType::to_string).collect::<Vec<_>>().join("/"))
            .collect()
    }

    /// Sections whose title reads as methodology, one finding per missing
    /// companion edge type.
    pub fn validate_methodology_completeness(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for (idx, node) in self.nodes() {
            if node.node_type != NodeType::Section
                || SectionRole::classify(&node.content) != SectionRole::Methodology
            {
                continue;
            }
            for missing in self.missing_companions(idx) {
                findings.push(format!(
                    "methodology section '{}' has no {} edge",
                    label(node),
                    missing
                ));
            }
        }
        findings
    }

    /// Claims are nodes with an outgoing MainContribution or
    /// SubContribution edge, one finding per missing companion edge type.
    pub fn validate_evidence_chain(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for (idx, node) in self.nodes() {
            if !self.has_outgoing(idx, &[EdgeType::MainContribution, EdgeType::SubContribution]) {
                continue;
            }
            for missing in self.missing_companions(idx) {
                findings.push(format!("claim '{}' has no {} edge", label(node), missing));
            }
        }
        findings
    }

    /// Unvalidated assumptions and argument chains that end without
    /// evidence.
    pub fn identify_logical_gaps(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for target in self.targets_of(EdgeType::Assumption) {
            let validated =
                self.has_incoming(target, &[EdgeType::ValidationMethod, EdgeType::EvidenceSupport]);
            if !validated {
                if let Some(node) = self.node(target) {
                    findings.push(format!("assumption '{}' is never validated", label(node)));
                }
            }
        }
        for target in self.targets_of(EdgeType::ArgumentFlow) {
            let continues = self.has_outgoing(target, &[EdgeType::ArgumentFlow]);
            let supported = self.has_incoming(
                target,
                &[EdgeType::EvidenceSupport, EdgeType::ResultSupports, EdgeType::StatisticalLink],
            );
            if !continues && !supported {
                if let Some(node) = self.node(target) {
                    findings.push(format!(
                        "argument ends at '{}' without supporting evidence",
                        label(node)
                    ));
                }
            }
        }
        for target in self.targets_of(EdgeType::ConceptDependency) {
            let defined = self.has_incoming(target, &[EdgeType::Definition])
                || self.has_outgoing(target, &[EdgeType::Definition]);
            if !defined {
                if let Some(node) = self.node(target) {
                    if node.node_type != NodeType::Citation {
                        findings
                            .push(format!("concept '{}' is used but never defined", label(node)));
                    }
                }
            }
        }
        findings
    }

    /// Limitations without follow-up and bibliography entries nobody
    /// cites.
    pub fn identify_research_gaps(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for target in self.targets_of(EdgeType::Limitation) {
            let addressed = self.has_incoming(target, &[EdgeType::FutureWork])
                || self
                    .has_outgoing(target, &[EdgeType::FutureWork, EdgeType::AlternativeApproach]);
            if !addressed {
                if let Some(node) = self.node(target) {
                    findings.push(format!(
                        "limitation '{}' has no proposed future work",
                        label(node)
                    ));
                }
            }
        }
        for (idx, node) in self.nodes() {
            if node.node_type != NodeType::Citation || node.ast_node().is_none() {
                continue;
            }
            let cited = self
                .live_incoming(idx)
                .any(|e| !e.edge_type.is_hierarchical());
            if !cited {
                findings.push(format!("bibliography entry '{}' is never cited", node.content));
            }
        }
        findings
    }

    /// Pairs linked by CounterArgument, flagged harder when the same pair
    /// is also linked by a supporting edge.
    pub fn find_contradictions(&self) -> Vec<String> {
        const SUPPORT: &[EdgeType] = &[EdgeType::EvidenceSupport, EdgeType::ResultSupports];
        let mut findings = Vec::new();
        for (idx, node) in self.nodes() {
            for edge in self.live_edges(idx).filter(|e| e.edge_type == EdgeType::CounterArgument) {
                let target = match self.node(edge.target) {
                    Some(t) => t,
                    None => continue,
                };
                let supports = SUPPORT.iter().any(|s| node.has_edge(edge.target, *s));
                if supports {
                    findings.push(format!(
                        "'{}' both supports and argues against '{}'",
                        label(node),
                        label(target)
                    ));
                } else {
                    findings.push(format!("'{}' argues against '{}'", label(node), label(target)));
                }
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Dag, EdgeType, NodeType};

    #[test]
    fn test_concept_hierarchy_handles_cycles() {
        let mut dag = Dag::new();
        let a = dag.add_node("a", NodeType::Text, "graph");
        let b = dag.add_node("b", NodeType::Text, "node");
        let c = dag.add_node("c", NodeType::Text, "edge");
        dag.add_edge(a, b, EdgeType::ConceptDependency, None).unwrap();
        dag.add_edge(b, c, EdgeType::Definition, None).unwrap();
        dag.add_edge(c, a, EdgeType::ConceptDependency, None).unwrap();

        let hierarchy = dag.build_concept_hierarchy();
        assert_eq!(hierarchy.len(), 3);
        assert_eq!(hierarchy["a"], vec!["b", "c"]);
        assert!(hierarchy["b"].contains(&"c".to_string()));
    }

    #[test]
    fn test_claims_are_contribution_sources() {
        let mut dag = Dag::new();
        let intro = dag.add_node("intro", NodeType::Section, "Introduction");
        let results = dag.add_node("results", NodeType::Section, "Results");
        dag.add_edge(intro, results, EdgeType::MainContribution, None).unwrap();

        assert_eq!(
            dag.validate_evidence_chain(),
            vec![
                "claim 'Introduction' has no DataDependency edge",
                "claim 'Introduction' has no MethodologyFlow edge",
                "claim 'Introduction' has no ResultSupports/EvidenceSupport edge",
                "claim 'Introduction' has no ValidationMethod edge",
            ]
        );

        let data = dag.add_node("data", NodeType::Text, "ImageNet");
        let method = dag.add_node("method", NodeType::Section, "Approach");
        dag.add_edge(intro, data, EdgeType::DataDependency, None).unwrap();
        dag.add_edge(method, intro, EdgeType::MethodologyFlow, None).unwrap();
        dag.add_edge(results, intro, EdgeType::EvidenceSupport, None).unwrap();
        assert_eq!(
            dag.validate_evidence_chain(),
            vec!["claim 'Introduction' has no ValidationMethod edge"]
        );
        dag.add_edge(results, intro, EdgeType::ValidationMethod, None).unwrap();
        assert!(dag.validate_evidence_chain().is_empty());
    }

    #[test]
    fn test_methodology_section_reports_each_missing_edge() {
        let mut dag = Dag::new();
        let methods = dag.add_node("methods", NodeType::Section, "Methods");
        let experiments = dag.add_node("exp", NodeType::Section, "Experimental Results");
        let results = dag.add_node("results", NodeType::Section, "Results");
        dag.add_edge(methods, experiments, EdgeType::MethodologyFlow, None).unwrap();
        dag.add_edge(results, methods, EdgeType::ValidationMethod, None).unwrap();

        assert_eq!(
            dag.validate_methodology_completeness(),
            vec![
                "methodology section 'Methods' has no DataDependency edge",
                "methodology section 'Methods' has no ResultSupports/EvidenceSupport edge",
            ]
        );

        let data = dag.add_node("data", NodeType::Text, "survey responses");
        dag.add_edge(methods, data, EdgeType::DataDependency, None).unwrap();
        dag.add_edge(methods, results, EdgeType::ResultSupports, None).unwrap();
        assert!(dag.validate_methodology_completeness().is_empty());
    }

    #[test]
    fn test_research_gaps_and_contradictions() {
        let mut dag = Dag::new();
        let results = dag.add_node("r", NodeType::Section, "Results");
        let limits = dag.add_node("l", NodeType::Text, "Only English data");
        let other = dag.add_node("o", NodeType::Text, "Prior claim");
        dag.add_edge(results, limits, EdgeType::Limitation, None).unwrap();
        dag.add_edge(results, other, EdgeType::CounterArgument, None).unwrap();
        dag.add_edge(results, other, EdgeType::ResultSupports, None).unwrap();

        let gaps = dag.identify_research_gaps();
        assert_eq!(gaps, vec!["limitation 'Only English data' has no proposed future work"]);
        let contradictions = dag.find_contradictions();
        assert_eq!(
            contradictions,
            vec!["'Results' both supports and argues against 'Prior claim'"]
        );
    }

    #[test]
    fn test_logical_gaps() {
        let mut dag = Dag::new();
        let a = dag.add_node("a", NodeType::Text, "premise");
        let b = dag.add_node("b", NodeType::Text, "conclusion");
        let c = dag.add_node("c", NodeType::Text, "iid data");
        dag.add_edge(a, b, EdgeType::ArgumentFlow, None).unwrap();
        dag.add_edge(a, c, EdgeType::Assumption, None).unwrap();
        let gaps = dag.identify_logical_gaps();
        assert!(gaps.contains(&"assumption 'iid data' is never validated".to_string()));
        let unsupported = "argument ends at 'conclusion' without supporting evidence";
        assert!(gaps.contains(&unsupported.to_string()));
    }
}
