use std::collections::BTreeMap;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::super::types::{DagIndex, EdgeType, NodeType};
use super::super::Dag;

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b([0-9]{4})\b").unwrap();
}

/// Citation statistics for the whole paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CitationAnalysis {
    /// Incoming citation count per cited work, in first-seen order
    pub counts: IndexMap<String, usize>,
    /// Most cited works, highest first
    pub most_cited: Vec<(String, usize)>,
    /// Text around each citation, per cited work
    pub contexts: IndexMap<String, Vec<String>>,
    /// Cited works grouped by publication year
    pub by_year: BTreeMap<u16, Vec<String>>,
}

/// First plausible publication year in the text.
pub(crate) fn extract_year(text: &str) -> Option<u16> {
    YEAR.captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
        .find(|y| (1500..=2100).contains(y))
}

impl Dag {
    pub fn analyze_citations(&self, top: usize) -> CitationAnalysis {
        let mut analysis = CitationAnalysis::default();

        for (idx, node) in self.nodes().filter(|(_, n)| n.node_type == NodeType::Citation) {
            let citing: Vec<DagIndex> = self
                .live_incoming(idx)
                .filter(|e| e.edge_type != EdgeType::Hierarchical)
                .map(|e| e.source)
                .collect();
            analysis.counts.insert(node.content.clone(), citing.len());

            let contexts: Vec<String> = citing
                .iter()
                .filter_map(|source| self.citation_context(*source))
                .collect();
            if !contexts.is_empty() {
                analysis.contexts.insert(node.content.clone(), contexts);
            }

            // The key itself may carry the year (`knuth1984`); the
            // bibliography entry text is the better source.
            let entry_text: Vec<&str> = self
                .hierarchical_children(idx)
                .filter_map(|c| self.node(c).map(|n| n.content.as_str()))
                .collect();
            let year = extract_year(&entry_text.join(" ")).or_else(|| extract_year(&node.content));
            if let Some(year) = year {
                analysis.by_year.entry(year).or_default().push(node.content.clone());
            }
        }

        let mut ranked: Vec<(String, usize)> = analysis
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top);
        analysis.most_cited = ranked;
        analysis
    }

    /// Readable context for a citing node: its own text, or for a bare
    /// citation command the innermost section or container around it.
    fn citation_context(&self, source: DagIndex) -> Option<String> {
        let node = self.node(source)?;
        if node.node_type != NodeType::Reference && !node.content.is_empty() {
            return Some(node.content.clone());
        }
        self.live_incoming(source)
            .filter(|e| e.edge_type.is_hierarchical())
            .filter_map(|e| self.node(e.source))
            .filter(|n| n.node_type != NodeType::Document)
            .last()
            .map(|n| n.content.clone())
            .or_else(|| Some(node.content.clone()))
    }
}
