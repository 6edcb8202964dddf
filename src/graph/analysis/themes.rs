use fxhash::{FxHashMap, FxHashSet};
use phf::phf_set;
use serde::Serialize;

use super::super::types::{EdgeType, NodeType};
use super::super::Dag;

static STOPWORDS: phf::Set<&'static str> = phf_set! {
    "this", "that", "these", "those", "with", "from", "have", "has", "been",
    "were", "which", "their", "there", "they", "then", "than", "into", "also",
    "such", "each", "what", "when", "where", "while", "will", "would", "could",
    "should", "about", "between", "through", "over", "under", "more", "most",
    "some", "only", "other", "both", "very", "here", "them", "using", "used",
    "upon", "does", "your", "ours", "because", "however", "therefore", "thus",
    "section", "figure", "table", "paper", "show", "shows", "shown",
};

/// A recurring content word and its weighted score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Theme {
    pub word: String,
    pub score: f64,
    /// Number of distinct nodes the word appears in
    pub contexts: usize,
}

/// Lower-case words longer than three characters that are not stopwords.
pub(crate) fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3 && !w.chars().all(|c| c.is_numeric()))
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(w.as_str()))
}

fn type_weight(node_type: NodeType) -> f64 {
    match node_type {
        NodeType::Abstract => 3.0,
        NodeType::Section => 2.0,
        NodeType::Author => 0.5,
        _ => 1.0,
    }
}

fn edge_weight(edge: EdgeType) -> f64 {
    match edge {
        EdgeType::MainContribution => 2.0,
        EdgeType::RelatedWork => 1.5,
        EdgeType::ResultSupports => 1.3,
        _ => 1.0,
    }
}

impl Dag {
    /// Highest scoring content words. Scores are normalized by the best raw
    /// score and scaled by `ln(1 + number of contexts)`.
    pub fn extract_key_themes(&self, limit: usize) -> Vec<Theme> {
        let mut raw: FxHashMap<String, f64> = FxHashMap::default();
        let mut contexts: FxHashMap<String, FxHashSet<usize>> = FxHashMap::default();

        for (idx, node) in self.nodes() {
            if matches!(node.node_type, NodeType::Math | NodeType::Command | NodeType::Equation) {
                continue;
            }
            let multiplier = self
                .live_edges(idx)
                .map(|e| edge_weight(e.edge_type))
                .fold(1.0, f64::max);
            let weight = type_weight(node.node_type) * multiplier;
            for word in content_words(&node.content) {
                *raw.entry(word.clone()).or_default() += weight;
                contexts.entry(word).or_default().insert(idx.index());
            }
        }

        let max = raw.values().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        let mut themes: Vec<Theme> = raw
            .into_iter()
            .map(|(word, score)| {
                let diversity = contexts.get(&word).map_or(0, |c| c.len());
                Theme {
                    score: score / max * (1.0 + diversity as f64).ln(),
                    contexts: diversity,
                    word,
                }
            })
            .collect();
        themes.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));
        themes.truncate(limit);
        themes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_words_filters() {
        let words: Vec<String> =
            content_words("We show that Graph-based parsing with 2024 results").collect();
        assert_eq!(words, vec!["graph", "based", "parsing", "results"]);
    }

    #[test]
    fn test_abstract_and_contribution_weighting() {
        let mut dag = Dag::new();
        dag.add_node("abs", NodeType::Abstract, "Transformers for parsing");
        let text = dag.add_node("t", NodeType::Text, "parsing trees and parsing forests");
        dag.add_node("m", NodeType::Math, "$transformers$");
        let claim = dag.add_node("c", NodeType::Section, "Contributions");
        dag.add_edge(text, claim, EdgeType::MainContribution, None).unwrap();

        let themes = dag.extract_key_themes(10);
        let parsing = themes.iter().find(|t| t.word == "parsing").unwrap();
        assert_eq!(parsing.contexts, 2);
        assert_eq!(themes[0].word, "parsing");
        // the abstract counts, the math node does not
        let transformers = themes.iter().find(|t| t.word == "transformers").unwrap();
        assert_eq!(transformers.contexts, 1);
    }
}
