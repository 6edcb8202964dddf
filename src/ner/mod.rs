//! Named-entity helpers for front matter.
//!
//! [`Ner::parse_latex`] scans raw source for author and affiliation commands
//! and stages them through the same [`EntityCollector`] the traversal uses,
//! so both paths produce identical graph nodes. [`Ner::annotate_with_crf`]
//! tags a loose token sequence with the seed-trained [`CrfModel`].

pub mod crf;
pub mod patterns;

use serde::Serialize;
use tracing::debug;

use self::crf::{seed_examples, CrfModel, Label};
use self::patterns::{AFFILIATION_COMMAND, AUTHOR_COMMAND};
use crate::graph::{Dag, DagIndex};
use crate::traversal::{EntityCollector, EntityOutput};
use crate::utils::text::extract_content_between_braces;

/// Training passes over the seed sequences.
pub const SEED_EPOCHS: usize = 5;
pub const SEED_LEARNING_RATE: f64 = 0.1;

/// A CRF trained on the built-in seed sequences.
pub fn trained_seed_model() -> CrfModel {
    let mut model = CrfModel::new();
    let loss = model.train(&seed_examples(), SEED_EPOCHS, SEED_LEARNING_RATE);
    debug!(loss, "trained seed crf");
    model
}

/// A run of consecutive tokens sharing one entity label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySpan {
    pub label: Label,
    pub text: String,
}

/// Entity names seen so far, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityMap {
    pub authors: Vec<String>,
    pub affiliations: Vec<String>,
}

impl EntityMap {
    fn record(list: &mut Vec<String>, name: &str) {
        if !name.is_empty() && !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }
}

#[derive(Debug, Default)]
pub struct Ner {
    crf: Option<CrfModel>,
    entities: EntityMap,
}

enum Match<'a> {
    Author { option: Option<&'a str> },
    Affiliation { command: &'a str, option: Option<&'a str> },
}

impl Ner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train the seed model up front.
    pub fn with_crf() -> Self {
        Ner {
            crf: Some(trained_seed_model()),
            entities: EntityMap::default(),
        }
    }

    pub fn crf(&self) -> Option<&CrfModel> {
        self.crf.as_ref()
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    /// Extract author and affiliation commands from raw source, add their
    /// nodes to `graph` (under `anchor`, when given) and return the paired
    /// records.
    pub fn parse_latex(
        &mut self,
        source: &str,
        graph: &mut Dag,
        anchor: Option<DagIndex>,
    ) -> EntityOutput {
        let mut found: Vec<(usize, usize, Match<'_>)> = Vec::new();
        for caps in AUTHOR_COMMAND.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            found.push((
                whole.start(),
                whole.end(),
                Match::Author {
                    option: caps.get(1).map(|m| m.as_str()),
                },
            ));
        }
        for caps in AFFILIATION_COMMAND.captures_iter(source) {
            let (Some(whole), Some(command)) = (caps.get(0), caps.get(1)) else { continue };
            found.push((
                whole.start(),
                whole.end(),
                Match::Affiliation {
                    command: command.as_str(),
                    option: caps.get(2).map(|m| m.as_str()),
                },
            ));
        }
        found.sort_by_key(|(start, _, _)| *start);

        let mut collector = EntityCollector::new();
        // Commands nested in an argument already consumed are part of it
        let mut consumed = 0;
        for (start, end, found) in found {
            if start < consumed {
                continue;
            }
            // The match ends just past the opening brace
            let Some(argument) = extract_content_between_braces(source, end - 1) else {
                debug!(offset = start, "unbalanced entity argument");
                continue;
            };
            consumed = end + argument.len() + 1;
            match found {
                Match::Author { option } => {
                    collector.add_author_command(option, &argument, anchor, self.crf.as_ref())
                }
                Match::Affiliation { command, option } => {
                    collector.add_affiliation_command(command, option, &argument, anchor)
                }
            }
        }

        let output = collector.finish(graph);
        for author in &output.authors {
            EntityMap::record(&mut self.entities.authors, &author.name);
        }
        for affiliation in &output.affiliations {
            EntityMap::record(&mut self.entities.affiliations, &affiliation.details);
        }
        debug!(
            authors = output.authors.len(),
            affiliations = output.affiliations.len(),
            "ner pass"
        );
        output
    }

    /// Tag `words` with the CRF, training the seed model on first use, and
    /// group consecutive tokens with the same non-`O` label.
    pub fn annotate_with_crf(&mut self, words: &[&str]) -> Vec<EntitySpan> {
        let labels = self.crf.get_or_insert_with(trained_seed_model).predict(words);
        let mut spans: Vec<EntitySpan> = Vec::new();
        let mut previous = Label::O;
        for (word, label) in words.iter().zip(labels) {
            match spans.last_mut() {
                Some(span) if label != Label::O && label == previous => {
                    span.text.push(' ');
                    span.text.push_str(word);
                }
                _ if label != Label::O => spans.push(EntitySpan {
                    label,
                    text: word.to_string(),
                }),
                _ => {}
            }
            previous = label;
        }

        for span in &spans {
            match span.label {
                Label::Author => EntityMap::record(&mut self.entities.authors, &span.text),
                Label::Affiliation => {
                    EntityMap::record(&mut self.entities.affiliations, &span.text)
                }
                Label::O => {}
            }
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_latex_pairs_labels() {
        let source = r"\author[1]{Ada Lovelace}\author[2]{Charles Babbage}
\affil[1]{Analytical Society}\affil[2]{University of Cambridge}";
        let mut graph = Dag::new();
        let mut ner = Ner::new();
        let out = ner.parse_latex(source, &mut graph, None);

        assert_eq!(out.authors.len(), 2);
        assert_eq!(out.authors[0].affiliations, vec![0]);
        assert_eq!(out.authors[1].affiliations, vec![1]);
        assert_eq!(ner.entities().authors, vec!["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(
            graph.get("affiliation:university of cambridge").map(|n| n.node_type),
            Some(NodeType::Affiliation)
        );
    }

    #[test]
    fn test_nested_institution_is_not_counted_twice() {
        let source =
            r"\author{Grace Hopper}\affiliation{\institution{Yale University}\city{New Haven}}";
        let mut graph = Dag::new();
        let out = Ner::new().parse_latex(source, &mut graph, None);
        assert_eq!(out.affiliations.len(), 1);
        assert!(out.affiliations[0].details.starts_with("Yale University"));
        assert_eq!(out.authors[0].affiliations, vec![0]);
    }

    #[test]
    fn test_annotate_groups_spans() {
        let mut ner = Ner::with_crf();
        let spans = ner.annotate_with_crf(&["Alan", "Turing", "University", "of", "Manchester"]);
        assert!(spans.iter().any(|s| s.label == Label::Author && s.text.starts_with("Alan")));
        assert!(spans.iter().all(|s| s.label != Label::O));
        assert!(!ner.entities().authors.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let mut ner = Ner::new();
        assert!(ner.annotate_with_crf(&[]).is_empty());
        let out = ner.parse_latex("no front matter", &mut Dag::new(), None);
        assert!(out.authors.is_empty());
        assert!(ner.crf().is_some());
    }
}
