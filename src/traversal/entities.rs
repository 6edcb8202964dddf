//! Author and affiliation extraction.
//!
//! Entity commands are collected in document order and paired once the
//! whole front matter has been seen. Pairing works in three passes:
//!
//! 1. explicit labels (`\inst{1}`, `$^{1}$`, `\author[1]`) match
//!    affiliations carrying the same label (`\affil[1]`, `\institute{A \and B}`);
//! 2. unlabeled affiliations that directly follow an author command attach
//!    to the authors of that command, when either side is a single entry;
//! 3. what is left pairs positionally: 1:1 when the counts match, one
//!    affiliation shared by everyone, otherwise truncated and reported.

use indexmap::IndexMap;
use texgraph_ir::{AffiliationRecord, AuthorRecord};
use tracing::debug;

use crate::graph::{Dag, DagIndex, EdgeType, NodeType};
use crate::ner::crf::{CrfModel, Label};
use crate::ner::patterns::{
    first_email, first_orcid, looks_like_institution, EMAIL, EMAIL_ANNOTATION, ORCID, SUPERSCRIPT,
};
use crate::utils::error::{Diagnostic, DiagnosticKind};
use crate::utils::text::{
    canonical_key, remove_commands, split_command, split_top_level, strip_latex,
};

const AUTHOR_DELIMITERS: &[&str] = &["\\and", ",", "\\\\", ";"];

/// Commands that never contribute to a display name.
const NAME_NOISE: &[&str] = &[
    "thanks",
    "email",
    "orcid",
    "inst",
    "textsuperscript",
    "footnote",
    "footnotemark",
    "IEEEauthorrefmark",
    "affilmark",
];

/// Author staged during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAuthor {
    pub name: String,
    pub canonical: String,
    pub email: Option<String>,
    pub orcid: Option<String>,
    /// Indices into the pending affiliations
    pub affiliations: Vec<usize>,
    pub labels: Vec<String>,
    group: usize,
    anchor: Option<DagIndex>,
}

/// Affiliation staged during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAffiliation {
    pub label: Option<String>,
    pub details: String,
    pub canonical: String,
    follows: Option<usize>,
    anchor: Option<DagIndex>,
}

/// Records produced by [`EntityCollector::finish`].
#[derive(Debug, Clone, Default)]
pub struct EntityOutput {
    pub authors: Vec<AuthorRecord>,
    pub affiliations: Vec<AffiliationRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

fn split_labels(text: &str) -> Vec<String> {
    text.split(',')
        .map(|l| l.trim().trim_matches('*').trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Labels attached to a name: `\inst{1,2}`, `\textsuperscript{a}`,
/// `$^{1}$` and `\IEEEauthorrefmark{1}`.
fn segment_labels(segment: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut rest = segment;
    while let Some(pos) = rest.find('\\') {
        let tail = &rest[pos..];
        if let Some(parts) = split_command(tail) {
            if matches!(
                parts.name.as_str(),
                "inst" | "textsuperscript" | "IEEEauthorrefmark" | "affilmark"
            ) {
                if let Some(arg) = parts.first_arg() {
                    labels.extend(split_labels(arg));
                }
            }
        }
        rest = &tail[1..];
    }
    for caps in SUPERSCRIPT.captures_iter(segment) {
        if let Some(m) = caps.get(1) {
            labels.extend(split_labels(m.as_str()));
        }
    }
    let mut unique = Vec::new();
    for label in labels {
        if !unique.contains(&label) {
            unique.push(label);
        }
    }
    unique
}

fn command_argument(segment: &str, name: &str) -> Option<String> {
    let marker = format!("\\{}", name);
    let pos = segment.find(&marker)?;
    split_command(&segment[pos..])
        .and_then(|parts| parts.first_arg().map(|a| a.trim().to_string()))
        .filter(|a| !a.is_empty())
}

/// Display text with markers, emails and ORCIDs removed.
fn clean_text(segment: &str) -> String {
    let without_commands = remove_commands(segment, NAME_NOISE);
    let without_marks = SUPERSCRIPT.replace_all(&without_commands, " ");
    let without_annotations = EMAIL_ANNOTATION.replace_all(&without_marks, " ");
    let without_emails = EMAIL.replace_all(&without_annotations, " ");
    let without_orcid = ORCID.replace_all(&without_emails, " ");
    strip_latex(&without_orcid)
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | ';' | '*' | '†' | '‡' | ':')
        })
        .to_string()
}

/// Parse one author segment into a staged author.
pub fn parse_author_segment(segment: &str) -> Option<PendingAuthor> {
    let name = clean_text(segment);
    if name.is_empty() {
        return None;
    }
    Some(PendingAuthor {
        canonical: canonical_key(&name),
        email: command_argument(segment, "email").or_else(|| first_email(segment)),
        orcid: command_argument(segment, "orcid").or_else(|| first_orcid(segment)),
        labels: segment_labels(segment),
        affiliations: Vec::new(),
        name,
        group: 0,
        anchor: None,
    })
}

/// Whether an author-block segment names an institution. With a model,
/// the majority of its non-O token labels decides; ties fall back to the
/// keyword patterns.
fn is_institution(segment: &str, crf: Option<&CrfModel>) -> bool {
    let text = strip_latex(segment);
    if let Some(model) = crf {
        let words: Vec<&str> = text.split_whitespace().collect();
        let labels = model.predict(&words);
        let authors = labels.iter().filter(|l| **l == Label::Author).count();
        let affiliations = labels.iter().filter(|l| **l == Label::Affiliation).count();
        if authors != affiliations {
            return affiliations > authors;
        }
    }
    looks_like_institution(&text)
}

fn is_contact_only(segment: &str) -> bool {
    let stripped = clean_text(segment);
    stripped.is_empty() && (first_email(segment).is_some() || first_orcid(segment).is_some())
}

/// Collects entity commands in document order.
#[derive(Debug, Default)]
pub struct EntityCollector {
    authors: Vec<PendingAuthor>,
    affiliations: Vec<PendingAffiliation>,
    groups: usize,
    last_group: Option<usize>,
}

impl EntityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authors(&self) -> &[PendingAuthor] {
        &self.authors
    }

    pub fn affiliations(&self) -> &[PendingAffiliation] {
        &self.affiliations
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.affiliations.is_empty()
    }

    /// Stage the authors of one `\author[option]{argument}` command.
    pub fn add_author_command(
        &mut self,
        option: Option<&str>,
        argument: &str,
        anchor: Option<DagIndex>,
        crf: Option<&CrfModel>,
    ) {
        let group = self.groups;
        self.groups += 1;
        self.last_group = Some(group);
        let option_labels = option.map(split_labels).unwrap_or_default();
        let first_in_group = self.authors.len();

        for segment in split_top_level(argument, AUTHOR_DELIMITERS) {
            if is_contact_only(segment) {
                if let Some(author) = self.authors[first_in_group..].last_mut() {
                    author.email = author.email.take().or_else(|| first_email(segment));
                    author.orcid = author.orcid.take().or_else(|| first_orcid(segment));
                }
                continue;
            }
            if is_institution(segment, crf) {
                let details = clean_text(segment);
                if !details.is_empty() {
                    self.affiliations.push(PendingAffiliation {
                        canonical: canonical_key(&details),
                        label: segment_labels(segment).into_iter().next(),
                        details,
                        follows: Some(group),
                        anchor,
                    });
                }
                continue;
            }
            if let Some(mut author) = parse_author_segment(segment) {
                author.group = group;
                author.anchor = anchor;
                for label in &option_labels {
                    if !author.labels.contains(label) {
                        author.labels.push(label.clone());
                    }
                }
                self.authors.push(author);
            }
        }
        debug!(group, authors = self.authors.len() - first_in_group, "staged author command");
    }

    /// Stage one affiliation-like command (`\affiliation`, `\affil`,
    /// `\institute`, `\address`, `\institution`).
    pub fn add_affiliation_command(
        &mut self,
        command: &str,
        option: Option<&str>,
        argument: &str,
        anchor: Option<DagIndex>,
    ) {
        let follows = self.last_group;
        let pieces = if command == "institute" {
            split_top_level(argument, &["\\and"])
        } else {
            vec![argument]
        };
        let numbered = pieces.len() > 1;
        for (i, piece) in pieces.iter().enumerate() {
            let lines: Vec<String> = split_top_level(piece, &["\\\\"])
                .into_iter()
                .map(clean_text)
                .filter(|l| !l.is_empty())
                .collect();
            let details = lines.join(", ");
            if details.is_empty() {
                continue;
            }
            let label = option
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .or_else(|| numbered.then(|| (i + 1).to_string()))
                .or_else(|| segment_labels(piece).into_iter().next());
            self.affiliations.push(PendingAffiliation {
                canonical: canonical_key(&details),
                follows: if label.is_none() { follows } else { None },
                label,
                details,
                anchor,
            });
        }
    }

    /// A stand-alone `\email{}` or `\orcid{}` applies to the author staged last.
    pub fn attach_contact(&mut self, email: Option<String>, orcid: Option<String>) {
        if let Some(author) = self.authors.last_mut() {
            if email.is_some() {
                author.email = email;
            }
            if orcid.is_some() {
                author.orcid = orcid;
            }
        }
    }

    /// Affiliations seen after this point no longer count as following the
    /// last author command.
    pub fn break_sequence(&mut self) {
        self.last_group = None;
    }

    fn pair(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut used = vec![false; self.affiliations.len()];

        // 1. explicit labels
        for author in &mut self.authors {
            for label in &author.labels {
                let matches: Vec<usize> = self
                    .affiliations
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.label.as_deref() == Some(label.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                if matches.is_empty() {
                    continue;
                }
                for i in matches {
                    used[i] = true;
                    if !author.affiliations.contains(&i) {
                        author.affiliations.push(i);
                    }
                }
            }
        }

        // 2. unlabeled affiliations directly after an author command
        let mut by_group: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for (i, aff) in self.affiliations.iter().enumerate() {
            if let (None, Some(group)) = (&aff.label, aff.follows) {
                by_group.entry(group).or_default().push(i);
            }
        }
        for (group, affs) in by_group {
            let members: Vec<usize> = (0..self.authors.len())
                .filter(|a| self.authors[*a].group == group)
                .collect();
            if members.is_empty() || (members.len() > 1 && affs.len() > 1) {
                continue;
            }
            for a in members {
                for i in &affs {
                    used[*i] = true;
                    if !self.authors[a].affiliations.contains(i) {
                        self.authors[a].affiliations.push(*i);
                    }
                }
            }
        }

        // 3. positional
        let remaining: Vec<usize> = (0..self.affiliations.len())
            .filter(|i| !used[*i] && self.affiliations[*i].label.is_none())
            .collect();
        let unlinked: Vec<usize> = (0..self.authors.len())
            .filter(|a| self.authors[*a].affiliations.is_empty())
            .collect();
        if !remaining.is_empty() && !unlinked.is_empty() {
            if remaining.len() == unlinked.len() {
                for (a, i) in unlinked.iter().zip(&remaining) {
                    self.authors[*a].affiliations.push(*i);
                    used[*i] = true;
                }
            } else if remaining.len() == 1 {
                for a in &unlinked {
                    self.authors[*a].affiliations.push(remaining[0]);
                }
                used[remaining[0]] = true;
            } else {
                for (a, i) in unlinked.iter().zip(&remaining) {
                    self.authors[*a].affiliations.push(*i);
                    used[*i] = true;
                }
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::EntityPairing,
                    format!(
                        "{} unlabeled affiliations for {} unlinked authors; paired the first {} by position",
                        remaining.len(),
                        unlinked.len(),
                        remaining.len().min(unlinked.len())
                    ),
                ));
            }
        }

        for (i, aff) in self.affiliations.iter().enumerate() {
            if !used[i] && !self.authors.is_empty() {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::EntityPairing,
                    format!("affiliation '{}' is not linked to any author", aff.details),
                ));
            }
        }
        for author in &self.authors {
            for label in &author.labels {
                if !self.affiliations.iter().any(|a| a.label.as_deref() == Some(label.as_str())) {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::EntityPairing,
                        format!(
                            "author '{}' refers to unknown affiliation label '{}'",
                            author.name, label
                        ),
                    ));
                }
            }
        }
        diagnostics
    }

    /// Pair authors with affiliations, add `author:` / `affiliation:` nodes
    /// and their edges to the graph, and return the deduplicated records.
    pub fn finish(mut self, graph: &mut Dag) -> EntityOutput {
        let mut output = EntityOutput {
            diagnostics: self.pair(),
            ..EntityOutput::default()
        };

        let mut affiliation_ids: IndexMap<String, usize> = IndexMap::new();
        let mut affiliation_nodes: Vec<Option<(usize, DagIndex)>> =
            Vec::with_capacity(self.affiliations.len());
        for aff in &self.affiliations {
            if aff.canonical.is_empty() {
                affiliation_nodes.push(None);
                continue;
            }
            let record_id = match affiliation_ids.get(&aff.canonical).copied() {
                Some(id) => id,
                None => {
                    let id = output.affiliations.len();
                    affiliation_ids.insert(aff.canonical.clone(), id);
                    output.affiliations.push(AffiliationRecord {
                        id,
                        label: aff.label.clone(),
                        details: aff.details.clone(),
                    });
                    id
                }
            };
            let node = graph.add_node(
                format!("affiliation:{}", aff.canonical),
                NodeType::Affiliation,
                aff.details.clone(),
            );
            if let Some(anchor) = aff.anchor {
                link(graph, anchor, node, EdgeType::Hierarchical, &mut output.diagnostics);
            }
            affiliation_nodes.push(Some((record_id, node)));
        }

        let mut author_ids: IndexMap<String, usize> = IndexMap::new();
        let mut group_nodes: IndexMap<usize, Vec<DagIndex>> = IndexMap::new();
        for author in &self.authors {
            let record = match author_ids.get(&author.canonical).copied() {
                Some(id) => &mut output.authors[id],
                None => {
                    author_ids.insert(author.canonical.clone(), output.authors.len());
                    output.authors.push(AuthorRecord {
                        name: author.name.clone(),
                        ..AuthorRecord::default()
                    });
                    let last = output.authors.len() - 1;
                    &mut output.authors[last]
                }
            };
            if record.email.is_none() {
                record.email = author.email.clone();
            }
            if record.orcid.is_none() {
                record.orcid = author.orcid.clone();
            }

            let node = graph.add_node(
                format!("author:{}", author.canonical),
                NodeType::Author,
                author.name.clone(),
            );
            if let Some(anchor) = author.anchor {
                link(graph, anchor, node, EdgeType::Hierarchical, &mut output.diagnostics);
            }
            for aff in &author.affiliations {
                if let Some(Some((record_id, aff_node))) = affiliation_nodes.get(*aff) {
                    if !record.affiliations.contains(record_id) {
                        record.affiliations.push(*record_id);
                    }
                    link(
                        graph,
                        node,
                        *aff_node,
                        EdgeType::AuthorAffiliation,
                        &mut output.diagnostics,
                    );
                }
            }
            let group = group_nodes.entry(author.group).or_default();
            for coauthor in group.iter() {
                link(graph, *coauthor, node, EdgeType::TeamCollaboration, &mut output.diagnostics);
            }
            if !group.contains(&node) {
                group.push(node);
            }
        }

        debug!(
            authors = output.authors.len(),
            affiliations = output.affiliations.len(),
            "extracted entities"
        );
        output
    }
}

fn link(
    graph: &mut Dag,
    source: DagIndex,
    target: DagIndex,
    edge: EdgeType,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if source == target {
        return;
    }
    if let Err(rejection) = graph.add_edge(source, target, edge, None) {
        if !rejection.is_duplicate() {
            diagnostics.push(Diagnostic::from_edge_rejection(&rejection));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(collector: EntityCollector) -> (EntityOutput, Dag) {
        let mut graph = Dag::new();
        let out = collector.finish(&mut graph);
        (out, graph)
    }

    fn affiliation_names(out: &EntityOutput, author: usize) -> Vec<String> {
        out.authors[author]
            .affiliations
            .iter()
            .map(|id| out.affiliations[*id].details.clone())
            .collect()
    }

    #[test]
    fn test_author_segment_cleanup() {
        let segment = r"Ada Lovelace\thanks{Funded by Babbage}\inst{1,2} \email{ada@engine.org}";
        let author = parse_author_segment(segment).unwrap();
        assert_eq!(author.name, "Ada Lovelace");
        assert_eq!(author.canonical, "ada lovelace");
        assert_eq!(author.email.as_deref(), Some("ada@engine.org"));
        assert_eq!(author.labels, vec!["1", "2"]);

        let marked = parse_author_segment(r"Alan Turing$^{a}$ 0000-0002-1825-0097").unwrap();
        assert_eq!(marked.name, "Alan Turing");
        assert_eq!(marked.labels, vec!["a"]);
        assert_eq!(marked.orcid.as_deref(), Some("0000-0002-1825-0097"));
    }

    #[test]
    fn test_shared_affiliation_after_author_command() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, r"A \and B", None, None);
        c.add_affiliation_command("affiliation", None, "Uni1", None);
        let (out, graph) = records(c);
        assert_eq!(out.authors.len(), 2);
        assert_eq!(affiliation_names(&out, 0), vec!["Uni1"]);
        assert_eq!(affiliation_names(&out, 1), vec!["Uni1"]);
        assert!(out.diagnostics.is_empty());
        let a = graph.lookup("author:a").unwrap();
        let uni = graph.lookup("affiliation:uni1").unwrap();
        assert!(graph.node(a).unwrap().has_edge(uni, EdgeType::AuthorAffiliation));
    }

    #[test]
    fn test_labels_take_precedence() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, r"Ada\inst{2} \and Alan\inst{1}", None, None);
        c.add_affiliation_command("institute", None, r"Oxford \and Cambridge", None);
        let (out, _) = records(c);
        assert_eq!(affiliation_names(&out, 0), vec!["Cambridge"]);
        assert_eq!(affiliation_names(&out, 1), vec!["Oxford"]);
    }

    #[test]
    fn test_acm_style_blocks() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, "Ada", None, None);
        c.add_affiliation_command("affiliation", None, r"\institution{MIT}", None);
        c.add_affiliation_command("affiliation", None, r"\institution{CERN}", None);
        c.add_author_command(None, "Alan", None, None);
        c.add_affiliation_command("affiliation", None, r"\institution{MIT}", None);
        let (out, _) = records(c);
        assert_eq!(affiliation_names(&out, 0), vec!["MIT", "CERN"]);
        assert_eq!(affiliation_names(&out, 1), vec!["MIT"]);
        assert_eq!(out.affiliations.len(), 2);
    }

    #[test]
    fn test_positional_pairing_and_truncation() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, "A, B", None, None);
        c.add_affiliation_command("affil", None, "U1", None);
        c.add_affiliation_command("affil", None, "U2", None);
        let (out, _) = records(c);
        assert_eq!(affiliation_names(&out, 0), vec!["U1"]);
        assert_eq!(affiliation_names(&out, 1), vec!["U2"]);

        let mut c = EntityCollector::new();
        c.add_author_command(None, "A, B, C", None, None);
        c.add_affiliation_command("affil", None, "U1", None);
        c.add_affiliation_command("affil", None, "U2", None);
        let (out, _) = records(c);
        assert!(affiliation_names(&out, 2).is_empty());
        assert!(out.diagnostics.iter().any(|d| d.kind == DiagnosticKind::EntityPairing));
    }

    #[test]
    fn test_institution_segment_inside_author_block() {
        let mut c = EntityCollector::new();
        let block = r"Grace Hopper \\ Yale University \\ grace@yale.edu";
        c.add_author_command(None, block, None, None);
        let (out, _) = records(c);
        assert_eq!(out.authors.len(), 1);
        assert_eq!(out.authors[0].email.as_deref(), Some("grace@yale.edu"));
        assert_eq!(affiliation_names(&out, 0), vec!["Yale University"]);
    }

    #[test]
    fn test_unknown_label_reported() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, r"Ada\inst{3}", None, None);
        c.add_affiliation_command("affil", Some("1"), "Oxford", None);
        let (out, _) = records(c);
        let messages: Vec<&str> = out.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("unknown affiliation label '3'")));
        assert!(messages.iter().any(|m| m.contains("'Oxford' is not linked")));
    }

    #[test]
    fn test_coauthors_linked() {
        let mut c = EntityCollector::new();
        c.add_author_command(None, r"A \and B", None, None);
        let (_, graph) = records(c);
        let a = graph.lookup("author:a").unwrap();
        let b = graph.lookup("author:b").unwrap();
        assert!(graph.node(a).unwrap().has_edge(b, EdgeType::TeamCollaboration));
    }
}
