//! Structured document model produced by the traversal layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub metadata: Metadata,
    pub content: Vec<Fragment>,
}

impl StructuredDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.content.push(fragment);
    }

    /// Fragments of one kind, in document order.
    pub fn fragments_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Fragment> + 'a {
        self.content.iter().filter(move |f| f.kind() == kind)
    }

    pub fn author(&self, name: &str) -> Option<&AuthorRecord> {
        self.metadata
            .authors
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn affiliation(&self, id: usize) -> Option<&AffiliationRecord> {
        self.metadata.affiliations.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub authors: Vec<AuthorRecord>,
    pub affiliations: Vec<AffiliationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    /// Ids of [`AffiliationRecord`]s this author belongs to.
    pub affiliations: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationRecord {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Begin,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathDisplay {
    Inline,
    Display,
}

/// One typed piece of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fragment {
    Section {
        title: String,
        level: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Text {
        text: String,
    },
    Math {
        expression: String,
        display: MathDisplay,
    },
    Figure {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        graphics: Vec<String>,
    },
    Citation {
        command: String,
        keys: Vec<String>,
    },
    Reference {
        command: String,
        label: String,
        resolved: bool,
    },
    Command {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    MathCommand {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    Theorem {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Environment {
        name: String,
        boundary: Boundary,
    },
    Abstract {
        text: String,
    },
    Bibitem {
        key: String,
        text: String,
    },
    Verbatim {
        environment: String,
        text: String,
    },
    DocumentCommand {
        name: String,
        value: String,
    },
}

impl Fragment {
    pub fn text(s: impl Into<String>) -> Self {
        Fragment::Text { text: s.into() }
    }

    pub fn inline_math(s: impl Into<String>) -> Self {
        Fragment::Math {
            expression: s.into(),
            display: MathDisplay::Inline,
        }
    }

    /// The serialized `type` tag of this fragment.
    pub fn kind(&self) -> &'static str {
        match self {
            Fragment::Section { .. } => "section",
            Fragment::Text { .. } => "text",
            Fragment::Math { .. } => "math",
            Fragment::Figure { .. } => "figure",
            Fragment::Citation { .. } => "citation",
            Fragment::Reference { .. } => "reference",
            Fragment::Command { .. } => "command",
            Fragment::MathCommand { .. } => "math_command",
            Fragment::Theorem { .. } => "theorem",
            Fragment::Environment { .. } => "environment",
            Fragment::Abstract { .. } => "abstract",
            Fragment::Bibitem { .. } => "bibitem",
            Fragment::Verbatim { .. } => "verbatim",
            Fragment::DocumentCommand { .. } => "document_command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_tag_matches_kind() {
        let fragments = vec![
            Fragment::text("hello"),
            Fragment::inline_math("x+1"),
            Fragment::Environment {
                name: "proof".into(),
                boundary: Boundary::Begin,
            },
        ];
        for fragment in fragments {
            let value = serde_json::to_value(&fragment).unwrap();
            assert_eq!(value["type"], fragment.kind());
        }
    }

    #[test]
    fn test_abstract_field_renamed() {
        let mut doc = StructuredDocument::new();
        doc.metadata.abstract_text = Some("We study graphs.".into());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["metadata"]["abstract"], "We study graphs.");
        assert!(value["metadata"].get("title").is_none());
    }

    #[test]
    fn test_author_lookup_is_case_insensitive() {
        let mut doc = StructuredDocument::new();
        doc.metadata.authors.push(AuthorRecord {
            name: "Ada Lovelace".into(),
            affiliations: vec![0],
            ..Default::default()
        });
        doc.metadata.affiliations.push(AffiliationRecord {
            id: 0,
            label: None,
            details: "Analytical Society".into(),
        });
        let author = doc.author("ada lovelace").unwrap();
        assert_eq!(doc.affiliation(author.affiliations[0]).unwrap().details, "Analytical Society");
    }
}
