//! Compiled patterns for entity extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `\author[opt]{` up to the opening brace of the argument.
    pub static ref AUTHOR_COMMAND: Regex =
        Regex::new(r"\\author\s*(?:\[([^\]]*)\])?\s*\{").unwrap();
    /// `\affiliation`, `\affil`, `\institute`, `\address`, `\institution`.
    pub static ref AFFILIATION_COMMAND: Regex =
        Regex::new(
            r"\\(affiliation|affil|institute|address|institution)\s*(?:\[([^\]]*)\])?\s*\{"
        )
        .unwrap();
    pub static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    pub static ref ORCID: Regex =
        Regex::new(r"\b[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]\b").unwrap();
    /// `{email: a@b.org}` style annotations.
    pub static ref EMAIL_ANNOTATION: Regex = Regex::new(r"\{\s*e-?mail\s*:\s*([^}]*)\}").unwrap();
    /// `$^{1,2}$`, `$^a$` and bare `^{1}` markers.
    pub static ref SUPERSCRIPT: Regex = Regex::new(r"\$?\^\{?([A-Za-z0-9,*\s]+)\}?\$?").unwrap();
    pub static ref DEPARTMENT: Regex =
        Regex::new(
            r"(?i)\b(department|dept\.?|school|faculty|division|laboratory|lab|group|centre|center)\b"
        )
        .unwrap();
    pub static ref INSTITUTION: Regex = Regex::new(
        r"(?i)\b(university|universit[äaé]t?|universidad|universit[ée]|institute|institut|college|academy|inc\.?|ltd\.?|corporation|research|hospital|polytechnic|eth|mit|cnrs|inria)\b"
    )
    .unwrap();
}

/// Whether the text reads like an institution or department rather than
/// a person.
pub fn looks_like_institution(text: &str) -> bool {
    INSTITUTION.is_match(text) || DEPARTMENT.is_match(text)
}

pub fn first_email(text: &str) -> Option<String> {
    EMAIL_ANNOTATION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| EMAIL.find(text).map(|m| m.as_str().to_string()))
}

pub fn first_orcid(text: &str) -> Option<String> {
    ORCID.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_forms() {
        assert_eq!(first_email("Ada {email: ada@uni.edu}").as_deref(), Some("ada@uni.edu"));
        assert_eq!(
            first_email("contact: bob.smith@cs.mit.edu.").as_deref(),
            Some("bob.smith@cs.mit.edu")
        );
        assert_eq!(first_email("no address here"), None);
    }

    #[test]
    fn test_orcid_and_institution() {
        assert_eq!(first_orcid("0000-0002-1825-0097").as_deref(), Some("0000-0002-1825-0097"));
        assert!(looks_like_institution("Department of Physics"));
        assert!(looks_like_institution("Stanford University"));
        assert!(!looks_like_institution("Grace Hopper"));
    }

    #[test]
    fn test_command_patterns() {
        let caps = AFFILIATION_COMMAND.captures(r"\affil[2]{Uni}").unwrap();
        assert_eq!(&caps[1], "affil");
        assert_eq!(caps.get(2).map(|m| m.as_str()), Some("2"));
        assert!(AUTHOR_COMMAND.is_match(r"\author {A}"));
    }
}
