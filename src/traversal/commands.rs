//! Command categories and the small parsing helpers the handlers share.

use crate::core::vocabulary::{
    base_name, section_level, BIBLIOGRAPHY_COMMANDS, CITATION_COMMANDS, DOCUMENT_COMMANDS,
    FLOAT_COMMANDS, MATH_COMMANDS, REFERENCE_COMMANDS, THEOREM_ENVIRONMENTS,
};
use crate::utils::text::{collapse_whitespace, matching_close, split_command, strip_latex};

use super::state::FsmState;

/// How a command is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    /// Front matter and preamble: `\title`, `\usepackage`, `\email` ...
    Document,
    Sectioning,
    Math,
    /// `\newtheorem` and friends
    Theorem,
    /// `\caption`, `\includegraphics` ...
    Float,
    Citation,
    Reference,
    Bibliography,
    Label,
    /// `\\`, `\,` and other spacing
    Spacing,
    /// `\%`, `\&` and other escaped characters
    Escape,
    Generic,
}

pub fn categorize(name: &str) -> CommandCategory {
    let base = base_name(name);
    if base == "label" {
        CommandCategory::Label
    } else if section_level(base).is_some() {
        CommandCategory::Sectioning
    } else if CITATION_COMMANDS.contains(base) {
        CommandCategory::Citation
    } else if REFERENCE_COMMANDS.contains(base) {
        CommandCategory::Reference
    } else if BIBLIOGRAPHY_COMMANDS.contains(base) {
        CommandCategory::Bibliography
    } else if DOCUMENT_COMMANDS.contains(base) {
        CommandCategory::Document
    } else if matches!(base, "newtheorem" | "declaretheorem" | "theoremstyle") {
        CommandCategory::Theorem
    } else if FLOAT_COMMANDS.contains(base) {
        CommandCategory::Float
    } else if MATH_COMMANDS.contains(base) {
        CommandCategory::Math
    } else if matches!(
        base,
        "\\" | "," | ";" | ":" | "!" | " " | "quad" | "qquad" | "newline" | "linebreak"
    ) {
        CommandCategory::Spacing
    } else if base.chars().count() == 1 && !base.chars().all(|c| c.is_ascii_alphabetic()) {
        CommandCategory::Escape
    } else {
        CommandCategory::Generic
    }
}

/// State a command moves to after `InCommand`, if it refines it.
pub fn refined_state(name: &str) -> Option<FsmState> {
    match base_name(name) {
        "title" => Some(FsmState::InTitle),
        "date" => Some(FsmState::InDate),
        "keywords" => Some(FsmState::InKeywords),
        "label" => Some(FsmState::InLabel),
        "bibitem" => Some(FsmState::InCitation),
        "cref" | "Cref" | "autoref" | "nameref" => Some(FsmState::InCrossRef),
        base if REFERENCE_COMMANDS.contains(base) => Some(FsmState::InRef),
        base if CITATION_COMMANDS.contains(base) => Some(FsmState::InCitation),
        _ => None,
    }
}

/// State for an environment by name. `is_custom_theorem` marks names
/// registered with `\newtheorem`.
pub fn environment_state(name: &str, is_custom_theorem: bool) -> FsmState {
    match base_name(name) {
        "document" => FsmState::InDocument,
        "figure" | "subfigure" | "wrapfigure" => FsmState::InFigure,
        "table" | "tabular" | "tabularx" => FsmState::InTable,
        "algorithm" | "algorithmic" => FsmState::InAlgorithm,
        "listing" | "lstlisting" | "verbatim" | "Verbatim" | "minted" => FsmState::InListing,
        "proof" => FsmState::InProof,
        "definition" => FsmState::InDefinition,
        "lemma" => FsmState::InLemma,
        "corollary" => FsmState::InCorollary,
        base if THEOREM_ENVIRONMENTS.contains(base) || is_custom_theorem => FsmState::InTheorem,
        _ => FsmState::InEnvironment,
    }
}

/// Theorem-like states produce a `Theorem` fragment.
pub fn is_theorem_state(state: FsmState) -> bool {
    matches!(
        state,
        FsmState::InTheorem
            | FsmState::InProof
            | FsmState::InDefinition
            | FsmState::InLemma
            | FsmState::InCorollary
    )
}

/// Trailing `[...]` of a `\begin{name}[...]` header.
pub fn environment_option(header: &str) -> Option<String> {
    let body = header.trim_start().strip_prefix("\\begin")?.trim_start();
    let close = matching_close(body, '{', '}')?;
    let rest = body[close + 1..].trim_start();
    if !rest.starts_with('[') {
        return None;
    }
    let end = matching_close(rest, '[', ']')?;
    Some(rest[1..end].trim().to_string()).filter(|o| !o.is_empty())
}

/// First brace argument of a raw command, cleaned for display.
pub fn display_argument(raw: &str) -> Option<String> {
    split_command(raw)
        .and_then(|parts| parts.first_arg().map(|a| collapse_whitespace(&strip_latex(a))))
        .filter(|a| !a.is_empty())
}

/// Raw first brace argument, trimmed.
pub fn raw_argument(raw: &str) -> Option<String> {
    split_command(raw)
        .and_then(|parts| parts.first_arg().map(|a| a.trim().to_string()))
        .filter(|a| !a.is_empty())
}

/// Comma separated list in a command argument (`\usepackage{a,b}`,
/// `\keywords{x; y}`).
pub fn list_argument(raw: &str) -> Vec<String> {
    raw_argument(raw)
        .unwrap_or_default()
        .split(|c| c == ',' || c == ';')
        .flat_map(|item| item.split("\\and"))
        .map(|item| collapse_whitespace(&strip_latex(item)))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Math delimiter stripped from a Math node's source, and whether the
/// expression is displayed.
pub fn strip_math_delimiters(content: &str, environment: Option<&str>) -> (String, Option<bool>) {
    let content = content.trim();
    if let Some(env) = environment {
        let begin = format!("\\begin{{{}}}", env);
        let end = format!("\\end{{{}}}", env);
        let inner = content.strip_prefix(begin.as_str()).unwrap_or(content);
        let inner = inner.strip_suffix(end.as_str()).unwrap_or(inner);
        return (inner.trim().to_string(), Some(true));
    }
    let delimiters = [
        ("$$", "$$", true),
        ("\\[", "\\]", true),
        ("\\(", "\\)", false),
        ("$", "$", false),
    ];
    for (open, close, display) in delimiters {
        if content.len() >= open.len() + close.len()
            && content.starts_with(open)
            && content.ends_with(close)
        {
            let inner = &content[open.len()..content.len() - close.len()];
            return (inner.trim().to_string(), Some(display));
        }
    }
    (content.to_string(), None)
}

/// A piece of running text: plain words or an inline `$...$` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPiece {
    Text(String),
    Math(String),
}

/// Split text on unescaped `$` into alternating text and inline math.
/// An unterminated `$` leaves the remainder as text.
pub fn split_inline_math(text: &str) -> Vec<TextPiece> {
    let mut pieces = Vec::new();
    let mut buf = String::new();
    // Text before the `$` currently open
    let mut before_math: Option<String> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                buf.push(c);
                if let Some(next) = chars.next() {
                    buf.push(next);
                }
            }
            '$' => {
                let piece = std::mem::take(&mut buf);
                match before_math.take() {
                    Some(prefix) => {
                        push_text(&mut pieces, &prefix);
                        if !piece.trim().is_empty() {
                            pieces.push(TextPiece::Math(piece.trim().to_string()));
                        }
                    }
                    None => before_math = Some(piece),
                }
            }
            _ => buf.push(c),
        }
    }
    match before_math {
        Some(prefix) => push_text(&mut pieces, &format!("{}${}", prefix, buf)),
        None => push_text(&mut pieces, &buf),
    }
    pieces
}

fn push_text(pieces: &mut Vec<TextPiece>, text: &str) {
    let text = collapse_whitespace(text);
    if !text.is_empty() {
        pieces.push(TextPiece::Text(text));
    }
}

/// Escape text for the XML-like chunk markup.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(categorize("title"), CommandCategory::Document);
        assert_eq!(categorize("citep"), CommandCategory::Citation);
        assert_eq!(categorize("eqref"), CommandCategory::Reference);
        assert_eq!(categorize("alpha"), CommandCategory::Math);
        assert_eq!(categorize("caption"), CommandCategory::Float);
        assert_eq!(categorize("newtheorem"), CommandCategory::Theorem);
        assert_eq!(categorize("\\"), CommandCategory::Spacing);
        assert_eq!(categorize("%"), CommandCategory::Escape);
        assert_eq!(categorize("textbf"), CommandCategory::Generic);
    }

    #[test]
    fn test_environment_states() {
        assert_eq!(environment_state("figure*", false), FsmState::InFigure);
        assert_eq!(environment_state("lemma", false), FsmState::InLemma);
        assert_eq!(environment_state("thm", true), FsmState::InTheorem);
        assert_eq!(environment_state("itemize", false), FsmState::InEnvironment);
        assert_eq!(refined_state("autoref"), Some(FsmState::InCrossRef));
        assert_eq!(refined_state("ref"), Some(FsmState::InRef));
    }

    #[test]
    fn test_environment_option() {
        assert_eq!(
            environment_option(r"\begin{theorem}[Main result]").as_deref(),
            Some("Main result")
        );
        assert_eq!(environment_option(r"\begin{proof}"), None);
    }

    #[test]
    fn test_strip_math_delimiters() {
        assert_eq!(strip_math_delimiters("$x+1$", None), ("x+1".to_string(), Some(false)));
        assert_eq!(strip_math_delimiters(r"\[ y \]", None), ("y".to_string(), Some(true)));
        assert_eq!(
            strip_math_delimiters(r"\begin{align}a&=b\end{align}", Some("align")),
            ("a&=b".to_string(), Some(true))
        );
    }

    #[test]
    fn test_split_inline_math() {
        assert_eq!(
            split_inline_math(r"Hello $x+1$ world, \$5"),
            vec![
                TextPiece::Text("Hello".into()),
                TextPiece::Math("x+1".into()),
                TextPiece::Text(r"world, \$5".into()),
            ]
        );
        assert_eq!(split_inline_math("cost $5"), vec![TextPiece::Text("cost $5".into())]);
    }
}
