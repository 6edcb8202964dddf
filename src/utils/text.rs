//! Text helpers shared by the parser, graph builder and traversal layer.

/// Maximum number of characters kept in a sanitized identifier.
pub const MAX_ID_LEN: usize = 30;

/// Return the content between the first `{` at or after `start` and its
/// matching `}`, at any nesting depth. `None` when unbalanced.
pub fn extract_content_between_braces(input: &str, start: usize) -> Option<String> {
    let rest = input.get(start..)?;
    let open = rest.find('{')?;
    let mut depth = 0usize;
    for (idx, ch) in rest[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(rest[open + 1..open + idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// All top-level brace groups in order: `{a}{b{c}}` → `["a", "b{c}"]`.
pub fn brace_groups(input: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (idx, ch) in input.char_indices() {
        match ch {
            '{' => {
                depth += 1;
                if depth == 1 {
                    start = Some(idx + 1);
                }
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        groups.push(input[s..idx].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    groups
}

/// A command occurrence split into its parts: `\name[opt]{a}{b}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandParts {
    pub name: String,
    pub option: Option<String>,
    pub args: Vec<String>,
}

impl CommandParts {
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Split raw command text into name, optional bracket argument and brace
/// arguments. Returns `None` if the text does not start with `\`.
pub fn split_command(raw: &str) -> Option<CommandParts> {
    let body = raw.trim_start().strip_prefix('\\')?;
    let name_len = body
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphabetic() || *c == '*' || *c == '@'))
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    let (name, mut rest) = if name_len == 0 {
        let first = body.chars().next()?;
        (first.to_string(), &body[first.len_utf8()..])
    } else {
        (body[..name_len].to_string(), &body[name_len..])
    };

    let mut option = None;
    let trimmed = rest.trim_start();
    if trimmed.starts_with('[') {
        if let Some(end) = matching_close(trimmed, '[', ']') {
            option = Some(trimmed[1..end].to_string());
            rest = &trimmed[end + 1..];
        }
    }

    let mut args = Vec::new();
    loop {
        let trimmed = rest.trim_start();
        if !trimmed.starts_with('{') {
            break;
        }
        match matching_close(trimmed, '{', '}') {
            Some(end) => {
                args.push(trimmed[1..end].to_string());
                rest = &trimmed[end + 1..];
            }
            None => break,
        }
    }

    Some(CommandParts { name, option, args })
}

/// Byte index of the delimiter closing the one at index 0.
pub fn matching_close(input: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in input.char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Split on any of the given delimiters, ignoring delimiters nested in
/// braces. Empty pieces are dropped; pieces are trimmed.
pub fn split_top_level<'a>(input: &'a str, delimiters: &[&str]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut idx = 0;
    let bytes = input.as_bytes();
    while idx < input.len() {
        match bytes[idx] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 {
            if let Some(delim) = delimiters.iter().find(|d| input[idx..].starts_with(**d)) {
                // `\and` must not swallow the prefix of `\andor` and friends
                let tail = &input[idx + delim.len()..];
                let is_word_cut = delim.starts_with('\\')
                    && delim[1..].chars().all(|c| c.is_ascii_alphabetic())
                    && tail.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
                if !is_word_cut {
                    pieces.push(input[start..idx].trim());
                    idx += delim.len();
                    start = idx;
                    continue;
                }
            }
        }
        idx += input[idx..].chars().next().map_or(1, char::len_utf8);
    }
    pieces.push(input[start..].trim());
    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove command markers and braces, keeping argument text:
/// `\textbf{Deep} learning` → `Deep learning`.
pub fn strip_latex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(n) if n.is_ascii_alphabetic() => {
                    while chars.peek().map_or(false, |n| n.is_ascii_alphabetic() || *n == '*') {
                        chars.next();
                    }
                    out.push(' ');
                }
                Some('\\') => {
                    chars.next();
                    out.push(' ');
                }
                Some(_) => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                None => {}
            },
            '{' | '}' | '~' => out.push(' '),
            _ => out.push(c),
        }
    }
    collapse_whitespace(&out)
}

/// Remove whole commands (name and arguments) for the given names.
pub fn remove_commands(input: &str, names: &[&str]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        let name = &after[..name_len];
        if name_len > 0 && names.contains(&name) {
            let mut tail = &after[name_len..];
            if tail.trim_start().starts_with('[') {
                let t = tail.trim_start();
                if let Some(end) = matching_close(t, '[', ']') {
                    tail = &t[end + 1..];
                }
            }
            while tail.trim_start().starts_with('{') {
                let t = tail.trim_start();
                match matching_close(t, '{', '}') {
                    Some(end) => tail = &t[end + 1..],
                    None => break,
                }
            }
            rest = tail;
        } else {
            out.push('\\');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Lower-case canonical form used to deduplicate entities.
pub fn canonical_key(input: &str) -> String {
    collapse_whitespace(&strip_latex(input)).to_lowercase()
}

/// Keep alphanumerics and `_`, mapping runs of anything else to a single
/// `_`, capped at [`MAX_ID_LEN`] characters.
pub fn sanitize_id(input: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = true;
    for ch in input.chars() {
        if out.chars().count() >= MAX_ID_LEN {
            break;
        }
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Truncate to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = input.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_nested_braces() {
        assert_eq!(extract_content_between_braces("{a{b}c}", 0).as_deref(), Some("a{b}c"));
        assert_eq!(extract_content_between_braces(r"\cite{x}", 0).as_deref(), Some("x"));
        assert_eq!(extract_content_between_braces("{a{b}", 0), None);
        assert_eq!(extract_content_between_braces("no braces", 0), None);
    }

    #[test]
    fn test_split_command_parts() {
        let parts = split_command(r"\includegraphics[width=0.5\textwidth]{fig/a.png}").unwrap();
        assert_eq!(parts.name, "includegraphics");
        assert_eq!(parts.option.as_deref(), Some(r"width=0.5\textwidth"));
        assert_eq!(parts.args, vec!["fig/a.png".to_string()]);

        let parts = split_command(r"\frac{a}{b{c}}").unwrap();
        assert_eq!(parts.args, vec!["a".to_string(), "b{c}".to_string()]);

        let parts = split_command(r"\%").unwrap();
        assert_eq!(parts.name, "%");
        assert!(split_command("plain").is_none());
    }

    #[test]
    fn test_split_top_level_respects_braces() {
        let pieces = split_top_level(r"A\inst{1,2} \and B, C", &[r"\and", ","]);
        assert_eq!(pieces, vec![r"A\inst{1,2}", "B", "C"]);
    }

    #[test]
    fn test_split_top_level_keeps_longer_commands() {
        let pieces = split_top_level(r"X \andor Y", &[r"\and"]);
        assert_eq!(pieces, vec![r"X \andor Y"]);
    }

    #[test]
    fn test_strip_latex() {
        assert_eq!(strip_latex(r"\textbf{Deep}   learning"), "Deep learning");
        assert_eq!(strip_latex(r"50\% of {cases}"), "50% of cases");
    }

    #[test]
    fn test_remove_commands() {
        assert_eq!(
            collapse_whitespace(&remove_commands(r"Ann\thanks{Funded by X} Lee", &["thanks"])),
            "Ann Lee"
        );
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("Intro: The Basics!"), "intro_the_basics");
        assert_eq!(sanitize_id(&"x".repeat(50)).len(), MAX_ID_LEN);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 40), "short");
        let long = "a".repeat(60);
        let cut = truncate_chars(&long, 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }
}
