//! Token definitions for the LaTeX lexer.
//!
//! Tokens are coarse-grained: a command token already carries its optional
//! `[...]` argument and its first `{...}` argument, so the parser can build
//! most nodes from a single token.

use std::fmt;

/// The category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A control sequence like `\section{Intro}` or `\%`
    Command,
    /// `\begin{name}`
    BeginEnvironment,
    /// `\end{name}`
    EndEnvironment,
    /// Begin group `{`
    OpenBrace,
    /// End group `}`
    CloseBrace,
    /// Math delimiter: `$`, `$$`, `\[`, `\]`, `\(`, `\)`
    MathShift,
    /// A run of free text
    Text,
    /// End of input marker
    Eof,
}

/// The parsed parts of a command token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandToken {
    /// Name without the leading backslash, including a trailing `*`
    pub name: String,
    /// Content of the `[...]` argument, if present
    pub option: Option<String>,
    /// Content of the `{...}` argument, if present
    pub argument: Option<String>,
}

/// A lexed token. `text` is the exact source slice and `offset` the byte
/// offset of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
    pub command: Option<CommandToken>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            offset,
            command: None,
        }
    }

    pub fn eof(offset: usize) -> Self {
        Token::new(TokenKind::Eof, "", offset)
    }

    pub fn with_command(mut self, command: CommandToken) -> Self {
        self.command = Some(command);
        self
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns true if this token is a command (including begin/end)
    pub fn is_command(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Command | TokenKind::BeginEnvironment | TokenKind::EndEnvironment
        )
    }

    /// Command name, or environment name for begin/end tokens.
    pub fn name(&self) -> Option<&str> {
        self.command.as_ref().map(|c| c.name.as_str())
    }

    pub fn argument(&self) -> Option<&str> {
        self.command.as_ref().and_then(|c| c.argument.as_deref())
    }

    pub fn option(&self) -> Option<&str> {
        self.command.as_ref().and_then(|c| c.option.as_deref())
    }

    /// The delimiter that closes this math shift token.
    pub fn closing_math_delimiter(&self) -> Option<&'static str> {
        match self.text.as_str() {
            "$" => Some("$"),
            "$$" => Some("$$"),
            "\\[" => Some("\\]"),
            "\\(" => Some("\\)"),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "<EOF>"),
            _ => write!(f, "{:?}({:?}@{})", self.kind, self.text, self.offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_end_offset() {
        let tok = Token::new(TokenKind::Text, "hello", 10);
        assert_eq!(tok.end(), 15);
    }

    #[test]
    fn test_closing_delimiters() {
        assert_eq!(Token::new(TokenKind::MathShift, "$", 0).closing_math_delimiter(), Some("$"));
        assert_eq!(
            Token::new(TokenKind::MathShift, "\\[", 0).closing_math_delimiter(),
            Some("\\]")
        );
        assert_eq!(Token::new(TokenKind::MathShift, "\\]", 0).closing_math_delimiter(), None);
    }

    #[test]
    fn test_command_accessors() {
        let tok =
            Token::new(TokenKind::Command, "\\cite[p. 3]{knuth}", 0).with_command(CommandToken {
                name: "cite".into(),
                option: Some("p. 3".into()),
                argument: Some("knuth".into()),
            });
        assert!(tok.is_command());
        assert_eq!(tok.name(), Some("cite"));
        assert_eq!(tok.option(), Some("p. 3"));
        assert_eq!(tok.argument(), Some("knuth"));
    }
}
