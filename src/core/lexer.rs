//! LaTeX Lexer
//!
//! Converts a LaTeX source string into a stream of coarse tokens:
//! - Control sequences with their `[option]` and `{argument}` captured
//! - `\begin{..}` / `\end{..}` classified as environment boundaries
//! - Math shifts (`$`, `$$`, `\[`, `\]`, `\(`, `\)`)
//! - Braces and free text
//!
//! Comments are elided and whitespace before a token is skipped.

use tracing::trace;

use super::token::{CommandToken, Token, TokenKind};
use crate::utils::error::LexError;

/// The LaTeX lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    finished: bool,
    /// Start of a command whose arguments failed to scan; it is re-lexed bare
    bare_command_at: Option<usize>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            finished: false,
            bare_command_at: None,
        }
    }

    /// The full source being lexed.
    pub fn source(&self) -> &'a str {
        self.input
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor, e.g. past a raw-captured verbatim body. Offsets
    /// that are out of range or not on a char boundary are clamped forward.
    pub(crate) fn seek(&mut self, offset: usize) {
        let mut pos = offset.min(self.input.len());
        while !self.input.is_char_boundary(pos) {
            pos += 1;
        }
        self.pos = pos;
    }

    /// Peek at the next character without consuming it
    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Consume and return the next character
    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    /// Skip a comment through the end of its line
    fn skip_comment(&mut self) {
        while let Some(c) = self.next_char() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Consume `expected` or fail naming what was found instead.
    pub fn expect(&mut self, expected: char) -> Result<(), LexError> {
        match self.peek_char() {
            Some(c) if c == expected => {
                self.next_char();
                Ok(())
            }
            Some(found) => Err(LexError::Unexpected {
                expected,
                found,
                offset: self.pos,
            }),
            None => Err(LexError::Unterminated {
                expected,
                offset: self.pos,
            }),
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let token = match self.peek_char() {
                None => return Ok(Token::eof(start)),
                Some('%') => {
                    self.skip_comment();
                    continue;
                }
                Some('$') => {
                    self.next_char();
                    if self.peek_char() == Some('$') {
                        self.next_char();
                    }
                    self.token(TokenKind::MathShift, start)
                }
                Some('{') => {
                    self.next_char();
                    self.token(TokenKind::OpenBrace, start)
                }
                Some('}') => {
                    self.next_char();
                    self.token(TokenKind::CloseBrace, start)
                }
                Some('\\') => self.lex_command(start)?,
                Some(_) => self.lex_text(start),
            };
            trace!(token = %token, "lexed");
            return Ok(token);
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, &self.input[start..self.pos], start)
    }

    fn lex_text(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek_char() {
            if matches!(c, '\\' | '{' | '}' | '%' | '$') {
                break;
            }
            self.next_char();
        }
        self.token(TokenKind::Text, start)
    }

    fn lex_command(&mut self, start: usize) -> Result<Token, LexError> {
        self.next_char();
        let first = match self.peek_char() {
            Some(c) => c,
            // Lone backslash at end of input
            None => return Ok(self.token(TokenKind::Text, start)),
        };

        if !first.is_ascii_alphabetic() {
            self.next_char();
            let kind = match first {
                '[' | ']' | '(' | ')' => TokenKind::MathShift,
                _ => TokenKind::Command,
            };
            let token = self.token(kind, start);
            return Ok(if kind == TokenKind::Command {
                token.with_command(CommandToken {
                    name: first.to_string(),
                    ..Default::default()
                })
            } else {
                token
            });
        }

        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphabetic() {
                name.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('*') {
            name.push('*');
            self.next_char();
        }
        let (option, argument) = if self.bare_command_at.take() == Some(start) {
            (None, None)
        } else {
            match self.scan_arguments() {
                Ok(parts) => parts,
                Err(err) => {
                    // Rewind; the next call yields the command without arguments
                    self.pos = start;
                    self.bare_command_at = Some(start);
                    return Err(err);
                }
            }
        };

        let token = match name.as_str() {
            "begin" | "end" => {
                let kind = if name == "begin" {
                    TokenKind::BeginEnvironment
                } else {
                    TokenKind::EndEnvironment
                };
                let env = argument.unwrap_or_default();
                let mut env_option = option;
                if kind == TokenKind::BeginEnvironment {
                    // Trailing `[title]` and parameter groups such as `{ll}`
                    if self.peek_char() == Some('[') {
                        let open = self.pos;
                        match self.scan_group('[', ']') {
                            Ok(opt) => env_option = Some(opt),
                            Err(_) => self.pos = open,
                        }
                    }
                    while self.peek_char() == Some('{') && is_parameterized_env(&env) {
                        let open = self.pos;
                        if self.scan_group('{', '}').is_err() {
                            self.pos = open;
                            break;
                        }
                    }
                }
                self.token(kind, start).with_command(CommandToken {
                    name: env,
                    option: env_option,
                    argument: None,
                })
            }
            _ => self.token(TokenKind::Command, start).with_command(CommandToken {
                name,
                option,
                argument,
            }),
        };
        Ok(token)
    }

    fn scan_arguments(&mut self) -> Result<(Option<String>, Option<String>), LexError> {
        let mut option = None;
        let mut argument = None;
        if self.peek_char() == Some('[') {
            option = Some(self.scan_group('[', ']')?);
        }
        if self.peek_char() == Some('{') {
            argument = Some(self.scan_group('{', '}')?);
        }
        Ok((option, argument))
    }

    /// Scan a delimited group starting at the cursor, returning its inner
    /// text. Escaped delimiters do not count towards nesting.
    fn scan_group(&mut self, open: char, close: char) -> Result<String, LexError> {
        let group_start = self.pos;
        self.expect(open)?;
        let inner_start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.next_char() {
            if c == '\\' {
                self.next_char();
            } else if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(self.input[inner_start..self.pos - close.len_utf8()].to_string());
                }
            }
        }
        Err(LexError::Unterminated {
            expected: close,
            offset: group_start,
        })
    }

    /// Tokenize the entire input, collecting lexing failures separately.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(tok) if tok.is_eof() => break,
                Ok(tok) => tokens.push(tok),
                Err(err) => errors.push(err),
            }
        }
        (tokens, errors)
    }
}

/// Environments whose `\begin` takes brace parameters that are not content.
fn is_parameterized_env(name: &str) -> bool {
    matches!(
        name,
        "tabular"
            | "tabular*"
            | "tabularx"
            | "array"
            | "minipage"
            | "wrapfigure"
            | "multicols"
            | "thebibliography"
    )
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(tok) if tok.is_eof() => {
                self.finished = true;
                None
            }
            other => Some(other),
        }
    }
}

/// Convenience function to tokenize a string, dropping lexing failures
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize().0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_command_with_arguments() {
        let tokens = tokenize(r"\section[Short]{Long title}");
        assert_eq!(tokens.len(), 1);
        let tok = &tokens[0];
        assert_eq!(tok.kind, TokenKind::Command);
        assert_eq!(tok.name(), Some("section"));
        assert_eq!(tok.option(), Some("Short"));
        assert_eq!(tok.argument(), Some("Long title"));
        assert_eq!(tok.text, r"\section[Short]{Long title}");
    }

    #[test]
    fn test_nested_argument() {
        let tokens = tokenize(r"\textbf{a{b}c} rest");
        assert_eq!(tokens[0].argument(), Some("a{b}c"));
        assert_eq!(tokens[1].text, "rest");
    }

    #[test]
    fn test_escaped_brace_in_argument() {
        let tokens = tokenize(r"\section{Set \{x\}}");
        assert_eq!(tokens[0].argument(), Some(r"Set \{x\}"));
    }

    #[test]
    fn test_starred_command() {
        let tokens = tokenize(r"\section*{Intro}");
        assert_eq!(tokens[0].name(), Some("section*"));
    }

    #[test]
    fn test_environment_boundaries() {
        let tokens = tokenize(r"\begin{theorem}[Fermat] x \end{theorem}");
        assert_eq!(tokens[0].kind, TokenKind::BeginEnvironment);
        assert_eq!(tokens[0].name(), Some("theorem"));
        assert_eq!(tokens[0].option(), Some("Fermat"));
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens[2].kind, TokenKind::EndEnvironment);
        assert_eq!(tokens[2].name(), Some("theorem"));
    }

    #[test]
    fn test_tabular_parameters_swallowed() {
        let tokens = tokenize(r"\begin{tabular}{ll} a & b \end{tabular}");
        assert_eq!(tokens[0].text, r"\begin{tabular}{ll}");
        assert_eq!(tokens[1].text, "a & b ");
    }

    #[test]
    fn test_math_shifts() {
        assert_eq!(
            kinds(r"$x$ $$y$$ \[z\]"),
            vec![
                TokenKind::MathShift,
                TokenKind::Text,
                TokenKind::MathShift,
                TokenKind::MathShift,
                TokenKind::Text,
                TokenKind::MathShift,
                TokenKind::MathShift,
                TokenKind::Text,
                TokenKind::MathShift,
            ]
        );
        let tokens = tokenize("$$y$$");
        assert_eq!(tokens[0].text, "$$");
    }

    #[test]
    fn test_comment_elided() {
        let tokens = tokenize("a % comment\nb");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "a ");
        assert_eq!(tokens[1].text, "b");
    }

    #[test]
    fn test_escaped_characters() {
        let tokens = tokenize(r"50\% off");
        assert_eq!(tokens[0].text, "50");
        assert_eq!(tokens[1].name(), Some("%"));
        assert_eq!(tokens[2].text, "off");
    }

    #[test]
    fn test_offsets_are_absolute() {
        let input = "ab \\cite{k} {c}";
        for tok in tokenize(input) {
            assert_eq!(&input[tok.offset..tok.end()], tok.text);
        }
    }

    #[test]
    fn test_unterminated_argument_recovers() {
        let mut lexer = Lexer::new(r"\section{Intro text");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(
            err,
            LexError::Unterminated {
                expected: '}',
                offset: 8
            }
        );
        let bare = lexer.next_token().unwrap();
        assert_eq!(bare.name(), Some("section"));
        assert_eq!(bare.argument(), None);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::OpenBrace);
        assert_eq!(lexer.next_token().unwrap().text, "Intro text");
    }

    #[test]
    fn test_expect_reports_found_char() {
        let mut lexer = Lexer::new("x");
        let err = lexer.expect('{').unwrap_err();
        assert_eq!(err.to_string(), "Expected '{' but found 'x' at byte 0");
    }
}
