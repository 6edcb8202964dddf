//! Mode-stack LaTeX parser.
//!
//! Turns the token stream into an [`Ast`]. The parser keeps an explicit
//! [`StateStack`] (default, math, environment, command argument, verbatim),
//! binds `\label`s in a [`SymbolTable`] and resolves references once the
//! whole document has been read, so forward references work.
//!
//! Nothing here aborts the parse: malformed input becomes a [`Diagnostic`]
//! and the offending construct is skipped or repaired.

mod state;
mod symbols;

pub use state::{ParserState, StateStack};
pub use symbols::SymbolTable;

use tracing::{debug, warn};

use super::ast::{Ast, AstKind, AstNode, NodeId};
use super::lexer::Lexer;
use super::options::{MathValidation, ParseOptions};
use super::token::{Token, TokenKind};
use super::vocabulary::{
    base_name, is_math_environment, is_verbatim_environment, section_level, AFFILIATION_COMMANDS,
    CITATION_COMMANDS, REFERENCE_COMMANDS,
};
use crate::utils::error::{Diagnostic, DiagnosticKind};

/// Result of parsing one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub ast: Ast,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// The LaTeX parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    states: StateStack,
    ast: Ast,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    options: ParseOptions,
    /// Node a `\label` binds to when no environment is open
    label_anchor: Option<NodeId>,
    /// Names of the environments currently open, innermost last
    open_environments: Vec<String>,
    pending_references: Vec<(NodeId, String, usize)>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, ParseOptions::default())
    }

    pub fn with_options(source: &'a str, options: ParseOptions) -> Self {
        let mut parser = Parser {
            lexer: Lexer::new(source),
            current: Token::eof(0),
            states: StateStack::new(),
            ast: Ast::new(),
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            options,
            label_anchor: None,
            open_environments: Vec::new(),
            pending_references: Vec::new(),
        };
        parser.advance();
        parser
    }

    pub fn state(&self) -> ParserState {
        self.states.current()
    }

    /// Parse the whole input.
    pub fn parse_document(mut self) -> ParsedDocument {
        let root = self.ast.root();
        while !self.current.is_eof() {
            if let Some(node) = self.parse_element() {
                self.attach(root, node);
            }
        }
        self.resolve_references();
        debug!(
            nodes = self.ast.len(),
            labels = self.symbols.len(),
            diagnostics = self.diagnostics.len(),
            "parsed document"
        );
        ParsedDocument {
            ast: self.ast,
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    // =========================================================================
    // Token handling
    // =========================================================================

    fn advance(&mut self) {
        loop {
            match self.lexer.next_token() {
                Ok(token) => {
                    self.current = token;
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "lexing failure");
                    let diagnostic = Diagnostic::warning(DiagnosticKind::Lexing, err.to_string());
                    self.diagnostics.push(diagnostic.at(err.offset()));
                }
            }
        }
    }

    fn source(&self) -> &'a str {
        self.lexer.source()
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!(kind = %diagnostic.kind, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    /// Allocate a node and check its content shape.
    fn create(&mut self, node: AstNode) -> NodeId {
        let kind = node.kind;
        let offset = node.offset;
        let verdict = node.validate_content();
        let id = self.ast.alloc(node);
        if let Err(message) = verdict {
            if kind == AstKind::Math && self.options.math_validation == MathValidation::Reclassify {
                self.ast.set_kind(id, AstKind::Text);
                let message = format!("{}; reclassified as Text", message);
                self.report(
                    Diagnostic::warning(DiagnosticKind::InvalidContent, message).at(offset),
                );
            } else {
                self.report(
                    Diagnostic::warning(DiagnosticKind::InvalidContent, message).at(offset),
                );
            }
        }
        id
    }

    fn node(&self, kind: AstKind, content: impl Into<String>, offset: usize) -> AstNode {
        AstNode::new(kind, content, offset, self.state())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Err(rejection) = self.ast.add_child(parent, child) {
            let offset = self.ast[child].offset;
            self.report(
                Diagnostic::warning(DiagnosticKind::RejectedChild, rejection.to_string())
                    .at(offset),
            );
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Parse one element at the current token.
    pub fn parse_element(&mut self) -> Option<NodeId> {
        match self.current.kind {
            TokenKind::Eof => None,
            TokenKind::Command => self.parse_command(),
            TokenKind::BeginEnvironment => self.parse_environment(),
            TokenKind::EndEnvironment => {
                let name = self.current.name().unwrap_or("").to_string();
                let offset = self.current.offset;
                let message = format!("stray \\end{{{}}}", name);
                self.report(
                    Diagnostic::warning(DiagnosticKind::InvalidContent, message).at(offset),
                );
                self.advance();
                None
            }
            TokenKind::MathShift => self.parse_math_mode(),
            TokenKind::OpenBrace | TokenKind::CloseBrace => {
                // Plain grouping braces are transparent
                self.advance();
                None
            }
            TokenKind::Text => {
                let tok = self.current.clone();
                self.advance();
                let node = self.node(AstKind::Text, tok.text, tok.offset);
                Some(self.create(node))
            }
        }
    }

    fn parse_command(&mut self) -> Option<NodeId> {
        let tok = self.current.clone();
        self.advance();
        let name = tok.name().unwrap_or("").to_string();
        let base = base_name(&name);

        if section_level(&name).is_some() {
            let title = match tok.argument() {
                Some(arg) => arg.to_string(),
                None if self.current.kind == TokenKind::OpenBrace => self.parse_brace_content(),
                None => String::new(),
            };
            let node = self.node(AstKind::Section, title.trim(), tok.offset).with_name(name);
            let id = self.create(node);
            self.label_anchor = Some(id);
            return Some(id);
        }

        let id = match base {
            "label" => {
                let node = self.node(AstKind::Label, tok.text.clone(), tok.offset).with_name(name);
                let id = self.create(node);
                if let Some(key) = tok.argument().map(str::trim).filter(|k| !k.is_empty()) {
                    let target = self.label_anchor.unwrap_or(id);
                    if let Some(previous) = self.symbols.define(key, target) {
                        self.diagnostics.push(
                            Diagnostic::warning(
                                DiagnosticKind::DuplicateLabel,
                                format!("label '{}' redefined (was {})", key, previous),
                            )
                            .at(tok.offset),
                        );
                    }
                }
                id
            }
            _ if REFERENCE_COMMANDS.contains(base) => {
                let node = self
                    .node(AstKind::Reference, tok.text.clone(), tok.offset)
                    .with_name(name);
                let id = self.create(node);
                for key in tok.argument().unwrap_or("").split(',') {
                    let key = key.trim();
                    if !key.is_empty() {
                        self.pending_references.push((id, key.to_string(), tok.offset));
                    }
                }
                id
            }
            _ if CITATION_COMMANDS.contains(base) => {
                let node = self
                    .node(AstKind::Reference, tok.text.clone(), tok.offset)
                    .with_name(name);
                self.create(node)
            }
            "author" => self.parse_entity_command(AstKind::Author, &tok, name.clone()),
            _ if AFFILIATION_COMMANDS.contains(base) => {
                self.parse_entity_command(AstKind::Affiliation, &tok, name.clone())
            }
            "bibitem" => {
                let node = self
                    .node(AstKind::Citation, tok.text.clone(), tok.offset)
                    .with_name(name);
                self.create(node)
            }
            _ => {
                let node = self
                    .node(AstKind::Command, tok.text.clone(), tok.offset)
                    .with_name(name);
                self.create(node)
            }
        };
        Some(id)
    }

    /// Author/affiliation commands own a Text child with their argument.
    fn parse_entity_command(&mut self, kind: AstKind, tok: &Token, name: String) -> NodeId {
        let node = self.node(kind, tok.text.clone(), tok.offset).with_name(name);
        let id = self.create(node);
        if let Some(arg) = tok.argument().filter(|a| !a.trim().is_empty()) {
            let offset = tok.offset + tok.text.find('{').map_or(0, |i| i + 1);
            let text = self.node(AstKind::Text, arg, offset);
            let text = self.create(text);
            self.attach(id, text);
        }
        id
    }

    /// Raw source of a `{...}` group starting at the current OpenBrace.
    fn parse_brace_content(&mut self) -> String {
        self.states.push(ParserState::CommandArgument);
        let open = self.current.clone();
        self.advance();
        let mut depth = 1usize;
        let mut end = open.end();
        loop {
            match self.current.kind {
                TokenKind::Eof => {
                    end = self.source().len();
                    self.report(
                        Diagnostic::warning(
                            DiagnosticKind::Lexing,
                            "Expected '}' but found end of input",
                        )
                        .at(open.offset),
                    );
                    break;
                }
                TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseBrace => {
                    depth -= 1;
                    if depth == 0 {
                        end = self.current.offset;
                        self.advance();
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        self.states.pop();
        self.source()[open.end()..end].to_string()
    }

    // =========================================================================
    // Math
    // =========================================================================

    fn parse_math_mode(&mut self) -> Option<NodeId> {
        let open = self.current.clone();
        let closing = match open.closing_math_delimiter() {
            Some(closing) => closing,
            None => {
                self.report(
                    Diagnostic::warning(
                        DiagnosticKind::InvalidContent,
                        format!("unmatched math delimiter {}", open.text),
                    )
                    .at(open.offset),
                );
                self.advance();
                return None;
            }
        };

        self.states.push(ParserState::MathMode);
        self.advance();
        let mut labels = Vec::new();
        let end = loop {
            if self.current.is_eof() {
                self.report(
                    Diagnostic::warning(
                        DiagnosticKind::Lexing,
                        format!("Expected '{}' but found end of input", closing),
                    )
                    .at(open.offset),
                );
                break self.source().len();
            }
            if self.current.kind == TokenKind::MathShift && self.current.text == closing {
                let end = self.current.end();
                self.advance();
                break end;
            }
            if self.current.name() == Some("label") {
                labels.extend(self.current.argument().map(|k| k.trim().to_string()));
            }
            self.advance();
        };
        self.states.pop();

        let content = self.source()[open.offset..end].to_string();
        let node = AstNode::new(AstKind::Math, content, open.offset, ParserState::MathMode);
        let id = self.create(node);
        self.bind_labels(labels, id, open.offset);
        Some(id)
    }

    /// `\begin{equation} ... \end{equation}` and friends become one Math node.
    fn parse_math_environment(&mut self, begin: Token, env: String) -> NodeId {
        self.states.push(ParserState::MathMode);
        let mut nesting = 0usize;
        let mut labels = Vec::new();
        let end = loop {
            match self.current.kind {
                TokenKind::Eof => {
                    self.report(
                        Diagnostic::warning(
                            DiagnosticKind::Lexing,
                            format!("Expected '\\end{{{}}}' but found end of input", env),
                        )
                        .at(begin.offset),
                    );
                    break self.source().len();
                }
                TokenKind::BeginEnvironment if self.current.name() == Some(env.as_str()) => {
                    nesting += 1
                }
                TokenKind::EndEnvironment if self.current.name() == Some(env.as_str()) => {
                    if nesting == 0 {
                        let end = self.current.end();
                        self.advance();
                        break end;
                    }
                    nesting -= 1;
                }
                TokenKind::Command if self.current.name() == Some("label") => {
                    labels.extend(self.current.argument().map(|k| k.trim().to_string()));
                }
                _ => {}
            }
            self.advance();
        };
        self.states.pop();

        let content = self.source()[begin.offset..end].to_string();
        let node = AstNode::new(AstKind::Math, content, begin.offset, ParserState::MathMode)
            .with_name(env);
        let id = self.create(node);
        self.bind_labels(labels, id, begin.offset);
        id
    }

    fn bind_labels(&mut self, labels: Vec<String>, target: NodeId, offset: usize) {
        for key in labels.into_iter().filter(|k| !k.is_empty()) {
            if let Some(previous) = self.symbols.define(&key, target) {
                self.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::DuplicateLabel,
                        format!("label '{}' redefined (was {})", key, previous),
                    )
                    .at(offset),
                );
            }
        }
    }

    // =========================================================================
    // Environments
    // =========================================================================

    fn parse_environment(&mut self) -> Option<NodeId> {
        let begin = self.current.clone();
        let env = begin.name().unwrap_or("").to_string();

        if is_verbatim_environment(&env) {
            return Some(self.parse_verbatim(begin, env));
        }
        self.advance();

        if self.states.count(ParserState::Environment) >= self.options.max_depth {
            self.report(
                Diagnostic::error(
                    DiagnosticKind::DepthLimit,
                    format!(
                        "environment '{}' exceeds the nesting limit of {}; body skipped",
                        env, self.options.max_depth
                    ),
                )
                .at(begin.offset),
            );
            self.skip_environment(&env);
            let node = self.node(AstKind::Environment, begin.text, begin.offset).with_name(env);
            return Some(self.create(node));
        }

        if is_math_environment(&env) {
            return Some(self.parse_math_environment(begin, env));
        }

        let kind = match env.as_str() {
            "abstract" => AstKind::Abstract,
            "thebibliography" => AstKind::Bibliography,
            _ => AstKind::Environment,
        };
        let node = self.node(kind, begin.text.clone(), begin.offset).with_name(env.clone());
        let id = self.create(node);

        self.states.push(ParserState::Environment);
        self.open_environments.push(env.clone());
        let saved_anchor = self.label_anchor;
        if env != "document" {
            self.label_anchor = Some(id);
        }

        let mut current_item: Option<NodeId> = None;
        loop {
            match self.current.kind {
                TokenKind::Eof => {
                    self.report(
                        Diagnostic::warning(
                            DiagnosticKind::Lexing,
                            format!("Expected '\\end{{{}}}' but found end of input", env),
                        )
                        .at(begin.offset),
                    );
                    break;
                }
                TokenKind::EndEnvironment => {
                    let end_name = self.current.name().unwrap_or("").to_string();
                    if end_name == env {
                        self.advance();
                        break;
                    }
                    let encloses =
                        self.open_environments.iter().rev().skip(1).any(|e| *e == end_name);
                    self.report(
                        Diagnostic::warning(
                            DiagnosticKind::InvalidContent,
                            format!("\\end{{{}}} while '{}' is open", end_name, env),
                        )
                        .at(self.current.offset),
                    );
                    if encloses {
                        // Let the enclosing environment consume it
                        break;
                    }
                    self.advance();
                }
                _ => {
                    let child = match self.parse_element() {
                        Some(child) => child,
                        None => continue,
                    };
                    if kind == AstKind::Bibliography {
                        if self.ast[child].kind == AstKind::Citation {
                            self.attach(id, child);
                            current_item = Some(child);
                            continue;
                        }
                        if let Some(item) = current_item {
                            self.attach(item, child);
                            continue;
                        }
                    }
                    self.attach(id, child);
                }
            }
        }

        if env != "document" {
            self.label_anchor = saved_anchor;
        }
        self.open_environments.pop();
        self.states.pop();
        Some(id)
    }

    /// Capture a verbatim body from the raw source. The current token is
    /// the `\begin`, so the lexer cursor sits right after it.
    fn parse_verbatim(&mut self, begin: Token, env: String) -> NodeId {
        self.states.push(ParserState::Verbatim);
        let body_start = self.lexer.position();
        let marker = format!("\\end{{{}}}", env);
        let (body_end, resume) = match self.source()[body_start..].find(&marker) {
            Some(rel) => (body_start + rel, body_start + rel + marker.len()),
            None => {
                self.report(
                    Diagnostic::warning(
                        DiagnosticKind::Lexing,
                        format!("Expected '{}' but found end of input", marker),
                    )
                    .at(begin.offset),
                );
                (self.source().len(), self.source().len())
            }
        };
        let body = self.source()[body_start..body_end].to_string();

        let node = self.node(AstKind::Environment, begin.text.clone(), begin.offset).with_name(env);
        let id = self.create(node);
        if !body.trim().is_empty() {
            let content = self.node(AstKind::EnvironmentContent, body, body_start);
            let content = self.create(content);
            self.attach(id, content);
        }
        self.states.pop();

        self.lexer.seek(resume);
        self.advance();
        id
    }

    /// Consume tokens through the `\end` matching an environment that was
    /// just opened, without building nodes.
    fn skip_environment(&mut self, env: &str) {
        let mut nesting = 0usize;
        loop {
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::BeginEnvironment if self.current.name() == Some(env) => nesting += 1,
                TokenKind::EndEnvironment if self.current.name() == Some(env) => {
                    if nesting == 0 {
                        self.advance();
                        return;
                    }
                    nesting -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // =========================================================================
    // References
    // =========================================================================

    fn resolve_references(&mut self) {
        let pending = std::mem::take(&mut self.pending_references);
        for (node, key, offset) in pending {
            match self.symbols.resolve(&key) {
                Some(target) => {
                    if let Err(rejection) = self.ast.add_reference(node, target) {
                        self.report(Diagnostic::warning(
                            DiagnosticKind::RejectedChild,
                            rejection.to_string(),
                        ));
                    }
                }
                None => self.report(
                    Diagnostic::warning(
                        DiagnosticKind::UnresolvedLabel,
                        format!("label '{}' is never defined", key),
                    )
                    .at(offset),
                ),
            }
        }
    }
}

/// Parse a document with default options.
pub fn parse(source: &str) -> ParsedDocument {
    Parser::new(source).parse_document()
}

/// Parse a document with explicit options.
pub fn parse_with_options(source: &str, options: ParseOptions) -> ParsedDocument {
    Parser::with_options(source, options).parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(doc: &ParsedDocument, parent: NodeId) -> Vec<AstKind> {
        doc.ast.children(parent).iter().map(|c| doc.ast[*c].kind).collect()
    }

    #[test]
    fn test_section_text_math() {
        let doc = parse(r"\section{Intro}Hello $x+1$ world.");
        let root = doc.ast.root();
        assert_eq!(
            kinds(&doc, root),
            vec![AstKind::Section, AstKind::Text, AstKind::Math, AstKind::Text]
        );
        let children = doc.ast.children(root);
        assert_eq!(doc.ast[children[0]].content, "Intro");
        assert_eq!(doc.ast[children[2]].content, "$x+1$");
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
    }

    #[test]
    fn test_environment_nesting() {
        let doc = parse(
            r"\begin{document}\section{A}\begin{figure}\caption{Cap}\label{fig:a}\end{figure}\end{document}",
        );
        let root = doc.ast.root();
        let document = doc.ast.children(root)[0];
        assert_eq!(doc.ast[document].name.as_deref(), Some("document"));
        assert_eq!(kinds(&doc, document), vec![AstKind::Section, AstKind::Environment]);
        let figure = doc.ast.children(document)[1];
        assert_eq!(kinds(&doc, figure), vec![AstKind::Command, AstKind::Label]);
        assert_eq!(doc.symbols.resolve("fig:a"), Some(figure));
    }

    #[test]
    fn test_forward_reference_resolves() {
        let doc = parse(r"See \ref{sec:b}. \section{B}\label{sec:b}");
        let reference = doc
            .ast
            .ids()
            .find(|id| doc.ast[*id].kind == AstKind::Reference)
            .unwrap();
        let section = doc
            .ast
            .ids()
            .find(|id| doc.ast[*id].kind == AstKind::Section)
            .unwrap();
        assert_eq!(doc.ast[reference].references(), &[section]);
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let doc = parse(r"\ref{nowhere}");
        assert!(doc
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedLabel && d.message.contains("nowhere")));
    }

    #[test]
    fn test_duplicate_label_reported() {
        let doc = parse(r"\section{A}\label{x}\section{B}\label{x}");
        assert!(doc.diagnostics.iter().any(|d| d.kind == DiagnosticKind::DuplicateLabel));
    }

    #[test]
    fn test_equation_environment_is_math() {
        let doc = parse(r"\begin{equation}E=mc^2\label{eq:e}\end{equation}");
        let math = doc.ast.children(doc.ast.root())[0];
        assert_eq!(doc.ast[math].kind, AstKind::Math);
        assert!(doc.ast[math].content.starts_with(r"\begin{equation}"));
        assert_eq!(doc.symbols.resolve("eq:e"), Some(math));
    }

    #[test]
    fn test_verbatim_captured_raw() {
        let doc = parse("\\begin{verbatim}\n\\section{not a section} $x\n\\end{verbatim}\nAfter");
        let root = doc.ast.root();
        assert_eq!(kinds(&doc, root), vec![AstKind::Environment, AstKind::Text]);
        let env = doc.ast.children(root)[0];
        let body = doc.ast.children(env)[0];
        assert_eq!(doc.ast[body].kind, AstKind::EnvironmentContent);
        assert!(doc.ast[body].content.contains(r"\section{not a section}"));
    }

    #[test]
    fn test_bibliography_groups_items() {
        let doc = parse(
            r"\begin{thebibliography}{9}\bibitem{knuth84} Knuth, 1984. \bibitem{lamport} Lamport.\end{thebibliography}",
        );
        let bib = doc.ast.children(doc.ast.root())[0];
        assert_eq!(doc.ast[bib].kind, AstKind::Bibliography);
        assert_eq!(kinds(&doc, bib), vec![AstKind::Citation, AstKind::Citation]);
        let first = doc.ast.children(bib)[0];
        assert_eq!(doc.ast.text_content(first), "Knuth, 1984.");
    }

    #[test]
    fn test_author_owns_text_child() {
        let doc = parse(r"\author{A \and B}\affiliation{Uni1}");
        let root = doc.ast.root();
        assert_eq!(kinds(&doc, root), vec![AstKind::Author, AstKind::Affiliation]);
        let author = doc.ast.children(root)[0];
        let text = doc.ast.children(author)[0];
        assert_eq!(doc.ast[text].content, r"A \and B");
    }

    #[test]
    fn test_depth_limit_skips_body() {
        let options = ParseOptions {
            max_depth: 1,
            ..ParseOptions::default()
        };
        let doc = parse_with_options(r"\begin{a}\begin{b}inner\end{b}after\end{a}", options);
        let outer = doc.ast.children(doc.ast.root())[0];
        let inner = doc.ast.children(outer)[0];
        assert!(doc.ast.children(inner).is_empty());
        assert!(doc.diagnostics.iter().any(|d| d.kind == DiagnosticKind::DepthLimit));
        assert_eq!(kinds(&doc, outer), vec![AstKind::Environment, AstKind::Text]);
    }

    #[test]
    fn test_unterminated_math_policy() {
        let doc = parse("$x + 1");
        let math = doc.ast.children(doc.ast.root())[0];
        assert_eq!(doc.ast[math].kind, AstKind::Math);
        assert!(doc.diagnostics.iter().any(|d| d.kind == DiagnosticKind::InvalidContent));

        let strict = parse_with_options("$x + 1", ParseOptions::strict());
        let math = strict.ast.children(strict.ast.root())[0];
        assert_eq!(strict.ast[math].kind, AstKind::Text);
    }

    #[test]
    fn test_mismatched_end_closes_inner() {
        let doc = parse(r"\begin{a}\begin{b}x\end{a}tail");
        let root = doc.ast.root();
        let a = doc.ast.children(root)[0];
        assert_eq!(kinds(&doc, a), vec![AstKind::Environment]);
        assert_eq!(kinds(&doc, root), vec![AstKind::Environment, AstKind::Text]);
    }

    #[test]
    fn test_lexing_failure_is_not_fatal() {
        let doc = parse(r"\section{Intro text");
        assert!(doc.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Lexing));
        assert!(doc.ast.ids().any(|id| doc.ast[id].kind == AstKind::Section));
    }
}
