//! Traversal state machine
//!
//! [`Traversal::run`] walks the AST with [`LinkedWalk`] (tree children, then
//! nodes reached through DAG hierarchical links) and moves a
//! [`StateMachine`] through one validated transition path per node. Each
//! node's handler appends XML-like pieces to the current chunk, pushes typed
//! [`Fragment`]s into a [`StructuredDocument`] and stages authors and
//! affiliations. A node whose transition is refused is logged, recorded as a
//! diagnostic and skipped together with its subtree; the walk continues with
//! its siblings.

pub mod commands;
pub mod context;
pub mod entities;
pub mod state;

pub use context::TraversalContext;
pub use entities::{EntityCollector, EntityOutput};
pub use state::{is_valid_transition, FsmState, StateMachine};

use texgraph_ir::{Boundary, Fragment, MathDisplay, StructuredDocument};
use tracing::{debug, info, warn};

use self::commands::{
    categorize, display_argument, environment_option, environment_state, escape_markup,
    is_theorem_state, list_argument, raw_argument, refined_state, split_inline_math,
    strip_math_delimiters, CommandCategory, TextPiece,
};
use self::context::{EntityBlock, FloatDraft};
use crate::core::ast::{Ast, AstKind, AstNode, NodeId};
use crate::core::options::ParseOptions;
use crate::core::vocabulary::{
    base_name, is_math_environment, is_verbatim_environment, section_level, CITATION_COMMANDS,
    FLOAT_ENVIRONMENTS,
};
use crate::core::walk::{LinkedWalk, WalkEvent};
use crate::graph::{
    citation_id, citation_keys, is_compatible, reference_edge, Dag, DagIndex, EdgeType, NodeType,
    DOCUMENT_ID,
};
use crate::ner::crf::CrfModel;
use crate::utils::error::{Diagnostic, DiagnosticKind, ExportError, TraversalError};
use crate::utils::text::{collapse_whitespace, remove_commands, split_command, strip_latex};

/// Everything one traversal produces.
#[derive(Debug, Clone, Default)]
pub struct TraversalOutput {
    pub chunks: Vec<String>,
    pub document: StructuredDocument,
    pub diagnostics: Vec<Diagnostic>,
}

impl TraversalOutput {
    /// The structured document as a JSON value.
    pub fn document_json(&self) -> Result<serde_json::Value, ExportError> {
        Ok(serde_json::to_value(&self.document)?)
    }
}

/// One run of the state machine over a parsed document.
pub struct Traversal {
    options: ParseOptions,
    crf: Option<CrfModel>,
    fsm: StateMachine,
    ctx: TraversalContext,
    /// Open container nodes and the state each one entered
    containers: Vec<(NodeId, FsmState)>,
}

impl Traversal {
    pub fn new(options: ParseOptions) -> Self {
        let crf = options.use_crf.then(crate::ner::trained_seed_model);
        Traversal {
            options,
            crf,
            fsm: StateMachine::new(),
            ctx: TraversalContext::new(),
            containers: Vec::new(),
        }
    }

    /// Use `model` to classify author block segments.
    pub fn with_crf(mut self, model: CrfModel) -> Self {
        self.crf = Some(model);
        self
    }

    pub fn state(&self) -> FsmState {
        self.fsm.current()
    }

    /// Walk `ast`, extending `graph` with citation, reference and entity
    /// nodes.
    pub fn run(mut self, ast: &Ast, graph: &mut Dag) -> TraversalOutput {
        self.ctx.document_node = graph.lookup(DOCUMENT_ID);
        let mut walk = LinkedWalk::new(ast.root()).follow_links(self.options.follow_graph_links);

        while let Some(event) = walk.next_event(ast, Some(&*graph)) {
            match event {
                WalkEvent::Enter(id) => {
                    if let Err(err) = self.enter(ast, graph, id) {
                        let offset = ast.get(id).map_or(0, |n| n.offset);
                        warn!(node = %id, error = %err, "skipping node");
                        let kind = match err {
                            TraversalError::InvalidTransition { .. } => {
                                DiagnosticKind::InvalidTransition
                            }
                            _ => DiagnosticKind::InvalidStructure,
                        };
                        let diagnostic = Diagnostic::warning(kind, err.to_string()).at(offset);
                        self.ctx.diagnostics.push(diagnostic);
                        walk.skip_subtree(id);
                        self.restore();
                    }
                }
                WalkEvent::Exit(id) => self.exit(ast, id),
            }
        }
        self.ctx.flush_chunk();

        let entities = std::mem::take(&mut self.ctx.entities).finish(graph);
        let mut document = std::mem::take(&mut self.ctx.document);
        document.metadata.authors = entities.authors;
        document.metadata.affiliations = entities.affiliations;
        self.ctx.diagnostics.extend(entities.diagnostics);

        info!(
            chunks = self.ctx.chunks.len(),
            fragments = document.content.len(),
            authors = document.metadata.authors.len(),
            transitions = self.fsm.transitions(),
            "traversal finished"
        );
        TraversalOutput {
            chunks: std::mem::take(&mut self.ctx.chunks),
            document,
            diagnostics: std::mem::take(&mut self.ctx.diagnostics),
        }
    }

    // =========================================================================
    // Walk protocol
    // =========================================================================

    fn enter(&mut self, ast: &Ast, graph: &mut Dag, id: NodeId) -> Result<(), TraversalError> {
        let Some(node) = ast.get(id) else { return Ok(()) };
        self.check_structure(ast, id, node)?;
        let path = self.state_path(node)?;
        for state in &path {
            self.fsm.set_state(*state)?;
        }
        let target = self.fsm.current();
        if target.is_container() {
            self.containers.push((id, target));
        }

        match node.kind {
            AstKind::Document => debug!("document start"),
            AstKind::Section => self.enter_section(ast, id, node),
            AstKind::Text => self.text(&node.content),
            AstKind::EnvironmentContent => self.verbatim(&node.content),
            AstKind::Math => self.math(node),
            AstKind::Label => self.label(node),
            AstKind::Reference => {
                if CITATION_COMMANDS.contains(base_name(node.name.as_deref().unwrap_or(""))) {
                    self.citation(graph, node);
                } else {
                    self.reference(ast, graph, node);
                }
            }
            AstKind::Command => self.command(node),
            AstKind::Citation => {
                let key = raw_argument(&node.content).unwrap_or_default();
                self.ctx.bibitem = Some((key, String::new()));
            }
            AstKind::Author | AstKind::Affiliation => {
                let parts = split_command(&node.content).unwrap_or_default();
                self.ctx.open_entity_block(
                    node.kind == AstKind::Author,
                    EntityBlock {
                        command: base_name(node.name.as_deref().unwrap_or(&parts.name)).to_string(),
                        option: parts.option,
                        text: String::new(),
                        anchor: ast.dag_node(id),
                    },
                );
            }
            AstKind::Abstract => self.ctx.abstract_buffer = Some(String::new()),
            AstKind::Bibliography => {
                self.ctx.flush_chunk();
                self.ctx.emit("<bibliography>");
                self.ctx.push_fragment(Fragment::Environment {
                    name: node.name.clone().unwrap_or_else(|| "thebibliography".to_string()),
                    boundary: Boundary::Begin,
                });
            }
            AstKind::Environment => self.enter_environment(node, target),
        }
        Ok(())
    }

    fn exit(&mut self, ast: &Ast, id: NodeId) {
        let Some(node) = ast.get(id) else { return };
        let state = match self.containers.last() {
            Some((top, state)) if *top == id => {
                let state = *state;
                self.containers.pop();
                Some(state)
            }
            _ => None,
        };

        match node.kind {
            AstKind::Document => debug!("document end"),
            AstKind::Citation => {
                if let Some((key, text)) = self.ctx.bibitem.take() {
                    let text = collapse_whitespace(&text);
                    self.ctx.emit(format!(
                        "<bibitem key=\"{}\">{}</bibitem>",
                        escape_markup(&key),
                        escape_markup(&text)
                    ));
                    self.ctx.push_fragment(Fragment::Bibitem { key, text });
                }
            }
            AstKind::Author | AstKind::Affiliation => self.finish_entity_block(node.kind),
            AstKind::Abstract => {
                if let Some(buffer) = self.ctx.abstract_buffer.take() {
                    let text = collapse_whitespace(&buffer);
                    if !text.is_empty() {
                        self.ctx.emit(format!("<abstract>{}</abstract>", escape_markup(&text)));
                        self.ctx.document.metadata.abstract_text = Some(text.clone());
                        self.ctx.push_fragment(Fragment::Abstract { text });
                    }
                }
            }
            AstKind::Bibliography => {
                self.ctx.emit("</bibliography>");
                self.ctx.push_fragment(Fragment::Environment {
                    name: node.name.clone().unwrap_or_else(|| "thebibliography".to_string()),
                    boundary: Boundary::End,
                });
            }
            AstKind::Environment => self.exit_environment(node, state),
            _ => {}
        }
        self.restore();
    }

    /// Return to the state of the innermost open container.
    fn restore(&mut self) {
        if let Some((_, state)) = self.containers.last().copied() {
            if let Err(err) = self.fsm.set_state(state) {
                debug!(error = %err, "could not return to enclosing container");
            }
        }
    }

    /// Structural constraints the transition table does not express.
    fn check_structure(&self, ast: &Ast, id: NodeId, node: &AstNode) -> Result<(), TraversalError> {
        let invalid = TraversalError::InvalidStructure {
            state: self.fsm.current(),
            kind: node.kind,
        };
        let in_block = self.containers.iter().any(|(_, s)| {
            matches!(s, FsmState::InAuthor | FsmState::InAffiliation | FsmState::InCitation)
        });
        let in_bibliography = self.containers.iter().any(|(_, s)| *s == FsmState::InBibliography);
        match node.kind {
            AstKind::Document if id != ast.root() => Err(invalid),
            AstKind::Section | AstKind::Abstract | AstKind::Author | AstKind::Affiliation
                if in_block =>
            {
                Err(invalid)
            }
            AstKind::Bibliography if in_block || in_bibliography => Err(invalid),
            _ => Ok(()),
        }
    }

    /// States a node moves through, outermost first.
    fn state_path(&self, node: &AstNode) -> Result<Vec<FsmState>, TraversalError> {
        let name = node.name.as_deref().unwrap_or("");
        let path = match node.kind {
            AstKind::Document => vec![FsmState::InDocument],
            AstKind::Section => {
                let level = section_level(name)
                    .ok_or(TraversalError::UnknownNodeType(AstKind::Section))?;
                let state = match level {
                    0..=2 => FsmState::InSection,
                    3 | 4 => FsmState::InSubsection,
                    _ => FsmState::InParagraph,
                };
                vec![state]
            }
            AstKind::Command | AstKind::Reference | AstKind::Label | AstKind::Citation => {
                let mut path = vec![FsmState::InCommand];
                path.extend(refined_state(name));
                path
            }
            AstKind::Math => vec![math_state(node)],
            AstKind::Text | AstKind::EnvironmentContent => vec![FsmState::InText],
            AstKind::Author => vec![FsmState::InAuthor],
            AstKind::Affiliation => vec![FsmState::InAffiliation],
            AstKind::Abstract => vec![FsmState::InAbstract],
            AstKind::Bibliography => vec![FsmState::InBibliography],
            AstKind::Environment => {
                let custom = self.ctx.custom_theorems.contains(base_name(name));
                vec![environment_state(name, custom)]
            }
        };
        Ok(path)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    fn enter_section(&mut self, ast: &Ast, id: NodeId, node: &AstNode) {
        let level = node.name.as_deref().and_then(section_level).unwrap_or(2);
        let title = collapse_whitespace(&strip_latex(&node.content));
        self.ctx.entities.break_sequence();
        self.ctx.open_section(level, ast.dag_node(id));
        self.ctx.flush_chunk();
        self.ctx
            .emit(format!("<section level=\"{}\">{}</section>", level, escape_markup(&title)));
        let idx = self.ctx.push_fragment(Fragment::Section {
            title,
            level,
            label: None,
        });
        self.ctx.last_section = Some(idx);
    }

    fn text(&mut self, content: &str) {
        if self.ctx.buffer_text(content) {
            return;
        }
        for piece in split_inline_math(content) {
            match piece {
                TextPiece::Text(text) => {
                    self.ctx.emit(format!("<text>{}</text>", escape_markup(&text)));
                    self.ctx.push_fragment(Fragment::text(text));
                }
                TextPiece::Math(expression) => {
                    let escaped = escape_markup(&expression);
                    self.ctx.emit(format!("<math display=\"inline\">{}</math>", escaped));
                    self.ctx.push_fragment(Fragment::inline_math(expression));
                }
            }
        }
    }

    fn verbatim(&mut self, content: &str) {
        let environment = self.ctx.current_env().unwrap_or("verbatim").to_string();
        let text = content.trim_matches(|c| c == '\n' || c == '\r').to_string();
        self.ctx.emit(format!(
            "<verbatim environment=\"{}\">{}</verbatim>",
            escape_markup(&environment),
            escape_markup(&text)
        ));
        self.ctx.push_fragment(Fragment::Verbatim { environment, text });
    }

    fn math(&mut self, node: &AstNode) {
        if self.ctx.buffer_text(&node.content) {
            return;
        }
        let (expression, delimited) = strip_math_delimiters(&node.content, node.name.as_deref());
        let expression = collapse_whitespace(&remove_commands(&expression, &["label"]));
        let display = match delimited {
            Some(true) => MathDisplay::Display,
            Some(false) => MathDisplay::Inline,
            None if self.ctx.current_env().map_or(false, is_math_environment) => {
                MathDisplay::Display
            }
            None => MathDisplay::Inline,
        };
        let tag = match display {
            MathDisplay::Inline => "inline",
            MathDisplay::Display => "display",
        };
        self.ctx
            .emit(format!("<math display=\"{}\">{}</math>", tag, escape_markup(&expression)));
        self.ctx.push_fragment(Fragment::Math { expression, display });
    }

    /// A label names the open float, else the open theorem, else the
    /// section it directly follows.
    fn label(&mut self, node: &AstNode) {
        let Some(key) = raw_argument(&node.content) else { return };
        if let Some(draft) = self.ctx.floats.last_mut() {
            if draft.label.is_none() {
                draft.label = Some(key);
                return;
            }
        }
        if let Some(idx) = self.ctx.theorems.last().copied() {
            let slot = self.ctx.document.content.get_mut(idx);
            if let Some(Fragment::Theorem { label: label @ None, .. }) = slot {
                *label = Some(key);
                return;
            }
        }
        self.ctx.emit(format!("<label key=\"{}\"/>", escape_markup(&key)));
        let outside_environments = self.ctx.env_stack.iter().all(|e| e == "document");
        if let (true, Some(idx)) = (outside_environments, self.ctx.last_section) {
            let slot = self.ctx.document.content.get_mut(idx);
            if let Some(Fragment::Section { label: label @ None, .. }) = slot {
                *label = Some(key);
                return;
            }
        }
        self.ctx.push_fragment(Fragment::Command {
            name: "label".to_string(),
            options: None,
            args: vec![key],
        });
    }

    fn citation(&mut self, graph: &mut Dag, node: &AstNode) {
        let command = base_name(node.name.as_deref().unwrap_or("cite")).to_string();
        let keys = citation_keys(node);
        self.ctx.emit(format!(
            "<citation command=\"{}\" keys=\"{}\"/>",
            escape_markup(&command),
            escape_markup(&keys.join(","))
        ));
        if let Some(source) = self.ctx.current_node() {
            for key in &keys {
                let target = graph.add_node(citation_id(key), NodeType::Citation, key.clone());
                self.link(graph, source, target, EdgeType::Citation, Some(command.clone()));
            }
        }
        self.ctx.push_fragment(Fragment::Citation { command, keys });
    }

    fn reference(&mut self, ast: &Ast, graph: &mut Dag, node: &AstNode) {
        let command = base_name(node.name.as_deref().unwrap_or("ref")).to_string();
        let label = raw_argument(&node.content).unwrap_or_default();
        let wanted = label.split(',').filter(|k| !k.trim().is_empty()).count();
        let resolved = wanted > 0 && node.references().len() >= wanted;
        self.ctx.emit(format!(
            "<ref command=\"{}\" label=\"{}\" resolved=\"{}\"/>",
            escape_markup(&command),
            escape_markup(&label),
            resolved
        ));

        if let Some(section) = self.ctx.current_section() {
            let section_type = graph.node(section).map(|n| n.node_type);
            for target_ast in node.references() {
                let Some(target) = ast.dag_node(*target_ast) else { continue };
                let target_type = graph.node(target).map(|n| n.node_type);
                let (Some(source_type), Some(target_type)) = (section_type, target_type) else {
                    continue;
                };
                let edge = reference_edge(target_type);
                if is_compatible(source_type, target_type, edge) {
                    self.link(graph, section, target, edge, Some(command.clone()));
                }
            }
        }
        self.ctx.push_fragment(Fragment::Reference {
            command,
            label,
            resolved,
        });
    }

    fn command(&mut self, node: &AstNode) {
        let name = node.name.as_deref().unwrap_or("");
        let base = base_name(name).to_string();
        match categorize(name) {
            CommandCategory::Spacing => {}
            CommandCategory::Escape => self.text(&base),
            CommandCategory::Document => self.document_command(&base, &node.content),
            CommandCategory::Theorem => {
                if base == "newtheorem" {
                    if let Some(env) = raw_argument(&node.content) {
                        debug!(environment = %env, "registered theorem environment");
                        self.ctx.custom_theorems.insert(env);
                    }
                }
                self.generic_command(&base, &node.content);
            }
            CommandCategory::Float if !self.ctx.floats.is_empty() => {
                let arg = match base.as_str() {
                    "includegraphics" => raw_argument(&node.content),
                    _ => display_argument(&node.content),
                };
                if let (Some(draft), Some(arg)) = (self.ctx.floats.last_mut(), arg) {
                    match base.as_str() {
                        "includegraphics" => draft.graphics.push(arg),
                        "caption" | "subcaption" if draft.caption.is_none() => {
                            draft.caption = Some(arg)
                        }
                        _ => {}
                    }
                }
            }
            CommandCategory::Math => {
                if self.ctx.buffer_text(&node.content) {
                    return;
                }
                let args = split_command(&node.content).map(|p| p.args).unwrap_or_default();
                self.ctx.emit(format!("<math_command name=\"{}\"/>", escape_markup(&base)));
                self.ctx.push_fragment(Fragment::MathCommand { name: base, args });
            }
            _ => self.generic_command(&base, &node.content),
        }
    }

    fn document_command(&mut self, base: &str, raw: &str) {
        let value = match base {
            "documentclass" | "usepackage" | "email" | "orcid" => raw_argument(raw),
            _ => display_argument(raw),
        }
        .unwrap_or_default();
        let metadata = &mut self.ctx.document.metadata;
        match base {
            "title" => metadata.title = Some(value.clone()),
            "date" => metadata.date = Some(value.clone()),
            "abstract" if !value.is_empty() => metadata.abstract_text = Some(value.clone()),
            "documentclass" => metadata.document_class = Some(value.clone()),
            "usepackage" => {
                for package in list_argument(raw) {
                    if !metadata.packages.contains(&package) {
                        metadata.packages.push(package);
                    }
                }
            }
            "keywords" => metadata.keywords.extend(list_argument(raw)),
            "email" => self.ctx.entities.attach_contact(Some(value.clone()), None),
            "orcid" => self.ctx.entities.attach_contact(None, Some(value.clone())),
            _ => {}
        }
        self.ctx.emit(format!(
            "<meta name=\"{}\">{}</meta>",
            escape_markup(base),
            escape_markup(&value)
        ));
        self.ctx.push_fragment(Fragment::DocumentCommand {
            name: base.to_string(),
            value,
        });
    }

    fn generic_command(&mut self, base: &str, raw: &str) {
        if self.ctx.is_buffering() {
            let text = strip_latex(raw);
            if !text.is_empty() {
                self.ctx.buffer_text(&text);
            }
            return;
        }
        let parts = split_command(raw).unwrap_or_default();
        self.ctx.emit(format!(
            "<command name=\"{}\">{}</command>",
            escape_markup(base),
            escape_markup(&parts.args.join(" "))
        ));
        self.ctx.push_fragment(Fragment::Command {
            name: base.to_string(),
            options: parts.option,
            args: parts.args,
        });
    }

    fn finish_entity_block(&mut self, kind: AstKind) {
        let Some(block) = self.ctx.close_entity_block() else { return };
        let display = strip_latex(&block.text);
        if kind == AstKind::Author {
            self.ctx.entities.add_author_command(
                block.option.as_deref(),
                &block.text,
                block.anchor,
                self.crf.as_ref(),
            );
            self.ctx.emit(format!("<author>{}</author>", escape_markup(&display)));
        } else {
            self.ctx.entities.add_affiliation_command(
                &block.command,
                block.option.as_deref(),
                &block.text,
                block.anchor,
            );
            self.ctx.emit(format!("<affiliation>{}</affiliation>", escape_markup(&display)));
        }
    }

    fn enter_environment(&mut self, node: &AstNode, state: FsmState) {
        let name = node.name.clone().unwrap_or_default();
        let base = base_name(&name).to_string();
        self.ctx.push_env(&name);
        if state == FsmState::InDocument || is_verbatim_environment(&name) {
            return;
        }
        if FLOAT_ENVIRONMENTS.contains(base.as_str()) {
            self.ctx.floats.push(FloatDraft {
                kind: base,
                ..FloatDraft::default()
            });
        } else if is_theorem_state(state) {
            let title = environment_option(&node.content)
                .map(|t| collapse_whitespace(&strip_latex(&t)));
            let mut open = format!("<theorem kind=\"{}\"", escape_markup(&base));
            if let Some(title) = &title {
                open.push_str(&format!(" title=\"{}\"", escape_markup(title)));
            }
            open.push('>');
            self.ctx.emit(open);
            let idx = self.ctx.push_fragment(Fragment::Theorem {
                kind: base,
                title,
                label: None,
            });
            self.ctx.theorems.push(idx);
        } else {
            self.ctx.emit(format!("<environment name=\"{}\">", escape_markup(&name)));
            self.ctx.push_fragment(Fragment::Environment {
                name,
                boundary: Boundary::Begin,
            });
        }
    }

    fn exit_environment(&mut self, node: &AstNode, state: Option<FsmState>) {
        let name = self.ctx.pop_env().or_else(|| node.name.clone()).unwrap_or_default();
        let base = base_name(&name);
        let state = state.unwrap_or(FsmState::InEnvironment);
        if state == FsmState::InDocument || is_verbatim_environment(&name) {
            return;
        }
        if FLOAT_ENVIRONMENTS.contains(base) {
            let Some(draft) = self.ctx.floats.pop() else { return };
            let mut piece = format!("<figure kind=\"{}\"", escape_markup(&draft.kind));
            if let Some(label) = &draft.label {
                piece.push_str(&format!(" label=\"{}\"", escape_markup(label)));
            }
            piece.push('>');
            if let Some(caption) = &draft.caption {
                piece.push_str(&format!("<caption>{}</caption>", escape_markup(caption)));
            }
            for graphic in &draft.graphics {
                piece.push_str(&format!("<graphics>{}</graphics>", escape_markup(graphic)));
            }
            piece.push_str("</figure>");
            self.ctx.emit(piece);
            self.ctx.push_fragment(Fragment::Figure {
                kind: draft.kind,
                caption: draft.caption,
                label: draft.label,
                graphics: draft.graphics,
            });
            return;
        }
        if is_theorem_state(state) {
            self.ctx.theorems.pop();
            self.ctx.emit("</theorem>");
        } else {
            self.ctx.emit("</environment>");
        }
        self.ctx.push_fragment(Fragment::Environment {
            name,
            boundary: Boundary::End,
        });
    }

    fn link(
        &mut self,
        graph: &mut Dag,
        source: DagIndex,
        target: DagIndex,
        edge: EdgeType,
        label: Option<String>,
    ) {
        if source == target {
            return;
        }
        if let Err(rejection) = graph.add_edge(source, target, edge, label) {
            if rejection.is_duplicate() {
                debug!(%rejection, "edge already present");
            } else {
                warn!(%rejection, "edge rejected");
                self.ctx.diagnostics.push(Diagnostic::from_edge_rejection(&rejection));
            }
        }
    }
}

fn math_state(node: &AstNode) -> FsmState {
    match node.name.as_deref().map(base_name) {
        Some("align" | "gather" | "multline" | "eqnarray" | "flalign" | "alignat") => {
            FsmState::InAlignedEquation
        }
        Some(_) => FsmState::InEquation,
        None => {
            let content = node.content.trim_start();
            if content.starts_with("$$") || content.starts_with("\\[") {
                FsmState::InMath
            } else {
                FsmState::InInlineMath
            }
        }
    }
}

/// Run a traversal and keep only the chunks.
pub fn chunk_document(ast: &Ast, graph: &mut Dag, options: &ParseOptions) -> Vec<String> {
    Traversal::new(options.clone()).run(ast, graph).chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::{parse, ParserState};
    use crate::graph::build_from_ast;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (TraversalOutput, Dag) {
        let mut doc = parse(source);
        let options = ParseOptions::default();
        let (mut graph, _) = build_from_ast(&mut doc.ast, &options);
        let output = Traversal::new(options).run(&doc.ast, &mut graph);
        (output, graph)
    }

    #[test]
    fn test_section_text_and_inline_math() {
        let (out, _) = run(r"\section{Intro}Hello $x+1$ world.");
        assert_eq!(
            out.document.content,
            vec![
                Fragment::Section {
                    title: "Intro".into(),
                    level: 2,
                    label: None
                },
                Fragment::text("Hello"),
                Fragment::inline_math("x+1"),
                Fragment::text("world."),
            ]
        );
        assert_eq!(
            out.chunks,
            vec!["<section level=\"2\">Intro</section>\n<text>Hello</text>\n<math display=\"inline\">x+1</math>\n<text>world.</text>"]
        );
    }

    #[test]
    fn test_sections_start_new_chunks() {
        let (out, _) = run(r"Preface. \section{A}one\subsection{B}two\section{C}three");
        assert_eq!(out.chunks.len(), 4);
        assert_eq!(out.chunks[0], "<text>Preface.</text>");
        assert!(out.chunks[2].starts_with("<section level=\"3\">B</section>"));
        assert!(out.chunks[3].ends_with("<text>three</text>"));
    }

    #[test]
    fn test_citation_edge_from_section() {
        let (out, graph) = run(r"\section{Related}As shown \cite{knuth84, lamport}.");
        assert_eq!(
            out.document.fragments_of("citation").next(),
            Some(&Fragment::Citation {
                command: "cite".into(),
                keys: vec!["knuth84".into(), "lamport".into()]
            })
        );
        let section = graph.nodes().find(|(_, n)| n.node_type == NodeType::Section).unwrap().0;
        let knuth = graph.lookup("citation:knuth84").unwrap();
        assert!(graph.has_edge(section, knuth, EdgeType::Citation));
        assert!(graph.contains("citation:lamport"));
    }

    #[test]
    fn test_front_matter_and_entities() {
        let (out, graph) = run(
            r"\documentclass{article}\usepackage{amsmath,graphicx}\title{Graphs \& Papers}
\author{Ada Lovelace \and Alan Turing}\affiliation{University of Manchester}
\begin{abstract}We study $G$.\end{abstract}",
        );
        let meta = &out.document.metadata;
        assert_eq!(meta.document_class.as_deref(), Some("article"));
        assert_eq!(meta.packages, vec!["amsmath", "graphicx"]);
        assert_eq!(meta.title.as_deref(), Some("Graphs & Papers"));
        assert_eq!(meta.abstract_text.as_deref(), Some("We study $G$."));
        assert_eq!(meta.authors.len(), 2);
        assert_eq!(meta.affiliations[0].details, "University of Manchester");
        assert_eq!(meta.authors[1].affiliations, vec![0]);
        assert!(graph.contains("author:ada lovelace"));
        assert!(graph.contains("affiliation:university of manchester"));
    }

    #[test]
    fn test_author_text_is_buffered_not_emitted() {
        let (out, _) = run(r"\author{Ada Lovelace}Body text.");
        let texts: Vec<&Fragment> = out.document.fragments_of("text").collect();
        assert_eq!(texts, vec![&Fragment::text("Body text.")]);
        assert_eq!(out.document.metadata.authors[0].name, "Ada Lovelace");
        assert!(out.chunks[0].contains("<author>Ada Lovelace</author>"));
    }

    #[test]
    fn test_figure_and_reference() {
        let (out, graph) = run(
            r"\section{Results}\begin{figure}\includegraphics{plot.pdf}\caption{Accuracy}\label{fig:acc}\end{figure}See \ref{fig:acc} and \ref{missing}.",
        );
        assert!(out.document.content.contains(&Fragment::Figure {
            kind: "figure".into(),
            caption: Some("Accuracy".into()),
            label: Some("fig:acc".into()),
            graphics: vec!["plot.pdf".into()],
        }));
        let refs: Vec<&Fragment> = out.document.fragments_of("reference").collect();
        assert_eq!(
            refs,
            vec![
                &Fragment::Reference {
                    command: "ref".into(),
                    label: "fig:acc".into(),
                    resolved: true
                },
                &Fragment::Reference {
                    command: "ref".into(),
                    label: "missing".into(),
                    resolved: false
                },
            ]
        );
        let section = graph.nodes().find(|(_, n)| n.node_type == NodeType::Section).unwrap().0;
        let figure = graph.nodes().find(|(_, n)| n.node_type == NodeType::Figure).unwrap().0;
        assert!(graph.has_edge(section, figure, EdgeType::FigureReference));
    }

    #[test]
    fn test_theorems_and_custom_environments() {
        let (out, _) = run(
            r"\newtheorem{conj}{Conjecture}\begin{theorem}[Main]\label{thm:main}Holds.\end{theorem}\begin{conj}Open.\end{conj}",
        );
        let theorems: Vec<&Fragment> = out.document.fragments_of("theorem").collect();
        assert_eq!(
            theorems[0],
            &Fragment::Theorem {
                kind: "theorem".into(),
                title: Some("Main".into()),
                label: Some("thm:main".into())
            }
        );
        assert!(matches!(theorems[1], Fragment::Theorem { kind, .. } if kind == "conj"));
    }

    #[test]
    fn test_section_label_and_bibliography() {
        let (out, _) = run(
            r"\section{Intro}\label{sec:intro}Text.\begin{thebibliography}{9}\bibitem{knuth84} D. Knuth. \emph{TeX}.\end{thebibliography}",
        );
        assert!(matches!(
            &out.document.content[0],
            Fragment::Section { label: Some(l), .. } if l == "sec:intro"
        ));
        assert!(out.document.content.contains(&Fragment::Bibitem {
            key: "knuth84".into(),
            text: "D. Knuth. TeX.".into(),
        }));
        assert!(out.chunks.last().unwrap().starts_with("<bibliography>"));
    }

    #[test]
    fn test_verbatim_and_math_commands() {
        let (out, _) = run("\\alpha\\begin{verbatim}\nx < y\n\\end{verbatim}\\[ a^2 \\]");
        assert_eq!(
            out.document.content,
            vec![
                Fragment::MathCommand {
                    name: "alpha".into(),
                    args: vec![]
                },
                Fragment::Verbatim {
                    environment: "verbatim".into(),
                    text: "x < y".into()
                },
                Fragment::Math {
                    expression: "a^2".into(),
                    display: MathDisplay::Display
                },
            ]
        );
        assert!(out.chunks[0].contains("x &lt; y"));
    }

    #[test]
    fn test_invalid_transition_skips_subtree() {
        let mut ast = Ast::new();
        let root = ast.root();
        let cmd = ast.alloc(
            AstNode::new(AstKind::Command, r"\textbf", 0, ParserState::Default).with_name("textbf"),
        );
        ast.add_child(root, cmd).unwrap();
        let inner = ast.alloc(AstNode::new(AstKind::Text, "hidden", 8, ParserState::Default));
        ast.add_child(cmd, inner).unwrap();
        let after = ast.alloc(AstNode::new(AstKind::Text, "after", 20, ParserState::Default));
        ast.add_child(root, after).unwrap();

        let mut graph = Dag::new();
        let out = Traversal::new(ParseOptions::default()).run(&ast, &mut graph);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::InvalidTransition);
        assert_eq!(out.diagnostics[0].offset, Some(8));
        let texts: Vec<&Fragment> = out.document.fragments_of("text").collect();
        assert_eq!(texts, vec![&Fragment::text("after")]);
    }

    #[test]
    fn test_document_json() {
        let (out, _) = run(r"\title{T}\section{S}x");
        let value = out.document_json().unwrap();
        assert_eq!(value["metadata"]["title"], "T");
        assert_eq!(value["content"][1]["type"], "section");
    }
}
