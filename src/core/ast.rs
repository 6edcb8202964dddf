//! Arena-backed abstract syntax tree.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`].
//! Ownership is tree-shaped: every node has at most one parent. Reference
//! links (label targets) and the back-link into the semantic graph are plain
//! indices and never own anything.

use std::fmt;
use std::ops::Index;

use fxhash::FxHashSet;

use super::parser::ParserState;
use super::walk::{LinkedWalk, WalkEvent};
use crate::graph::{Dag, DagIndex};
use crate::utils::error::Rejection;
use crate::utils::text::{collapse_whitespace, split_command};

/// Index of a node in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Syntactic category of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AstKind {
    Document,
    Section,
    Command,
    Environment,
    Math,
    Text,
    Label,
    Reference,
    EnvironmentContent,
    Author,
    Affiliation,
    Abstract,
    Citation,
    Bibliography,
}

impl AstKind {
    /// Per-parent allow-list of child kinds.
    pub fn allows(self, child: AstKind) -> bool {
        use AstKind::*;
        match self {
            Document | Environment => child != Document,
            Section => matches!(child, Text | Command | Math | Label | Reference),
            Command | Math | EnvironmentContent => child == Text,
            Text | Label | Reference => false,
            Author | Affiliation => matches!(child, Text | Command),
            Abstract => matches!(
                child,
                Text | Command | Math | Label | Reference | Environment | EnvironmentContent
            ),
            Citation => matches!(child, Text | Command | Math | Reference | Label),
            Bibliography => matches!(child, Citation | Text | Command | Math | Label | Reference),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AstKind::Document => "Document",
            AstKind::Section => "Section",
            AstKind::Command => "Command",
            AstKind::Environment => "Environment",
            AstKind::Math => "Math",
            AstKind::Text => "Text",
            AstKind::Label => "Label",
            AstKind::Reference => "Reference",
            AstKind::EnvironmentContent => "EnvironmentContent",
            AstKind::Author => "Author",
            AstKind::Affiliation => "Affiliation",
            AstKind::Abstract => "Abstract",
            AstKind::Citation => "Citation",
            AstKind::Bibliography => "Bibliography",
        }
    }
}

/// A single AST node.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: AstKind,
    /// Source-derived content; its shape depends on `kind`
    pub content: String,
    /// Command or environment name, when the node came from one
    pub name: Option<String>,
    /// Byte offset of the construct in the source
    pub offset: usize,
    /// Parser state active when the node was created
    pub mode: ParserState,
    pub(crate) children: Vec<NodeId>,
    pub(crate) references: Vec<NodeId>,
    pub(crate) dag_node: Option<DagIndex>,
    pub(crate) parent: Option<NodeId>,
}

impl AstNode {
    pub fn new(
        kind: AstKind,
        content: impl Into<String>,
        offset: usize,
        mode: ParserState,
    ) -> Self {
        AstNode {
            kind,
            content: content.into(),
            name: None,
            offset,
            mode,
            children: Vec::new(),
            references: Vec::new(),
            dag_node: None,
            parent: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn references(&self) -> &[NodeId] {
        &self.references
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn dag_node(&self) -> Option<DagIndex> {
        self.dag_node
    }

    /// Check that the content is non-empty and shaped like the kind.
    pub fn validate_content(&self) -> Result<(), String> {
        use AstKind::*;
        if self.kind == Document {
            return Ok(());
        }
        let content = self.content.trim();
        if content.is_empty() {
            return Err(format!("{} node has empty content", self.kind.as_str()));
        }
        let ok = match self.kind {
            Label => content.starts_with("\\label"),
            Citation => content.starts_with("\\bibitem"),
            Command | Reference | Author | Affiliation => content.starts_with('\\'),
            Environment | Abstract | Bibliography => content.starts_with("\\begin"),
            Math => looks_like_math(content),
            Document | Section | Text | EnvironmentContent => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "{} node content does not match its kind: {:?}",
                self.kind.as_str(),
                content
            ))
        }
    }
}

/// Whether text is a complete delimited math span.
pub fn looks_like_math(content: &str) -> bool {
    let s = content.trim();
    let pairs = [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")];
    for (open, close) in pairs {
        if s.starts_with(open) {
            return s.len() >= open.len() + close.len() && s.ends_with(close);
        }
    }
    s.starts_with("\\begin{") && s.contains("\\end{")
}

/// Arena holding every node of a parsed document.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<AstNode>,
    root: NodeId,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    /// Create an arena containing only the document root.
    pub fn new() -> Self {
        Ast {
            nodes: vec![AstNode::new(AstKind::Document, "", 0, ParserState::Default)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Store a node in the arena. It stays detached until `add_child`.
    pub fn alloc(&mut self, node: AstNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AstNode> {
        self.nodes.get_mut(id.0)
    }

    /// All node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Attach `child` under `parent`, enforcing the allow-list and the
    /// single-owner rule.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Rejection> {
        let parent_kind = self.get(parent).ok_or(Rejection::UnknownNode(parent))?.kind;
        let child_node = self.get(child).ok_or(Rejection::UnknownNode(child))?;
        if parent == child {
            return Err(Rejection::SelfLink(child));
        }
        if child == self.root {
            return Err(Rejection::RootAsChild);
        }
        if let Some(owner) = child_node.parent {
            return Err(Rejection::AlreadyAttached { child, parent: owner });
        }
        if !parent_kind.allows(child_node.kind) {
            return Err(Rejection::Disallowed {
                parent: parent_kind,
                child: child_node.kind,
            });
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Add a non-owning link from `from` to `to`.
    pub fn add_reference(&mut self, from: NodeId, to: NodeId) -> Result<(), Rejection> {
        self.get(to).ok_or(Rejection::UnknownNode(to))?;
        let node = self.get_mut(from).ok_or(Rejection::UnknownNode(from))?;
        if !node.references.contains(&to) {
            node.references.push(to);
        }
        Ok(())
    }

    pub fn dag_node(&self, id: NodeId) -> Option<DagIndex> {
        self.get(id).and_then(|n| n.dag_node)
    }

    pub fn set_dag_node(&mut self, id: NodeId, dag: DagIndex) {
        if let Some(node) = self.get_mut(id) {
            node.dag_node = Some(dag);
        }
    }

    /// Reclassify a node. Used when content validation fails and the
    /// caller prefers demotion over keeping an invalid node.
    pub(crate) fn set_kind(&mut self, id: NodeId, kind: AstKind) {
        if let Some(node) = self.get_mut(id) {
            node.kind = kind;
        }
    }

    /// Pre-order list of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        let mut seen = FxHashSet::default();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Concatenated Text content of a subtree, whitespace-collapsed.
    pub fn text_content(&self, id: NodeId) -> String {
        let parts: Vec<&str> = self
            .descendants(id)
            .into_iter()
            .filter_map(|n| self.get(n))
            .filter(|n| n.kind == AstKind::Text)
            .map(|n| n.content.as_str())
            .collect();
        collapse_whitespace(&parts.join(" "))
    }

    /// First node of `kind` in the subtree of `id`, excluding `id`.
    pub fn find_in_subtree(&self, id: NodeId, kind: AstKind) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .skip(1)
            .find(|n| self.get(*n).map_or(false, |node| node.kind == kind))
    }

    /// Render the tree as an indented listing.
    pub fn print(&self) -> String {
        let mut ctx = PrintContext::default();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = match self.get(id) {
                Some(node) => node,
                None => continue,
            };
            let indent = "  ".repeat(depth);
            let grouped = matches!(node.kind, AstKind::Author | AstKind::Affiliation);
            if grouped && !ctx.in_author_group {
                ctx.line(&indent, "[Author-Affiliation Group]");
                ctx.in_author_group = true;
            } else if !grouped && ctx.in_author_group && depth <= ctx.group_depth {
                ctx.line(&indent, "[End Group]");
                ctx.in_author_group = false;
            }
            if grouped {
                ctx.group_depth = depth;
            }
            if !ctx.visited.insert(id) {
                ctx.line(&indent, &format!("[Already printed node: {}]", node.kind.as_str()));
                continue;
            }
            let mut line = node.kind.as_str().to_string();
            if let Some(name) = &node.name {
                line.push_str(&format!(" <{}>", name));
            }
            if !node.content.is_empty() {
                line.push_str(": ");
                line.push_str(&collapse_whitespace(&node.content));
            }
            ctx.line(&indent, &line);
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        if ctx.in_author_group {
            ctx.line("", "[End Group]");
        }
        ctx.out
    }

    /// Linearize the document into tagged text segments. When a graph is
    /// given, nodes reachable through DAG hierarchical links that were not
    /// reached through the tree are folded in after the linking node.
    pub fn chunk(&self, graph: Option<&Dag>) -> Vec<String> {
        let mut segments = Vec::new();
        let mut walk = LinkedWalk::new(self.root);
        while let Some(event) = walk.next_event(self, graph) {
            let (id, entering) = match event {
                WalkEvent::Enter(id) => (id, true),
                WalkEvent::Exit(id) => (id, false),
            };
            let node = match self.get(id) {
                Some(node) => node,
                None => continue,
            };
            let name = node.name.as_deref().unwrap_or("");
            let segment = match (node.kind, entering) {
                (AstKind::Section, true) => Some(format!("[Section] {}", node.content.trim())),
                (AstKind::Text, true) => {
                    let text = collapse_whitespace(&node.content);
                    (!text.is_empty()).then_some(text)
                }
                (AstKind::Math, true) => {
                    Some(format!("[Math Start] {} [Math End]", node.content.trim()))
                }
                (AstKind::Abstract, true) => Some("[Abstract Start]".to_string()),
                (AstKind::Abstract, false) => Some("[Abstract End]".to_string()),
                (AstKind::Bibliography, true) => Some("[Bibliography Start]".to_string()),
                (AstKind::Bibliography, false) => Some("[Bibliography End]".to_string()),
                (AstKind::Citation, true) => {
                    let key = split_command(&node.content)
                        .and_then(|c| c.first_arg().map(str::to_string));
                    Some(format!("[Citation: {}]", key.as_deref().unwrap_or(name)))
                }
                (AstKind::Author, true) => Some("[Author-Affiliation Group]".to_string()),
                (AstKind::Affiliation, true) => Some("[Affiliation]".to_string()),
                (AstKind::Environment, true) => Some(format!("[Environment: {}]", name)),
                (AstKind::Environment, false) => Some(format!("[End Environment: {}]", name)),
                (AstKind::EnvironmentContent, true) => {
                    Some(format!("[Verbatim] {}", node.content.trim()))
                }
                (AstKind::Command | AstKind::Label | AstKind::Reference, true) => {
                    Some(node.content.trim().to_string())
                }
                _ => None,
            };
            segments.extend(segment);
        }
        segments
    }
}

impl Index<NodeId> for Ast {
    type Output = AstNode;

    fn index(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0]
    }
}

/// Explicit state for [`Ast::print`].
#[derive(Default)]
struct PrintContext {
    out: String,
    visited: FxHashSet<NodeId>,
    in_author_group: bool,
    group_depth: usize,
}

impl PrintContext {
    fn line(&mut self, indent: &str, text: &str) {
        self.out.push_str(indent);
        self.out.push_str(text);
        self.out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(kind: AstKind, content: &str) -> AstNode {
        AstNode::new(kind, content, 0, ParserState::Default)
    }

    #[test]
    fn test_allow_list_rejects_and_leaves_parent_unchanged() {
        let mut ast = Ast::new();
        let math = ast.alloc(node(AstKind::Math, "$x$"));
        let section = ast.alloc(node(AstKind::Section, "Intro"));
        ast.add_child(ast.root(), math).unwrap();

        let err = ast.add_child(math, section).unwrap_err();
        assert_eq!(
            err,
            Rejection::Disallowed {
                parent: AstKind::Math,
                child: AstKind::Section
            }
        );
        assert!(ast.children(math).is_empty());
        assert_eq!(ast[section].parent(), None);
    }

    #[test]
    fn test_single_owner() {
        let mut ast = Ast::new();
        let env = ast.alloc(node(AstKind::Environment, "\\begin{figure}"));
        let text = ast.alloc(node(AstKind::Text, "caption"));
        ast.add_child(ast.root(), env).unwrap();
        ast.add_child(env, text).unwrap();
        assert!(matches!(
            ast.add_child(ast.root(), text),
            Err(Rejection::AlreadyAttached { .. })
        ));
        assert_eq!(ast.add_child(env, env), Err(Rejection::SelfLink(env)));
        assert_eq!(ast.add_child(env, ast.root()), Err(Rejection::RootAsChild));
    }

    #[test]
    fn test_content_validation() {
        assert!(node(AstKind::Math, "$x+1$").validate_content().is_ok());
        let env = node(AstKind::Math, "\\begin{equation}a\\end{equation}");
        assert!(env.validate_content().is_ok());
        assert!(node(AstKind::Math, "x+1").validate_content().is_err());
        assert!(node(AstKind::Math, "$x").validate_content().is_err());
        assert!(node(AstKind::Command, "section").validate_content().is_err());
        assert!(node(AstKind::Text, "   ").validate_content().is_err());
        assert!(node(AstKind::Document, "").validate_content().is_ok());
    }

    #[test]
    fn test_print_groups_authors() {
        let mut ast = Ast::new();
        let author = ast.alloc(node(AstKind::Author, "\\author{Ann}").with_name("author"));
        let aff =
            ast.alloc(node(AstKind::Affiliation, "\\affiliation{Uni}").with_name("affiliation"));
        let text = ast.alloc(node(AstKind::Text, "Body"));
        for id in [author, aff, text] {
            ast.add_child(ast.root(), id).unwrap();
        }
        let expected = "\
Document
  [Author-Affiliation Group]
  Author <author>: \\author{Ann}
  Affiliation <affiliation>: \\affiliation{Uni}
  [End Group]
  Text: Body
";
        assert_eq!(ast.print(), expected);
    }

    #[test]
    fn test_text_content_collects_subtree() {
        let mut ast = Ast::new();
        let env = ast.alloc(node(AstKind::Abstract, "\\begin{abstract}"));
        let a = ast.alloc(node(AstKind::Text, "We  study"));
        let b = ast.alloc(node(AstKind::Text, "graphs."));
        ast.add_child(ast.root(), env).unwrap();
        ast.add_child(env, a).unwrap();
        ast.add_child(env, b).unwrap();
        assert_eq!(ast.text_content(env), "We study graphs.");
    }
}
