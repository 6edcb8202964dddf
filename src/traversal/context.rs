//! Mutable state carried through one traversal.

use fxhash::FxHashSet;
use texgraph_ir::{Fragment, StructuredDocument};

use super::entities::EntityCollector;
use crate::graph::DagIndex;
use crate::utils::error::Diagnostic;

/// Figure-like float being collected until its environment closes.
#[derive(Debug, Clone, Default)]
pub struct FloatDraft {
    pub kind: String,
    pub caption: Option<String>,
    pub label: Option<String>,
    pub graphics: Vec<String>,
}

/// Author or affiliation command whose text children are being buffered.
#[derive(Debug, Clone)]
pub struct EntityBlock {
    pub command: String,
    pub option: Option<String>,
    pub text: String,
    pub anchor: Option<DagIndex>,
}

/// Traversal state: block flags, environment stack, chunk buffers, the
/// structured document under construction and entity staging.
#[derive(Debug, Default)]
pub struct TraversalContext {
    pub inside_author_block: bool,
    pub inside_institute_block: bool,
    /// Open environments, innermost last
    pub env_stack: Vec<String>,
    /// Pieces of the chunk being built
    pub current_chunk: Vec<String>,
    pub chunks: Vec<String>,
    pub document: StructuredDocument,
    pub entities: EntityCollector,
    pub entity_block: Option<EntityBlock>,
    pub abstract_buffer: Option<String>,
    /// Key and text of the `\bibitem` being read
    pub bibitem: Option<(String, String)>,
    pub floats: Vec<FloatDraft>,
    /// Fragment indices of open theorem-like environments
    pub theorems: Vec<usize>,
    /// Environment names registered with `\newtheorem`
    pub custom_theorems: FxHashSet<String>,
    /// (level, graph node) of the open sections
    pub section_stack: Vec<(u8, DagIndex)>,
    pub document_node: Option<DagIndex>,
    /// Index of the most recent section fragment
    pub last_section: Option<usize>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_env(&mut self, name: &str) {
        self.env_stack.push(name.to_string());
    }

    pub fn pop_env(&mut self) -> Option<String> {
        self.env_stack.pop()
    }

    pub fn current_env(&self) -> Option<&str> {
        self.env_stack.last().map(String::as_str)
    }

    /// Append one markup piece to the current chunk.
    pub fn emit(&mut self, piece: impl Into<String>) {
        self.current_chunk.push(piece.into());
    }

    /// Close the current chunk, if it has any content.
    pub fn flush_chunk(&mut self) {
        if !self.current_chunk.is_empty() {
            self.chunks.push(self.current_chunk.join("\n"));
            self.current_chunk.clear();
        }
    }

    /// Push a fragment and return its index.
    pub fn push_fragment(&mut self, fragment: Fragment) -> usize {
        self.document.push(fragment);
        self.document.content.len() - 1
    }

    /// Graph node new content belongs to: the innermost open section, else
    /// the document.
    pub fn current_node(&self) -> Option<DagIndex> {
        self.section_stack.last().map(|(_, idx)| *idx).or(self.document_node)
    }

    pub fn current_section(&self) -> Option<DagIndex> {
        self.section_stack.last().map(|(_, idx)| *idx)
    }

    /// Close sections at `level` or deeper and open a new one.
    pub fn open_section(&mut self, level: u8, node: Option<DagIndex>) {
        while self.section_stack.last().map_or(false, |(l, _)| *l >= level) {
            self.section_stack.pop();
        }
        if let Some(node) = node {
            self.section_stack.push((level, node));
        }
    }

    /// Start buffering an `\author` (or affiliation-family) argument.
    pub fn open_entity_block(&mut self, author: bool, block: EntityBlock) {
        self.inside_author_block = author;
        self.inside_institute_block = !author;
        self.entity_block = Some(block);
    }

    /// Stop buffering and hand back what was collected.
    pub fn close_entity_block(&mut self) -> Option<EntityBlock> {
        self.inside_author_block = false;
        self.inside_institute_block = false;
        self.entity_block.take()
    }

    pub fn in_entity_block(&self) -> bool {
        self.inside_author_block || self.inside_institute_block
    }

    /// Whether text and generic commands are being captured rather than
    /// emitted.
    pub fn is_buffering(&self) -> bool {
        self.in_entity_block() || self.bibitem.is_some() || self.abstract_buffer.is_some()
    }

    /// Buffer text for the innermost block that collects text, returning
    /// false when none does.
    pub fn buffer_text(&mut self, text: &str) -> bool {
        let target = if self.inside_author_block || self.inside_institute_block {
            match self.entity_block.as_mut() {
                Some(block) => &mut block.text,
                None => return false,
            }
        } else if let Some((_, buf)) = self.bibitem.as_mut() {
            buf
        } else if let Some(buf) = self.abstract_buffer.as_mut() {
            buf
        } else {
            return false;
        };
        let joined = target.is_empty()
            || target.ends_with(char::is_whitespace)
            || text.starts_with(|c: char| {
                c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')')
            });
        if !joined {
            target.push(' ');
        }
        target.push_str(text);
        true
    }
}
