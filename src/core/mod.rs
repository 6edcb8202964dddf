//! Core parsing layer
//!
//! This module contains the front half of the pipeline:
//! - `lexer`/`token`: raw text to coarse tokens
//! - `parser`: tokens to an arena AST under a mode stack
//! - `ast`: the arena itself, printing and chunking
//! - `walk`: the tree-plus-graph traversal shared with the state machine

pub mod ast;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod token;
pub mod vocabulary;
pub mod walk;

pub use ast::{Ast, AstKind, AstNode, NodeId};
pub use lexer::{tokenize, Lexer};
pub use options::{AnalysisOptions, MathValidation, ParseOptions};
pub use parser::{parse, parse_with_options, ParsedDocument, Parser, ParserState, SymbolTable};
pub use token::{CommandToken, Token, TokenKind};
pub use walk::{LinkedWalk, WalkEvent};
