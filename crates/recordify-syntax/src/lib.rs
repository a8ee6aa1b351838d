//! Syntax tree and parsing primitives for Recordify.
//!
//! This crate provides three entry points:
//! - [`parse`]: builds an arena-backed [`SyntaxTree`] from Java source. Only the
//!   structure needed for class-to-record conversion is modelled; everything
//!   else is carried as verbatim text.
//! - [`TreeBuilder`]: builds or extends trees programmatically. Transforms fork
//!   the input tree so unchanged nodes keep their ids.
//! - [`print`]: renders a tree back to source, byte-identical outside of the
//!   declarations that were replaced by records.

mod arena;
mod lexer;
mod parser;
mod print;
mod scan;
mod text;
mod tree;
mod trivia;

pub use arena::{Arena, NodeId};
pub use lexer::{is_java_keyword, is_type_name, lex, LexError, Lexer, Token, TokenKind};
pub use parser::{parse, ParseError};
pub use print::{line_ending, print, render_record};
pub use scan::{scan_declared_names, scan_writes, VariableWrite};
pub use text::{line_of, TextRange};
pub use tree::*;
pub use trivia::{Comment, CommentKind, Trivia, TriviaTable};
