//! Parser module for command lines and batch scripts
//!
//! This module contains the lexer, the line parser and the script loader.

pub mod types;
pub mod lexer;
pub mod compound_parser;
pub mod parser;
pub mod script;

// Re-exports
pub use types::ParseError;
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse, parse_tokens, Parser};
pub use script::{LineKind, LogicalLine, Program};
