//! Parser Types and Constants
//!
//! Shared types and limits used across parser modules.

use thiserror::Error;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_000_000; // 1MB max logical line
pub const MAX_PARSER_DEPTH: usize = 200; // Max block/IF/FOR nesting

/// Syntax error raised while parsing a logical line.
///
/// `offset` is the character offset into the logical line at which the
/// parser gave up; it is used for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// The `x was unexpected at this time.` form used for stray tokens.
    pub fn unexpected(text: &str, offset: usize) -> Self {
        Self::new(format!("{} was unexpected at this time.", text), offset)
    }
}
