//! Abstract Syntax Tree (AST) Types for Command Lines
//!
//! Architecture:
//!   Line → Tokenizer → Expander → Parser → AST → Script Interpreter → Output

pub mod types;
