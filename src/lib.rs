//! just-cmd - A CMD-style command interpreter
//!
//! This library tokenizes, expands, parses and executes command lines and
//! batch scripts: percent variables, `&`/`&&`/`||`/`|` chaining,
//! redirection, `IF`/`FOR` blocks, labels with `GOTO` and `CALL`, and
//! `SETLOCAL` scoping. External programs are run through a pluggable
//! [`interpreter::ProcessRunner`].

pub mod ast;
pub mod config;
pub mod interpreter;
pub mod parser;
pub mod shell;

/// Banner printed by `VER`.
pub const VERSION_BANNER: &str = concat!("Just CMD [Version ", env!("CARGO_PKG_VERSION"), "]");

pub use ast::types::*;
pub use config::{ConfigError, ShellConfig};
pub use interpreter::{ExecResult, ExecutionLimits, InterpreterError, InterruptFlag, ProcessRunner};
pub use parser::{parse, ParseError, Program};
pub use shell::{Shell, ShellOptions};
