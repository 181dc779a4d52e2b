//! Interpreter module
//!
//! This module contains the command interpreter: variable scopes, percent
//! and loop-variable expansion, the execution engine with its builtins,
//! pipelines and redirections, and the batch script runner.

pub mod arithmetic;
pub mod builtin_dispatch;
pub mod builtins;
pub mod command_resolution;
pub mod conditionals;
pub mod control_flow;
pub mod environment;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod helpers;
pub mod pipeline_execution;
pub mod process;
pub mod redirections;
pub mod script_runner;
pub mod types;

pub use builtin_dispatch::Builtin;
pub use command_resolution::{resolve_command, ResolvedCommand};
pub use environment::Environment;
pub use errors::*;
pub use execution_engine::ExecutionEngine;
pub use process::{InterruptFlag, ProcessRequest, ProcessRunner, SystemProcessRunner, INTERRUPTED_EXIT_CODE};
pub use types::*;
