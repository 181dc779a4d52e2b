//! Interpreter Types
//!
//! State carried across lines and script frames, plus execution results and
//! limits.

use std::path::PathBuf;
use std::sync::Arc;

use crate::interpreter::environment::Environment;
use crate::interpreter::expansion::MacroTable;
use crate::parser::script::Program;

/// Where a line comes from; this decides percent-expansion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// A line typed at the prompt or passed with `-c`
    Interactive,
    /// A line of a batch script
    Batch,
}

/// Coarse state of the script interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Running,
    /// Evaluating an `IF` condition or producing a `FOR` set
    Branching,
    /// Executing a `FOR` body
    Iterating,
    /// Inside a `CALL`ed script or subroutine
    Calling,
    /// `EXIT` without `/B` was executed
    Terminated,
}

/// `%0`..`%9` and `%*` of a script frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionalParams {
    /// Index 0 is the script or label name
    args: Vec<String>,
    /// `%*` text; not affected by `SHIFT`
    all: String,
}

impl PositionalParams {
    pub fn new(name: impl Into<String>, args: &[String]) -> Self {
        let mut all_args = Vec::with_capacity(args.len() + 1);
        all_args.push(name.into());
        all_args.extend(args.iter().cloned());
        Self {
            args: all_args,
            all: args.join(" "),
        }
    }

    /// `%n`; out of range is empty.
    pub fn get(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn all(&self) -> &str {
        &self.all
    }

    /// `SHIFT [/n]`: drop the parameter at `from`, moving later ones down.
    pub fn shift(&mut self, from: usize) {
        if from < self.args.len() {
            self.args.remove(from);
        }
    }
}

/// One active script or subroutine invocation.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub program: Arc<Program>,
    /// Index of the next logical line to execute
    pub pc: usize,
    pub params: PositionalParams,
    /// Echo flag of the caller, restored on return
    pub saved_echo: bool,
    /// Scope depth at entry; scopes opened inside are closed on return
    pub scope_marker: usize,
}

/// Bindings of one active `FOR` loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    pub variable: char,
    /// Current values; `FOR /F` with several tokens binds consecutive letters
    pub bindings: Vec<(char, String)>,
    pub iteration: u64,
}

impl LoopState {
    pub fn new(variable: char) -> Self {
        Self {
            variable,
            bindings: Vec::new(),
            iteration: 0,
        }
    }

    pub fn lookup(&self, c: char) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(v, _)| *v == c)
            .map(|(_, value)| value.as_str())
    }
}

/// Complete interpreter state.
///
/// Cloned for each pipeline stage and for `FOR /F` command sets, which run in
/// a child context whose changes are discarded.
#[derive(Debug, Clone)]
pub struct InterpreterState {
    pub env: Environment,
    pub cwd: PathBuf,
    pub last_exit_code: i32,
    pub echo_on: bool,
    pub phase: ExecutionPhase,
    pub call_stack: Vec<CallFrame>,
    pub loop_stack: Vec<LoopState>,
    /// `PUSHD` history
    pub directory_stack: Vec<PathBuf>,
    pub command_count: u64,
    pub title: Option<String>,
    /// `VERIFY ON|OFF`; recorded only
    pub verify: bool,
    /// `DOSKEY` definitions applied to typed lines
    pub macros: MacroTable,
}

impl InterpreterState {
    pub fn new(env: Environment, cwd: PathBuf) -> Self {
        Self {
            env,
            cwd,
            last_exit_code: 0,
            echo_on: true,
            phase: ExecutionPhase::Running,
            call_stack: Vec::new(),
            loop_stack: Vec::new(),
            directory_stack: Vec::new(),
            command_count: 0,
            title: None,
            verify: false,
            macros: MacroTable::new(),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        if self.call_stack.is_empty() {
            ExecutionMode::Interactive
        } else {
            ExecutionMode::Batch
        }
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut CallFrame> {
        self.call_stack.last_mut()
    }

    /// Switch phase, returning the previous one for restoration.
    pub fn enter_phase(&mut self, phase: ExecutionPhase) -> ExecutionPhase {
        let previous = self.phase;
        if previous != ExecutionPhase::Terminated {
            self.phase = phase;
        }
        previous
    }

    pub fn restore_phase(&mut self, previous: ExecutionPhase) {
        if self.phase != ExecutionPhase::Terminated {
            self.phase = previous;
        }
    }

    /// Child context for a pipeline stage or `FOR /F` command.
    ///
    /// The child runs outside any script frame; active loop bindings stay
    /// visible.
    pub fn child_context(&self) -> Self {
        let mut child = self.clone();
        child.call_stack.clear();
        child
    }
}

/// Execution result from a command or script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::new(String::new(), String::new(), 0)
    }

    /// Success result with stdout
    pub fn output(stdout: impl Into<String>) -> Self {
        Self::new(stdout.into(), String::new(), 0)
    }

    /// Failure result with stderr message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), 1)
    }

    /// Failure result with stderr message and custom exit code
    pub fn failure_with_code(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(String::new(), stderr.into(), exit_code)
    }

    /// Append another result's output; the exit code becomes `other`'s.
    pub fn append(&mut self, other: ExecResult) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self.exit_code = other.exit_code;
    }
}

impl Default for ExecResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Execution limits configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum nesting of `CALL`ed scripts and subroutines
    pub max_call_depth: usize,
    /// Maximum number of `FOR` iterations per loop
    pub max_iterations: u64,
    /// Maximum number of commands per top-level invocation
    pub max_command_count: u64,
    /// Chunks buffered between pipeline stages
    pub pipe_buffer: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_iterations: 1_000_000,
            max_command_count: 10_000_000,
            pipe_buffer: 16,
        }
    }
}
