//! Shell - Main entry point for just-cmd
//!
//! Provides a simple API for running command lines and batch scripts. A
//! `Shell` owns the interpreter state, so variables, the working directory
//! and the exit status persist across calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::interpreter::command_resolution::DEFAULT_PATHEXT;
use crate::interpreter::expansion::expand_prompt;
use crate::interpreter::expansion::prompt::DEFAULT_PROMPT;
use crate::interpreter::helpers::resolve_path;
use crate::interpreter::script_runner::{call_batch_file, run_program};
use crate::interpreter::{
    Environment, ExecResult, ExecutionEngine, ExecutionLimitError, ExecutionLimits, ExecutionPhase,
    InterpreterError, InterpreterState, InterruptFlag, PositionalParams, ProcessRunner, SystemProcessRunner,
    INTERRUPTED_EXIT_CODE,
};
use crate::parser::Program;

/// Options for creating a Shell instance.
#[derive(Default, Clone)]
pub struct ShellOptions {
    /// Initial variables; the host environment when `None`
    pub env: Option<HashMap<String, String>>,
    /// Working directory; the process's current directory when `None`
    pub cwd: Option<PathBuf>,
    pub limits: Option<ExecutionLimits>,
    /// Spawner for external programs; `SystemProcessRunner` when `None`
    pub runner: Option<Arc<dyn ProcessRunner>>,
    /// Initial echo state for batch scripts; on when `None`
    pub echo: Option<bool>,
    /// Overrides `PROMPT`
    pub prompt: Option<String>,
    /// Overrides `PATHEXT`
    pub pathext: Option<String>,
    /// Text given as standard input to every top-level invocation
    pub stdin: Option<String>,
}

/// Command interpreter with persistent state.
pub struct Shell {
    state: InterpreterState,
    limits: ExecutionLimits,
    runner: Arc<dyn ProcessRunner>,
    interrupt: InterruptFlag,
    stdin: String,
}

impl Shell {
    pub fn new(options: ShellOptions) -> Self {
        let cwd = options
            .cwd
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut env = match options.env {
            Some(vars) => Environment::from_vars(vars),
            None => Environment::from_host(),
        };
        match options.prompt {
            Some(prompt) => env.set("PROMPT", prompt),
            None if !env.contains("PROMPT") => env.set("PROMPT", DEFAULT_PROMPT),
            None => {}
        }
        match options.pathext {
            Some(pathext) => env.set("PATHEXT", pathext),
            None if !env.contains("PATHEXT") => env.set("PATHEXT", DEFAULT_PATHEXT),
            None => {}
        }

        let mut state = InterpreterState::new(env, cwd);
        state.echo_on = options.echo.unwrap_or(true);

        Self {
            state,
            limits: options.limits.unwrap_or_default(),
            runner: options.runner.unwrap_or_else(|| Arc::new(SystemProcessRunner)),
            interrupt: InterruptFlag::new(),
            stdin: options.stdin.unwrap_or_default(),
        }
    }

    /// Execute one command line in interactive mode. A line starting with a
    /// `DOSKEY` macro name is replaced by the macro first.
    pub fn exec(&mut self, line: &str) -> ExecResult {
        self.state.command_count = 0;
        let line = match self.state.macros.expand_line(line) {
            Some(expanded) => {
                debug!(line, expanded = %expanded, "macro");
                expanded
            }
            None => line.to_string(),
        };
        let engine = ExecutionEngine::new(&self.limits, &*self.runner, &self.interrupt);
        let outcome = engine.execute_line(&mut self.state, &line, &self.stdin);
        self.finish(outcome)
    }

    /// Run batch source text as a script named `name` with `args` as `%1..`.
    pub fn exec_script(&mut self, name: &str, source: &str, args: &[String]) -> ExecResult {
        self.state.command_count = 0;
        let program = Program::load(name, source);
        info!(script = name, lines = program.len(), "running script");
        let engine = ExecutionEngine::new(&self.limits, &*self.runner, &self.interrupt);
        let params = PositionalParams::new(name, args);
        let outcome = run_program(&engine, &mut self.state, Arc::new(program), 0, params, &self.stdin);
        self.finish(outcome)
    }

    /// Run a batch file; relative paths are taken from the working directory.
    pub fn exec_file(&mut self, path: &Path, args: &[String]) -> ExecResult {
        self.state.command_count = 0;
        let path = resolve_path(&self.state.cwd, &path.to_string_lossy());
        let engine = ExecutionEngine::new(&self.limits, &*self.runner, &self.interrupt);
        let outcome = call_batch_file(&engine, &mut self.state, &path, args, &self.stdin);
        self.finish(outcome)
    }

    /// Map what escaped the engine to a final result.
    fn finish(&mut self, outcome: Result<ExecResult, InterpreterError>) -> ExecResult {
        let mut error = match outcome {
            Ok(result) => return result,
            Err(e) => e,
        };
        let (stdout, mut stderr) = error.take_output();
        let exit_code = match error {
            InterpreterError::Exit(e) => e.exit_code,
            // Only reachable outside a script
            InterpreterError::Goto(_) => 1,
            InterpreterError::LabelNotFound(_) | InterpreterError::RecursionLimit(_) => 1,
            InterpreterError::Interrupted(_) => {
                self.interrupt.clear();
                INTERRUPTED_EXIT_CODE
            }
            InterpreterError::ExecutionLimit(e) => {
                stderr.push_str(&format!("{}\n", e.message));
                ExecutionLimitError::EXIT_CODE
            }
        };
        debug!(exit_code, "invocation ended early");
        self.state.last_exit_code = exit_code;
        ExecResult::new(stdout, stderr, exit_code)
    }

    /// The expanded `PROMPT` for an interactive session.
    pub fn prompt(&self) -> String {
        let template = self.state.env.get("PROMPT").unwrap_or(DEFAULT_PROMPT);
        expand_prompt(template, &self.state.cwd)
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.state.env.get(name)
    }

    pub fn cwd(&self) -> &Path {
        &self.state.cwd
    }

    pub fn last_exit_code(&self) -> i32 {
        self.state.last_exit_code
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.state.phase
    }

    /// True once `EXIT` without `/B` has run.
    pub fn is_terminated(&self) -> bool {
        self.state.phase == ExecutionPhase::Terminated
    }

    /// Flag that stops the running command when set from another thread.
    pub fn interrupt_handle(&self) -> InterruptFlag {
        self.interrupt.clone()
    }
}
