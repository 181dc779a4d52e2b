//! Execution Engine
//!
//! Ties the interpreter components together. One logical line goes through:
//!
//! execute_line -> execute_sequence -> execute_command -> execute_simple_command
//!
//! Percent expansion happens once per line in `execute_line`; loop variables
//! are substituted per command so every iteration sees its own value.

use std::io::{self, Read, Write};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::ast::types::{CommandNode, SequenceNode, SimpleCommandNode};
use crate::interpreter::builtin_dispatch::{dispatch_command, not_recognized, NOT_FOUND_EXIT_CODE};
use crate::interpreter::builtins::SYNTAX_ERROR;
use crate::interpreter::control_flow::{execute_for, execute_if};
use crate::interpreter::errors::{ExecutionLimitError, InterpreterError, InterruptedError, LimitType};
use crate::interpreter::expansion::{expand_tokens, substitute_loop_vars};
use crate::interpreter::pipeline_execution::execute_pipeline;
use crate::interpreter::process::{InterruptFlag, ProcessRequest, ProcessRunner};
use crate::interpreter::redirections::prepare_redirections;
use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
use crate::parser::{parse_tokens, tokenize};

/// The execution engine that ties all interpreter components together.
///
/// Holds only shared references, so it is `Copy` and can be handed to
/// pipeline stage threads.
#[derive(Clone, Copy)]
pub struct ExecutionEngine<'a> {
    /// Execution limits (call depth, iterations, command count)
    pub limits: &'a ExecutionLimits,
    /// Spawns external programs
    pub runner: &'a dyn ProcessRunner,
    /// Set by the Ctrl-C handler
    pub interrupt: &'a InterruptFlag,
}

impl<'a> ExecutionEngine<'a> {
    /// Create a new execution engine.
    pub fn new(limits: &'a ExecutionLimits, runner: &'a dyn ProcessRunner, interrupt: &'a InterruptFlag) -> Self {
        Self { limits, runner, interrupt }
    }

    /// Expand, parse and execute one logical line.
    ///
    /// A syntax error is reported on stderr and leaves the exit status
    /// unchanged; the rest of the script keeps running.
    pub fn execute_line(
        &self,
        state: &mut InterpreterState,
        line: &str,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        let tokens = expand_tokens(tokenize(line), state);
        match parse_tokens(tokens) {
            Ok(Some(sequence)) => self.execute_sequence(state, &sequence, stdin),
            Ok(None) => Ok(ExecResult::new(String::new(), String::new(), state.last_exit_code)),
            Err(e) => {
                debug!(error = %e, line, "syntax error");
                Ok(ExecResult::new(String::new(), SYNTAX_ERROR.to_string(), state.last_exit_code))
            }
        }
    }

    /// Execute a command sequence (`&`, `&&`, `||`, `|`).
    pub fn execute_sequence(
        &self,
        state: &mut InterpreterState,
        sequence: &SequenceNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        match sequence {
            SequenceNode::Single(command) => self.execute_command(state, command, stdin),
            SequenceNode::Pipe(..) => {
                let result = execute_pipeline(self, state, sequence, stdin)?;
                state.last_exit_code = result.exit_code;
                Ok(result)
            }
            SequenceNode::Sequential(left, right) => {
                let first = self.execute_sequence(state, left, stdin)?;
                self.then_execute(state, first, right, stdin)
            }
            SequenceNode::AndThen(left, right) => {
                let first = self.execute_sequence(state, left, stdin)?;
                if first.exit_code != 0 {
                    return Ok(first);
                }
                self.then_execute(state, first, right, stdin)
            }
            SequenceNode::OrElse(left, right) => {
                let first = self.execute_sequence(state, left, stdin)?;
                if first.exit_code == 0 {
                    return Ok(first);
                }
                self.then_execute(state, first, right, stdin)
            }
        }
    }

    /// Run `next` after `first`, keeping `first`'s output ahead of it.
    fn then_execute(
        &self,
        state: &mut InterpreterState,
        mut first: ExecResult,
        next: &SequenceNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        match self.execute_sequence(state, next, stdin) {
            Ok(result) => {
                first.append(result);
                Ok(first)
            }
            Err(e) => Err(e.with_output(&first.stdout, &first.stderr)),
        }
    }

    /// Execute a single command.
    pub fn execute_command(
        &self,
        state: &mut InterpreterState,
        command: &CommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        if self.interrupt.is_set() {
            debug!("interrupted");
            return Err(InterruptedError::default().into());
        }

        state.command_count += 1;
        if state.command_count > self.limits.max_command_count {
            return Err(ExecutionLimitError::new(
                format!("too many commands executed (limit {})", self.limits.max_command_count),
                LimitType::Commands,
            )
            .into());
        }

        let result = match command {
            CommandNode::Simple(simple) => return self.execute_simple_command(state, simple, stdin, false),
            CommandNode::Block(block) => {
                let plan = match prepare_redirections(&block.redirections, state) {
                    Ok(plan) => plan,
                    Err(failed) => {
                        state.last_exit_code = failed.exit_code;
                        return Ok(failed);
                    }
                };
                let input = plan.stdin.as_deref().unwrap_or(stdin);
                match self.execute_sequence(state, &block.body, input) {
                    Ok(result) => plan.apply(result),
                    Err(e) => return Err(plan.apply_to_error(e)),
                }
            }
            CommandNode::If(node) => execute_if(self, state, node, stdin)?,
            CommandNode::For(node) => execute_for(self, state, node, stdin)?,
        };

        state.last_exit_code = result.exit_code;
        Ok(result)
    }

    /// Execute a simple command: substitute loop variables, open
    /// redirections, dispatch, then route the output.
    pub fn execute_simple_command(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        stdin: &str,
        called: bool,
    ) -> Result<ExecResult, InterpreterError> {
        let substitute = |text: &str| substitute_loop_vars(text, &state.loop_stack, &state.cwd);
        let name = substitute(&cmd.name);
        let args: Vec<String> = cmd.args.iter().map(|arg| substitute(arg)).collect();
        let raw_args = substitute(&cmd.raw_args);

        let plan = match prepare_redirections(&cmd.redirections, state) {
            Ok(plan) => plan,
            Err(failed) => {
                state.last_exit_code = failed.exit_code;
                return Ok(failed);
            }
        };
        let stdin = plan.stdin.as_deref().unwrap_or(stdin);

        // A line holding only redirections
        if name.is_empty() {
            return Ok(plan.apply(ExecResult::new(String::new(), String::new(), state.last_exit_code)));
        }

        trace!(name = %name, args = ?args, "simple command");
        match dispatch_command(self, state, &name, &args, &raw_args, stdin, called) {
            Ok(result) => {
                state.last_exit_code = result.exit_code;
                Ok(plan.apply(result))
            }
            Err(e) => Err(plan.apply_to_error(e)),
        }
    }

    /// Run an external program with `stdin` as its input, capturing output.
    pub fn run_external(&self, state: &InterpreterState, program: &Path, args: &[String], stdin: &str) -> ExecResult {
        let mut input = io::Cursor::new(stdin.as_bytes());
        let mut stdout = Vec::new();
        let (stderr, exit_code) = self.run_external_streaming(state, program, args, &mut input, &mut stdout);
        ExecResult::new(String::from_utf8_lossy(&stdout).into_owned(), stderr, exit_code)
    }

    /// Run an external program between a reader and a writer.
    ///
    /// Returns the captured stderr and the exit status.
    pub fn run_external_streaming(
        &self,
        state: &InterpreterState,
        program: &Path,
        args: &[String],
        stdin: &mut (dyn Read + Send),
        stdout: &mut dyn Write,
    ) -> (String, i32) {
        // Quotes group words on the command line; the program never sees them
        let argv: Vec<String> = args.iter().map(|arg| arg.replace('"', "")).collect();
        let env = state.env.to_env_map();
        let request = ProcessRequest {
            program,
            args: &argv,
            cwd: &state.cwd,
            env: &env,
        };

        let mut stderr = Vec::new();
        match self.runner.run(&request, stdin, stdout, &mut stderr, self.interrupt) {
            Ok(code) => (String::from_utf8_lossy(&stderr).into_owned(), code),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(program = %program.display(), "program vanished before spawn");
                (not_recognized(&program.display().to_string()), NOT_FOUND_EXIT_CODE)
            }
            Err(e) => {
                warn!(program = %program.display(), error = %e, "failed to run program");
                (format!("{}: {}\n", program.display(), e), 1)
            }
        }
    }
}
