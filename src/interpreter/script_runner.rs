//! Script Runner
//!
//! Runs batch programs one logical line at a time. Each invocation, whether
//! a script file or a `CALL :label` subroutine, gets its own frame on the
//! call stack holding the program counter and the positional parameters.
//!
//! `GOTO` unwinds to here as an error and moves the program counter. `EXIT
//! /B` and `GOTO :EOF` end the frame. On return the frame's `SETLOCAL`
//! scopes are closed and the caller's echo flag is restored.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::interpreter::errors::{ControlFlowError, InterpreterError, LabelNotFoundError, RecursionLimitError};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::expand_prompt;
use crate::interpreter::expansion::prompt::DEFAULT_PROMPT;
use crate::interpreter::redirections::FILE_NOT_FOUND;
use crate::interpreter::types::{CallFrame, ExecResult, ExecutionPhase, InterpreterState, PositionalParams};
use crate::parser::script::{LineKind, Program};

/// Run `program` from line `start` in a new frame.
pub fn run_program(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    program: Arc<Program>,
    start: usize,
    params: PositionalParams,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let depth = state.call_stack.len();
    if depth >= engine.limits.max_call_depth {
        let err = RecursionLimitError::new(depth);
        warn!(depth, "call depth limit reached");
        let message = err.message();
        return Err(InterpreterError::from(err).with_output("", &message));
    }

    debug!(program = %program.name, start, depth = depth + 1, "enter frame");
    let previous_phase = if depth > 0 {
        state.enter_phase(ExecutionPhase::Calling)
    } else {
        state.phase
    };
    state.call_stack.push(CallFrame {
        program,
        pc: start,
        params,
        saved_echo: state.echo_on,
        scope_marker: state.env.scope_depth(),
    });

    let outcome = run_frame(engine, state, stdin);

    if let Some(frame) = state.call_stack.pop() {
        state.env.truncate_scopes(frame.scope_marker);
        state.echo_on = frame.saved_echo;
        debug!(program = %frame.program.name, "leave frame");
    }
    state.restore_phase(previous_phase);
    outcome
}

/// Execute lines of the current frame until it ends.
fn run_frame(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let mut stdout = String::new();
    let mut stderr = String::new();

    loop {
        let Some(frame) = state.current_frame_mut() else {
            break;
        };
        let Some(line) = frame.program.lines.get(frame.pc).cloned() else {
            break;
        };
        frame.pc += 1;

        if line.kind != LineKind::Command {
            continue;
        }

        let text = line.text.trim_start();
        if state.echo_on && !text.starts_with('@') {
            let template = state.env.get("PROMPT").unwrap_or(DEFAULT_PROMPT).to_string();
            stdout.push_str(&format!("\n{}{}\n", expand_prompt(&template, &state.cwd), text));
        }

        match engine.execute_line(state, &line.text, stdin) {
            Ok(result) => {
                stdout.push_str(&result.stdout);
                stderr.push_str(&result.stderr);
            }
            Err(InterpreterError::Goto(mut goto)) => {
                let (out, err) = goto.take_output();
                stdout.push_str(&out);
                stderr.push_str(&err);
                if goto.is_eof() {
                    break;
                }
                let target = state.current_frame().and_then(|frame| frame.program.find_label(&goto.label));
                match (target, state.current_frame_mut()) {
                    (Some(index), Some(frame)) => frame.pc = index + 1,
                    _ => {
                        let missing = LabelNotFoundError::new(goto.label);
                        warn!(label = %missing.label, line = line.line_number, "label not found");
                        stderr.push_str(&missing.message());
                        return Err(InterpreterError::from(missing).with_output(&stdout, &stderr));
                    }
                }
            }
            Err(InterpreterError::Exit(mut exit)) if exit.batch_only => {
                let (out, err) = exit.take_output();
                stdout.push_str(&out);
                stderr.push_str(&err);
                state.last_exit_code = exit.exit_code;
                break;
            }
            Err(e) => return Err(e.with_output(&stdout, &stderr)),
        }
    }

    Ok(ExecResult::new(stdout, stderr, state.last_exit_code))
}

/// `CALL :label args`: run a subroutine of the current script.
///
/// A missing label is reported and the caller continues.
pub fn call_label(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    label: &str,
    args: &[String],
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let Some(program) = state.current_frame().map(|frame| Arc::clone(&frame.program)) else {
        return Ok(ExecResult::failure(
            "Invalid attempt to call batch label outside of batch script.\n",
        ));
    };
    let Some(index) = program.find_label(label) else {
        return Ok(ExecResult::failure(LabelNotFoundError::new(label).message()));
    };

    let params = PositionalParams::new(label, args);
    run_program(engine, state, program, index + 1, params, stdin)
}

/// Load and run a batch file with `args` as its parameters.
pub fn call_batch_file(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    path: &Path,
    args: &[String],
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let source = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read batch file");
            return Ok(ExecResult::failure(FILE_NOT_FOUND));
        }
    };

    let program = Program::load(path.display().to_string(), &source);
    for label in program.duplicate_labels() {
        warn!(path = %path.display(), label = %label, "duplicate label; the first definition is used");
    }
    info!(path = %path.display(), lines = program.len(), "running batch file");

    let params = PositionalParams::new(path.display().to_string(), args);
    run_program(engine, state, Arc::new(program), 0, params, stdin)
}
