//! call / goto - Transfer control inside and between scripts
//!
//! - `CALL script [args]` runs a batch script and returns to the caller
//! - `CALL :label [args]` runs a subroutine of the current script
//! - `CALL command` runs any other command after a second percent expansion
//! - `GOTO label` continues the current script at `label`
//! - `GOTO :EOF` returns from the current script or subroutine

use tracing::debug;

use crate::ast::types::{CommandNode, SequenceNode};
use crate::interpreter::errors::{GotoError, InterpreterError, LabelNotFoundError};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::expand_percent;
use crate::interpreter::script_runner::call_label;
use crate::interpreter::types::{ExecResult, ExecutionMode, InterpreterState};
use crate::parser::{parse_tokens, tokenize};

use super::set_cmd::SYNTAX_ERROR;

/// Handle the call builtin command. `raw` is the text after the name.
pub fn handle_call(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    raw: &str,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    // The line was expanded once already; CALL expands it again
    let line = expand_percent(raw.trim_start(), state);
    debug!(line = %line, "call");

    let sequence = match parse_tokens(tokenize(&line)) {
        Ok(Some(sequence)) => sequence,
        Ok(None) => return Ok(ExecResult::ok()),
        Err(e) => {
            debug!(error = %e, "call target failed to parse");
            return Ok(ExecResult::failure(SYNTAX_ERROR));
        }
    };

    match &sequence {
        SequenceNode::Single(CommandNode::Simple(cmd)) if cmd.name.starts_with(':') => {
            call_label(engine, state, &cmd.name, &cmd.args, stdin)
        }
        SequenceNode::Single(CommandNode::Simple(cmd)) => {
            engine.execute_simple_command(state, cmd, stdin, true)
        }
        other => engine.execute_sequence(state, other, stdin),
    }
}

/// Handle the goto builtin command.
///
/// In a script this unwinds to the script runner, which moves the program
/// counter. At the prompt there are no labels to jump to.
pub fn handle_goto(state: &InterpreterState, args: &[String]) -> Result<ExecResult, InterpreterError> {
    let Some(label) = args.first() else {
        return Ok(ExecResult::failure("No batch label specified to GOTO command.\n"));
    };

    if state.mode() == ExecutionMode::Interactive {
        return Ok(ExecResult::failure(LabelNotFoundError::new(label.as_str()).message()));
    }
    Err(GotoError::new(label.as_str()).into())
}
