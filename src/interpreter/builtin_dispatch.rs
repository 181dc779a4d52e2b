//! Builtin Command Dispatch
//!
//! Routes a resolved command name to its builtin handler, to the script
//! runner for batch files, or to the process runner for external programs.

use tracing::debug;

use crate::interpreter::builtins::{
    handle_call, handle_cd, handle_cls, handle_doskey, handle_echo, handle_echo_text, handle_endlocal, handle_exit,
    handle_find, handle_findstr, handle_goto, handle_more, handle_pause, handle_popd, handle_pushd,
    handle_set, handle_setlocal, handle_shift, handle_sort, handle_title, handle_type, handle_ver,
    handle_verify, split_echo_prefix,
};
use crate::interpreter::command_resolution::{resolve_command, ResolvedCommand};
use crate::interpreter::errors::{ExitError, InterpreterError};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::script_runner::call_batch_file;
use crate::interpreter::types::{ExecResult, ExecutionMode, InterpreterState};

/// Exit status of a command that could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 9009;

/// Internal commands, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Set,
    Setlocal,
    Endlocal,
    Cd,
    Pushd,
    Popd,
    Exit,
    Shift,
    Goto,
    Call,
    Rem,
    Pause,
    Type,
    More,
    Sort,
    Find,
    Findstr,
    Cls,
    Ver,
    Title,
    Verify,
    Doskey,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_uppercase().as_str() {
            "ECHO" => Builtin::Echo,
            "SET" => Builtin::Set,
            "SETLOCAL" => Builtin::Setlocal,
            "ENDLOCAL" => Builtin::Endlocal,
            "CD" | "CHDIR" => Builtin::Cd,
            "PUSHD" => Builtin::Pushd,
            "POPD" => Builtin::Popd,
            "EXIT" => Builtin::Exit,
            "SHIFT" => Builtin::Shift,
            "GOTO" => Builtin::Goto,
            "CALL" => Builtin::Call,
            "REM" => Builtin::Rem,
            "PAUSE" => Builtin::Pause,
            "TYPE" => Builtin::Type,
            "MORE" => Builtin::More,
            "SORT" => Builtin::Sort,
            "FIND" => Builtin::Find,
            "FINDSTR" => Builtin::Findstr,
            "CLS" | "CLEAR" => Builtin::Cls,
            "VER" => Builtin::Ver,
            "TITLE" => Builtin::Title,
            "VERIFY" => Builtin::Verify,
            "DOSKEY" => Builtin::Doskey,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Echo => "ECHO",
            Builtin::Set => "SET",
            Builtin::Setlocal => "SETLOCAL",
            Builtin::Endlocal => "ENDLOCAL",
            Builtin::Cd => "CD",
            Builtin::Pushd => "PUSHD",
            Builtin::Popd => "POPD",
            Builtin::Exit => "EXIT",
            Builtin::Shift => "SHIFT",
            Builtin::Goto => "GOTO",
            Builtin::Call => "CALL",
            Builtin::Rem => "REM",
            Builtin::Pause => "PAUSE",
            Builtin::Type => "TYPE",
            Builtin::More => "MORE",
            Builtin::Sort => "SORT",
            Builtin::Find => "FIND",
            Builtin::Findstr => "FINDSTR",
            Builtin::Cls => "CLS",
            Builtin::Ver => "VER",
            Builtin::Title => "TITLE",
            Builtin::Verify => "VERIFY",
            Builtin::Doskey => "DOSKEY",
        }
    }
}

/// Message printed for a command that is neither internal nor on `PATH`.
pub fn not_recognized(name: &str) -> String {
    format!(
        "'{}' is not recognized as an internal or external command,\noperable program or batch file.\n",
        name
    )
}

/// Dispatch one simple command after loop-variable substitution.
///
/// `called` is set when the command came through `CALL`: a batch file then
/// returns to the caller instead of replacing the running script.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_command(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    name: &str,
    args: &[String],
    raw_args: &str,
    stdin: &str,
    called: bool,
) -> Result<ExecResult, InterpreterError> {
    // ECHO. ECHO: ECHO( and friends glue the message to the name
    if let Some(prefix) = split_echo_prefix(name) {
        return Ok(handle_echo_text(&format!("{}{}", prefix, raw_args)));
    }

    match resolve_command(name, state) {
        ResolvedCommand::Builtin(builtin) => run_builtin(engine, state, builtin, args, raw_args, stdin),
        ResolvedCommand::Batch(path) => {
            if called || state.mode() == ExecutionMode::Interactive {
                return call_batch_file(engine, state, &path, args, stdin);
            }
            // Without CALL the new script replaces the running one
            debug!(path = %path.display(), "chaining to batch file");
            let result = call_batch_file(engine, state, &path, args, stdin)?;
            Err(InterpreterError::from(ExitError::new(result.exit_code, true))
                .with_output(&result.stdout, &result.stderr))
        }
        ResolvedCommand::External(path) => Ok(engine.run_external(state, &path, args, stdin)),
        ResolvedCommand::NotFound => Ok(ExecResult::failure_with_code(
            not_recognized(name),
            NOT_FOUND_EXIT_CODE,
        )),
    }
}

fn run_builtin(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    builtin: Builtin,
    args: &[String],
    raw_args: &str,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let result = match builtin {
        Builtin::Echo => handle_echo(state, raw_args),
        Builtin::Set => handle_set(state, raw_args, stdin),
        Builtin::Setlocal => handle_setlocal(state),
        Builtin::Endlocal => handle_endlocal(state),
        Builtin::Cd => handle_cd(state, raw_args),
        Builtin::Pushd => handle_pushd(state, raw_args),
        Builtin::Popd => handle_popd(state),
        Builtin::Exit => match handle_exit(state, args) {
            Ok(never) => match never {},
            Err(e) => return Err(e),
        },
        Builtin::Shift => handle_shift(state, args),
        Builtin::Goto => return handle_goto(state, args),
        Builtin::Call => return handle_call(engine, state, raw_args, stdin),
        Builtin::Rem => ExecResult::new(String::new(), String::new(), state.last_exit_code),
        Builtin::Pause => handle_pause(),
        Builtin::Type => handle_type(state, args),
        Builtin::More => handle_more(state, args, stdin),
        Builtin::Sort => handle_sort(state, args, stdin),
        Builtin::Find => handle_find(state, args, stdin),
        Builtin::Findstr => handle_findstr(state, args, stdin),
        Builtin::Cls => handle_cls(),
        Builtin::Ver => handle_ver(),
        Builtin::Title => handle_title(state, raw_args),
        Builtin::Verify => handle_verify(state, args),
        Builtin::Doskey => handle_doskey(state, raw_args),
    };
    Ok(result)
}
