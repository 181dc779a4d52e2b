//! setlocal / endlocal - Localize environment changes
//!
//! `SETLOCAL` opens a scope; `ENDLOCAL` discards every change made since.
//! Extension options such as `ENABLEDELAYEDEXPANSION` are accepted and
//! ignored. Scopes still open when a script or subroutine returns are closed
//! by the script runner.

use tracing::{debug, warn};

use crate::interpreter::types::{ExecResult, InterpreterState};

pub const ENDLOCAL_UNDERFLOW: &str = "ENDLOCAL without matching SETLOCAL\n";

/// Handle the setlocal builtin command.
pub fn handle_setlocal(state: &mut InterpreterState) -> ExecResult {
    state.env.push_scope();
    debug!(depth = state.env.scope_depth(), "setlocal");
    ExecResult::ok()
}

/// Handle the endlocal builtin command.
///
/// A scope opened by a caller cannot be closed from a called script or
/// subroutine. Underflow is reported and leaves the exit status unchanged.
pub fn handle_endlocal(state: &mut InterpreterState) -> ExecResult {
    let marker = state.current_frame().map(|frame| frame.scope_marker).unwrap_or(0);
    if state.env.scope_depth() <= marker || state.env.pop_scope().is_err() {
        warn!(depth = state.env.scope_depth(), marker, "scope underflow");
        return ExecResult::new(String::new(), ENDLOCAL_UNDERFLOW.to_string(), state.last_exit_code);
    }
    debug!(depth = state.env.scope_depth(), "endlocal");
    ExecResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use crate::interpreter::types::{CallFrame, PositionalParams};
    use crate::parser::script::Program;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn make_state() -> InterpreterState {
        InterpreterState::new(Environment::from_vars([("X", "1")]), PathBuf::from("/"))
    }

    #[test]
    fn test_setlocal_endlocal_restores() {
        let mut state = make_state();
        handle_setlocal(&mut state);
        state.env.set("X", "2");
        state.env.set("NEW", "y");
        assert_eq!(handle_endlocal(&mut state).exit_code, 0);
        assert_eq!(state.env.get("X"), Some("1"));
        assert_eq!(state.env.get("NEW"), None);
    }

    #[test]
    fn test_underflow_keeps_exit_code() {
        let mut state = make_state();
        state.last_exit_code = 5;
        let result = handle_endlocal(&mut state);
        assert_eq!(result.exit_code, 5);
        assert_eq!(result.stderr, ENDLOCAL_UNDERFLOW);
        assert_eq!(state.env.get("X"), Some("1"));
    }

    #[test]
    fn test_cannot_close_callers_scope() {
        let mut state = make_state();
        handle_setlocal(&mut state);
        state.call_stack.push(CallFrame {
            program: Arc::new(Program::load("t.bat", "")),
            pc: 0,
            params: PositionalParams::new("t.bat", &[]),
            saved_echo: true,
            scope_marker: 1,
        });
        let result = handle_endlocal(&mut state);
        assert_eq!(result.stderr, ENDLOCAL_UNDERFLOW);
        assert_eq!(state.env.scope_depth(), 1);
    }
}
