//! exit - Leave a script or the interpreter
//!
//! - `EXIT [code]` ends the interpreter
//! - `EXIT /B [code]` ends the current script or subroutine
//!
//! Without a code the last exit status is kept.

use std::convert::Infallible;

use crate::interpreter::errors::{ExitError, InterpreterError};
use crate::interpreter::types::{ExecutionPhase, InterpreterState};

/// Handle the exit builtin command.
///
/// # Returns
/// Always returns Err(InterpreterError::Exit) to unwind execution
pub fn handle_exit(state: &mut InterpreterState, args: &[String]) -> Result<Infallible, InterpreterError> {
    let mut rest = args.iter();
    let mut code_arg = rest.next();
    let batch_only = code_arg.is_some_and(|arg| arg.eq_ignore_ascii_case("/B"));
    if batch_only {
        code_arg = rest.next();
    }

    // Non-numeric codes count as 0
    let exit_code = match code_arg {
        Some(arg) => arg.trim().parse::<i32>().unwrap_or(0),
        None => state.last_exit_code,
    };

    if !batch_only {
        state.phase = ExecutionPhase::Terminated;
    }
    Err(ExitError::new(exit_code, batch_only).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use std::path::PathBuf;

    fn make_state() -> InterpreterState {
        InterpreterState::new(Environment::new(), PathBuf::from("/"))
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exit_no_args() {
        let mut state = make_state();
        state.last_exit_code = 42;
        match handle_exit(&mut state, &[]) {
            Err(InterpreterError::Exit(e)) => {
                assert_eq!(e.exit_code, 42);
                assert!(!e.batch_only);
            }
            _ => panic!("Expected ExitError"),
        }
        assert_eq!(state.phase, ExecutionPhase::Terminated);
    }

    #[test]
    fn test_exit_batch_with_code() {
        let mut state = make_state();
        match handle_exit(&mut state, &args(&["/b", "3"])) {
            Err(InterpreterError::Exit(e)) => {
                assert_eq!(e.exit_code, 3);
                assert!(e.batch_only);
            }
            _ => panic!("Expected ExitError"),
        }
        assert_eq!(state.phase, ExecutionPhase::Running);
    }

    #[test]
    fn test_exit_non_numeric_code() {
        let mut state = make_state();
        match handle_exit(&mut state, &args(&["abc"])) {
            Err(InterpreterError::Exit(e)) => assert_eq!(e.exit_code, 0),
            _ => panic!("Expected ExitError"),
        }
    }

    #[test]
    fn test_exit_negative_code() {
        let mut state = make_state();
        match handle_exit(&mut state, &args(&["/B", "-1"])) {
            Err(InterpreterError::Exit(e)) => assert_eq!(e.exit_code, -1),
            _ => panic!("Expected ExitError"),
        }
    }
}
