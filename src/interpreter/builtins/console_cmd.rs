//! Console builtins: pause, cls, ver, title, verify

use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::VERSION_BANNER;

use super::set_cmd::SYNTAX_ERROR;

/// Handle the pause builtin command. Consumes no input; there is no
/// keyboard to wait on when output is captured.
pub fn handle_pause() -> ExecResult {
    ExecResult::output("Press any key to continue . . . \n")
}

/// Handle the cls builtin command.
pub fn handle_cls() -> ExecResult {
    ExecResult::output("\x1b[2J\x1b[H")
}

/// Handle the ver builtin command.
pub fn handle_ver() -> ExecResult {
    ExecResult::output(format!("\n{}\n", VERSION_BANNER))
}

/// Handle the title builtin command.
pub fn handle_title(state: &mut InterpreterState, raw: &str) -> ExecResult {
    state.title = Some(raw.trim().to_string());
    ExecResult::ok()
}

/// Handle the verify builtin command.
pub fn handle_verify(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    if args.len() > 1 {
        return ExecResult::failure(SYNTAX_ERROR);
    }
    match args.first().map(|arg| arg.to_ascii_uppercase()).as_deref() {
        None => {
            let status = if state.verify { "on" } else { "off" };
            ExecResult::output(format!("VERIFY is {}.\n", status))
        }
        Some("ON") => {
            state.verify = true;
            ExecResult::ok()
        }
        Some("OFF") => {
            state.verify = false;
            ExecResult::ok()
        }
        Some(_) => ExecResult::failure("Must specify ON or OFF.\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use std::path::PathBuf;

    fn make_state() -> InterpreterState {
        InterpreterState::new(Environment::new(), PathBuf::from("/"))
    }

    #[test]
    fn test_ver_banner() {
        let result = handle_ver();
        assert!(result.stdout.starts_with("\nJust CMD [Version "));
    }

    #[test]
    fn test_title() {
        let mut state = make_state();
        handle_title(&mut state, " Build  step ");
        assert_eq!(state.title.as_deref(), Some("Build  step"));
    }

    #[test]
    fn test_verify() {
        let mut state = make_state();
        assert_eq!(handle_verify(&mut state, &[]).stdout, "VERIFY is off.\n");
        handle_verify(&mut state, &["on".to_string()]);
        assert!(state.verify);
        assert_eq!(handle_verify(&mut state, &["maybe".to_string()]).exit_code, 1);
        assert_eq!(
            handle_verify(&mut state, &["on".to_string(), "x".to_string()]).stderr,
            SYNTAX_ERROR
        );
    }
}
