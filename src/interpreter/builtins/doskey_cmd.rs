//! DOSKEY builtin: define, delete and list macros
//!
//! `DOSKEY name=definition` defines, `DOSKEY name=` deletes, `DOSKEY /MACROS`
//! lists. History and editing switches are accepted; the interpreter keeps no
//! history of its own.

use tracing::debug;

use crate::interpreter::types::{ExecResult, InterpreterState};

const INVALID_DEFINITION: &str = "Invalid macro definition.\n";

pub fn handle_doskey(state: &mut InterpreterState, raw: &str) -> ExecResult {
    let mut text = raw.trim();
    let mut stdout = String::new();

    while text.starts_with('/') {
        let (switch, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let upper = switch.to_ascii_uppercase();
        let name = upper.split([':', '=']).next().unwrap_or_default();
        match name {
            "/M" | "/MACROS" => {
                for (macro_name, definition) in state.macros.list() {
                    stdout.push_str(&format!("{}={}\n", macro_name, definition));
                }
            }
            "/H" | "/HISTORY" | "/REINSTALL" | "/LISTSIZE" | "/INSERT" | "/OVERSTRIKE" | "/EXENAME"
            | "/MACROFILE" => {}
            _ => return ExecResult::failure(format!("Invalid switch - {}\n", switch)),
        }
        text = rest.trim_start();
    }

    if text.is_empty() {
        return ExecResult::output(stdout);
    }

    let Some((name, definition)) = text.split_once('=') else {
        return ExecResult::failure(INVALID_DEFINITION);
    };
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return ExecResult::failure(INVALID_DEFINITION);
    }
    debug!(name, definition, "doskey macro");
    state.macros.define(name, definition);
    ExecResult::output(stdout)
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
    fn test_define_list_and_delete() {
        let mut state = make_state();
        assert_eq!(handle_doskey(&mut state, " ll=dir /w $*").exit_code, 0);
        assert_eq!(handle_doskey(&mut state, " cdd=cd $1$Tcd").exit_code, 0);
        assert_eq!(state.macros.get("LL"), Some("dir /w $*"));

        let listing = handle_doskey(&mut state, " /macros");
        assert_eq!(listing.stdout, "cdd=cd $1$Tcd\nll=dir /w $*\n");

        handle_doskey(&mut state, " ll=");
        assert_eq!(state.macros.get("ll"), None);
        assert_eq!(handle_doskey(&mut state, " /MACROS:ALL").stdout, "cdd=cd $1$Tcd\n");
    }

    #[test]
    fn test_invalid_input() {
        let mut state = make_state();
        let result = handle_doskey(&mut state, " nodefinition");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "Invalid macro definition.\n");
        assert_eq!(handle_doskey(&mut state, " =x").exit_code, 1);
        assert_eq!(handle_doskey(&mut state, " /bogus").stderr, "Invalid switch - /bogus\n");
        assert!(state.macros.is_empty());
    }

    #[test]
    fn test_switches_before_definition() {
        let mut state = make_state();
        let result = handle_doskey(&mut state, " /reinstall /listsize=50 g=echo $1");
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.macros.get("g"), Some("echo $1"));
        assert_eq!(handle_doskey(&mut state, "").stdout, "");
    }
}
