//! cd - Change directory builtin
//!
//! Supports:
//! - `CD` / `CHDIR` - print the current directory
//! - `CD [/D] path` - change directory; the path may contain unquoted spaces
//! - `PUSHD path` - save the current directory and change to `path`
//! - `POPD` - return to the most recently pushed directory

use std::path::PathBuf;

use crate::interpreter::helpers::resolve_path;
use crate::interpreter::redirections::PATH_NOT_FOUND;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Resolve the directory named by `text`, if it exists.
fn target_directory(state: &InterpreterState, text: &str) -> Option<PathBuf> {
    let path = resolve_path(&state.cwd, text.trim());
    path.is_dir().then_some(path)
}

/// Handle the cd builtin command. `raw` is the text after the name.
pub fn handle_cd(state: &mut InterpreterState, raw: &str) -> ExecResult {
    let mut text = raw.trim();
    if text.len() >= 2 && text[..2].eq_ignore_ascii_case("/D") {
        text = text[2..].trim_start();
    }

    if text.is_empty() {
        return ExecResult::output(format!("{}\n", state.cwd.display()));
    }

    match target_directory(state, text) {
        Some(dir) => {
            state.cwd = dir;
            ExecResult::ok()
        }
        None => ExecResult::failure(PATH_NOT_FOUND),
    }
}

/// Handle the pushd builtin command.
pub fn handle_pushd(state: &mut InterpreterState, raw: &str) -> ExecResult {
    let text = raw.trim();
    if text.is_empty() {
        let listing: String = state
            .directory_stack
            .iter()
            .rev()
            .map(|dir| format!("{}\n", dir.display()))
            .collect();
        return ExecResult::output(listing);
    }

    match target_directory(state, text) {
        Some(dir) => {
            let previous = std::mem::replace(&mut state.cwd, dir);
            state.directory_stack.push(previous);
            ExecResult::ok()
        }
        None => ExecResult::failure(PATH_NOT_FOUND),
    }
}

/// Handle the popd builtin command. An empty stack is not an error.
pub fn handle_popd(state: &mut InterpreterState) -> ExecResult {
    if let Some(dir) = state.directory_stack.pop() {
        state.cwd = dir;
    }
    ExecResult::ok()
}
