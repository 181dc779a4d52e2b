//! shift - Shift positional parameters
//!
//! `SHIFT` moves `%1` to `%0`, `%2` to `%1` and so on. `SHIFT /n` starts at
//! `%n`, leaving the parameters before it alone. `%*` is not affected.
//! Outside a script there are no parameters and the command does nothing.

use crate::interpreter::types::{ExecResult, InterpreterState};

/// Handle the shift builtin command.
pub fn handle_shift(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let from = match args.first() {
        None => 0,
        Some(arg) => match arg.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n <= 8 => n,
            _ => return ExecResult::failure("Invalid parameter to SHIFT command.\n"),
        },
    };

    if let Some(frame) = state.current_frame_mut() {
        frame.params.shift(from);
    }
    ExecResult::ok()
}
