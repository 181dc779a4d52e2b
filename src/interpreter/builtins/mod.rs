//! Builtin Commands
//!
//! This module contains implementations of the interpreter's internal
//! commands. Handlers take the interpreter state and the command's words (or
//! its raw argument text) and return an [`ExecResult`]; the few that change
//! control flow return `Result<_, InterpreterError>`.
//!
//! [`ExecResult`]: crate::interpreter::types::ExecResult

pub mod call_cmd;
pub mod cd_cmd;
pub mod console_cmd;
pub mod doskey_cmd;
pub mod echo_cmd;
pub mod exit_cmd;
pub mod filter_cmd;
pub mod local_cmd;
pub mod set_cmd;
pub mod shift_cmd;

pub use call_cmd::{handle_call, handle_goto};
pub use cd_cmd::{handle_cd, handle_popd, handle_pushd};
pub use console_cmd::{handle_cls, handle_pause, handle_title, handle_ver, handle_verify};
pub use doskey_cmd::handle_doskey;
pub use echo_cmd::{handle_echo, handle_echo_text, split_echo_prefix};
pub use exit_cmd::handle_exit;
pub use filter_cmd::{handle_find, handle_findstr, handle_more, handle_sort, handle_type};
pub use local_cmd::{handle_endlocal, handle_setlocal};
pub use set_cmd::{handle_set, SYNTAX_ERROR};
pub use shift_cmd::handle_shift;
