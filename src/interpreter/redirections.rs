//! Redirection Handling
//!
//! Handles the redirections attached to a command or block:
//! - `< file` : read stdin from a file (`NUL` gives empty input)
//! - `> file`, `>> file` : write (append) stdout to a file
//! - `2> file`, `2>> file` : the same for stderr
//! - `2>&1`, `1>&2` : send one stream wherever the other currently goes
//!
//! Redirections are processed left to right. Every output file is opened
//! (created or truncated) before the command runs, so `> file` empties the
//! file even when the command prints nothing; output is appended afterwards.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

use crate::ast::types::{RedirectionNode, RedirectionOp, RedirectionTarget};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::expansion::substitute_loop_vars;
use crate::interpreter::helpers::{is_null_device, resolve_path};
use crate::interpreter::types::{ExecResult, InterpreterState};

pub const PATH_NOT_FOUND: &str = "The system cannot find the path specified.\n";
pub const FILE_NOT_FOUND: &str = "The system cannot find the file specified.\n";

/// Where one output stream ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    Stdout,
    Stderr,
    Null,
    File(PathBuf),
}

/// Redirections of one command after their files have been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPlan {
    /// Replacement stdin, if `<` was given
    pub stdin: Option<String>,
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
}

impl Default for RedirectPlan {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout: StreamTarget::Stdout,
            stderr: StreamTarget::Stderr,
        }
    }
}

impl RedirectPlan {
    pub fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }

    /// Route a finished command's output through the plan.
    pub fn apply(&self, result: ExecResult) -> ExecResult {
        let mut routed = ExecResult::new(String::new(), String::new(), result.exit_code);
        route(&self.stdout, result.stdout, &mut routed);
        route(&self.stderr, result.stderr, &mut routed);
        routed
    }

    /// Route the output carried by a control-flow error through the plan.
    pub fn apply_to_error(&self, mut error: InterpreterError) -> InterpreterError {
        let (stdout, stderr) = error.take_output();
        let routed = self.apply(ExecResult::new(stdout, stderr, 0));
        error.with_output(&routed.stdout, &routed.stderr)
    }
}

fn route(target: &StreamTarget, text: String, result: &mut ExecResult) {
    if text.is_empty() {
        return;
    }
    match target {
        StreamTarget::Stdout => result.stdout.push_str(&text),
        StreamTarget::Stderr => result.stderr.push_str(&text),
        StreamTarget::Null => {}
        StreamTarget::File(path) => {
            let written = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(text.as_bytes()));
            if let Err(e) = written {
                warn!(path = %path.display(), error = %e, "redirection write failed");
                result.stderr.push_str(PATH_NOT_FOUND);
            }
        }
    }
}

/// Open the files named by `redirections` and compute the stream routing.
///
/// On failure the returned result carries the diagnostic; the command must
/// not run.
pub fn prepare_redirections(
    redirections: &[RedirectionNode],
    state: &InterpreterState,
) -> Result<RedirectPlan, ExecResult> {
    let mut plan = RedirectPlan::default();

    for redirection in redirections {
        match (&redirection.op, &redirection.target) {
            (RedirectionOp::Input, RedirectionTarget::File(name)) => {
                let name = substitute_loop_vars(name, &state.loop_stack, &state.cwd);
                if is_null_device(&name) {
                    plan.stdin = Some(String::new());
                    continue;
                }
                let path = resolve_path(&state.cwd, &name);
                match std::fs::read(&path) {
                    Ok(bytes) => plan.stdin = Some(String::from_utf8_lossy(&bytes).into_owned()),
                    Err(_) => return Err(ExecResult::failure(FILE_NOT_FOUND)),
                }
            }
            (RedirectionOp::Input, RedirectionTarget::Fd(_)) => {}
            (op, RedirectionTarget::File(name)) => {
                let name = substitute_loop_vars(name, &state.loop_stack, &state.cwd);
                let target = if is_null_device(&name) {
                    StreamTarget::Null
                } else {
                    let path = resolve_path(&state.cwd, &name);
                    let mut options = OpenOptions::new();
                    options.create(true);
                    if *op == RedirectionOp::Append {
                        options.append(true);
                    } else {
                        options.write(true).truncate(true);
                    }
                    if options.open(&path).is_err() {
                        return Err(ExecResult::failure(PATH_NOT_FOUND));
                    }
                    StreamTarget::File(path)
                };
                set_stream(&mut plan, redirection.fd, target);
            }
            (_, RedirectionTarget::Fd(source)) => {
                let target = match *source {
                    1 => plan.stdout.clone(),
                    2 => plan.stderr.clone(),
                    _ => continue,
                };
                set_stream(&mut plan, redirection.fd, target);
            }
        }
    }

    Ok(plan)
}

fn set_stream(plan: &mut RedirectPlan, fd: u8, target: StreamTarget) {
    match fd {
        1 => plan.stdout = target,
        2 => plan.stderr = target,
        // Handles 3-9 are accepted and ignored
        _ => {}
    }
}
