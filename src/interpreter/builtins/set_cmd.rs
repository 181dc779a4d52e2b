//! set - Display, set, or remove environment variables
//!
//! - `SET` lists every visible variable
//! - `SET prefix` lists variables whose names start with `prefix`
//! - `SET name=value` assigns; `SET name=` deletes
//! - `SET "name=value"` assigns; text after the closing quote is ignored
//! - `SET /A expression` evaluates arithmetic
//! - `SET /P name=prompt` reads one line of input

use tracing::trace;

use crate::interpreter::arithmetic::evaluate_arithmetic;
use crate::interpreter::types::{ExecResult, ExecutionMode, InterpreterState};

pub const SYNTAX_ERROR: &str = "The syntax of the command is incorrect.\n";

/// Split a leading `/X` switch off `text`.
fn strip_switch<'a>(text: &'a str, switch: char) -> Option<&'a str> {
    let mut chars = text.chars();
    if chars.next() != Some('/') {
        return None;
    }
    let c = chars.next()?;
    if !c.eq_ignore_ascii_case(&switch) {
        return None;
    }
    let rest = chars.as_str();
    match rest.chars().next() {
        None => Some(rest),
        Some(next) if next.is_whitespace() || next == '"' => Some(rest.trim_start()),
        Some(_) => None,
    }
}

/// Handle the set builtin command.
///
/// `raw` is the text after the command name; `stdin` feeds `SET /P`.
pub fn handle_set(state: &mut InterpreterState, raw: &str, stdin: &str) -> ExecResult {
    let text = raw.trim_start();

    if let Some(expr) = strip_switch(text, 'A') {
        return set_arithmetic(state, expr);
    }
    if let Some(rest) = strip_switch(text, 'P') {
        return set_prompt(state, rest, stdin);
    }
    if text.trim().is_empty() {
        return list_variables(state, "");
    }

    let body = unquote_assignment(text);
    let Some((name, value)) = body.split_once('=') else {
        return list_variables(state, body.trim());
    };
    if name.is_empty() {
        return ExecResult::failure(SYNTAX_ERROR);
    }

    if value.is_empty() {
        trace!(name, "unset variable");
        state.env.unset(name);
    } else {
        trace!(name, value, "set variable");
        state.env.set(name, value);
    }
    ExecResult::ok()
}

/// `"name=value" trailing` becomes `name=value`.
fn unquote_assignment(text: &str) -> &str {
    if let Some(inner) = text.strip_prefix('"') {
        if let Some(close) = inner.rfind('"') {
            return &inner[..close];
        }
        return inner;
    }
    text
}

fn list_variables(state: &InterpreterState, prefix: &str) -> ExecResult {
    let vars = state.env.with_prefix(prefix);
    if vars.is_empty() {
        return ExecResult::failure(format!("Environment variable {} not defined\n", prefix));
    }
    let listing: String = vars
        .into_iter()
        .map(|var| format!("{}={}\n", var.name, var.value))
        .collect();
    ExecResult::output(listing)
}

fn set_arithmetic(state: &mut InterpreterState, expr: &str) -> ExecResult {
    if expr.trim().is_empty() {
        return ExecResult::failure(SYNTAX_ERROR);
    }
    match evaluate_arithmetic(expr, &mut state.env) {
        // The value is shown only at the prompt, without a newline
        Ok(value) if state.mode() == ExecutionMode::Interactive => ExecResult::output(value.to_string()),
        Ok(_) => ExecResult::ok(),
        Err(e) => ExecResult::failure(format!("{}\n", e)),
    }
}

fn set_prompt(state: &mut InterpreterState, rest: &str, stdin: &str) -> ExecResult {
    let body = unquote_assignment(rest);
    let Some((name, prompt)) = body.split_once('=') else {
        return ExecResult::failure(SYNTAX_ERROR);
    };
    if name.is_empty() {
        return ExecResult::failure(SYNTAX_ERROR);
    }

    let line = stdin.lines().next().map(|l| l.trim_end_matches('\r'));
    match line {
        Some(value) if !value.is_empty() => {
            state.env.set(name, value);
            ExecResult::output(prompt)
        }
        // No input leaves the variable untouched
        _ => ExecResult::new(prompt.to_string(), String::new(), 1),
    }
}
