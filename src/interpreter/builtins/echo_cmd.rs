//! echo - Display messages or toggle command echoing
//!
//! - `ECHO` prints the echo state
//! - `ECHO ON` / `ECHO OFF` switch batch line echoing
//! - `ECHO text` prints the text as written, spacing included
//! - `ECHO.` (or `ECHO(`, `ECHO:` ...) prints the rest, even when empty

use crate::interpreter::types::{ExecResult, InterpreterState};

/// Characters that end the word `ECHO` and start its message directly.
pub const ECHO_DELIMITERS: &[char] = &['.', '(', ':', ';', ',', '=', '+', '/', '[', ']', '\\'];

/// Handle the echo builtin command.
///
/// `raw` is the text after the command name, leading separator included.
pub fn handle_echo(state: &mut InterpreterState, raw: &str) -> ExecResult {
    // One separator after the name is not part of the message
    let message = match raw.chars().next() {
        Some(c) if c.is_whitespace() => &raw[c.len_utf8()..],
        _ => raw,
    };

    let word = message.trim();
    if word.is_empty() {
        let status = if state.echo_on { "on" } else { "off" };
        return ExecResult::output(format!("ECHO is {}.\n", status));
    }
    if word.eq_ignore_ascii_case("ON") {
        state.echo_on = true;
        return ExecResult::ok();
    }
    if word.eq_ignore_ascii_case("OFF") {
        state.echo_on = false;
        return ExecResult::ok();
    }

    ExecResult::output(format!("{}\n", message))
}

/// `ECHO.text`: print `text` verbatim.
pub fn handle_echo_text(text: &str) -> ExecResult {
    ExecResult::output(format!("{}\n", text))
}

/// Split `ECHO.text` style names. Returns the message part.
pub fn split_echo_prefix(name: &str) -> Option<&str> {
    let head = name.get(..4)?;
    if !head.eq_ignore_ascii_case("ECHO") {
        return None;
    }
    let rest = &name[4..];
    let first = rest.chars().next()?;
    if ECHO_DELIMITERS.contains(&first) {
        Some(&rest[first.len_utf8()..])
    } else {
        None
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
    fn test_echo_state() {
        let mut state = make_state();
        assert_eq!(handle_echo(&mut state, "").stdout, "ECHO is on.\n");
        handle_echo(&mut state, " off");
        assert!(!state.echo_on);
        assert_eq!(handle_echo(&mut state, "   ").stdout, "ECHO is off.\n");
        handle_echo(&mut state, " ON");
        assert!(state.echo_on);
    }

    #[test]
    fn test_echo_text_keeps_spacing() {
        let mut state = make_state();
        assert_eq!(handle_echo(&mut state, " hello   world ").stdout, "hello   world \n");
        assert_eq!(handle_echo(&mut state, "  indented").stdout, " indented\n");
        assert_eq!(handle_echo(&mut state, " \"quoted\" & text").stdout, "\"quoted\" & text\n");
    }

    #[test]
    fn test_echo_on_with_more_words_is_text() {
        let mut state = make_state();
        assert_eq!(handle_echo(&mut state, " on and on").stdout, "on and on\n");
        assert!(state.echo_on);
    }

    #[test]
    fn test_split_echo_prefix() {
        assert_eq!(split_echo_prefix("ECHO."), Some(""));
        assert_eq!(split_echo_prefix("echo.hello"), Some("hello"));
        assert_eq!(split_echo_prefix("Echo("), Some(""));
        assert_eq!(split_echo_prefix("ECHO"), None);
        assert_eq!(split_echo_prefix("ECHOX"), None);
        assert_eq!(split_echo_prefix("ECH"), None);
    }

    #[test]
    fn test_echo_dot_prints_blank_line() {
        assert_eq!(handle_echo_text("").stdout, "\n");
    }
}
