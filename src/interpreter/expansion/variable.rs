//! Variable Access
//!
//! Handles variable value retrieval, including:
//! - Regular variables (case-insensitive)
//! - Dynamic variables (`%CD%`, `%ERRORLEVEL%`, `%DATE%`, `%TIME%`,
//!   `%RANDOM%`, `%CMDEXTVERSION%`) when no variable of that name is set
//! - Substring `%NAME:~start,length%` and replacement `%NAME:old=new%`

use chrono::{Local, Timelike};
use lazy_static::lazy_static;
use rand::Rng;
use regex_lite::Regex;

use crate::interpreter::types::InterpreterState;

lazy_static! {
    static ref SUBSTRING_RE: Regex = Regex::new(r"^~\s*(-?\d+)\s*(?:,\s*(-?\d+)\s*)?$").unwrap();
}

/// Value of `name`, falling back to the dynamic variables.
pub fn lookup_variable(state: &InterpreterState, name: &str) -> Option<String> {
    if let Some(value) = state.env.get(name) {
        return Some(value.to_string());
    }
    dynamic_variable(state, name)
}

/// Values computed on every read. A set variable of the same name wins.
pub fn dynamic_variable(state: &InterpreterState, name: &str) -> Option<String> {
    match name.to_ascii_uppercase().as_str() {
        "CD" => Some(state.cwd.display().to_string()),
        "ERRORLEVEL" => Some(state.last_exit_code.to_string()),
        "DATE" => Some(Local::now().format("%a %m/%d/%Y").to_string()),
        "TIME" => {
            let now = Local::now();
            Some(format!(
                "{:>2}:{:02}:{:02}.{:02}",
                now.hour(),
                now.minute(),
                now.second(),
                now.nanosecond() % 1_000_000_000 / 10_000_000
            ))
        }
        "RANDOM" => Some(rand::thread_rng().gen_range(0..=32767).to_string()),
        "CMDEXTVERSION" => Some("2".to_string()),
        _ => None,
    }
}

/// Expand the text between a pair of percent signs.
///
/// Returns `None` when the variable is undefined or the edit form is invalid.
pub fn expand_reference(state: &InterpreterState, body: &str) -> Option<String> {
    let Some((name, edit)) = body.split_once(':') else {
        return lookup_variable(state, body);
    };
    if name.is_empty() {
        return None;
    }
    let value = lookup_variable(state, name)?;

    if let Some(caps) = SUBSTRING_RE.captures(edit) {
        let start: i64 = caps.get(1)?.as_str().parse().ok()?;
        let length: Option<i64> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return Some(substring(&value, start, length));
    }

    let (old, new) = edit.split_once('=')?;
    Some(replace(&value, old, new))
}

/// `:~start,length`. Negative `start` counts from the end; negative
/// `length` stops that many characters before the end.
pub fn substring(value: &str, start: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let begin = if start < 0 { (len + start).max(0) } else { start.min(len) };
    let end = match length {
        None => len,
        Some(l) if l < 0 => (len + l).max(0),
        Some(l) => (begin + l).min(len),
    };
    if end <= begin {
        return String::new();
    }
    chars[begin as usize..end as usize].iter().collect()
}

/// `:old=new`, case-insensitive. `*old` replaces everything up to and
/// including the first match.
pub fn replace(value: &str, old: &str, new: &str) -> String {
    if let Some(needle) = old.strip_prefix('*') {
        if needle.is_empty() {
            return value.to_string();
        }
        return match find_ignore_case(value, needle, 0) {
            Some(idx) => format!("{}{}", new, &value[idx + needle.len()..]),
            None => value.to_string(),
        };
    }
    if old.is_empty() {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    while let Some(idx) = find_ignore_case(value, old, pos) {
        out.push_str(&value[pos..idx]);
        out.push_str(new);
        pos = idx + old.len();
    }
    out.push_str(&value[pos..]);
    out
}

fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - pat.len()).find(|&i| {
        haystack.is_char_boundary(i) && hay[i..i + pat.len()].eq_ignore_ascii_case(pat)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use std::path::PathBuf;

    fn make_state() -> InterpreterState {
        let env = Environment::from_vars([("GREETING", "Hello World"), ("EMPTY", "")]);
        InterpreterState::new(env, PathBuf::from("/work"))
    }

    #[test]
    fn test_plain_and_dynamic_lookup() {
        let mut state = make_state();
        state.last_exit_code = 3;
        assert_eq!(lookup_variable(&state, "greeting").as_deref(), Some("Hello World"));
        assert_eq!(lookup_variable(&state, "ERRORLEVEL").as_deref(), Some("3"));
        assert_eq!(lookup_variable(&state, "cd").as_deref(), Some("/work"));
        assert_eq!(lookup_variable(&state, "CMDEXTVERSION").as_deref(), Some("2"));
        assert_eq!(lookup_variable(&state, "NOPE"), None);
    }

    #[test]
    fn test_set_variable_shadows_dynamic() {
        let mut state = make_state();
        state.env.set("ERRORLEVEL", "custom");
        assert_eq!(lookup_variable(&state, "errorlevel").as_deref(), Some("custom"));
    }

    #[test]
    fn test_random_range() {
        let state = make_state();
        let n: i32 = lookup_variable(&state, "RANDOM").unwrap().parse().unwrap();
        assert!((0..=32767).contains(&n));
    }

    #[test]
    fn test_substring_forms() {
        let state = make_state();
        assert_eq!(expand_reference(&state, "GREETING:~0,5").as_deref(), Some("Hello"));
        assert_eq!(expand_reference(&state, "GREETING:~6").as_deref(), Some("World"));
        assert_eq!(expand_reference(&state, "GREETING:~-5").as_deref(), Some("World"));
        assert_eq!(expand_reference(&state, "GREETING:~0,-6").as_deref(), Some("Hello"));
        assert_eq!(expand_reference(&state, "GREETING:~50").as_deref(), Some(""));
    }

    #[test]
    fn test_replacement_forms() {
        let state = make_state();
        assert_eq!(
            expand_reference(&state, "GREETING:o=0").as_deref(),
            Some("Hell0 W0rld")
        );
        assert_eq!(
            expand_reference(&state, "GREETING:WORLD=There").as_deref(),
            Some("Hello There")
        );
        assert_eq!(expand_reference(&state, "GREETING:*o =").as_deref(), Some("World"));
        assert_eq!(expand_reference(&state, "GREETING: =").as_deref(), Some("HelloWorld"));
    }

    #[test]
    fn test_undefined_reference() {
        let state = make_state();
        assert_eq!(expand_reference(&state, "MISSING:~0,1"), None);
        assert_eq!(expand_reference(&state, "GREETING:bogus"), None);
        assert_eq!(expand_reference(&state, "EMPTY").as_deref(), Some(""));
    }
}
