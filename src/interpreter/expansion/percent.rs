//! Percent Expansion
//!
//! Runs once over a whole logical line before it is parsed, so a variable
//! that changes inside a block is seen with its value from before the block.
//!
//! Batch mode:
//! - `%%` becomes `%` (so `%%i` reaches the parser as the loop variable `%i`)
//! - `%0`..`%9`, `%*` and `%~mods0`..`%~mods9` are the frame parameters
//! - an undefined `%NAME%` becomes empty; a lone `%` is dropped
//!
//! Interactive mode keeps undefined references and lone `%` literally.
//!
//! Values are inserted as text: a quote or `&` inside a value does not
//! change how the surrounding line was split into tokens.

use crate::interpreter::expansion::modifiers::{apply_modifiers, scan_modifiers};
use crate::interpreter::expansion::variable::expand_reference;
use crate::interpreter::types::{ExecutionMode, InterpreterState};
use crate::parser::lexer::{Token, TokenKind};

/// Expand percent references in one piece of text.
pub fn expand_percent(text: &str, state: &InterpreterState) -> String {
    if !text.contains('%') {
        return text.to_string();
    }

    let batch = state.mode() == ExecutionMode::Batch;
    let params = state.current_frame().map(|frame| &frame.params);
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        if batch {
            match chars.get(i + 1) {
                Some('%') => {
                    out.push('%');
                    i += 2;
                    continue;
                }
                Some(d) if d.is_ascii_digit() => {
                    let index = d.to_digit(10).unwrap_or(0) as usize;
                    out.push_str(params.map_or("", |p| p.get(index)));
                    i += 2;
                    continue;
                }
                Some('*') => {
                    out.push_str(params.map_or("", |p| p.all()));
                    i += 2;
                    continue;
                }
                Some('~') => {
                    let (mods, end) = scan_modifiers(&chars, i + 2);
                    if let Some(d) = chars.get(end).filter(|c| c.is_ascii_digit()) {
                        let index = d.to_digit(10).unwrap_or(0) as usize;
                        let value = params.map_or("", |p| p.get(index));
                        out.push_str(&apply_modifiers(value, &mods, &state.cwd));
                        i = end + 1;
                        continue;
                    }
                }
                _ => {}
            }
        }

        // %NAME% or %NAME:edit%
        let close = chars[i + 1..]
            .iter()
            .position(|&c| c == '%' || c == '\n')
            .map(|offset| i + 1 + offset)
            .filter(|&idx| chars[idx] == '%' && idx > i + 1);
        if let Some(close) = close {
            let body: String = chars[i + 1..close].iter().collect();
            if let Some(value) = expand_reference(state, &body) {
                out.push_str(&value);
                i = close + 1;
                continue;
            }
            if batch {
                i = close + 1;
                continue;
            }
        }

        if !batch {
            out.push('%');
        }
        i += 1;
    }

    out
}

/// Expand every word token of a line. Operators and redirections pass through.
pub fn expand_tokens(tokens: Vec<Token>, state: &InterpreterState) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|tok| match tok.kind {
            TokenKind::Word | TokenKind::String => Token {
                text: expand_percent(&tok.text, state),
                ..tok
            },
            _ => tok,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use crate::interpreter::types::{CallFrame, PositionalParams};
    use crate::parser::script::Program;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn interactive_state() -> InterpreterState {
        let env = Environment::from_vars([("NAME", "World"), ("Q", "\"quoted & odd")]);
        InterpreterState::new(env, PathBuf::from("/work"))
    }

    fn batch_state(args: &[&str]) -> InterpreterState {
        let mut state = interactive_state();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        state.call_stack.push(CallFrame {
            program: Arc::new(Program::load("t.bat", "")),
            pc: 0,
            params: PositionalParams::new("t.bat", &args),
            saved_echo: true,
            scope_marker: 0,
        });
        state
    }

    #[test]
    fn test_interactive_expansion() {
        let state = interactive_state();
        assert_eq!(expand_percent("Hello %NAME%!", &state), "Hello World!");
        assert_eq!(expand_percent("%name%", &state), "World");
        assert_eq!(expand_percent("%UNDEFINED%", &state), "%UNDEFINED%");
        assert_eq!(expand_percent("100%", &state), "100%");
        assert_eq!(expand_percent("%%i", &state), "%%i");
    }

    #[test]
    fn test_interactive_keeps_loop_variable() {
        let state = interactive_state();
        assert_eq!(expand_percent("%i %NAME%", &state), "%i World");
    }

    #[test]
    fn test_batch_expansion() {
        let state = batch_state(&["first", "\"two words\""]);
        assert_eq!(expand_percent("%0 %1 %2 %3", &state), "t.bat first \"two words\" ");
        assert_eq!(expand_percent("%*", &state), "first \"two words\"");
        assert_eq!(expand_percent("%~2", &state), "two words");
        assert_eq!(expand_percent("%%i", &state), "%i");
        assert_eq!(expand_percent("%UNDEFINED%x", &state), "x");
        assert_eq!(expand_percent("50% off", &state), "50 off");
    }

    #[test]
    fn test_batch_modifiers_on_params() {
        let state = batch_state(&["dir/report.txt"]);
        assert_eq!(expand_percent("%~nx1", &state), "report.txt");
        assert_eq!(expand_percent("%~n0", &state), "t");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let state = interactive_state();
        let tokens = crate::parser::lexer::tokenize("ECHO %Q%");
        let expanded = expand_tokens(tokens, &state);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[1].text, "\"quoted & odd");
    }
}
