//! Loop Variable Substitution
//!
//! `%i` and `%~nxi` inside a `FOR` body are replaced at execution time, once
//! per iteration, from the innermost loop that binds the letter. Loop
//! variables are case-sensitive single characters.

use std::path::Path;

use crate::interpreter::expansion::modifiers::{apply_modifiers, scan_modifiers};
use crate::interpreter::types::LoopState;

fn lookup(loops: &[LoopState], c: char) -> Option<&str> {
    loops.iter().rev().find_map(|state| state.lookup(c))
}

/// Replace references to active loop variables in `text`.
pub fn substitute_loop_vars(text: &str, loops: &[LoopState], cwd: &Path) -> String {
    if loops.is_empty() || !text.contains('%') {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some('~') => {
                let (mut mods, end) = scan_modifiers(&chars, i + 2);
                let mut var_at = end;
                // %~nx where x is the loop variable itself
                if chars.get(end).and_then(|&c| lookup(loops, c)).is_none() && !mods.is_empty() {
                    mods.pop();
                    var_at = end - 1;
                }
                if let Some(value) = chars.get(var_at).and_then(|&c| lookup(loops, c)) {
                    out.push_str(&apply_modifiers(value, &mods, cwd));
                    i = var_at + 1;
                    continue;
                }
            }
            Some(&c) => {
                if let Some(value) = lookup(loops, c) {
                    out.push_str(value);
                    i += 2;
                    continue;
                }
            }
            None => {}
        }

        out.push('%');
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_with(bindings: &[(char, &str)]) -> LoopState {
        let mut state = LoopState::new(bindings[0].0);
        state.bindings = bindings.iter().map(|(c, v)| (*c, v.to_string())).collect();
        state
    }

    #[test]
    fn test_basic_substitution() {
        let loops = vec![loop_with(&[('i', "apple")])];
        assert_eq!(substitute_loop_vars("ECHO %i!", &loops, Path::new("/")), "ECHO apple!");
    }

    #[test]
    fn test_case_sensitive() {
        let loops = vec![loop_with(&[('i', "x")])];
        assert_eq!(substitute_loop_vars("%I %i", &loops, Path::new("/")), "%I x");
    }

    #[test]
    fn test_innermost_loop_wins() {
        let loops = vec![loop_with(&[('a', "outer")]), loop_with(&[('a', "inner"), ('b', "two")])];
        assert_eq!(substitute_loop_vars("%a %b", &loops, Path::new("/")), "inner two");
    }

    #[test]
    fn test_modifiers() {
        let loops = vec![loop_with(&[('f', "\"dir/name.txt\"")])];
        let cwd = Path::new("/w");
        assert_eq!(substitute_loop_vars("%~f", &loops, cwd), "dir/name.txt");
        assert_eq!(substitute_loop_vars("%~nf", &loops, cwd), "name");
        assert_eq!(substitute_loop_vars("%~nxf", &loops, cwd), "name.txt");
    }

    #[test]
    fn test_variable_that_is_a_modifier_letter() {
        let loops = vec![loop_with(&[('x', "a/b.c")])];
        assert_eq!(substitute_loop_vars("%~nx", &loops, Path::new("/")), "b");
    }

    #[test]
    fn test_unbound_percent_is_kept() {
        let loops = vec![loop_with(&[('i', "v")])];
        assert_eq!(substitute_loop_vars("50% %z", &loops, Path::new("/")), "50% %z");
    }
}
