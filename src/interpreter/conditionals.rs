//! Conditional Evaluation
//!
//! Evaluates the condition of an `IF` command:
//! - `EXIST path` (wildcards allowed)
//! - `DEFINED name`
//! - `ERRORLEVEL n`, true when the last exit status is at least `n`
//! - `a==b`, always a string comparison including any quotes
//! - `a EQU b` and friends, numeric when both sides are integers
//!
//! `NOT` inverts the result; `/I` makes string comparisons ignore case.

use std::cmp::Ordering;

use tracing::trace;

use crate::ast::types::{CompareOp, ConditionNode, ConditionTest};
use crate::interpreter::arithmetic::parse_number;
use crate::interpreter::expansion::{expand_wildcard, has_wildcards, substitute_loop_vars, EntryKind};
use crate::interpreter::helpers::{dequote, resolve_path};
use crate::interpreter::types::InterpreterState;

/// Evaluate `condition` against the current state.
///
/// Loop variables in the operands are substituted first.
pub fn evaluate_condition(state: &InterpreterState, condition: &ConditionNode) -> bool {
    let subst = |text: &str| substitute_loop_vars(text, &state.loop_stack, &state.cwd);

    let result = match &condition.test {
        ConditionTest::Exist(path) => path_exists(state, &subst(path)),
        ConditionTest::Defined(name) => state.env.contains(&subst(name)),
        ConditionTest::ErrorLevel(level) => match parse_number(subst(level).trim()) {
            Ok(n) => state.last_exit_code >= n,
            Err(_) => false,
        },
        ConditionTest::Compare { left, op, right } => compare(
            &subst(left),
            *op,
            &subst(right),
            condition.case_insensitive,
        ),
    };

    trace!(?condition, result, "if condition");
    result != condition.negated
}

fn path_exists(state: &InterpreterState, path: &str) -> bool {
    let path = dequote(path);
    if path.is_empty() {
        return false;
    }
    if has_wildcards(&path) {
        return !expand_wildcard(&path, &state.cwd, EntryKind::Any).is_empty();
    }
    resolve_path(&state.cwd, &path).exists()
}

/// Compare two operands with `op`.
pub fn compare(left: &str, op: CompareOp, right: &str, case_insensitive: bool) -> bool {
    let ordering = match op {
        CompareOp::Equal => string_ordering(left, right, case_insensitive),
        _ => match (parse_number(left), parse_number(right)) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => string_ordering(left, right, case_insensitive),
        },
    };

    match op {
        CompareOp::Equal | CompareOp::Equ => ordering == Ordering::Equal,
        CompareOp::Neq => ordering != Ordering::Equal,
        CompareOp::Lss => ordering == Ordering::Less,
        CompareOp::Leq => ordering != Ordering::Greater,
        CompareOp::Gtr => ordering == Ordering::Greater,
        CompareOp::Geq => ordering != Ordering::Less,
    }
}

fn string_ordering(left: &str, right: &str, case_insensitive: bool) -> Ordering {
    if case_insensitive {
        left.to_lowercase().cmp(&right.to_lowercase())
    } else {
        left.cmp(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use crate::interpreter::types::LoopState;
    use std::path::PathBuf;

    fn state_in(dir: PathBuf) -> InterpreterState {
        InterpreterState::new(Environment::from_vars([("SET_ME", "1")]), dir)
    }

    fn cond(test: ConditionTest) -> ConditionNode {
        ConditionNode {
            negated: false,
            case_insensitive: false,
            test,
        }
    }

    #[test]
    fn test_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        let state = state_in(dir.path().to_path_buf());

        assert!(evaluate_condition(&state, &cond(ConditionTest::Exist("present.txt".into()))));
        assert!(evaluate_condition(&state, &cond(ConditionTest::Exist("\"present.txt\"".into()))));
        assert!(evaluate_condition(&state, &cond(ConditionTest::Exist("*.txt".into()))));
        assert!(!evaluate_condition(&state, &cond(ConditionTest::Exist("missing.txt".into()))));
        assert!(!evaluate_condition(&state, &cond(ConditionTest::Exist("*.log".into()))));
    }

    #[test]
    fn test_defined_ignores_dynamic_variables() {
        let state = state_in(PathBuf::from("/"));
        assert!(evaluate_condition(&state, &cond(ConditionTest::Defined("set_me".into()))));
        assert!(!evaluate_condition(&state, &cond(ConditionTest::Defined("ERRORLEVEL".into()))));
    }

    #[test]
    fn test_errorlevel_is_at_least() {
        let mut state = state_in(PathBuf::from("/"));
        state.last_exit_code = 2;
        assert!(evaluate_condition(&state, &cond(ConditionTest::ErrorLevel("1".into()))));
        assert!(evaluate_condition(&state, &cond(ConditionTest::ErrorLevel("2".into()))));
        assert!(!evaluate_condition(&state, &cond(ConditionTest::ErrorLevel("3".into()))));
    }

    #[test]
    fn test_not_inverts() {
        let state = state_in(PathBuf::from("/"));
        let mut node = cond(ConditionTest::Defined("NOPE".into()));
        node.negated = true;
        assert!(evaluate_condition(&state, &node));
    }

    #[test]
    fn test_string_comparison() {
        assert!(compare("abc", CompareOp::Equal, "abc", false));
        assert!(!compare("abc", CompareOp::Equal, "ABC", false));
        assert!(compare("abc", CompareOp::Equal, "ABC", true));
        assert!(!compare("\"a\"", CompareOp::Equal, "a", false));
        assert!(compare("apple", CompareOp::Lss, "banana", false));
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(compare("10", CompareOp::Gtr, "9", false));
        assert!(compare("010", CompareOp::Equ, "8", false));
        assert!(compare("5", CompareOp::Leq, "5", false));
        assert!(compare("-1", CompareOp::Lss, "0", false));
        assert!(compare("1", CompareOp::Neq, "2", false));
        // Not numbers: string ordering
        assert!(compare("10a", CompareOp::Lss, "9a", false));
    }

    #[test]
    fn test_loop_variables_are_substituted() {
        let mut state = state_in(PathBuf::from("/"));
        let mut loop_state = LoopState::new('i');
        loop_state.bindings.push(('i', "x".into()));
        state.loop_stack.push(loop_state);
        let node = cond(ConditionTest::Compare {
            left: "%i".into(),
            op: CompareOp::Equal,
            right: "x".into(),
        });
        assert!(evaluate_condition(&state, &node));
    }
}
