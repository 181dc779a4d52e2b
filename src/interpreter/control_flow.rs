//! Control Flow Execution
//!
//! Handles control flow constructs:
//! - `IF` with an optional `ELSE` branch
//! - `FOR` over items and file wildcards
//! - `FOR /D` over directories, `FOR /R` over a directory tree
//! - `FOR /L` over a numeric range
//! - `FOR /F` over the lines of files, strings and command output
//!
//! The loop variable is bound on the loop stack and substituted into the
//! body per iteration; the body itself was percent-expanded once with the
//! rest of the line.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::ast::types::{ForKind, ForNode, IfNode};
use crate::interpreter::arithmetic::parse_number;
use crate::interpreter::conditionals::evaluate_condition;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::{expand_wildcard, has_wildcards, substitute_loop_vars, EntryKind};
use crate::interpreter::helpers::{dequote, resolve_path};
use crate::interpreter::types::{ExecResult, ExecutionPhase, InterpreterState, LoopState};
use crate::parser::compound_parser::split_set_items;

// =============================================================================
// IF
// =============================================================================

/// Execute an `IF` command. A false condition without `ELSE` leaves the exit
/// status unchanged.
pub fn execute_if(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    node: &IfNode,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let previous = state.enter_phase(ExecutionPhase::Branching);
    let taken = evaluate_condition(state, &node.condition);
    state.restore_phase(previous);

    if taken {
        engine.execute_sequence(state, &node.then_branch, stdin)
    } else if let Some(else_branch) = &node.else_branch {
        engine.execute_sequence(state, else_branch, stdin)
    } else {
        Ok(ExecResult::new(String::new(), String::new(), state.last_exit_code))
    }
}

// =============================================================================
// FOR
// =============================================================================

/// Values bound per iteration; `FOR /F` binds one per requested token.
type Iterations = Box<dyn Iterator<Item = Vec<String>>>;

/// Execute a `FOR` command.
pub fn execute_for(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    node: &ForNode,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let previous = state.enter_phase(ExecutionPhase::Branching);
    let produced = produce_iterations(engine, state, node);
    state.restore_phase(previous);

    let (iterations, mut result) = match produced {
        Ok(produced) => produced,
        Err(failed) => return Ok(failed),
    };
    result.exit_code = state.last_exit_code;

    let previous = state.enter_phase(ExecutionPhase::Iterating);
    state.loop_stack.push(LoopState::new(node.variable));
    let outcome = run_iterations(engine, state, node, iterations, result, stdin);
    state.loop_stack.pop();
    state.restore_phase(previous);
    outcome
}

fn run_iterations(
    engine: &ExecutionEngine<'_>,
    state: &mut InterpreterState,
    node: &ForNode,
    iterations: Iterations,
    mut result: ExecResult,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    for (count, values) in iterations.enumerate() {
        let iteration = count as u64 + 1;
        if iteration > engine.limits.max_iterations {
            warn!(limit = engine.limits.max_iterations, "FOR iteration limit reached");
            result.stderr.push_str(&format!(
                "FOR: too many iterations (limit {})\n",
                engine.limits.max_iterations
            ));
            result.exit_code = 1;
            break;
        }

        if let Some(current) = state.loop_stack.last_mut() {
            current.bindings = bind_values(node.variable, values);
            current.iteration = iteration;
            trace!(variable = %node.variable, bindings = ?current.bindings, "for iteration");
        }

        match engine.execute_sequence(state, &node.body, stdin) {
            Ok(body) => result.append(body),
            Err(e) => return Err(e.with_output(&result.stdout, &result.stderr)),
        }
    }
    Ok(result)
}

/// Bind values to consecutive letters starting at `variable`.
fn bind_values(variable: char, values: Vec<String>) -> Vec<(char, String)> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(offset, value)| {
            char::from_u32(variable as u32 + offset as u32).map(|letter| (letter, value))
        })
        .collect()
}

fn single_values(items: Vec<String>) -> Iterations {
    Box::new(items.into_iter().map(|item| vec![item]))
}

/// Produce the iteration values for `node`, plus any diagnostics gathered on
/// the way. A failed source aborts the loop with the returned result.
fn produce_iterations(
    engine: &ExecutionEngine<'_>,
    state: &InterpreterState,
    node: &ForNode,
) -> Result<(Iterations, ExecResult), ExecResult> {
    let raw_set = substitute_loop_vars(&node.raw_set, &state.loop_stack, &state.cwd);
    let items = split_set_items(&raw_set);
    debug!(kind = ?node.kind, items = ?items, "for set");

    let iterations = match &node.kind {
        ForKind::Items => single_values(expand_items(&items, &state.cwd, EntryKind::Files)),
        ForKind::Directories => single_values(expand_items(&items, &state.cwd, EntryKind::Directories)),
        ForKind::Recursive { root } => {
            let root = match root {
                Some(root) => {
                    let root = substitute_loop_vars(root, &state.loop_stack, &state.cwd);
                    resolve_path(&state.cwd, &root)
                }
                None => state.cwd.clone(),
            };
            single_values(recursive_items(&root, &items))
        }
        ForKind::Range => {
            let number = |idx: usize| {
                items
                    .get(idx)
                    .and_then(|item| parse_number(item).ok())
                    .map(i64::from)
                    .unwrap_or(0)
            };
            Box::new(NumericRange::new(number(0), number(1), number(2)).map(|n| vec![n.to_string()]))
        }
        ForKind::Lines { options } => {
            let options = match parse_line_options(options) {
                Ok(options) => options,
                Err(message) => return Err(ExecResult::failure(message)),
            };
            return line_iterations(engine, state, raw_set.trim(), &options);
        }
    };
    Ok((iterations, ExecResult::ok()))
}

/// Plain and `/D` sets: wildcard items expand to matching entries, other
/// items are used as written.
fn expand_items(items: &[String], cwd: &Path, kind: EntryKind) -> Vec<String> {
    let mut values = Vec::new();
    for item in items {
        if has_wildcards(item) {
            values.extend(expand_wildcard(item, cwd, kind));
        } else {
            values.push(item.clone());
        }
    }
    values
}

/// `FOR /R`: apply the set in `root` and every directory below it.
fn recursive_items(root: &Path, items: &[String]) -> Vec<String> {
    let mut values = Vec::new();
    for dir in walk_directories(root) {
        for item in items {
            if has_wildcards(item) {
                values.extend(
                    expand_wildcard(item, &dir, EntryKind::Files)
                        .into_iter()
                        .map(|name| dir.join(name).display().to_string()),
                );
            } else {
                values.push(dir.join(dequote(item)).display().to_string());
            }
        }
    }
    values
}

/// `root` followed by its subdirectories, depth first, sorted by name.
fn walk_directories(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if !root.is_dir() {
        return dirs;
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut children: Vec<PathBuf> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory");
                Vec::new()
            }
        };
        children.sort();
        dirs.push(dir);
        stack.extend(children.into_iter().rev());
    }
    dirs
}

/// `FOR /L (start,step,end)`, produced lazily.
#[derive(Debug, Clone)]
pub struct NumericRange {
    next: Option<i64>,
    step: i64,
    end: i64,
}

impl NumericRange {
    pub fn new(start: i64, step: i64, end: i64) -> Self {
        Self {
            next: Some(start),
            step,
            end,
        }
    }
}

impl Iterator for NumericRange {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let value = self.next?;
        let past_end = if self.step >= 0 { value > self.end } else { value < self.end };
        if past_end {
            self.next = None;
            return None;
        }
        self.next = value.checked_add(self.step);
        Some(value)
    }
}

// =============================================================================
// FOR /F
// =============================================================================

/// Which tokens of a line `FOR /F` binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    /// 1-based token numbers, ascending
    pub indices: Vec<usize>,
    /// `*`: one more variable receives the rest of the line
    pub rest: bool,
}

/// Parsed `FOR /F` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOptions {
    pub eol: Option<char>,
    pub skip: usize,
    pub delims: Vec<char>,
    pub tokens: TokenSpec,
    pub usebackq: bool,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            eol: Some(';'),
            skip: 0,
            delims: vec![' ', '\t'],
            tokens: TokenSpec {
                indices: vec![1],
                rest: false,
            },
            usebackq: false,
        }
    }
}

const OPTION_KEYWORDS: [&str; 5] = ["eol=", "skip=", "delims=", "tokens=", "usebackq"];

fn unexpected(text: &str) -> String {
    format!("{} was unexpected at this time.\n", text)
}

/// Parse a `FOR /F` option string such as `tokens=1,2* delims=,`.
///
/// `delims=` runs up to the next keyword, so a space right after the `=`
/// is itself a delimiter.
pub fn parse_line_options(text: &str) -> Result<LineOptions, String> {
    let mut options = LineOptions::default();
    let lower = text.to_ascii_lowercase();
    let mut i = 0;

    while i < text.len() {
        let rest = &lower[i..];
        if let Some(c) = text[i..].chars().next().filter(|c| c.is_whitespace()) {
            i += c.len_utf8();
        } else if rest.starts_with("usebackq") {
            options.usebackq = true;
            i += "usebackq".len();
        } else if rest.starts_with("eol=") {
            i += "eol=".len();
            options.eol = text[i..].chars().next();
            i += options.eol.map_or(0, char::len_utf8);
        } else if rest.starts_with("skip=") {
            i += "skip=".len();
            let digits = text[i..].chars().take_while(char::is_ascii_digit).count();
            options.skip = text[i..i + digits].parse().map_err(|_| unexpected(&text[i..]))?;
            i += digits;
        } else if rest.starts_with("tokens=") {
            i += "tokens=".len();
            let end = text[i..].find(char::is_whitespace).map_or(text.len(), |n| i + n);
            options.tokens = parse_token_spec(&text[i..end]).ok_or_else(|| unexpected(&text[i..end]))?;
            i = end;
        } else if rest.starts_with("delims=") {
            i += "delims=".len();
            let end = delims_end(&lower, i);
            let mut delims = &text[i..end];
            if let Some(c) = delims.chars().last().filter(|c| c.is_whitespace()) {
                if delims.len() > c.len_utf8() {
                    delims = &delims[..delims.len() - c.len_utf8()];
                }
            }
            options.delims = delims.chars().collect();
            i = end;
        } else {
            return Err(unexpected(&text[i..]));
        }
    }
    Ok(options)
}

/// End of a `delims=` value starting at `start`: the next keyword that
/// follows whitespace, or the end of the text.
fn delims_end(lower: &str, start: usize) -> usize {
    lower[start..]
        .char_indices()
        .skip(1)
        .find(|&(offset, _)| {
            let at = start + offset;
            let after_space = lower[..at].ends_with(char::is_whitespace);
            after_space && OPTION_KEYWORDS.iter().any(|kw| lower[at..].starts_with(kw))
        })
        .map_or(lower.len(), |(offset, _)| start + offset)
}

/// `1,3`, `1-3`, `2*` or `*`.
fn parse_token_spec(spec: &str) -> Option<TokenSpec> {
    let mut indices = Vec::new();
    let mut rest = false;
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let part = match part.strip_suffix('*') {
            Some(before) => {
                rest = true;
                before
            }
            None => part,
        };
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (from.parse::<usize>().ok()?, to.parse::<usize>().ok()?);
                indices.extend(from..=to);
            }
            None => indices.push(part.parse().ok()?),
        }
    }
    indices.sort_unstable();
    indices.dedup();
    if indices.iter().any(|&n| n == 0 || n > 31) || (indices.is_empty() && !rest) {
        return None;
    }
    Some(TokenSpec { indices, rest })
}

/// Split one line into the values `options` asks for. `None` skips the line.
pub fn split_line(line: &str, options: &LineOptions) -> Option<Vec<String>> {
    let mut spans = Vec::new();
    let mut start = None;
    for (idx, c) in line.char_indices() {
        let is_delim = options.delims.contains(&c);
        match (start, is_delim) {
            (None, false) => start = Some(idx),
            (Some(s), true) => {
                spans.push((s, idx));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }

    let &(first_start, _) = spans.first()?;
    if options.eol.is_some_and(|eol| line[first_start..].starts_with(eol)) {
        return None;
    }

    let token = |n: usize| spans.get(n - 1).map_or(String::new(), |&(s, e)| line[s..e].to_string());
    let mut values: Vec<String> = options.tokens.indices.iter().map(|&n| token(n)).collect();
    if options.tokens.rest {
        let after = options.tokens.indices.last().copied().unwrap_or(0);
        values.push(spans.get(after).map_or(String::new(), |&(s, _)| line[s..].to_string()));
    }
    Some(values)
}

fn strip_quotes(set: &str, quote: char) -> Option<&str> {
    let inner = set.strip_prefix(quote)?.strip_suffix(quote)?;
    Some(inner)
}

/// Collect the lines of a `FOR /F` set and split them.
fn line_iterations(
    engine: &ExecutionEngine<'_>,
    state: &InterpreterState,
    set: &str,
    options: &LineOptions,
) -> Result<(Iterations, ExecResult), ExecResult> {
    let (command_quote, string_quote) = if options.usebackq { ('`', '\'') } else { ('\'', '"') };
    let mut diagnostics = ExecResult::ok();

    let sources: Vec<String> = if let Some(command) = strip_quotes(set, command_quote) {
        debug!(command, "for /f command");
        let mut child = state.child_context();
        match engine.execute_line(&mut child, command, "") {
            Ok(output) => {
                diagnostics.stderr.push_str(&output.stderr);
                vec![output.stdout]
            }
            Err(mut e) => {
                let (stdout, stderr) = e.take_output();
                diagnostics.stderr.push_str(&stderr);
                vec![stdout]
            }
        }
    } else if let Some(text) = strip_quotes(set, string_quote) {
        vec![text.to_string()]
    } else {
        let mut contents = Vec::new();
        for name in split_set_items(set) {
            let path = resolve_path(&state.cwd, &name);
            match std::fs::read(&path) {
                Ok(bytes) => contents.push(String::from_utf8_lossy(&bytes).into_owned()),
                Err(_) => {
                    return Err(ExecResult::failure(format!(
                        "The system cannot find the file {}.\n",
                        dequote(&name)
                    )))
                }
            }
        }
        contents
    };

    let mut values = Vec::new();
    for source in &sources {
        let lines = source
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .skip(options.skip);
        values.extend(lines.filter_map(|line| split_line(line, options)));
    }
    Ok((Box::new(values.into_iter()), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use crate::interpreter::process::{InterruptFlag, ProcessRequest, ProcessRunner};
    use crate::interpreter::types::ExecutionLimits;
    use std::io::{self, Read, Write};

    struct NoProcesses;

    impl ProcessRunner for NoProcesses {
        fn run(
            &self,
            _request: &ProcessRequest<'_>,
            _stdin: &mut (dyn Read + Send),
            _stdout: &mut dyn Write,
            _stderr: &mut dyn Write,
            _interrupt: &InterruptFlag,
        ) -> io::Result<i32> {
            Ok(0)
        }
    }

    fn run_in(state: &mut InterpreterState, line: &str, limits: &ExecutionLimits) -> ExecResult {
        let interrupt = InterruptFlag::new();
        let engine = ExecutionEngine::new(limits, &NoProcesses, &interrupt);
        engine.execute_line(state, line, "").unwrap()
    }

    fn run(state: &mut InterpreterState, line: &str) -> ExecResult {
        run_in(state, line, &ExecutionLimits::default())
    }

    fn state_in(dir: &Path) -> InterpreterState {
        InterpreterState::new(Environment::from_vars([("X", "1")]), dir.to_path_buf())
    }

    #[test]
    fn test_if_else() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(run(&mut state, "if %X%==1 (echo yes) else (echo no)").stdout, "yes\n");
        assert_eq!(run(&mut state, "if not %X%==1 (echo yes) else (echo no)").stdout, "no\n");
        assert_eq!(run(&mut state, "if /i abc==ABC echo same").stdout, "same\n");
    }

    #[test]
    fn test_false_if_keeps_exit_code() {
        let mut state = state_in(Path::new("/"));
        state.last_exit_code = 3;
        let result = run(&mut state, "if 1==2 echo never");
        assert_eq!(result.exit_code, 3);
        assert_eq!(state.last_exit_code, 3);
    }

    #[test]
    fn test_for_items() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(run(&mut state, "for %i in (a b c) do echo %i").stdout, "a\nb\nc\n");
        assert!(state.loop_stack.is_empty());
    }

    #[test]
    fn test_for_wildcards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("c.log"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut state = state_in(dir.path());

        assert_eq!(run(&mut state, "for %f in (*.txt) do echo %f").stdout, "a.txt\nb.txt\n");
        assert_eq!(run(&mut state, "for /d %d in (*) do echo %d").stdout, "sub\n");
    }

    #[test]
    fn test_for_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("one/two")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "").unwrap();
        std::fs::write(dir.path().join("one/two/deep.txt"), "").unwrap();
        let mut state = state_in(dir.path());

        let result = run(&mut state, "for /r %f in (*.txt) do echo %~nxf");
        assert_eq!(result.stdout, "top.txt\ndeep.txt\n");
    }

    #[test]
    fn test_for_range() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(run(&mut state, "for /l %n in (1,2,7) do echo %n").stdout, "1\n3\n5\n7\n");
        assert_eq!(run(&mut state, "for /l %n in (3,-1,1) do echo %n").stdout, "3\n2\n1\n");
        assert_eq!(run(&mut state, "for /l %n in (5,1,1) do echo %n").stdout, "");
    }

    #[test]
    fn test_iteration_limit_aborts_loop() {
        let mut state = state_in(Path::new("/"));
        let limits = ExecutionLimits {
            max_iterations: 3,
            ..ExecutionLimits::default()
        };
        let result = run_in(&mut state, "for /l %n in (1,0,2) do echo %n", &limits);
        assert_eq!(result.stdout, "1\n1\n1\n");
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("too many iterations"));
    }

    #[test]
    fn test_for_f_string_and_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "name,age\r\n# comment\nann,31\n\nbob\n").unwrap();
        let mut state = state_in(dir.path());

        let result = run(&mut state, "for /f \"tokens=1,2 delims=,\" %a in (\"x,y\") do echo %a-%b");
        assert_eq!(result.stdout, "x-y\n");

        let result = run(
            &mut state,
            "for /f \"eol=# skip=1 tokens=1,2 delims=,\" %a in (data.csv) do echo [%a][%b]",
        );
        assert_eq!(result.stdout, "[ann][31]\n[bob][]\n");
    }

    #[test]
    fn test_for_f_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        let result = run(&mut state, "for /f %a in (nope.txt) do echo %a");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "The system cannot find the file nope.txt.\n");
    }

    #[test]
    fn test_for_f_command() {
        let mut state = state_in(Path::new("/"));
        let result = run(&mut state, "for /f \"tokens=*\" %l in ('echo first line') do echo got %l");
        assert_eq!(result.stdout, "got first line\n");
    }

    #[test]
    fn test_parse_line_options() {
        let options = parse_line_options("usebackq tokens=2* delims=;, eol=#").unwrap();
        assert!(options.usebackq);
        assert_eq!(options.tokens, TokenSpec { indices: vec![2], rest: true });
        assert_eq!(options.delims, vec![';', ',']);
        assert_eq!(options.eol, Some('#'));

        assert_eq!(parse_line_options("delims= ").unwrap().delims, vec![' ']);
        assert_eq!(parse_line_options("delims=").unwrap().delims, Vec::<char>::new());
        assert_eq!(parse_line_options("tokens=1-3").unwrap().tokens.indices, vec![1, 2, 3]);
        assert!(parse_line_options("bogus").is_err());
        assert!(parse_line_options("tokens=0").is_err());
    }

    #[test]
    fn test_split_line() {
        let options = parse_line_options("tokens=1,3* delims= ").unwrap();
        assert_eq!(
            split_line("  a b c d e", &options),
            Some(vec!["a".to_string(), "c".to_string(), "d e".to_string()])
        );
        assert_eq!(split_line("   ", &options), None);
        assert_eq!(split_line(";comment", &LineOptions::default()), None);
    }

    #[test]
    fn test_numeric_range_overflow_stops() {
        let values: Vec<i64> = NumericRange::new(i64::MAX - 1, 1, i64::MAX).collect();
        assert_eq!(values, vec![i64::MAX - 1, i64::MAX]);
    }
}
