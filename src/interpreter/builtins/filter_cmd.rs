//! Text filters: type, more, sort, find, findstr
//!
//! Each reads the named files, or the command's stdin when none are given,
//! and writes whole lines. They are the usual right-hand side of a pipe.

use lazy_static::lazy_static;
use regex_lite::Regex;

use crate::interpreter::helpers::{dequote, resolve_path};
use crate::interpreter::redirections::FILE_NOT_FOUND;
use crate::interpreter::types::{ExecResult, InterpreterState};

use super::set_cmd::SYNTAX_ERROR;

lazy_static! {
    static ref FINDSTR_LITERAL_RE: Regex = Regex::new(r#"(?i)^/C:"?(.*?)"?$"#).unwrap();
}

fn read_file(state: &InterpreterState, name: &str) -> Option<String> {
    let path = resolve_path(&state.cwd, name);
    std::fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn split_lines(text: &str) -> Vec<&str> {
    text.lines().map(|line| line.trim_end_matches('\r')).collect()
}

fn join_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines.into_iter().map(|line| format!("{}\n", line)).collect()
}

/// Separate `/X` switches (upper-cased) from operands.
fn split_switches(args: &[String]) -> (Vec<String>, Vec<&String>) {
    let mut switches = Vec::new();
    let mut operands = Vec::new();
    for arg in args {
        if arg.starts_with('/') && arg.len() > 1 {
            switches.push(arg.to_ascii_uppercase());
        } else {
            operands.push(arg);
        }
    }
    (switches, operands)
}

/// Handle the type builtin command.
pub fn handle_type(state: &InterpreterState, args: &[String]) -> ExecResult {
    if args.is_empty() {
        return ExecResult::failure(SYNTAX_ERROR);
    }

    let mut result = ExecResult::ok();
    for name in args {
        if args.len() > 1 {
            result.stderr.push_str(&format!("\n{}\n\n\n", dequote(name)));
        }
        match read_file(state, name) {
            Some(contents) => result.stdout.push_str(&contents),
            None => {
                result.stderr.push_str(FILE_NOT_FOUND);
                result.stderr.push_str(&format!("Error occurred while processing: {}.\n", dequote(name)));
                result.exit_code = 1;
            }
        }
    }
    result
}

/// Handle the more builtin command. Output is not paged.
pub fn handle_more(state: &InterpreterState, args: &[String], stdin: &str) -> ExecResult {
    let (_, files) = split_switches(args);
    if files.is_empty() {
        return ExecResult::output(join_lines(split_lines(stdin)));
    }

    let mut result = ExecResult::ok();
    for name in files {
        match read_file(state, name) {
            Some(contents) => result.stdout.push_str(&join_lines(split_lines(&contents))),
            None => {
                result.stderr.push_str(&format!("Cannot access file {}\n", dequote(name)));
                result.exit_code = 1;
            }
        }
    }
    result
}

/// Handle the sort builtin command: case-insensitive, `/R` reverses.
pub fn handle_sort(state: &InterpreterState, args: &[String], stdin: &str) -> ExecResult {
    let (switches, files) = split_switches(args);
    let reverse = switches.iter().any(|s| s == "/R");

    let input = match files.first() {
        Some(name) => match read_file(state, name) {
            Some(contents) => contents,
            None => return ExecResult::failure(FILE_NOT_FOUND),
        },
        None => stdin.to_string(),
    };

    let mut lines = split_lines(&input);
    lines.sort_by_key(|line| line.to_lowercase());
    if reverse {
        lines.reverse();
    }
    ExecResult::output(join_lines(lines))
}

/// Handle the find builtin command.
///
/// `FIND [/V] [/C] [/N] [/I] "string" [files]`. Exit status is 1 when no
/// line matched.
pub fn handle_find(state: &InterpreterState, args: &[String], stdin: &str) -> ExecResult {
    let (switches, operands) = split_switches(args);
    let invert = switches.iter().any(|s| s == "/V");
    let count_only = switches.iter().any(|s| s == "/C");
    let numbered = switches.iter().any(|s| s == "/N");
    let ignore_case = switches.iter().any(|s| s == "/I");

    let Some((needle, files)) = operands.split_first() else {
        return ExecResult::failure_with_code("FIND: Parameter format not correct\n", 2);
    };
    if !needle.starts_with('"') {
        return ExecResult::failure_with_code("FIND: Parameter format not correct\n", 2);
    }
    let needle = dequote(needle);
    let matches = |line: &str| {
        let found = if ignore_case {
            line.to_lowercase().contains(&needle.to_lowercase())
        } else {
            line.contains(&needle)
        };
        found != invert
    };

    let mut sources: Vec<(Option<String>, String)> = Vec::new();
    let mut result = ExecResult::ok();
    if files.is_empty() {
        sources.push((None, stdin.to_string()));
    } else {
        for name in files {
            match read_file(state, name) {
                Some(contents) => sources.push((Some(dequote(name).to_uppercase()), contents)),
                None => result.stderr.push_str(&format!("File not found - {}\n", dequote(name))),
            }
        }
    }

    let mut total = 0;
    for (label, text) in &sources {
        let found: Vec<(usize, &str)> = split_lines(text)
            .into_iter()
            .enumerate()
            .filter(|(_, line)| matches(line))
            .collect();
        total += found.len();

        if count_only {
            match label {
                Some(label) => result.stdout.push_str(&format!("---------- {}: {}\n", label, found.len())),
                None => result.stdout.push_str(&format!("{}\n", found.len())),
            }
            continue;
        }
        if let Some(label) = label {
            result.stdout.push_str(&format!("\n---------- {}\n", label));
        }
        for (index, line) in found {
            if numbered {
                result.stdout.push_str(&format!("[{}]{}\n", index + 1, line));
            } else {
                result.stdout.push_str(&format!("{}\n", line));
            }
        }
    }

    result.exit_code = if total > 0 { 0 } else { 1 };
    result
}

/// Handle the findstr builtin command.
///
/// `FINDSTR [/I] [/V] [/N] [/L] [/R] [/C:"text"] strings [files]`. Each
/// space-separated string is a regular expression unless `/L` is given; a
/// line matches if any string matches.
pub fn handle_findstr(state: &InterpreterState, args: &[String], stdin: &str) -> ExecResult {
    let mut ignore_case = false;
    let mut invert = false;
    let mut numbered = false;
    let mut literal = false;
    let mut patterns: Vec<String> = Vec::new();
    let mut operands: Vec<&String> = Vec::new();

    for arg in args {
        if let Some(caps) = FINDSTR_LITERAL_RE.captures(arg) {
            patterns.push(regex_lite::escape(caps.get(1).map_or("", |m| m.as_str())));
            continue;
        }
        match arg.to_ascii_uppercase().as_str() {
            "/I" => ignore_case = true,
            "/V" => invert = true,
            "/N" => numbered = true,
            "/L" => literal = true,
            "/R" => literal = false,
            _ => operands.push(arg),
        }
    }

    let mut operands = operands.into_iter();
    if patterns.is_empty() {
        match operands.next() {
            Some(strings) => patterns.extend(
                dequote(strings)
                    .split_whitespace()
                    .map(|s| if literal { regex_lite::escape(s) } else { s.to_string() }),
            ),
            None => return ExecResult::failure_with_code("FINDSTR: Bad command line\n", 2),
        }
    }

    let flags = if ignore_case { "(?i)" } else { "" };
    let regexes: Vec<Regex> = patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("{}{}", flags, p))
                .or_else(|_| Regex::new(&format!("{}{}", flags, regex_lite::escape(p))))
        })
        .collect::<Result<_, _>>()
        .unwrap_or_default();

    let files: Vec<&String> = operands.collect();
    let mut sources: Vec<(Option<String>, String)> = Vec::new();
    let mut result = ExecResult::ok();
    if files.is_empty() {
        sources.push((None, stdin.to_string()));
    } else {
        for name in &files {
            match read_file(state, name) {
                Some(contents) => sources.push((Some(dequote(name)), contents)),
                None => result.stderr.push_str(&format!("FINDSTR: Cannot open {}\n", dequote(name))),
            }
        }
    }

    let mut total = 0;
    let prefix_names = files.len() > 1;
    for (name, text) in &sources {
        for (index, line) in split_lines(text).into_iter().enumerate() {
            let found = regexes.iter().any(|re| re.is_match(line));
            if found == invert {
                continue;
            }
            total += 1;
            if let Some(name) = name.as_ref().filter(|_| prefix_names) {
                result.stdout.push_str(&format!("{}:", name));
            }
            if numbered {
                result.stdout.push_str(&format!("{}:", index + 1));
            }
            result.stdout.push_str(&format!("{}\n", line));
        }
    }

    result.exit_code = if total > 0 { 0 } else { 1 };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn state_in(dir: PathBuf) -> InterpreterState {
        InterpreterState::new(Environment::new(), dir)
    }

    #[test]
    fn test_type_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        let state = state_in(dir.path().to_path_buf());

        assert_eq!(handle_type(&state, &args(&["a.txt"])).stdout, "alpha\n");
        let missing = handle_type(&state, &args(&["b.txt"]));
        assert_eq!(missing.exit_code, 1);
        assert!(missing.stderr.starts_with(FILE_NOT_FOUND));
        assert_eq!(handle_type(&state, &[]).stderr, SYNTAX_ERROR);
    }

    #[test]
    fn test_more_from_stdin() {
        let state = state_in(PathBuf::from("/"));
        assert_eq!(handle_more(&state, &[], "a\r\nb").stdout, "a\nb\n");
    }

    #[test]
    fn test_sort() {
        let state = state_in(PathBuf::from("/"));
        assert_eq!(handle_sort(&state, &[], "pear\nApple\nbanana\n").stdout, "Apple\nbanana\npear\n");
        assert_eq!(handle_sort(&state, &args(&["/r"]), "b\na\nc\n").stdout, "c\nb\na\n");
    }

    #[test]
    fn test_find_stdin() {
        let state = state_in(PathBuf::from("/"));
        let input = "Error: one\nok\nerror: two\n";

        let result = handle_find(&state, &args(&["\"Error\""]), input);
        assert_eq!(result.stdout, "Error: one\n");
        assert_eq!(result.exit_code, 0);

        assert_eq!(handle_find(&state, &args(&["/I", "\"error\""]), input).stdout, "Error: one\nerror: two\n");
        assert_eq!(handle_find(&state, &args(&["/V", "\"rror\""]), input).stdout, "ok\n");
        assert_eq!(handle_find(&state, &args(&["/C", "/I", "\"error\""]), input).stdout, "2\n");
        assert_eq!(handle_find(&state, &args(&["/N", "\"ok\""]), input).stdout, "[2]ok\n");
    }

    #[test]
    fn test_find_no_match_is_exit_one() {
        let state = state_in(PathBuf::from("/"));
        assert_eq!(handle_find(&state, &args(&["\"zzz\""]), "abc\n").exit_code, 1);
        assert_eq!(handle_find(&state, &args(&["unquoted"]), "abc\n").exit_code, 2);
    }

    #[test]
    fn test_find_in_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.txt"), "x\nneedle\n").unwrap();
        let state = state_in(dir.path().to_path_buf());
        let result = handle_find(&state, &args(&["\"needle\"", "log.txt"]), "");
        assert_eq!(result.stdout, "\n---------- LOG.TXT\nneedle\n");
    }

    #[test]
    fn test_findstr_regex_and_literal() {
        let state = state_in(PathBuf::from("/"));
        let input = "abc123\nxyz\nA.C\n";

        assert_eq!(handle_findstr(&state, &args(&["[0-9]+"]), input).stdout, "abc123\n");
        assert_eq!(handle_findstr(&state, &args(&["/L", "A.C"]), input).stdout, "A.C\n");
        assert_eq!(handle_findstr(&state, &args(&["/I", "xyz abc"]), input).stdout, "abc123\nxyz\n");
        assert_eq!(handle_findstr(&state, &args(&["/N", "/V", "c"]), input).stdout, "2:xyz\n3:A.C\n");
        assert_eq!(handle_findstr(&state, &args(&["/C:\"A.C\""]), input).stdout, "A.C\n");
        assert_eq!(handle_findstr(&state, &args(&["nothing"]), input).exit_code, 1);
    }
}
