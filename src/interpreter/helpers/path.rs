//! Path and quoting helpers shared by built-ins and expansion.

use std::path::{Component, Path, PathBuf};

/// Remove every double quote; quotes only group text on a command line.
pub fn dequote(text: &str) -> String {
    text.chars().filter(|&c| c != '"').collect()
}

/// Whether `name` is the null device (`NUL`, `nul:`), which discards output.
pub fn is_null_device(name: &str) -> bool {
    let name = dequote(name);
    let name = name.trim_end_matches(':');
    name.eq_ignore_ascii_case("NUL") || name == "/dev/null"
}

/// Lexically normalize `path`: drop `.` components and fold `..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Resolve a (possibly quoted, backslash-separated) path against `cwd`.
pub fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
    let path = dequote(path);
    let path = if std::path::MAIN_SEPARATOR == '/' {
        path.replace('\\', "/")
    } else {
        path
    };
    normalize_path(&cwd.join(path))
}
