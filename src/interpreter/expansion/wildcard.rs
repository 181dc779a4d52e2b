//! Wildcard Expansion
//!
//! `*` and `?` in the last path component, matched case-insensitively with
//! the `glob` crate. Used by `FOR` sets, `IF EXIST`, `TYPE` and `%~` forms.

use std::path::Path;

use glob::{MatchOptions, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Files,
    Directories,
    Any,
}

pub fn has_wildcards(text: &str) -> bool {
    text.contains('*') || text.contains('?')
}

/// Expand `pattern` relative to `cwd`.
///
/// Results keep the directory prefix as written: a relative pattern yields
/// relative names, an absolute one yields absolute paths. Sorted by name.
pub fn expand_wildcard(pattern: &str, cwd: &Path, kind: EntryKind) -> Vec<String> {
    let pattern: String = pattern
        .chars()
        .filter(|&c| c != '"')
        .map(|c| if c == '\\' && std::path::MAIN_SEPARATOR == '/' { '/' } else { c })
        .collect();

    let (dir_part, file_part) = match pattern.rfind('/') {
        Some(idx) => (&pattern[..=idx], &pattern[idx + 1..]),
        None => ("", pattern.as_str()),
    };

    let base = cwd.join(dir_part);
    let file_glob: String = file_part
        .chars()
        .map(|c| match c {
            '[' => "[[]".to_string(),
            ']' => "[]]".to_string(),
            other => other.to_string(),
        })
        .collect();
    let full = format!(
        "{}/{}",
        Pattern::escape(&base.display().to_string()).trim_end_matches('/'),
        file_glob
    );

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut matches: Vec<String> = match glob::glob_with(&full, options) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .filter(|path| match kind {
                EntryKind::Files => path.is_file(),
                EntryKind::Directories => path.is_dir(),
                EntryKind::Any => true,
            })
            .filter_map(|path| {
                path.file_name()
                    .map(|name| format!("{}{}", dir_part, name.to_string_lossy()))
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    matches.sort_by_key(|name| name.to_ascii_lowercase());
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_expand_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("A.txt"), "").unwrap();
        fs::write(dir.path().join("c.log"), "").unwrap();
        fs::create_dir(dir.path().join("d.txt")).unwrap();

        let files = expand_wildcard("*.txt", dir.path(), EntryKind::Files);
        assert_eq!(files, vec!["A.txt", "b.txt"]);

        let dirs = expand_wildcard("*.txt", dir.path(), EntryKind::Directories);
        assert_eq!(dirs, vec!["d.txt"]);
    }

    #[test]
    fn test_case_insensitive_and_subdir_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("Data.CSV"), "").unwrap();

        let files = expand_wildcard("sub\\*.csv", dir.path(), EntryKind::Files);
        assert_eq!(files, vec!["sub/Data.CSV"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(expand_wildcard("*.none", dir.path(), EntryKind::Any).is_empty());
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("*.txt"));
        assert!(has_wildcards("a?c"));
        assert!(!has_wildcards("plain"));
    }
}
