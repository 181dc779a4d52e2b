//! `%~` Modifiers
//!
//! `%~1`, `%~nx1`, `%~dpf` and friends: strip quotes and take parts of a path.
//!
//! | letter | result                       |
//! |--------|------------------------------|
//! | (none) | value without quotes         |
//! | f      | full path                    |
//! | d      | drive                        |
//! | p      | directory, trailing separator|
//! | n      | name without extension       |
//! | x      | extension with dot           |
//! | a      | attributes                   |
//! | t      | modification time            |
//! | z      | size in bytes                |

use std::path::{Path, MAIN_SEPARATOR};

use chrono::{DateTime, Local};

use crate::interpreter::helpers::{dequote, resolve_path};

pub const MODIFIER_CHARS: &str = "fdpnxsatz";

pub fn is_modifier(c: char) -> bool {
    MODIFIER_CHARS.contains(c.to_ascii_lowercase())
}

/// Collect modifier letters starting at `start`. Returns them and the index
/// after the last one.
pub fn scan_modifiers(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_modifier(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Apply modifier letters to `value`.
pub fn apply_modifiers(value: &str, modifiers: &str, cwd: &Path) -> String {
    let plain = dequote(value);
    let mods = modifiers.to_ascii_lowercase();
    if mods.is_empty() || plain.is_empty() {
        return plain;
    }

    let full = resolve_path(cwd, &plain);
    let mut parts: Vec<String> = Vec::new();

    let metadata = std::fs::metadata(&full).ok();
    if mods.contains('a') {
        parts.push(match &metadata {
            Some(m) if m.is_dir() => "d--------".to_string(),
            Some(m) if m.permissions().readonly() => "-r-------".to_string(),
            Some(_) => "--a------".to_string(),
            None => String::new(),
        });
    }
    if mods.contains('t') {
        let time = metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%m/%d/%Y %I:%M %p").to_string())
            .unwrap_or_default();
        parts.push(time);
    }
    if mods.contains('z') {
        parts.push(
            metadata
                .as_ref()
                .filter(|m| m.is_file())
                .map(|m| m.len().to_string())
                .unwrap_or_default(),
        );
    }

    if mods.chars().any(|c| "fdpnx".contains(c)) {
        parts.push(path_parts(&full, &mods));
    }

    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn path_parts(full: &Path, mods: &str) -> String {
    let full_text = full.display().to_string();
    let only_full = !mods.chars().any(|c| "dpnx".contains(c));
    if only_full {
        return full_text;
    }

    let mut out = String::new();
    if mods.contains('d') || mods.contains('f') {
        let bytes = full_text.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' {
            out.push_str(&full_text[..2]);
        }
    }
    if mods.contains('p') || mods.contains('f') {
        let mut dir = full
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        if !dir.ends_with(MAIN_SEPARATOR) {
            dir.push(MAIN_SEPARATOR);
        }
        if dir.len() >= 2 && dir.as_bytes()[1] == b':' {
            dir = dir[2..].to_string();
        }
        out.push_str(&dir);
    }
    if mods.contains('n') || mods.contains('f') {
        let name = full.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let stem = match name.rfind('.') {
            Some(idx) if idx > 0 => name[..idx].to_string(),
            _ => name,
        };
        out.push_str(&stem);
    }
    if mods.contains('x') || mods.contains('f') {
        let name = full.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if let Some(idx) = name.rfind('.').filter(|&i| i > 0) {
            out.push_str(&name[idx..]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_modifiers_strips_quotes() {
        assert_eq!(apply_modifiers("\"a b.txt\"", "", Path::new("/")), "a b.txt");
    }

    #[test]
    fn test_scan_modifiers() {
        let chars: Vec<char> = "nx1rest".chars().collect();
        assert_eq!(scan_modifiers(&chars, 0), ("nx".to_string(), 2));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_parts() {
        let cwd = Path::new("/work");
        assert_eq!(apply_modifiers("dir/report.final.txt", "n", cwd), "report.final");
        assert_eq!(apply_modifiers("dir/report.final.txt", "x", cwd), ".txt");
        assert_eq!(apply_modifiers("dir/report.final.txt", "nx", cwd), "report.final.txt");
        assert_eq!(apply_modifiers("dir/report.txt", "dp", cwd), "/work/dir/");
        assert_eq!(apply_modifiers("dir/report.txt", "f", cwd), "/work/dir/report.txt");
        assert_eq!(apply_modifiers("\"dir/a b.txt\"", "f", cwd), "/work/dir/a b.txt");
    }

    #[test]
    fn test_size_modifier() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.bin"), b"12345").unwrap();
        assert_eq!(apply_modifiers("f.bin", "z", dir.path()), "5");
    }
}
