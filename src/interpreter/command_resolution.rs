//! Command Resolution
//!
//! Maps a command name to a built-in, a batch script or an external program.
//!
//! Search order: built-ins, then the current directory, then each `PATH`
//! entry. In every directory the name is tried as written and then with each
//! `PATHEXT` extension. A name containing a path separator is looked up only
//! at that path.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::interpreter::builtin_dispatch::Builtin;
use crate::interpreter::helpers::{dequote, resolve_path};
use crate::interpreter::types::InterpreterState;

/// `PATHEXT` used when the variable is not set.
pub const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// Result of command resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCommand {
    Builtin(Builtin),
    /// A `.bat`/`.cmd` file, run by this interpreter
    Batch(PathBuf),
    /// Any other executable, run through the process runner
    External(PathBuf),
    NotFound,
}

/// Split PATH into individual directories. Both `;` and, on Unix, `:` separate
/// entries.
pub fn split_path(path_env: &str) -> Vec<&str> {
    path_env
        .split(|c| c == ';' || (cfg!(unix) && c == ':'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check if a command name contains a path separator (making it a path reference)
pub fn is_path_command(name: &str) -> bool {
    name.contains('/') || name.contains('\\')
}

/// Whether `path` names a batch script.
pub fn is_batch_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("bat") || ext.eq_ignore_ascii_case("cmd"))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn classify(path: PathBuf) -> Option<ResolvedCommand> {
    if !path.is_file() {
        return None;
    }
    if is_batch_file(&path) {
        Some(ResolvedCommand::Batch(path))
    } else if is_executable(&path) {
        Some(ResolvedCommand::External(path))
    } else {
        None
    }
}

/// Try `base` as written and with each extension.
fn probe(base: &Path, extensions: &[String]) -> Option<ResolvedCommand> {
    if let Some(found) = classify(base.to_path_buf()) {
        return Some(found);
    }
    let file_name = base.file_name()?.to_string_lossy().to_string();
    for ext in extensions {
        // Extensions are matched as given and in lower case
        let mut spellings = vec![ext.clone()];
        if ext.to_lowercase() != *ext {
            spellings.push(ext.to_lowercase());
        }
        for spelling in spellings {
            if let Some(found) = classify(base.with_file_name(format!("{}{}", file_name, spelling))) {
                return Some(found);
            }
        }
    }
    None
}

/// Resolve `name` for execution in `state`.
pub fn resolve_command(name: &str, state: &InterpreterState) -> ResolvedCommand {
    let name = dequote(name);
    if name.is_empty() {
        return ResolvedCommand::NotFound;
    }
    if let Some(builtin) = Builtin::from_name(&name) {
        return ResolvedCommand::Builtin(builtin);
    }

    let extensions: Vec<String> = state
        .env
        .get("PATHEXT")
        .unwrap_or(DEFAULT_PATHEXT)
        .split(';')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(String::from)
        .collect();

    let resolved = if is_path_command(&name) {
        probe(&resolve_path(&state.cwd, &name), &extensions)
    } else {
        let mut dirs = vec![state.cwd.clone()];
        if let Some(path_env) = state.env.get("PATH") {
            dirs.extend(split_path(path_env).into_iter().map(|dir| resolve_path(&state.cwd, dir)));
        }
        dirs.iter().find_map(|dir| probe(&dir.join(&name), &extensions))
    };

    let resolved = resolved.unwrap_or(ResolvedCommand::NotFound);
    trace!(name = %name, ?resolved, "resolved command");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::Environment;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a;b;;c"), vec!["a", "b", "c"]);
        #[cfg(unix)]
        assert_eq!(split_path("/usr/bin:/bin"), vec!["/usr/bin", "/bin"]);
    }

    #[test]
    fn test_builtins_win() {
        let state = InterpreterState::new(Environment::new(), PathBuf::from("/"));
        assert_eq!(resolve_command("echo", &state), ResolvedCommand::Builtin(Builtin::Echo));
        assert_eq!(resolve_command("SetLocal", &state), ResolvedCommand::Builtin(Builtin::Setlocal));
    }

    #[test]
    fn test_batch_file_in_cwd_with_pathext() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build.bat"), "@echo off\n").unwrap();
        let state = InterpreterState::new(Environment::new(), dir.path().to_path_buf());
        assert_eq!(
            resolve_command("build", &state),
            ResolvedCommand::Batch(dir.path().join("build.bat"))
        );
        assert_eq!(
            resolve_command("build.bat", &state),
            ResolvedCommand::Batch(dir.path().join("build.bat"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_external_on_path() {
        let cwd = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        make_executable(&bin.path().join("tool"));
        std::fs::write(bin.path().join("plain"), "not executable").unwrap();
        let env = Environment::from_vars([("PATH", bin.path().display().to_string())]);
        let state = InterpreterState::new(env, cwd.path().to_path_buf());

        assert_eq!(
            resolve_command("tool", &state),
            ResolvedCommand::External(bin.path().join("tool"))
        );
        assert_eq!(resolve_command("plain", &state), ResolvedCommand::NotFound);
        assert_eq!(resolve_command("nothing-here", &state), ResolvedCommand::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_path_command_only_looks_there() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        make_executable(&dir.path().join("sub").join("run"));
        let state = InterpreterState::new(Environment::new(), dir.path().to_path_buf());

        assert_eq!(
            resolve_command("sub/run", &state),
            ResolvedCommand::External(dir.path().join("sub").join("run"))
        );
        assert_eq!(resolve_command("run", &state), ResolvedCommand::NotFound);
    }
}
