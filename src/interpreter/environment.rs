//! Environment Scope Manager
//!
//! Variables live in a stack of overlay frames. The outermost frame is the
//! persistent environment; `SETLOCAL` pushes a frame and `ENDLOCAL` drops it,
//! discarding every change made since.
//!
//! Names are case-insensitive; the spelling used at the most recent
//! assignment is kept for listings and child processes. A deletion inside a
//! pushed frame is recorded as a tombstone so that the outer value is hidden
//! until the frame is popped.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
struct Frame {
    /// Keyed by upper-cased name; `None` marks a deletion
    vars: HashMap<String, Option<Variable>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("ENDLOCAL without matching SETLOCAL")]
    Underflow,
}

#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Seed the persistent frame from name/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        for (name, value) in vars {
            env.set(name, value);
        }
        env
    }

    /// Seed the persistent frame from the host process environment.
    pub fn from_host() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Innermost visible value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = name.to_ascii_uppercase();
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(&key))
            .and_then(|entry| entry.as_ref())
            .map(|var| var.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name` in the innermost frame.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_uppercase();
        let var = Variable {
            name,
            value: value.into(),
        };
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.insert(key, Some(var));
        }
    }

    /// Delete `name`. Returns whether it was visible before.
    pub fn unset(&mut self, name: &str) -> bool {
        let existed = self.contains(name);
        let key = name.to_ascii_uppercase();
        let depth = self.frames.len();
        if let Some(frame) = self.frames.last_mut() {
            if depth == 1 {
                frame.vars.remove(&key);
            } else {
                frame.vars.insert(key, None);
            }
        }
        existed
    }

    /// Open a local scope (`SETLOCAL`).
    pub fn push_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Close the innermost local scope (`ENDLOCAL`).
    pub fn pop_scope(&mut self) -> Result<(), ScopeError> {
        if self.frames.len() <= 1 {
            return Err(ScopeError::Underflow);
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of open local scopes.
    pub fn scope_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Drop scopes until at most `depth` remain open.
    pub fn truncate_scopes(&mut self, depth: usize) {
        self.frames.truncate(depth + 1);
    }

    /// All visible variables, sorted case-insensitively by name.
    pub fn visible(&self) -> Vec<Variable> {
        let mut merged: HashMap<&str, &Option<Variable>> = HashMap::new();
        for frame in &self.frames {
            for (key, entry) in &frame.vars {
                merged.insert(key.as_str(), entry);
            }
        }
        let mut vars: Vec<Variable> = merged
            .into_iter()
            .filter_map(|(_, entry)| entry.clone())
            .collect();
        vars.sort_by(|a, b| {
            a.name
                .to_ascii_uppercase()
                .cmp(&b.name.to_ascii_uppercase())
        });
        vars
    }

    /// Visible variables whose names start with `prefix` (case-insensitive).
    pub fn with_prefix(&self, prefix: &str) -> Vec<Variable> {
        let prefix = prefix.to_ascii_uppercase();
        self.visible()
            .into_iter()
            .filter(|v| v.name.to_ascii_uppercase().starts_with(&prefix))
            .collect()
    }

    /// Environment block for a child process.
    pub fn to_env_map(&self) -> HashMap<String, String> {
        self.visible()
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_names() {
        let mut env = Environment::new();
        env.set("Path", "/bin");
        assert_eq!(env.get("PATH"), Some("/bin"));
        assert_eq!(env.get("path"), Some("/bin"));
    }

    #[test]
    fn test_local_scope_discards_changes() {
        let mut env = Environment::new();
        env.set("X", "1");
        env.push_scope();
        env.set("X", "2");
        env.set("Y", "new");
        assert_eq!(env.get("X"), Some("2"));
        env.pop_scope().unwrap();
        assert_eq!(env.get("X"), Some("1"));
        assert_eq!(env.get("Y"), None);
    }

    #[test]
    fn test_unset_inside_scope_is_restored() {
        let mut env = Environment::new();
        env.set("X", "1");
        env.push_scope();
        assert!(env.unset("X"));
        assert_eq!(env.get("X"), None);
        assert!(env.visible().is_empty());
        env.pop_scope().unwrap();
        assert_eq!(env.get("X"), Some("1"));
    }

    #[test]
    fn test_pop_outermost_is_underflow() {
        let mut env = Environment::new();
        assert_eq!(env.pop_scope(), Err(ScopeError::Underflow));
        assert_eq!(env.scope_depth(), 0);
    }

    #[test]
    fn test_truncate_scopes() {
        let mut env = Environment::new();
        env.push_scope();
        env.push_scope();
        env.set("A", "x");
        env.truncate_scopes(1);
        assert_eq!(env.scope_depth(), 1);
        assert_eq!(env.get("A"), None);
    }

    #[test]
    fn test_visible_is_sorted_and_merged() {
        let mut env = Environment::from_vars([("b", "2"), ("A", "1")]);
        env.push_scope();
        env.set("c", "3");
        env.set("B", "two");
        let names: Vec<String> = env.visible().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["A", "B", "c"]);
        assert_eq!(env.get("b"), Some("two"));
    }

    #[test]
    fn test_with_prefix() {
        let env = Environment::from_vars([("PATH", "x"), ("PATHEXT", "y"), ("HOME", "z")]);
        let names: Vec<String> = env.with_prefix("pa").into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["PATH", "PATHEXT"]);
    }
}
