//! DOSKEY macros
//!
//! A macro replaces a typed line whose first word is its name. Inside the
//! definition:
//! - `$1`..`$9` the words after the name, `$*` all of them
//! - `$T` command separator (`&`), `$G` `>`, `$L` `<`, `$B` `|`
//! - `$$` a literal `$`
//!
//! Only lines typed at the prompt are rewritten, never batch lines.

use std::collections::BTreeMap;

use tracing::trace;

/// Macro definitions, keyed by lower-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    entries: BTreeMap<String, (String, String)>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name`; an empty definition deletes it.
    pub fn define(&mut self, name: &str, definition: &str) {
        let key = name.to_lowercase();
        if definition.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, (name.to_string(), definition.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(|(_, def)| def.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `name=definition` pairs sorted by name.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(name, def)| (name.as_str(), def.as_str()))
    }

    /// Rewrite `line` if its first word names a macro.
    pub fn expand_line(&self, line: &str) -> Option<String> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        let definition = self.get(name)?;
        let args: Vec<&str> = words.collect();
        trace!(name, ?args, "expanding macro");
        Some(substitute(definition, &args))
    }
}

fn substitute(definition: &str, args: &[&str]) -> String {
    let mut result = String::new();
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d @ '1'..='9') => {
                chars.next();
                let index = d as usize - '1' as usize;
                result.push_str(args.get(index).copied().unwrap_or(""));
            }
            Some('*') => {
                chars.next();
                result.push_str(&args.join(" "));
            }
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some(code) if "TtGgLlBb".contains(code) => {
                chars.next();
                result.push(match code.to_ascii_uppercase() {
                    'T' => '&',
                    'G' => '>',
                    'L' => '<',
                    _ => '|',
                });
            }
            _ => result.push('$'),
        }
    }

    result
}
