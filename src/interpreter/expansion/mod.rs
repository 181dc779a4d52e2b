//! Expansion
//!
//! Percent expansion of whole lines, per-iteration loop-variable
//! substitution, `%~` path modifiers, wildcards, prompt codes and DOSKEY
//! macros.

pub mod loop_vars;
pub mod macros;
pub mod modifiers;
pub mod percent;
pub mod prompt;
pub mod variable;
pub mod wildcard;

pub use loop_vars::substitute_loop_vars;
pub use macros::MacroTable;
pub use percent::{expand_percent, expand_tokens};
pub use prompt::expand_prompt;
pub use variable::lookup_variable;
pub use wildcard::{expand_wildcard, has_wildcards, EntryKind};
