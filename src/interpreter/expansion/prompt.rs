//! Prompt expansion
//!
//! Expands the `$` codes of the `PROMPT` variable. The prompt is shown in
//! interactive mode and before each echoed batch line.
//!
//! Supported codes:
//! - `$P` current directory, `$G` `>`, `$L` `<`, `$B` `|`, `$Q` `=`
//! - `$A` `&`, `$C` `(`, `$F` `)`, `$S` space, `$_` newline, `$E` escape
//! - `$N` drive, `$D` date, `$T` time, `$V` version, `$$` `$`

use std::path::Path;

use chrono::{Local, Timelike};

pub const DEFAULT_PROMPT: &str = "$P$G";

/// Expand a `PROMPT` template. Unknown codes are dropped.
pub fn expand_prompt(template: &str, cwd: &Path) -> String {
    let mut result = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let Some(code) = chars.next() else {
            break;
        };
        match code.to_ascii_uppercase() {
            'P' => result.push_str(&cwd.display().to_string()),
            'G' => result.push('>'),
            'L' => result.push('<'),
            'B' => result.push('|'),
            'Q' => result.push('='),
            'A' => result.push('&'),
            'C' => result.push('('),
            'F' => result.push(')'),
            'S' => result.push(' '),
            '_' => result.push('\n'),
            'E' => result.push('\x1b'),
            '$' => result.push('$'),
            'N' => {
                let text = cwd.display().to_string();
                if text.as_bytes().get(1) == Some(&b':') {
                    result.push_str(&text[..1]);
                }
            }
            'D' => result.push_str(&Local::now().format("%a %m/%d/%Y").to_string()),
            'T' => {
                let now = Local::now();
                result.push_str(&format!(
                    "{:>2}:{:02}:{:02}.{:02}",
                    now.hour(),
                    now.minute(),
                    now.second(),
                    now.nanosecond() % 1_000_000_000 / 10_000_000
                ));
            }
            'V' => result.push_str(crate::VERSION_BANNER),
            _ => {}
        }
    }

    result
}
