//! Batch Script Loader
//!
//! Splits script source into logical lines and indexes labels.
//!
//! A logical line spans several physical lines when a block is still open,
//! when a line ends with an unescaped `^`, or when a line closing an `IF`
//! block is followed by a line starting with `ELSE`. Lines are parsed lazily
//! at execution time because percent expansion must see the variables of the
//! moment.

use std::collections::HashMap;

use crate::parser::lexer::{tokenize, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Command,
    /// `:name`; the name is normalized (upper case, no colon)
    Label(String),
    /// `::` comment
    Comment,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    /// 1-based number of the first physical line
    pub line_number: usize,
    pub kind: LineKind,
}

/// A loaded script: logical lines plus a label index.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub name: String,
    pub lines: Vec<LogicalLine>,
    labels: HashMap<String, usize>,
    duplicate_labels: Vec<String>,
}

impl Program {
    pub fn load(name: impl Into<String>, source: &str) -> Self {
        let lines = assemble_lines(source);

        let mut labels = HashMap::new();
        let mut duplicate_labels = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if let LineKind::Label(label) = &line.kind {
                if labels.contains_key(label) {
                    duplicate_labels.push(label.clone());
                } else {
                    labels.insert(label.clone(), idx);
                }
            }
        }

        Self {
            name: name.into(),
            lines,
            labels,
            duplicate_labels,
        }
    }

    /// Index of the line holding `label`; the first definition wins.
    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.labels.get(&normalize_label(label)).copied()
    }

    /// Labels defined more than once, in order of their repeated definition.
    pub fn duplicate_labels(&self) -> &[String] {
        &self.duplicate_labels
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// `:Loop extra` and `loop` both normalize to `LOOP`.
pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim_start();
    let trimmed = trimmed.strip_prefix(':').unwrap_or(trimmed);
    trimmed
        .split(|c: char| c.is_whitespace() || matches!(c, '+' | ':' | ',' | ';' | '='))
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

fn classify(text: &str) -> LineKind {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with("::") {
        LineKind::Comment
    } else if trimmed.starts_with(':') {
        LineKind::Label(normalize_label(trimmed))
    } else {
        LineKind::Command
    }
}

fn first_word_upper(text: &str) -> String {
    text.trim_start()
        .trim_start_matches('@')
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// True when the line ends in a `^` that is not itself escaped or quoted.
fn ends_with_continuation(text: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut last_is_caret = false;
    for c in text.chars() {
        last_is_caret = false;
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '"' => in_quotes = !in_quotes,
            '^' if !in_quotes => {
                escaped = true;
                last_is_caret = true;
            }
            _ => {}
        }
    }
    last_is_caret
}

/// Number of blocks still open at the end of `text`.
///
/// A `(` opens a block at command position: after an operator, at the start
/// of the line, after `DO` or `ELSE`, or after whitespace on an `IF` line.
/// Other parentheses are literal text.
pub fn open_block_depth(text: &str) -> usize {
    let is_if_line = first_word_upper(text) == "IF";
    let tokens = tokenize(text);
    let mut depth = 0usize;
    let mut literal = 0usize;
    let mut skipping_rem = false;

    for (idx, tok) in tokens.iter().enumerate() {
        if skipping_rem {
            // REM swallows the rest of its physical line
            skipping_rem = !tok.is_operator("\n");
            continue;
        }
        let prev = idx.checked_sub(1).map(|i| &tokens[i]);
        if tok.is_operator("(") {
            let opens = match prev {
                None => true,
                Some(p) if p.kind == TokenKind::Operator => true,
                Some(p) if p.text.eq_ignore_ascii_case("DO") || p.text.eq_ignore_ascii_case("ELSE") => true,
                Some(_) => is_if_line && !tok.leading_space.is_empty(),
            };
            if opens {
                depth += 1;
            } else {
                literal += 1;
            }
        } else if tok.is_operator(")") {
            if literal > 0 {
                literal -= 1;
            } else {
                depth = depth.saturating_sub(1);
            }
        } else if tok.is_word()
            && tok.text.trim_start_matches('@').eq_ignore_ascii_case("REM")
            && prev.map_or(true, |p| p.kind == TokenKind::Operator)
        {
            skipping_rem = true;
        }
    }

    depth
}

fn starts_with_else(line: &str) -> bool {
    let trimmed = line.trim_start();
    let upper: String = trimmed.chars().take(5).collect::<String>().to_ascii_uppercase();
    upper == "ELSE"
        || upper
            .strip_prefix("ELSE")
            .map_or(false, |rest| rest.starts_with(|c: char| c.is_whitespace() || c == '('))
}

fn assemble_lines(source: &str) -> Vec<LogicalLine> {
    let physical: Vec<&str> = source
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    // A trailing newline does not start another line
    let count = if source.ends_with('\n') {
        physical.len() - 1
    } else {
        physical.len()
    };

    let mut lines = Vec::new();
    let mut i = 0;
    while i < count {
        let line_number = i + 1;
        let mut text = physical[i].to_string();
        i += 1;

        let kind = classify(&text);
        if kind != LineKind::Command {
            lines.push(LogicalLine {
                text,
                line_number,
                kind,
            });
            continue;
        }

        let is_rem = first_word_upper(&text) == "REM";
        while i < count {
            if ends_with_continuation(&text) {
                text.pop();
                text.push_str(physical[i]);
                i += 1;
                continue;
            }
            if !is_rem && open_block_depth(&text) > 0 {
                let next = physical[i];
                i += 1;
                match classify(next) {
                    LineKind::Command => {
                        text.push('\n');
                        text.push_str(next);
                    }
                    // labels, comments and blank lines inside a block are skipped
                    _ => {}
                }
                continue;
            }
            if first_word_upper(&text) == "IF"
                && text.trim_end().ends_with(')')
                && starts_with_else(physical[i])
            {
                text.push(' ');
                text.push_str(physical[i].trim_start());
                i += 1;
                continue;
            }
            break;
        }

        lines.push(LogicalLine {
            text,
            line_number,
            kind: LineKind::Command,
        });
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_labels() {
        let program = Program::load("t.bat", "@ECHO OFF\r\n:Start\r\nECHO hi\r\n\r\n:: note\r\n");
        assert_eq!(program.len(), 5);
        assert_eq!(program.lines[1].kind, LineKind::Label("START".to_string()));
        assert_eq!(program.lines[2].text, "ECHO hi");
        assert_eq!(program.lines[3].kind, LineKind::Blank);
        assert_eq!(program.lines[4].kind, LineKind::Comment);
        assert_eq!(program.find_label(":start"), Some(1));
        assert_eq!(program.find_label("START"), Some(1));
        assert_eq!(program.find_label("missing"), None);
    }

    #[test]
    fn test_duplicate_labels_first_wins() {
        let program = Program::load("t.bat", ":a\nECHO 1\n:A\nECHO 2\n");
        assert_eq!(program.find_label("a"), Some(0));
        assert_eq!(program.duplicate_labels(), &["A".to_string()]);
    }

    #[test]
    fn test_multi_line_block() {
        let program = Program::load(
            "t.bat",
            "IF 1==1 (\n  ECHO a\n  :: skipped\n  ECHO b\n)\nECHO c\n",
        );
        assert_eq!(program.len(), 2);
        assert_eq!(program.lines[0].text, "IF 1==1 (\n  ECHO a\n  ECHO b\n)");
        assert_eq!(program.lines[1].line_number, 6);
    }

    #[test]
    fn test_else_on_next_line_is_joined() {
        let program = Program::load("t.bat", "IF 1==2 (\nECHO a\n)\nELSE (\nECHO b\n)\n");
        assert_eq!(program.len(), 1);
        assert!(program.lines[0].text.contains(") ELSE ("));
    }

    #[test]
    fn test_caret_continuation() {
        let program = Program::load("t.bat", "ECHO one ^\ntwo\nECHO three\n");
        assert_eq!(program.len(), 2);
        assert_eq!(program.lines[0].text, "ECHO one two");
    }

    #[test]
    fn test_escaped_caret_is_not_continuation() {
        let program = Program::load("t.bat", "ECHO a^^\nECHO b\n");
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_literal_parens_do_not_open_block() {
        assert_eq!(open_block_depth("ECHO:-("), 0);
        assert_eq!(open_block_depth("FOR %%i IN (a) DO ("), 1);
        assert_eq!(open_block_depth("(ECHO a"), 1);
        assert_eq!(open_block_depth("IF a==b (ECHO a) ELSE ("), 1);
    }

    #[test]
    fn test_rem_line_parens_are_ignored() {
        let program = Program::load("t.bat", "REM (not a block\nECHO next\n");
        assert_eq!(program.len(), 2);
    }
}
