//! Compound Command Parser
//!
//! Handles parsing of compound commands: `IF` and `FOR`.
//!
//! A parenthesized body is a block; an unparenthesized body runs to the end
//! of the line (or the `)` closing an enclosing block). `ELSE` is recognized
//! only after a parenthesized then-branch.

use crate::ast::types::{
    CompareOp, ConditionNode, ConditionTest, ForKind, ForNode, IfNode, SequenceNode,
};
use crate::parser::lexer::TokenKind;
use crate::parser::parser::Parser;
use crate::parser::types::ParseError;

impl Parser {
    /// `IF [/I] [NOT] condition command [ELSE command]`
    pub(crate) fn parse_if(&mut self) -> Result<IfNode, ParseError> {
        self.expect_word("IF")?;

        let mut negated = false;
        let mut case_insensitive = false;
        loop {
            match self.peek_word().map(|w| w.to_ascii_uppercase()).as_deref() {
                Some("/I") if !case_insensitive => case_insensitive = true,
                Some("NOT") if !negated => negated = true,
                _ => break,
            }
            self.read_word();
        }

        let keyword = self.peek_word().map(|w| w.to_ascii_uppercase());
        let test = match keyword.as_deref() {
            Some("EXIST") => {
                self.read_word();
                ConditionTest::Exist(self.expect_word("path after EXIST")?.text)
            }
            Some("DEFINED") => {
                self.read_word();
                ConditionTest::Defined(self.expect_word("name after DEFINED")?.text)
            }
            Some("ERRORLEVEL") => {
                self.read_word();
                ConditionTest::ErrorLevel(self.expect_word("number after ERRORLEVEL")?.text)
            }
            _ => self.parse_comparison()?,
        };

        let (then_branch, then_is_block) = self.parse_branch()?;
        let else_branch = if then_is_block
            && self
                .peek_word()
                .map_or(false, |w| w.eq_ignore_ascii_case("ELSE"))
        {
            self.read_word();
            let (branch, _) = self.parse_branch()?;
            Some(Box::new(branch))
        } else {
            None
        };

        Ok(IfNode {
            condition: ConditionNode {
                negated,
                case_insensitive,
                test,
            },
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    /// `left==right`, `left == right` or `left OP right` in any spacing.
    fn parse_comparison(&mut self) -> Result<ConditionTest, ParseError> {
        let first = self.expect_word("condition")?;

        if let Some(idx) = find_unquoted(&first.text, "==") {
            let left = first.text[..idx].to_string();
            let rest = &first.text[idx + 2..];
            let right = if rest.is_empty() {
                self.expect_word("right operand")?.text
            } else {
                rest.to_string()
            };
            return Ok(ConditionTest::Compare {
                left,
                op: CompareOp::Equal,
                right,
            });
        }

        let second = self.expect_word("comparison operator")?;
        if let Some(rest) = second.text.strip_prefix("==") {
            let right = if rest.is_empty() {
                self.expect_word("right operand")?.text
            } else {
                rest.to_string()
            };
            return Ok(ConditionTest::Compare {
                left: first.text,
                op: CompareOp::Equal,
                right,
            });
        }

        match CompareOp::from_keyword(&second.text) {
            Some(op) => {
                let right = self.expect_word("right operand")?.text;
                Ok(ConditionTest::Compare {
                    left: first.text,
                    op,
                    right,
                })
            }
            None => Err(ParseError::unexpected(&second.text, second.offset)),
        }
    }

    /// Parse an IF/ELSE/DO body. Returns the body and whether it was a block.
    fn parse_branch(&mut self) -> Result<(SequenceNode, bool), ParseError> {
        if self.check_operator("(") {
            let block = self.parse_block()?;
            return Ok((SequenceNode::single(block), true));
        }
        let offset = self.offset();
        match self.parse_sequence(true)? {
            Some(body) => Ok((body, false)),
            None => Err(ParseError::new("missing command", offset)),
        }
    }

    /// `FOR [/D | /R [root] | /L | /F ["options"]] %v IN (set) DO command`
    pub(crate) fn parse_for(&mut self) -> Result<ForNode, ParseError> {
        self.expect_word("FOR")?;

        let mut kind = ForKind::Items;
        loop {
            match self.peek_word().map(|w| w.to_ascii_uppercase()).as_deref() {
                Some("/L") => {
                    self.read_word();
                    kind = ForKind::Range;
                }
                Some("/D") => {
                    self.read_word();
                    kind = ForKind::Directories;
                }
                Some("/R") => {
                    self.read_word();
                    let root = match self.peek_word() {
                        Some(w) if !w.starts_with('%') => self.read_word().map(|w| w.text),
                        _ => None,
                    };
                    kind = ForKind::Recursive { root };
                }
                Some("/F") => {
                    self.read_word();
                    let options = match self.peek() {
                        Some(tok) if tok.kind == TokenKind::String => {
                            let text = tok.text.trim_matches('"').to_string();
                            self.pos += 1;
                            text
                        }
                        _ => String::new(),
                    };
                    kind = ForKind::Lines { options };
                }
                _ => break,
            }
        }

        let var_word = self.expect_word("loop variable")?;
        let var_text = var_word.text.strip_prefix('%').unwrap_or("");
        let var_text = var_text.strip_prefix('%').unwrap_or(var_text);
        let mut var_chars = var_text.chars();
        let variable = match (var_chars.next(), var_chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ParseError::unexpected(&var_word.text, var_word.offset)),
        };

        let in_word = self.expect_word("IN")?;
        if !in_word.text.eq_ignore_ascii_case("IN") {
            return Err(ParseError::unexpected(&in_word.text, in_word.offset));
        }

        if !self.check_operator("(") {
            let offset = self.offset();
            let text = self.peek().map(|t| t.text.clone()).unwrap_or_default();
            return Err(ParseError::unexpected(&text, offset));
        }
        let raw_set = self.read_for_set()?;
        let items = split_set_items(&raw_set);

        let do_word = self.expect_word("DO")?;
        if !do_word.text.eq_ignore_ascii_case("DO") {
            return Err(ParseError::unexpected(&do_word.text, do_word.offset));
        }

        let (body, _) = self.parse_branch()?;

        Ok(ForNode {
            variable,
            kind,
            items,
            raw_set,
            body: Box::new(body),
        })
    }

    /// Consume `( ... )` and return the text between the parentheses.
    fn read_for_set(&mut self) -> Result<String, ParseError> {
        let open = self.offset();
        self.pos += 1;
        let mut raw = String::new();
        let mut nested = 0usize;

        loop {
            let Some(tok) = self.advance() else {
                return Err(ParseError::new("missing closing parenthesis", open));
            };
            if tok.is_operator(")") {
                if nested == 0 {
                    break;
                }
                nested -= 1;
            } else if tok.is_operator("(") {
                nested += 1;
            } else if tok.is_operator("\n") {
                raw.push(' ');
                continue;
            }
            if !raw.is_empty() {
                raw.push_str(&tok.leading_space);
            }
            raw.push_str(&tok.text);
        }

        Ok(raw)
    }
}

/// Byte index of `needle` in `text`, ignoring occurrences inside quotes.
fn find_unquoted(text: &str, needle: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in text.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && text[idx..].starts_with(needle) {
            return Some(idx);
        }
    }
    None
}

/// Split a FOR set on whitespace, `,`, `;` and `=` outside quotes.
pub fn split_set_items(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ' ' | '\t' | ',' | ';' | '=' if !in_quotes => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::CommandNode;
    use crate::parser::parser::parse;

    fn parse_if(input: &str) -> IfNode {
        match parse(input).unwrap().unwrap() {
            SequenceNode::Single(CommandNode::If(node)) => node,
            other => panic!("expected IF, got {:?}", other),
        }
    }

    fn parse_for(input: &str) -> ForNode {
        match parse(input).unwrap().unwrap() {
            SequenceNode::Single(CommandNode::For(node)) => node,
            other => panic!("expected FOR, got {:?}", other),
        }
    }

    #[test]
    fn test_if_comparison_spacing_variants() {
        for input in [
            "IF a==b ECHO x",
            "IF a == b ECHO x",
            "IF a== b ECHO x",
            "IF a ==b ECHO x",
        ] {
            let node = parse_if(input);
            assert_eq!(
                node.condition.test,
                ConditionTest::Compare {
                    left: "a".to_string(),
                    op: CompareOp::Equal,
                    right: "b".to_string()
                },
                "failed for {}",
                input
            );
        }
    }

    #[test]
    fn test_if_quoted_comparison() {
        let node = parse_if(r#"IF "a b"=="a b" ECHO same"#);
        assert_eq!(
            node.condition.test,
            ConditionTest::Compare {
                left: r#""a b""#.to_string(),
                op: CompareOp::Equal,
                right: r#""a b""#.to_string()
            }
        );
    }

    #[test]
    fn test_if_modifiers_and_keyword_operator() {
        let node = parse_if("IF /I NOT 3 GEQ 4 ECHO x");
        assert!(node.condition.negated);
        assert!(node.condition.case_insensitive);
        assert!(matches!(
            node.condition.test,
            ConditionTest::Compare { op: CompareOp::Geq, .. }
        ));
    }

    #[test]
    fn test_if_else_requires_block() {
        let node = parse_if("IF EXIST a.txt (ECHO yes) ELSE (ECHO no)");
        assert!(node.else_branch.is_some());

        // Without a block the ELSE words belong to the command
        let node = parse_if("IF EXIST a.txt ECHO yes ELSE ECHO no");
        assert!(node.else_branch.is_none());
    }

    #[test]
    fn test_if_unparenthesized_body_takes_rest_of_line() {
        let node = parse_if("IF 1==1 ECHO a & ECHO b");
        assert!(matches!(*node.then_branch, SequenceNode::Sequential(_, _)));
    }

    #[test]
    fn test_if_missing_body_is_error() {
        assert!(parse("IF 1==1").is_err());
        assert!(parse("IF a b c").is_err());
    }

    #[test]
    fn test_for_items() {
        let node = parse_for("FOR %i IN (a b,c;d) DO ECHO %i");
        assert_eq!(node.variable, 'i');
        assert_eq!(node.kind, ForKind::Items);
        assert_eq!(node.items, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_for_batch_variable_form() {
        let node = parse_for("FOR %%x IN (a) DO ECHO %%x");
        assert_eq!(node.variable, 'x');
    }

    #[test]
    fn test_for_f_options_and_command_set() {
        let node = parse_for(r#"FOR /F "tokens=1,2 delims=," %a IN ('type x ^| sort') DO ECHO %a"#);
        assert_eq!(
            node.kind,
            ForKind::Lines {
                options: "tokens=1,2 delims=,".to_string()
            }
        );
        assert_eq!(node.raw_set, "'type x | sort'");
    }

    #[test]
    fn test_for_r_root() {
        let node = parse_for("FOR /R sub %f IN (*.txt) DO ECHO %f");
        assert_eq!(
            node.kind,
            ForKind::Recursive {
                root: Some("sub".to_string())
            }
        );
    }

    #[test]
    fn test_for_block_body() {
        let node = parse_for("FOR %i IN (1 2) DO (\nECHO %i\nECHO done\n)");
        assert!(matches!(
            *node.body,
            SequenceNode::Single(CommandNode::Block(_))
        ));
    }

    #[test]
    fn test_for_syntax_errors() {
        assert!(parse("FOR i IN (a) DO ECHO").is_err());
        assert!(parse("FOR %i (a) DO ECHO").is_err());
        assert!(parse("FOR %i IN a DO ECHO").is_err());
        assert!(parse("FOR %i IN (a) ECHO x").is_err());
    }
}
