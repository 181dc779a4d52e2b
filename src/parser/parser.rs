//! Recursive Descent Parser for Command Lines
//!
//! Builds a [`SequenceNode`] tree from the tokens of one logical line.
//!
//! Operator precedence, tightest first:
//!   `|`  >  `&&` / `||` (left-associative)  >  `&` and line breaks
//!
//! Adjacent word tokens with no whitespace between them form one argument.
//! `IF` and `FOR` live in `compound_parser.rs`.

use crate::ast::types::{
    BlockNode, CommandNode, RedirectionNode, RedirectionOp, RedirectionTarget, SequenceNode,
    SimpleCommandNode,
};
use crate::parser::lexer::{tokenize, Token, TokenKind};
use crate::parser::types::{ParseError, MAX_INPUT_SIZE, MAX_PARSER_DEPTH};

pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    /// Number of open `(` blocks; a `)` operator closes the innermost one
    pub(crate) block_depth: usize,
    pub(crate) nesting: usize,
}

/// A run of glued word tokens
#[derive(Debug, Clone)]
pub(crate) struct Word {
    pub text: String,
    pub offset: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            block_depth: 0,
            nesting: 0,
        }
    }

    /// Parse the whole token stream. Returns `None` for an empty line.
    pub fn parse(mut self) -> Result<Option<SequenceNode>, ParseError> {
        let sequence = self.parse_sequence(false)?;
        if let Some(tok) = self.peek() {
            return Err(ParseError::unexpected(&tok.text, tok.start));
        }
        Ok(sequence)
    }

    // =========================================================================
    // TOKEN HELPERS
    // =========================================================================

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn offset(&self) -> usize {
        self.peek()
            .map(|t| t.start)
            .or_else(|| self.tokens.last().map(|t| t.end))
            .unwrap_or(0)
    }

    pub(crate) fn check_operator(&self, op: &str) -> bool {
        self.peek().map_or(false, |t| t.is_operator(op))
    }

    /// Read one argument: consecutive word tokens with no whitespace between.
    pub(crate) fn read_word(&mut self) -> Option<Word> {
        let first = self.peek().filter(|t| t.is_word())?.clone();
        self.pos += 1;
        let mut word = Word {
            text: first.text,
            offset: first.start,
        };
        while let Some(next) = self.peek() {
            if !next.is_word() || !next.leading_space.is_empty() {
                break;
            }
            word.text.push_str(&next.text);
            self.pos += 1;
        }
        Some(word)
    }

    /// Look at the next argument without consuming it.
    pub(crate) fn peek_word(&self) -> Option<String> {
        let mut text = String::new();
        let mut idx = self.pos;
        while let Some(tok) = self.tokens.get(idx) {
            if !tok.is_word() || (idx > self.pos && !tok.leading_space.is_empty()) {
                break;
            }
            text.push_str(&tok.text);
            idx += 1;
        }
        if text.is_empty() && idx == self.pos {
            None
        } else {
            Some(text)
        }
    }

    pub(crate) fn expect_word(&mut self, what: &str) -> Result<Word, ParseError> {
        let offset = self.offset();
        self.read_word()
            .ok_or_else(|| ParseError::new(format!("expected {}", what), offset))
    }

    /// True when the current sequence is finished: end of input, the `)` that
    /// closes the current block, or a line break when `stop_at_newline`.
    fn at_sequence_end(&self, stop_at_newline: bool) -> bool {
        match self.peek() {
            None => true,
            Some(t) if t.is_operator(")") => true,
            Some(t) if stop_at_newline && t.is_operator("\n") => true,
            _ => false,
        }
    }

    fn expect_operand(&self, op: &str, offset: usize) -> Result<(), ParseError> {
        match self.peek() {
            None => Err(ParseError::unexpected(op, offset)),
            Some(t) if t.kind == TokenKind::Operator && t.text != "(" => {
                Err(ParseError::unexpected(&t.text, t.start))
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // SEQUENCES
    // =========================================================================

    /// sequence := and_or (('&' | NEWLINE) and_or)*
    pub(crate) fn parse_sequence(
        &mut self,
        stop_at_newline: bool,
    ) -> Result<Option<SequenceNode>, ParseError> {
        let mut result: Option<SequenceNode> = None;

        loop {
            if !stop_at_newline {
                while self.check_operator("\n") {
                    self.pos += 1;
                }
            }
            if self.at_sequence_end(stop_at_newline) {
                break;
            }
            if let Some(tok) = self.peek() {
                if tok.kind == TokenKind::Operator && tok.text != "(" {
                    return Err(ParseError::unexpected(&tok.text, tok.start));
                }
            }

            let item = self.parse_and_or()?;
            result = Some(match result {
                None => item,
                Some(prev) => SequenceNode::sequential(prev, item),
            });

            match self.peek() {
                Some(t) if t.is_operator("&") => {
                    self.pos += 1;
                }
                Some(t) if t.is_operator("\n") && !stop_at_newline => {}
                _ => break,
            }
        }

        Ok(result)
    }

    /// and_or := pipeline (('&&' | '||') pipeline)*
    fn parse_and_or(&mut self) -> Result<SequenceNode, ParseError> {
        let mut left = self.parse_pipeline()?;
        loop {
            let op = match self.peek() {
                Some(t) if t.is_operator("&&") || t.is_operator("||") => t.clone(),
                _ => break,
            };
            self.pos += 1;
            self.expect_operand(&op.text, op.end)?;
            let right = self.parse_pipeline()?;
            left = if op.text == "&&" {
                SequenceNode::and_then(left, right)
            } else {
                SequenceNode::or_else(left, right)
            };
        }
        Ok(left)
    }

    /// pipeline := command ('|' command)*
    fn parse_pipeline(&mut self) -> Result<SequenceNode, ParseError> {
        let mut left = SequenceNode::single(self.parse_command()?);
        while self.check_operator("|") {
            let end = self.peek().map_or(0, |t| t.end);
            self.pos += 1;
            self.expect_operand("|", end)?;
            let right = self.parse_command()?;
            left = SequenceNode::pipe(left, SequenceNode::single(right));
        }
        Ok(left)
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    pub(crate) fn parse_command(&mut self) -> Result<CommandNode, ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_PARSER_DEPTH {
            return Err(ParseError::new("nesting too deep", self.offset()));
        }

        let result = if self.check_operator("(") {
            self.parse_block()
        } else {
            let keyword = self
                .peek_word()
                .map(|w| w.trim_start_matches('@').to_ascii_uppercase());
            match keyword.as_deref() {
                Some("IF") => self.parse_if().map(CommandNode::If),
                Some("FOR") => self.parse_for().map(CommandNode::For),
                Some("REM") => self.parse_rem().map(CommandNode::Simple),
                _ => self.parse_simple_command().map(CommandNode::Simple),
            }
        };

        self.nesting -= 1;
        result
    }

    /// `( sequence ) [redirections]`
    pub(crate) fn parse_block(&mut self) -> Result<CommandNode, ParseError> {
        let open = self.offset();
        self.pos += 1;
        self.block_depth += 1;
        let body = self.parse_sequence(false)?;
        if !self.check_operator(")") {
            return Err(ParseError::new("missing closing parenthesis", open));
        }
        self.pos += 1;
        self.block_depth -= 1;

        let mut redirections = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.kind != TokenKind::Redirect {
                break;
            }
            redirections.push(self.parse_redirection()?);
        }

        let body = body.unwrap_or_else(|| {
            SequenceNode::single(CommandNode::Simple(SimpleCommandNode::default()))
        });
        Ok(CommandNode::Block(BlockNode {
            body: Box::new(body),
            redirections,
        }))
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommandNode, ParseError> {
        let mut node = SimpleCommandNode::default();
        let mut name: Option<String> = None;
        let mut current: Option<String> = None;
        let mut literal_parens = 0usize;

        loop {
            let Some(tok) = self.peek().cloned() else {
                break;
            };
            let literal = match tok.kind {
                TokenKind::Word | TokenKind::String => true,
                TokenKind::Redirect => {
                    if let Some(word) = current.take() {
                        push_word(&mut name, &mut node.args, word);
                    }
                    node.redirections.push(self.parse_redirection()?);
                    continue;
                }
                TokenKind::Operator => match tok.text.as_str() {
                    "(" => {
                        literal_parens += 1;
                        true
                    }
                    ")" if literal_parens > 0 => {
                        literal_parens -= 1;
                        true
                    }
                    _ => false,
                },
            };
            if !literal {
                break;
            }
            self.pos += 1;

            let glued = tok.leading_space.is_empty() && current.is_some();
            if name.is_some() || (current.is_some() && !glued) {
                node.raw_args.push_str(&tok.leading_space);
                node.raw_args.push_str(&tok.text);
            }
            if glued {
                if let Some(word) = current.as_mut() {
                    word.push_str(&tok.text);
                }
            } else {
                if let Some(word) = current.take() {
                    push_word(&mut name, &mut node.args, word);
                }
                current = Some(tok.text.clone());
            }
        }

        if let Some(word) = current.take() {
            push_word(&mut name, &mut node.args, word);
        }

        let name = name.unwrap_or_default();
        node.name = name.trim_start_matches('@').to_string();
        Ok(node)
    }

    /// `REM` swallows the rest of the line.
    fn parse_rem(&mut self) -> Result<SimpleCommandNode, ParseError> {
        let mut node = SimpleCommandNode {
            name: "REM".to_string(),
            ..Default::default()
        };
        self.pos += 1;
        while let Some(tok) = self.peek() {
            if tok.is_operator("\n") || (self.block_depth > 0 && tok.is_operator(")")) {
                break;
            }
            node.raw_args.push_str(&tok.leading_space);
            node.raw_args.push_str(&tok.text);
            if tok.is_word() {
                node.args.push(tok.text.clone());
            }
            self.pos += 1;
        }
        Ok(node)
    }

    pub(crate) fn parse_redirection(&mut self) -> Result<RedirectionNode, ParseError> {
        let offset = self.offset();
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::new("expected redirection", offset))?;

        let mut chars = tok.text.chars().peekable();
        let explicit_fd = match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let fd = d.to_digit(10).unwrap_or(1) as u8;
                chars.next();
                Some(fd)
            }
            _ => None,
        };
        let rest: String = chars.collect();

        let (op, default_fd) = if rest.starts_with('<') {
            (RedirectionOp::Input, 0)
        } else if rest.starts_with(">>") {
            (RedirectionOp::Append, 1)
        } else {
            (RedirectionOp::Output, 1)
        };
        let fd = explicit_fd.unwrap_or(default_fd);

        let target = match rest.split_once('&') {
            Some((_, dup)) => {
                let target_fd = dup
                    .parse::<u8>()
                    .map_err(|_| ParseError::unexpected(&tok.text, tok.start))?;
                RedirectionTarget::Fd(target_fd)
            }
            None => {
                let word = self
                    .read_word()
                    .ok_or_else(|| ParseError::unexpected(&tok.text, tok.start))?;
                RedirectionTarget::File(word.text)
            }
        };

        Ok(RedirectionNode { fd, op, target })
    }
}

fn push_word(name: &mut Option<String>, args: &mut Vec<String>, word: String) {
    if name.is_none() {
        *name = Some(word);
    } else {
        args.push(word);
    }
}

/// Parse already-expanded tokens.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Option<SequenceNode>, ParseError> {
    Parser::new(tokens).parse()
}

/// Tokenize and parse a line without percent expansion.
pub fn parse(input: &str) -> Result<Option<SequenceNode>, ParseError> {
    if input.len() > MAX_INPUT_SIZE {
        return Err(ParseError::new("line too long", MAX_INPUT_SIZE));
    }
    parse_tokens(tokenize(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{ConditionTest, ForKind};

    fn simple(node: &SequenceNode) -> &SimpleCommandNode {
        match node {
            SequenceNode::Single(CommandNode::Simple(cmd)) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_simple_command() {
        let node = parse("ECHO hello   world").unwrap().unwrap();
        let cmd = simple(&node);
        assert_eq!(cmd.name, "ECHO");
        assert_eq!(cmd.args, vec!["hello", "world"]);
        assert_eq!(cmd.raw_args, " hello   world");
    }

    #[test]
    fn test_glued_tokens_form_one_argument() {
        let node = parse(r#"ECHO a"b c"d"#).unwrap().unwrap();
        assert_eq!(simple(&node).args, vec![r#"a"b c"d"#]);
    }

    #[test]
    fn test_read_word_reports_start_offset() {
        let mut parser = Parser::new(tokenize(r#"x"y z"w next"#));
        let first = parser.read_word().unwrap();
        assert_eq!(first.text, r#"x"y z"w"#);
        assert_eq!(first.offset, 0);
        let second = parser.read_word().unwrap();
        assert_eq!(second.text, "next");
        assert_eq!(second.offset, 8);
        assert!(parser.read_word().is_none());
    }

    #[test]
    fn test_echo_with_literal_parens() {
        let node = parse("ECHO (hi)").unwrap().unwrap();
        let cmd = simple(&node);
        assert_eq!(cmd.args, vec!["(hi)"]);
        assert_eq!(cmd.raw_args, " (hi)");
    }

    #[test]
    fn test_at_prefix_is_stripped_from_name() {
        let node = parse("@ECHO off").unwrap().unwrap();
        assert_eq!(simple(&node).name, "ECHO");
    }

    #[test]
    fn test_redirections_are_excluded_from_args() {
        let node = parse("ECHO hi > out.txt 2>&1").unwrap().unwrap();
        let cmd = simple(&node);
        assert_eq!(cmd.args, vec!["hi"]);
        assert_eq!(cmd.raw_args, " hi");
        assert_eq!(cmd.redirections.len(), 2);
        assert_eq!(cmd.redirections[0].fd, 1);
        assert_eq!(
            cmd.redirections[0].target,
            RedirectionTarget::File("out.txt".to_string())
        );
        assert_eq!(cmd.redirections[1].fd, 2);
        assert_eq!(cmd.redirections[1].target, RedirectionTarget::Fd(1));
    }

    #[test]
    fn test_precedence() {
        // a & b && c | d  =>  a & (b && (c | d))
        let node = parse("a & b && c | d").unwrap().unwrap();
        match node {
            SequenceNode::Sequential(left, right) => {
                assert_eq!(simple(&left).name, "a");
                match *right {
                    SequenceNode::AndThen(b, pipe) => {
                        assert_eq!(simple(&b).name, "b");
                        assert!(matches!(*pipe, SequenceNode::Pipe(_, _)));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_and_or_is_left_associative() {
        let node = parse("a || b && c").unwrap().unwrap();
        match node {
            SequenceNode::AndThen(left, right) => {
                assert!(matches!(*left, SequenceNode::OrElse(_, _)));
                assert_eq!(simple(&right).name, "c");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pipe_stages() {
        let node = parse("a | b | c").unwrap().unwrap();
        let names: Vec<&str> = node
            .pipe_stages()
            .into_iter()
            .map(|s| simple(s).name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_operand_is_error() {
        assert!(parse("ECHO a |").is_err());
        assert!(parse("| ECHO a").is_err());
        assert!(parse("ECHO a &&").is_err());
        assert!(parse("ECHO a || || b").is_err());
    }

    #[test]
    fn test_trailing_ampersand_is_allowed() {
        let node = parse("ECHO a &").unwrap().unwrap();
        assert_eq!(simple(&node).name, "ECHO");
    }

    #[test]
    fn test_block_with_line_breaks() {
        let node = parse("(\nECHO a\n\nECHO b\n) > out.txt").unwrap().unwrap();
        match node {
            SequenceNode::Single(CommandNode::Block(block)) => {
                assert_eq!(block.redirections.len(), 1);
                assert!(matches!(*block.body, SequenceNode::Sequential(_, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_block_is_error() {
        assert!(parse("(ECHO a").is_err());
    }

    #[test]
    fn test_rem_swallows_operators() {
        let node = parse("REM a & b | c").unwrap().unwrap();
        let cmd = simple(&node);
        assert_eq!(cmd.name, "REM");
        assert_eq!(cmd.raw_args, " a & b | c");
    }

    #[test]
    fn test_if_and_for_dispatch() {
        let node = parse("IF EXIST x.txt ECHO yes").unwrap().unwrap();
        match node {
            SequenceNode::Single(CommandNode::If(if_node)) => {
                assert_eq!(
                    if_node.condition.test,
                    ConditionTest::Exist("x.txt".to_string())
                );
            }
            other => panic!("unexpected {:?}", other),
        }

        let node = parse("FOR /L %i IN (1,1,3) DO ECHO %i").unwrap().unwrap();
        match node {
            SequenceNode::Single(CommandNode::For(for_node)) => {
                assert_eq!(for_node.kind, ForKind::Range);
                assert_eq!(for_node.variable, 'i');
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_redirection_without_target_is_error() {
        assert!(parse("ECHO hi >").is_err());
    }
}
