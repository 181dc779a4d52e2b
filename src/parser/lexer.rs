//! Lexer for Command Lines
//!
//! The lexer splits one logical line into words, operators and redirections.
//! It handles:
//! - Double-quoted regions (a quote never spans a line break)
//! - Caret escapes outside quotes (`^&` is a literal `&`)
//! - Operators `&`, `&&`, `|`, `||`, `(`, `)` and line breaks
//! - Redirections `<`, `>`, `>>` with optional stream prefix and `>&N`
//!
//! Quote characters are kept in token text; carets are consumed. A closing
//! parenthesis is an operator only while a block is open, otherwise it is an
//! ordinary word character. An unterminated quote extends to the end of the
//! line.

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Bare or partially quoted word
    Word,
    /// Word that is exactly one double-quoted region
    String,
    /// `&`, `&&`, `|`, `||`, `(`, `)` or a line break inside a block
    Operator,
    /// `<`, `>`, `>>`, `2>`, `2>>`, `2>&1`, `1>&2`, ...
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Character offset of the first source character
    pub start: usize,
    /// Character offset one past the last source character
    pub end: usize,
    /// Whitespace between the previous token and this one
    pub leading_space: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
            leading_space: String::new(),
        }
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::String)
    }

    /// Source text that tokenizes back to this token.
    pub fn to_source(&self) -> String {
        match self.kind {
            TokenKind::Operator | TokenKind::Redirect => self.text.clone(),
            TokenKind::Word | TokenKind::String => escape_word(&self.text),
        }
    }
}

/// Characters that end a word outside quotes
fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '&' | '|' | '<' | '>' | '(')
}

fn escape_word(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    for c in text.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')' | ' ' | '\t') {
            out.push('^');
        }
        out.push(c);
    }
    out
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    paren_depth: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            paren_depth: 0,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut leading = String::new();

        while let Some(c) = self.peek(0) {
            let start = self.pos;
            let token = match c {
                ' ' | '\t' | '\r' => {
                    leading.push(c);
                    self.pos += 1;
                    continue;
                }
                '\n' => {
                    self.pos += 1;
                    Token::new(TokenKind::Operator, "\n", start, self.pos)
                }
                '&' | '|' => {
                    let doubled = self.peek(1) == Some(c);
                    self.pos += if doubled { 2 } else { 1 };
                    let text: String = self.chars[start..self.pos].iter().collect();
                    Token::new(TokenKind::Operator, text, start, self.pos)
                }
                '(' => {
                    self.paren_depth += 1;
                    self.pos += 1;
                    Token::new(TokenKind::Operator, "(", start, self.pos)
                }
                ')' if self.paren_depth > 0 => {
                    self.paren_depth -= 1;
                    self.pos += 1;
                    Token::new(TokenKind::Operator, ")", start, self.pos)
                }
                '<' | '>' => self.read_redirect(None),
                d @ '0'..='9' if matches!(self.peek(1), Some('<') | Some('>')) => {
                    self.pos += 1;
                    self.read_redirect(Some(d))
                }
                _ => self.read_word(),
            };
            tokens.push(Token {
                leading_space: std::mem::take(&mut leading),
                ..token
            });
        }

        tokens
    }

    /// Read a redirection operator; the stream digit, if any, is consumed.
    fn read_redirect(&mut self, fd: Option<char>) -> Token {
        let start = if fd.is_some() { self.pos - 1 } else { self.pos };
        let mut text = String::new();
        if let Some(d) = fd {
            text.push(d);
        }

        let op = self.peek(0).unwrap_or('>');
        text.push(op);
        self.pos += 1;

        if op == '>' && self.peek(0) == Some('>') {
            text.push('>');
            self.pos += 1;
        } else if self.peek(0) == Some('&') && self.peek(1).map_or(false, |d| d.is_ascii_digit()) {
            text.push('&');
            if let Some(d) = self.peek(1) {
                text.push(d);
            }
            self.pos += 2;
        }

        Token::new(TokenKind::Redirect, text, start, self.pos)
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        let mut text = String::new();
        let mut quoted_only = self.peek(0) == Some('"');
        let mut regions = 0;

        while let Some(c) = self.peek(0) {
            match c {
                '"' => {
                    regions += 1;
                    if regions > 1 {
                        quoted_only = false;
                    }
                    text.push('"');
                    self.pos += 1;
                    while let Some(q) = self.peek(0) {
                        if q == '\n' {
                            break;
                        }
                        text.push(q);
                        self.pos += 1;
                        if q == '"' {
                            break;
                        }
                    }
                }
                '^' => {
                    quoted_only = false;
                    self.pos += 1;
                    match self.peek(0) {
                        Some('\n') | None => {}
                        Some(escaped) => {
                            text.push(escaped);
                            self.pos += 1;
                        }
                    }
                }
                ')' if self.paren_depth > 0 => break,
                c if is_word_boundary(c) => break,
                c => {
                    quoted_only = false;
                    text.push(c);
                    self.pos += 1;
                }
            }
        }

        let kind = if quoted_only && regions == 1 {
            TokenKind::String
        } else {
            TokenKind::Word
        };
        Token::new(kind, text, start, self.pos)
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}

/// Rebuild source text from tokens; tokenizing the result yields the same
/// kinds and texts.
pub fn to_source(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_source)
        .collect::<Vec<_>>()
        .join(" ")
}
