//! Abstract Syntax Tree (AST) Types for Command Lines
//!
//! This module defines the AST produced by the parser for one logical line.
//! A logical line is a tree of [`SequenceNode`]s whose leaves are
//! [`CommandNode`]s: simple commands, parenthesized blocks, `IF` and `FOR`.
//!
//! Words are stored after percent expansion but before loop-variable
//! substitution, which happens per iteration at execution time.

use std::fmt;

// =============================================================================
// SEQUENCES
// =============================================================================

/// A command sequence: commands joined by `|`, `&&`, `||` and `&`.
///
/// `&&`/`||` short-circuit on the left operand's exit status; `&` always
/// executes both sides.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceNode {
    Single(CommandNode),
    /// `left | right`
    Pipe(Box<SequenceNode>, Box<SequenceNode>),
    /// `left & right` (also a line break inside a block)
    Sequential(Box<SequenceNode>, Box<SequenceNode>),
    /// `left && right`
    AndThen(Box<SequenceNode>, Box<SequenceNode>),
    /// `left || right`
    OrElse(Box<SequenceNode>, Box<SequenceNode>),
}

impl SequenceNode {
    pub fn single(command: CommandNode) -> Self {
        SequenceNode::Single(command)
    }

    pub fn pipe(left: SequenceNode, right: SequenceNode) -> Self {
        SequenceNode::Pipe(Box::new(left), Box::new(right))
    }

    pub fn sequential(left: SequenceNode, right: SequenceNode) -> Self {
        SequenceNode::Sequential(Box::new(left), Box::new(right))
    }

    pub fn and_then(left: SequenceNode, right: SequenceNode) -> Self {
        SequenceNode::AndThen(Box::new(left), Box::new(right))
    }

    pub fn or_else(left: SequenceNode, right: SequenceNode) -> Self {
        SequenceNode::OrElse(Box::new(left), Box::new(right))
    }

    /// Flatten a left-nested pipe tree into its stages, leftmost first.
    pub fn pipe_stages(&self) -> Vec<&SequenceNode> {
        match self {
            SequenceNode::Pipe(left, right) => {
                let mut stages = left.pipe_stages();
                stages.extend(right.pipe_stages());
                stages
            }
            other => vec![other],
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Union of all command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    Block(BlockNode),
    If(IfNode),
    For(ForNode),
}

/// Simple command: name args... with optional redirections
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommandNode {
    /// Command name as written (may be empty for a redirection-only command)
    pub name: String,
    /// Arguments, split on whitespace; quotes are preserved
    pub args: Vec<String>,
    /// Argument text exactly as written after the name, including the
    /// leading delimiter. `ECHO` and `SET` read this instead of `args`.
    pub raw_args: String,
    /// I/O redirections, in source order
    pub redirections: Vec<RedirectionNode>,
}

impl SimpleCommandNode {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        let raw_args = args.iter().map(|a| format!(" {}", a)).collect();
        Self {
            name: name.into(),
            args,
            raw_args,
            redirections: Vec::new(),
        }
    }
}

/// Parenthesized block: `( commands )`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub body: Box<SequenceNode>,
    pub redirections: Vec<RedirectionNode>,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionOp {
    /// `<`
    Input,
    /// `>`
    Output,
    /// `>>`
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectionTarget {
    File(String),
    /// `>&N` duplicates another stream
    Fd(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionNode {
    /// Stream being redirected: 0 stdin, 1 stdout, 2 stderr
    pub fd: u8,
    pub op: RedirectionOp,
    pub target: RedirectionTarget,
}

// =============================================================================
// IF
// =============================================================================

/// `IF [/I] [NOT] condition command [ELSE command]`
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub condition: ConditionNode,
    pub then_branch: Box<SequenceNode>,
    pub else_branch: Option<Box<SequenceNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    pub negated: bool,
    pub case_insensitive: bool,
    pub test: ConditionTest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTest {
    /// `EXIST path` (wildcards allowed)
    Exist(String),
    /// `DEFINED name`
    Defined(String),
    /// `ERRORLEVEL n`: last exit status >= n
    ErrorLevel(String),
    /// `left == right` or `left OP right`
    Compare {
        left: String,
        op: CompareOp,
        right: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`, always a string comparison
    Equal,
    Equ,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl CompareOp {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "EQU" => Some(CompareOp::Equ),
            "NEQ" => Some(CompareOp::Neq),
            "LSS" => Some(CompareOp::Lss),
            "LEQ" => Some(CompareOp::Leq),
            "GTR" => Some(CompareOp::Gtr),
            "GEQ" => Some(CompareOp::Geq),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equal => "==",
            CompareOp::Equ => "EQU",
            CompareOp::Neq => "NEQ",
            CompareOp::Lss => "LSS",
            CompareOp::Leq => "LEQ",
            CompareOp::Gtr => "GTR",
            CompareOp::Geq => "GEQ",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// FOR
// =============================================================================

/// `FOR [switch] %v IN (set) DO command`
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    /// Loop variable letter (case-sensitive)
    pub variable: char,
    pub kind: ForKind,
    /// Items of the set, split on standard delimiters
    pub items: Vec<String>,
    /// Text between the set's parentheses, as written
    pub raw_set: String,
    pub body: Box<SequenceNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForKind {
    /// Plain `FOR`: literals and file wildcards
    Items,
    /// `FOR /D`: directory wildcards
    Directories,
    /// `FOR /R [root]`: the set applied in every directory below root
    Recursive { root: Option<String> },
    /// `FOR /L`: `(start,step,end)`
    Range,
    /// `FOR /F ["options"]`: lines of files, strings or command output
    Lines { options: String },
}
