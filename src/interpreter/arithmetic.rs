//! Arithmetic Evaluation
//!
//! Evaluates `SET /A` expressions including:
//! - Basic operators (+, -, *, /, %)
//! - Bitwise operators (&, |, ^, ~, <<, >>)
//! - Logical not (!)
//! - Assignment operators (=, +=, -=, *=, /=, %=, &=, ^=, |=, <<=, >>=)
//! - Comma-separated expressions; the last value is the result
//!
//! Numbers are 32-bit signed integers with wrapping overflow. Constants may
//! be decimal (17), hexadecimal (0x11) or octal (021). Variable names are
//! read as numbers; undefined or non-numeric variables are 0.

use thiserror::Error;

use crate::interpreter::environment::Environment;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("Divide by zero error.")]
    DivideByZero,
    #[error("Missing operand.")]
    MissingOperand,
    #[error("Missing operator.")]
    MissingOperator,
    #[error("Unbalanced parenthesis.")]
    UnbalancedParenthesis,
    #[error("Invalid number.  Numeric constants are either decimal (17),\nhexadecimal (0x11), or octal (021).")]
    InvalidNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArithToken {
    Number(i32),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

// Longest operators first
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "<<", ">>", "+=", "-=", "*=", "/=", "%=", "&=", "^=", "|=", "+", "-", "*", "/",
    "%", "&", "^", "|", "!", "~", "=",
];

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "&=", "^=", "|=", "<<=", ">>="];

/// Parse an integer constant.
pub fn parse_number(text: &str) -> Result<i32, ArithmeticError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    }
    .map_err(|_| ArithmeticError::InvalidNumber)?;

    let value = if negative { -value } else { value };
    if value > i32::MAX as i64 || value < i32::MIN as i64 {
        return Err(ArithmeticError::InvalidNumber);
    }
    Ok(value as i32)
}

fn tokenize(expr: &str) -> Result<Vec<ArithToken>, ArithmeticError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '"' {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(ArithToken::Number(parse_number(&text)?));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.' | '$' | '#' | '@'))
            {
                i += 1;
            }
            tokens.push(ArithToken::Ident(chars[start..i].iter().collect()));
        } else if c == '(' {
            tokens.push(ArithToken::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(ArithToken::RParen);
            i += 1;
        } else if c == ',' {
            tokens.push(ArithToken::Comma);
            i += 1;
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                Some(op) => {
                    tokens.push(ArithToken::Op(op));
                    i += op.chars().count();
                }
                None => return Err(ArithmeticError::MissingOperator),
            }
        }
    }

    Ok(tokens)
}

struct Evaluator<'a> {
    tokens: Vec<ArithToken>,
    pos: usize,
    env: &'a mut Environment,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&ArithToken> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(ArithToken::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn variable(&self, name: &str) -> i32 {
        self.env
            .get(name)
            .and_then(|v| parse_number(v.trim()).ok())
            .unwrap_or(0)
    }

    fn expr_list(&mut self) -> Result<i32, ArithmeticError> {
        let mut value = self.assignment()?;
        while self.peek() == Some(&ArithToken::Comma) {
            self.pos += 1;
            value = self.assignment()?;
        }
        Ok(value)
    }

    fn assignment(&mut self) -> Result<i32, ArithmeticError> {
        if let (Some(ArithToken::Ident(name)), Some(ArithToken::Op(op))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            if ASSIGN_OPS.contains(op) {
                let name = name.clone();
                let op: &'static str = op;
                self.pos += 2;
                let rhs = self.assignment()?;
                let value = if op == "=" {
                    rhs
                } else {
                    apply_binary(self.variable(&name), rhs, &op[..op.len() - 1])?
                };
                self.env.set(name, value.to_string());
                return Ok(value);
            }
        }
        self.binary(0)
    }

    /// Precedence levels, loosest first.
    fn binary(&mut self, level: usize) -> Result<i32, ArithmeticError> {
        const LEVELS: &[&[&str]] = &[&["|"], &["^"], &["&"], &["<<", ">>"], &["+", "-"], &["*", "/", "%"]];
        if level >= LEVELS.len() {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.peek_op().filter(|op| LEVELS[level].contains(op)) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = apply_binary(left, right, op)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<i32, ArithmeticError> {
        match self.peek_op() {
            Some("!") => {
                self.pos += 1;
                Ok((self.unary()? == 0) as i32)
            }
            Some("~") => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some("-") => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some("+") => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i32, ArithmeticError> {
        match self.peek().cloned() {
            Some(ArithToken::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(ArithToken::Ident(name)) => {
                self.pos += 1;
                Ok(self.variable(&name))
            }
            Some(ArithToken::LParen) => {
                self.pos += 1;
                let value = self.expr_list()?;
                if self.peek() != Some(&ArithToken::RParen) {
                    return Err(ArithmeticError::UnbalancedParenthesis);
                }
                self.pos += 1;
                Ok(value)
            }
            _ => Err(ArithmeticError::MissingOperand),
        }
    }
}

fn apply_binary(left: i32, right: i32, op: &str) -> Result<i32, ArithmeticError> {
    Ok(match op {
        "+" => left.wrapping_add(right),
        "-" => left.wrapping_sub(right),
        "*" => left.wrapping_mul(right),
        "/" => {
            if right == 0 {
                return Err(ArithmeticError::DivideByZero);
            }
            left.wrapping_div(right)
        }
        "%" => {
            if right == 0 {
                return Err(ArithmeticError::DivideByZero);
            }
            left.wrapping_rem(right)
        }
        "&" => left & right,
        "|" => left | right,
        "^" => left ^ right,
        "<<" => left.wrapping_shl(right as u32 & 31),
        ">>" => left.wrapping_shr(right as u32 & 31),
        _ => return Err(ArithmeticError::MissingOperator),
    })
}

/// Evaluate `expr`, performing its assignments in `env`.
pub fn evaluate_arithmetic(expr: &str, env: &mut Environment) -> Result<i32, ArithmeticError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ArithmeticError::MissingOperand);
    }
    let mut evaluator = Evaluator { tokens, pos: 0, env };
    let value = evaluator.expr_list()?;
    match evaluator.peek() {
        None => Ok(value),
        Some(ArithToken::RParen) => Err(ArithmeticError::UnbalancedParenthesis),
        Some(_) => Err(ArithmeticError::MissingOperator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Result<i32, ArithmeticError> {
        evaluate_arithmetic(expr, &mut Environment::new())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(7));
        assert_eq!(eval("(1 + 2) * 3"), Ok(9));
        assert_eq!(eval("1 | 2 & 3"), Ok(3));
        assert_eq!(eval("1 << 4 + 1"), Ok(32));
        assert_eq!(eval("-7 / 2"), Ok(-3));
        assert_eq!(eval("7 % 3"), Ok(1));
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("!0"), Ok(1));
        assert_eq!(eval("!5"), Ok(0));
        assert_eq!(eval("~0"), Ok(-1));
        assert_eq!(eval("- -3"), Ok(3));
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(eval("0x1F"), Ok(31));
        assert_eq!(eval("010"), Ok(8));
        assert_eq!(eval("08"), Err(ArithmeticError::InvalidNumber));
        assert_eq!(eval("99999999999"), Err(ArithmeticError::InvalidNumber));
    }

    #[test]
    fn test_assignments_update_environment() {
        let mut env = Environment::new();
        assert_eq!(evaluate_arithmetic("x = 5, y = x * 2", &mut env), Ok(10));
        assert_eq!(env.get("X"), Some("5"));
        assert_eq!(env.get("y"), Some("10"));
        assert_eq!(evaluate_arithmetic("x += 3", &mut env), Ok(8));
        assert_eq!(evaluate_arithmetic("x <<= 1", &mut env), Ok(16));
        assert_eq!(env.get("x"), Some("16"));
    }

    #[test]
    fn test_undefined_variable_is_zero() {
        assert_eq!(eval("missing + 1"), Ok(1));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("1 / 0"), Err(ArithmeticError::DivideByZero));
        assert_eq!(eval("1 +"), Err(ArithmeticError::MissingOperand));
        assert_eq!(eval("(1 + 2"), Err(ArithmeticError::UnbalancedParenthesis));
        assert_eq!(eval("1 2"), Err(ArithmeticError::MissingOperator));
        assert_eq!(eval(""), Err(ArithmeticError::MissingOperand));
    }

    #[test]
    fn test_wrapping_overflow() {
        assert_eq!(eval("2147483647 + 1"), Ok(i32::MIN));
    }
}
