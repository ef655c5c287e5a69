//! Extraction expressions
//!
//! A small expression language over JSON payloads:
//!
//! ```text
//! expr    := logic ( "?" expr ":" expr )?
//! logic   := operand ( op operand )*      precedence: || < && < compare < + - < * / %
//! operand := ( "-" | "!" )* primary
//! primary := number | string | true | false | null | path | "(" expr ")"
//! path    := ( "$" | "@" ) segments
//! ```
//!
//! `+` concatenates when either side is a string. Arithmetic results with no
//! fractional part are emitted as JSON integers.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::jsonpath::{CompiledPath, PathError};
use super::number_value;

/// Expression compile and evaluation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("unexpected character `{found}` at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unterminated bracket in path starting at offset {0}")]
    UnterminatedBracket(usize),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("unexpected `{found}`, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("cannot apply `{operator}` to {left} and {right}")]
    TypeMismatch { operator: &'static str, left: &'static str, right: &'static str },

    #[error("cannot apply `{operator}` to {operand}")]
    InvalidOperand { operator: &'static str, operand: &'static str },

    #[error("division by zero")]
    DivisionByZero,
}

type ExprResult<T> = Result<T, ExpressionError>;

/// A compiled expression, reusable across payloads.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn compile(source: &str) -> ExprResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, position: 0 };
        let root = parser.parse_expression()?;
        if let Some(token) = parser.peek() {
            return Err(ExpressionError::UnexpectedToken {
                found: token.to_string(),
                expected: "end of expression",
            });
        }
        Ok(Self { source: source.to_string(), root })
    }

    pub fn evaluate(&self, data: &Value) -> ExprResult<Value> {
        evaluate(&self.root, data)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Path(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Question,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Path(p) | Self::Ident(p) => write!(f, "{p}"),
            Self::Op(op) => write!(f, "{op}"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Question => write!(f, "?"),
            Self::Colon => write!(f, ":"),
        }
    }
}

fn tokenize(source: &str) -> ExprResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '$' | '@' => {
                let end = scan_path(&chars, i)?;
                tokens.push(Token::Path(chars[i..end].iter().collect()));
                i = end;
            }
            '0'..='9' => {
                let (number, end) = scan_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = end;
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (number, end) = scan_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = end;
            }
            '"' | '\'' => {
                let (text, end) = scan_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = end;
            }
            '(' | ')' | '?' | ':' | '+' | '-' | '*' | '/' | '%' => {
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '?' => Token::Question,
                    ':' => Token::Colon,
                    '+' => Token::Op("+"),
                    '-' => Token::Op("-"),
                    '*' => Token::Op("*"),
                    '/' => Token::Op("/"),
                    _ => Token::Op("%"),
                });
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let with_eq = next == Some('=');
                let op = match (c, with_eq) {
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('!', false) => "!",
                    ('<', true) => "<=",
                    ('<', false) => "<",
                    ('>', true) => ">=",
                    ('>', false) => ">",
                    _ => return Err(ExpressionError::UnexpectedChar { found: c, offset: i }),
                };
                tokens.push(Token::Op(op));
                i += if with_eq { 2 } else { 1 };
            }
            '&' | '|' => {
                if next != Some(c) {
                    return Err(ExpressionError::UnexpectedChar { found: c, offset: i });
                }
                tokens.push(Token::Op(if c == '&' { "&&" } else { "||" }));
                i += 2;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while chars.get(i).is_some_and(|ch| ch.is_alphanumeric() || *ch == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(ExpressionError::UnexpectedChar { found: c, offset: i }),
        }
    }

    Ok(tokens)
}

fn scan_path(chars: &[char], start: usize) -> ExprResult<usize> {
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            Some('.') => {
                i += 1;
                if chars.get(i) == Some(&'.') {
                    i += 1;
                }
                if chars.get(i) == Some(&'*') {
                    i += 1;
                    continue;
                }
                while chars.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
                    i += 1;
                }
            }
            Some('[') => i = scan_brackets(chars, i)?,
            _ => return Ok(i),
        }
    }
}

fn scan_brackets(chars: &[char], start: usize) -> ExprResult<usize> {
    let mut depth = 0_usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = start;

    while let Some(&c) = chars.get(i) {
        i += 1;
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(ExpressionError::UnterminatedBracket(start))
}

fn scan_number(chars: &[char], start: usize) -> ExprResult<(f64, usize)> {
    let mut i = start;
    let digits = |i: &mut usize| {
        while chars.get(*i).is_some_and(char::is_ascii_digit) {
            *i += 1;
        }
    };

    digits(&mut i);
    if chars.get(i) == Some(&'.') {
        i += 1;
        digits(&mut i);
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mark = i;
        i += 1;
        if matches!(chars.get(i), Some('+' | '-')) {
            i += 1;
        }
        if chars.get(i).is_some_and(char::is_ascii_digit) {
            digits(&mut i);
        } else {
            i = mark;
        }
    }

    let text: String = chars[start..i].iter().collect();
    text.parse::<f64>().map(|n| (n, i)).map_err(|_| ExpressionError::InvalidNumber(text))
}

fn scan_string(chars: &[char], start: usize) -> ExprResult<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while let Some(&c) = chars.get(i) {
        i += 1;
        match c {
            '\\' => {
                let escaped = chars.get(i).ok_or(ExpressionError::UnterminatedString(start))?;
                i += 1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
            }
            c if c == quote => return Ok((text, i)),
            c => text.push(c),
        }
    }
    Err(ExpressionError::UnterminatedString(start))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Rem => 5,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Path(CompiledPath),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Conditional(Box<Node>, Box<Node>, Box<Node>),
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, expected: &Token, description: &'static str) -> ExprResult<()> {
        match self.advance() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => {
                Err(ExpressionError::UnexpectedToken { found: token.to_string(), expected: description })
            }
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn parse_expression(&mut self) -> ExprResult<Node> {
        let condition = self.parse_binary(1)?;
        if self.eat(&Token::Question) {
            let then = self.parse_expression()?;
            self.expect(&Token::Colon, "`:`")?;
            let otherwise = self.parse_expression()?;
            return Ok(Node::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)));
        }
        Ok(condition)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ExprResult<Node> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_binary() {
            if op.precedence() < min_precedence {
                break;
            }
            self.position += 1;
            let right = self.parse_binary(op.precedence() + 1)?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(symbol)) => BinaryOp::from_symbol(symbol),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> ExprResult<Node> {
        match self.peek() {
            Some(Token::Op("-")) => {
                self.position += 1;
                Ok(Node::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Some(Token::Op("!")) => {
                self.position += 1;
                Ok(Node::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ExprResult<Node> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Node::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Node::Literal(Value::String(s))),
            Some(Token::Path(p)) => Ok(Node::Path(CompiledPath::parse(&p)?)),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Node::Literal(Value::Bool(true))),
                "false" => Ok(Node::Literal(Value::Bool(false))),
                "null" | "nil" => Ok(Node::Literal(Value::Null)),
                _ => Err(ExpressionError::UnexpectedToken { found: ident, expected: "a value" }),
            },
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(token) => {
                Err(ExpressionError::UnexpectedToken { found: token.to_string(), expected: "a value" })
            }
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn evaluate(node: &Node, data: &Value) -> ExprResult<Value> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Path(path) => Ok(path.select(data)?),
        Node::Unary(UnaryOp::Neg, inner) => {
            let value = evaluate(inner, data)?;
            let n = value
                .as_f64()
                .ok_or(ExpressionError::InvalidOperand { operator: "-", operand: kind(&value) })?;
            Ok(number_value(-n))
        }
        Node::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&evaluate(inner, data)?))),
        Node::Binary(BinaryOp::And, left, right) => {
            Ok(Value::Bool(truthy(&evaluate(left, data)?) && truthy(&evaluate(right, data)?)))
        }
        Node::Binary(BinaryOp::Or, left, right) => {
            Ok(Value::Bool(truthy(&evaluate(left, data)?) || truthy(&evaluate(right, data)?)))
        }
        Node::Binary(op, left, right) => apply(*op, &evaluate(left, data)?, &evaluate(right, data)?),
        Node::Conditional(condition, then, otherwise) => {
            if truthy(&evaluate(condition, data)?) {
                evaluate(then, data)
            } else {
                evaluate(otherwise, data)
            }
        }
    }
}

fn apply(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    let mismatch =
        || ExpressionError::TypeMismatch { operator: op.symbol(), left: kind(left), right: kind(right) };

    match op {
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(format!("{}{}", display(left), display(right))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = left.as_f64().zip(right.as_f64()).ok_or_else(mismatch)?;
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Err(ExpressionError::DivisionByZero),
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(number_value(result))
        }
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loosely_equal(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(mismatch)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => truthy(left) && truthy(right),
            _ => truthy(left) || truthy(right),
        })),
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
