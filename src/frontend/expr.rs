//! Condition expression parser
//!
//! Precedence, lowest first: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//! `* / %`, unary `! -`, then postfix access (`.field`, `['key']`, calls).
//! A surrounding `${{ }}` is stripped before parsing.

use crate::ast::{BinaryOp, Expression, Literal, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprParseError {
    pub message: String,
}

impl ExprParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn parse_expression(raw: &str) -> Result<Expression, ExprParseError> {
    let text = strip_wrapper(raw);
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return Err(ExprParseError::new(format!(
            "unexpected token {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(expr)
}

fn strip_wrapper(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("${{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .unwrap_or(trimmed)
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
];

fn tokenize(text: &str) -> Result<Vec<Token>, ExprParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            b']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'.' if !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            b'\'' | b'"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(ExprParseError::new("unterminated string")),
                        // '' is an escaped quote in platform expressions
                        Some(&b) if b == quote && bytes.get(i + 1) == Some(&quote) => {
                            value.push(quote as char);
                            i += 2;
                        }
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(_) => {
                            let ch = text[i..].chars().next().unwrap_or('\u{FFFD}');
                            value.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let literal = &text[start..i];
                if literal.contains('.') {
                    let value = literal
                        .parse::<f64>()
                        .map_err(|_| ExprParseError::new(format!("invalid number '{}'", literal)))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = literal
                        .parse::<i64>()
                        .map_err(|_| ExprParseError::new(format!("invalid number '{}'", literal)))?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(text[start..i].to_string()));
            }
            _ => {
                let rest = &text[i..];
                match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => {
                        tokens.push(Token::Op(op));
                        i += op.len();
                    }
                    None => {
                        return Err(ExprParseError::new(format!(
                            "unexpected character '{}'",
                            rest.chars().next().unwrap_or('?')
                        )))
                    }
                }
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Parser) -> Result<Expression, ExprParseError>,
    ) -> Result<Expression, ExprParseError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expression::Binary {
                op: binary_op(op),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["||"], Parser::and)
    }

    fn and(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["&&"], Parser::equality)
    }

    fn equality(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["==", "!="], Parser::comparison)
    }

    fn comparison(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["<", "<=", ">", ">="], Parser::additive)
    }

    fn additive(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["+", "-"], Parser::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expression, ExprParseError> {
        self.binary_level(&["*", "/", "%"], Parser::unary)
    }

    fn unary(&mut self) -> Result<Expression, ExprParseError> {
        match self.eat_op(&["!", "-"]) {
            Some(op) => {
                let operand = self.unary()?;
                Ok(Expression::Unary {
                    op: if op == "!" { UnaryOp::Not } else { UnaryOp::Neg },
                    operand: Box::new(operand),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expression, ExprParseError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprParseError::new("expected ')'")),
                }
            }
            Some(Token::Str(s)) => Ok(Expression::Literal(Literal::String(s))),
            Some(Token::Int(n)) => Ok(Expression::Literal(Literal::Int(n))),
            Some(Token::Float(f)) => Ok(Expression::Literal(Literal::Float(f))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expression::Literal(Literal::Bool(true))),
                "false" => Ok(Expression::Literal(Literal::Bool(false))),
                "null" => Ok(Expression::Literal(Literal::Null)),
                _ if self.peek() == Some(&Token::LParen) => self.call(name),
                _ => self.path(name),
            },
            Some(other) => Err(ExprParseError::new(format!("unexpected token {:?}", other))),
            None => Err(ExprParseError::new("unexpected end of expression")),
        }
    }

    fn call(&mut self, name: String) -> Result<Expression, ExprParseError> {
        // consume '('
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(Expression::Call { name, args });
        }
        loop {
            args.push(self.or()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(ExprParseError::new("expected ',' or ')' in call")),
            }
        }
        Ok(Expression::Call { name, args })
    }

    fn path(&mut self, head: String) -> Result<Expression, ExprParseError> {
        let mut segments = vec![head];
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(seg)) => segments.push(seg),
                        Some(Token::Op("*")) => segments.push("*".to_string()),
                        _ => return Err(ExprParseError::new("expected property name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let segment = match self.next() {
                        Some(Token::Str(s)) => s,
                        Some(Token::Int(n)) => n.to_string(),
                        Some(Token::Op("*")) => "*".to_string(),
                        _ => return Err(ExprParseError::new("expected index inside '[]'")),
                    };
                    if self.next() != Some(Token::RBracket) {
                        return Err(ExprParseError::new("expected ']'"));
                    }
                    segments.push(segment);
                }
                _ => break,
            }
        }

        if segments.len() == 4 && segments[0] == "needs" && segments[2] == "outputs" {
            return Ok(Expression::OutputRef {
                job: segments[1].clone(),
                output: segments[3].clone(),
            });
        }
        Ok(Expression::Context(segments))
    }
}

fn binary_op(op: &str) -> BinaryOp {
    match op {
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "&&" => BinaryOp::And,
        "||" => BinaryOp::Or,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => BinaryOp::Rem,
    }
}
