//! Expression parser: free-form math text → [`Expr`].
//!
//! Accepts the notation OCR and structuring models actually emit rather
//! than a strict grammar: implicit multiplication (`2x`, `3x^2`, `2(x+1)`),
//! Python-style `**`, Unicode minus/times/division signs, `√` as `sqrt`,
//! and function application with or without parentheses (`sin x`).
//!
//! Multi-letter alphabetic runs that are not known function names are split
//! into single-letter variables (`xy` parses as `x*y`), matching the
//! convention of handwritten algebra.

use super::{Expr, Func};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),

    #[error("expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("unexpected '{0}' in expression")]
    UnexpectedToken(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Var(char),
    Func(Func),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn lex(input: &str) -> Result<Vec<Tok>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' | ',' => i += 1,
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' | '−' | '–' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '*' | '·' | '×' => {
                if c == '*' && chars.get(i + 1) == Some(&'*') {
                    tokens.push(Tok::Caret);
                    i += 2;
                } else {
                    tokens.push(Tok::Star);
                    i += 1;
                }
            }
            '/' | '÷' => {
                tokens.push(Tok::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Tok::Caret);
                i += 1;
            }
            '(' | '[' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' | ']' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '√' => {
                tokens.push(Tok::Func(Func::Sqrt));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::UnexpectedToken(text))?;
                tokens.push(Tok::Num(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let lower = word.to_ascii_lowercase();
                if let Some(func) = Func::from_name(&lower) {
                    tokens.push(Tok::Func(func));
                } else if lower == "pi" {
                    tokens.push(Tok::Num(std::f64::consts::PI));
                } else {
                    // handwritten-algebra convention: "xy" means x*y
                    for v in word.chars() {
                        tokens.push(Tok::Var(v));
                    }
                }
            }
            other => return Err(ParseError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Plus => {
                    self.next();
                    lhs = Expr::add(lhs, self.term()?);
                }
                Tok::Minus => {
                    self.next();
                    lhs = Expr::sub(lhs, self.term()?);
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.next();
                    lhs = Expr::mul(lhs, self.unary()?);
                }
                Some(Tok::Slash) => {
                    self.next();
                    lhs = Expr::div(lhs, self.unary()?);
                }
                // adjacency is multiplication: 2x, 3(x+1), x sin(x)
                Some(Tok::Num(_)) | Some(Tok::Var(_)) | Some(Tok::Func(_))
                | Some(Tok::LParen) => {
                    lhs = Expr::mul(lhs, self.unary()?);
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.next();
                Ok(Expr::neg(self.unary()?))
            }
            Some(Tok::Plus) => {
                self.next();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.atom()?;
        if let Some(Tok::Caret) = self.peek() {
            self.next();
            // right-associative; exponent may carry its own sign: x^-2
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Tok::Num(v)) => Ok(Expr::num(v)),
            Some(Tok::Var(name)) => Ok(Expr::var(name.to_string())),
            Some(Tok::Func(func)) => {
                let arg = if let Some(Tok::LParen) = self.peek() {
                    self.next();
                    let inner = self.expr()?;
                    match self.next() {
                        Some(Tok::RParen) => inner,
                        Some(other) => return Err(ParseError::UnexpectedToken(describe(&other))),
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                } else {
                    // bare application binds tightly: sin x^2 = sin(x^2)
                    self.unary()?
                };
                Ok(Expr::call(func, arg))
            }
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    Some(other) => Err(ParseError::UnexpectedToken(describe(&other))),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ParseError::UnexpectedToken(describe(&other))),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Num(v) => v.to_string(),
        Tok::Var(c) => c.to_string(),
        Tok::Func(f) => f.name().to_string(),
        Tok::Plus => "+".to_string(),
        Tok::Minus => "-".to_string(),
        Tok::Star => "*".to_string(),
        Tok::Slash => "/".to_string(),
        Tok::Caret => "^".to_string(),
        Tok::LParen => "(".to_string(),
        Tok::RParen => ")".to_string(),
    }
}

/// Parse free-form expression text into an [`Expr`].
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err(ParseError::UnexpectedEnd);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    match parser.next() {
        None => Ok(expr),
        Some(tok) => Err(ParseError::UnexpectedToken(describe(&tok))),
    }
}
