//! Tokenizer and recursive-descent parser for inline formulas.
//!
//! The grammar follows ordinary calculator precedence:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom (('**' | '^') unary)?
//! atom   := number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Power binds tighter than a unary minus on its left (`-x**2` is `-(x**2)`)
//! and is right-associative. The parser builds the canonical [`Expr`]
//! directly; there is no intermediate syntax tree.

use super::expr::Expr;
use super::number::Number;
use crate::error::FormulaError;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn syntax(offset: usize, detail: impl Into<String>) -> FormulaError {
    FormulaError::Syntax {
        offset,
        detail: detail.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i].1 == '.' {
                i += 1;
                while i < chars.len() && chars[i].1.is_ascii_digit() {
                    i += 1;
                }
            }
            // Exponent part: 1e5, 2.5E-3
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            tokens.push(Token {
                tok: Tok::Num(text),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            tokens.push(Token {
                tok: Tok::Ident(text),
                offset,
            });
            continue;
        }

        let tok = match c {
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' if next == Some('*') => {
                i += 1;
                Tok::Pow
            }
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '^' => Tok::Pow,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            ',' => Tok::Comma,
            other => return Err(syntax(offset, format!("unexpected character '{other}'"))),
        };
        tokens.push(Token { tok, offset });
        i += 1;
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.offset).unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), FormulaError> {
        if self.peek() == Some(&want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let mut acc = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.pos += 1;
                    acc = acc.add(&self.parse_term()?)?;
                }
                Some(Tok::Minus) => {
                    self.pos += 1;
                    acc = acc.sub(&self.parse_term()?)?;
                }
                _ => break,
            }
        }
        self.leave();
        Ok(acc)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut acc = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    acc = acc.mul(&self.parse_unary()?)?;
                }
                Some(Tok::Slash) => {
                    self.pos += 1;
                    acc = acc.div(&self.parse_unary()?)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let result = match self.peek() {
            Some(Tok::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            Some(Tok::Minus) => {
                self.pos += 1;
                self.parse_unary().and_then(|e| e.neg())
            }
            _ => self.parse_power(),
        };
        self.leave();
        result
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_atom()?;
        if self.peek() == Some(&Tok::Pow) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return base.pow(&exponent);
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, FormulaError> {
        let offset = self.offset();
        let Some(token) = self.bump() else {
            return Err(syntax(offset, "unexpected end of formula"));
        };
        match &token.tok {
            Tok::Num(text) => Number::parse_literal(text)
                .map(Expr::number)
                .map_err(|e| match e {
                    FormulaError::Syntax { detail, .. } => syntax(offset, detail),
                    other => other,
                }),
            Tok::Ident(name) => {
                if self.peek() != Some(&Tok::LParen) {
                    return Ok(Expr::symbol(name.clone()));
                }
                self.pos += 1;
                if self.peek() == Some(&Tok::RParen) {
                    return Err(syntax(self.offset(), format!("{name}() needs an argument")));
                }
                let mut args = vec![self.parse_expr()?];
                while self.peek() == Some(&Tok::Comma) {
                    self.pos += 1;
                    args.push(self.parse_expr()?);
                }
                self.expect(Tok::RParen, "')'")?;
                Expr::call(name, args)
            }
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(syntax(offset, "unexpected operator")),
        }
    }
}

/// Parse `src` into its canonical form.
pub fn parse(src: &str, max_depth: usize) -> Result<Expr, FormulaError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        max_depth,
        end: src.len(),
    };
    let expr = parser.parse_expr()?;
    if parser.pos < tokens.len() {
        return Err(syntax(parser.offset(), "unexpected trailing input"));
    }
    Ok(expr)
}
