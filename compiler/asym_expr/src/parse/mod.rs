//! Markup parser.
//!
//! Reads the LaTeX subset produced by [`crate::to_latex`] (and the common
//! hand-written variants of it) back into an [`Expr`]:
//!
//! - sums and differences, explicit (`*`, `\cdot`, `\times`, `/`) and
//!   implicit products, `^` powers, unary minus
//! - `\frac`, `\dfrac`, `\sqrt`, `\sqrt[k]`
//! - `\log`, `\lg`, `\ln` (bare or with `_{base}` and `^{k}`)
//! - `\sum_{i=lo}^{hi} term`
//! - `C_{k}` cost units and `\tau_{k}` placeholders
//! - `f(x, y)` applications (name immediately followed by a parenthesis)
//!
//! Grouping commands (`\left`, `\right`, `\big`, ...) and spacing are
//! dropped by the tokenizer. Unspecified-base and natural logarithms are
//! read as base 2; they differ by a constant factor.

mod lexer;

use std::fmt;

use num_bigint::BigInt;

use crate::expr::{Expr, Rational};
use lexer::{tokenize, RawToken, Token};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidCharacter,
    InvalidNumber,
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        name: String,
    },
}

/// A markup string that could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset into the input.
    pub offset: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, offset: usize) -> Self {
        ParseError { kind, offset }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::InvalidCharacter => write!(f, "invalid character")?,
            ParseErrorKind::InvalidNumber => write!(f, "invalid number")?,
            ParseErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "unexpected `{found}`, expected {expected}")?;
            }
            ParseErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")?;
            }
            ParseErrorKind::UnknownCommand { name } => write!(f, "unknown command `\\{name}`")?,
        }
        write!(f, " at offset {}", self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Parse markup into an expression. Every name becomes a variable.
pub fn parse_markup(source: &str) -> Result<Expr, ParseError> {
    parse_markup_with_constants(source, &[])
}

/// Parse markup, reading the listed names as symbolic constants
/// ([`Expr::Prob`]) instead of variables.
pub fn parse_markup_with_constants(source: &str, constants: &[&str]) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        constants,
    };
    let expr = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(parser.unexpected(tok, "end of input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    constants: &'a [&'a str],
}

impl<'a> Parser<'a> {
    // Cursor

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<RawToken> {
        self.peek().map(|t| t.kind)
    }

    fn at(&self, kind: RawToken) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn at_command(&self, names: &[&str]) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == RawToken::Command && names.contains(&self.command_name(t)))
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn eat(&mut self, kind: RawToken) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: RawToken, expected: &'static str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(self.unexpected(tok, expected)),
            None => Err(self.end(expected)),
        }
    }

    fn text(&self, tok: Token) -> &'a str {
        &self.source[tok.start..tok.end]
    }

    fn command_name(&self, tok: Token) -> &'a str {
        &self.source[tok.start + 1..tok.end]
    }

    fn unexpected(&self, tok: Token, expected: &'static str) -> ParseError {
        ParseError::new(
            ParseErrorKind::UnexpectedToken {
                found: self.text(tok).to_owned(),
                expected,
            },
            tok.start,
        )
    }

    fn end(&self, expected: &'static str) -> ParseError {
        ParseError::new(ParseErrorKind::UnexpectedEnd { expected }, self.source.len())
    }

    // Grammar

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_term()?];
        loop {
            if self.eat(RawToken::Plus) {
                terms.push(self.parse_term()?);
            } else if self.eat(RawToken::Minus) {
                terms.push(-self.parse_term()?);
            } else {
                break;
            }
        }
        Ok(Expr::add_all(terms))
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut factors = vec![self.parse_unary()?];
        loop {
            if self.eat(RawToken::Star) {
                factors.push(self.parse_unary()?);
            } else if self.at_command(&["cdot", "times"]) {
                self.pos += 1;
                factors.push(self.parse_unary()?);
            } else if self.eat(RawToken::Slash) {
                factors.push(Expr::powi(self.parse_unary()?, -1));
            } else if self.starts_atom() {
                factors.push(self.parse_power()?);
            } else {
                break;
            }
        }
        Ok(Expr::mul_all(factors))
    }

    fn starts_atom(&self) -> bool {
        match self.peek() {
            Some(tok) => match tok.kind {
                RawToken::Number
                | RawToken::Ident
                | RawToken::LParen
                | RawToken::LBrace
                | RawToken::LBracket => true,
                RawToken::Command => !matches!(self.command_name(tok), "cdot" | "times"),
                _ => false,
            },
            None => false,
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(RawToken::Minus) {
            return Ok(-self.parse_unary()?);
        }
        if self.eat(RawToken::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        if self.eat(RawToken::Caret) {
            let exp = self.parse_script()?;
            return Ok(Expr::pow(base, exp));
        }
        Ok(base)
    }

    /// The operand of `^`: a braced group, or a single (signed) atom.
    fn parse_script(&mut self) -> Result<Expr, ParseError> {
        if self.eat(RawToken::Minus) {
            return Ok(-self.parse_atom()?);
        }
        self.parse_atom()
    }

    fn parse_group(&mut self) -> Result<Expr, ParseError> {
        self.expect(RawToken::LBrace, "`{`")?;
        let inner = self.parse_expr()?;
        self.expect(RawToken::RBrace, "`}`")?;
        Ok(inner)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.bump() else {
            return Err(self.end("an expression"));
        };
        match tok.kind {
            RawToken::Number => self.number(tok),
            RawToken::Ident => {
                let name = self.text(tok).to_owned();
                self.name_tail(name, tok)
            }
            RawToken::LParen => {
                let inner = self.parse_expr()?;
                self.expect(RawToken::RParen, "`)`")?;
                Ok(inner)
            }
            RawToken::LBrace => {
                let inner = self.parse_expr()?;
                self.expect(RawToken::RBrace, "`}`")?;
                Ok(inner)
            }
            RawToken::LBracket => {
                let inner = self.parse_expr()?;
                self.expect(RawToken::RBracket, "`]`")?;
                Ok(inner)
            }
            RawToken::Command => self.command(tok),
            _ => Err(self.unexpected(tok, "an expression")),
        }
    }

    fn number(&self, tok: Token) -> Result<Expr, ParseError> {
        let text = self.text(tok);
        let invalid = || ParseError::new(ParseErrorKind::InvalidNumber, tok.start);
        let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
        let digits: BigInt = format!("{whole}{frac}").parse().map_err(|_| invalid())?;
        let denom = num_traits::pow(BigInt::from(10), frac.len());
        Ok(Expr::Num(Rational::new(digits, denom)))
    }

    /// Everything that can follow a name: a subscript, an argument list,
    /// or nothing.
    fn name_tail(&mut self, mut name: String, tok: Token) -> Result<Expr, ParseError> {
        if matches!(name.as_str(), "log" | "lg" | "ln") {
            return self.log();
        }
        if self.eat(RawToken::Underscore) {
            let sub = self.script_text()?;
            if name == "C" {
                if let Ok(k) = sub.parse::<u32>() {
                    return Ok(Expr::Cost(k));
                }
            }
            name.push('_');
            name.push_str(&sub);
        }
        let name_end = self.tokens.get(self.pos.wrapping_sub(1)).map_or(tok.end, |t| t.end);
        if let Some(next) = self.peek() {
            if next.kind == RawToken::LParen && next.start == name_end {
                self.pos += 1;
                let args = self.arguments()?;
                return Ok(Expr::apply(name, args));
            }
        }
        if self.constants.contains(&name.as_str()) {
            Ok(Expr::prob(name))
        } else {
            Ok(Expr::var(name))
        }
    }

    /// Comma-separated arguments after an opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(RawToken::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(RawToken::Comma) {
                continue;
            }
            self.expect(RawToken::RParen, "`,` or `)`")?;
            return Ok(args);
        }
    }

    /// Raw text of a `_` operand: a braced token run joined without spaces,
    /// or a single token.
    fn script_text(&mut self) -> Result<String, ParseError> {
        if !self.eat(RawToken::LBrace) {
            let tok = self.bump().ok_or_else(|| self.end("a subscript"))?;
            return Ok(self.text(tok).to_owned());
        }
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let tok = self.bump().ok_or_else(|| self.end("`}`"))?;
            match tok.kind {
                RawToken::RBrace if depth == 0 => return Ok(text),
                RawToken::RBrace => depth -= 1,
                RawToken::LBrace => depth += 1,
                _ => {}
            }
            text.push_str(self.text(tok));
        }
    }

    fn command(&mut self, tok: Token) -> Result<Expr, ParseError> {
        match self.command_name(tok) {
            "frac" | "dfrac" | "tfrac" => {
                let numer = self.parse_group()?;
                let denom = self.parse_group()?;
                Ok(numer / denom)
            }
            "sqrt" => {
                let index = if self.eat(RawToken::LBracket) {
                    let k = self.parse_expr()?;
                    self.expect(RawToken::RBracket, "`]`")?;
                    k
                } else {
                    Expr::int(2)
                };
                let radicand = self.parse_group()?;
                Ok(Expr::pow(radicand, Expr::powi(index, -1)))
            }
            "log" | "lg" | "ln" => self.log(),
            "sum" => self.summation(),
            "tau" => {
                self.expect(RawToken::Underscore, "`_`")?;
                let sub = self.script_text()?;
                sub.parse::<u32>()
                    .map(Expr::Opaque)
                    .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber, tok.start))
            }
            "operatorname" | "mathrm" | "text" | "mathit" => {
                if !self.at(RawToken::LBrace) {
                    return Err(match self.peek() {
                        Some(next) => self.unexpected(next, "`{`"),
                        None => self.end("`{`"),
                    });
                }
                let name = self.script_text()?;
                self.name_tail(name, tok)
            }
            other => Err(ParseError::new(
                ParseErrorKind::UnknownCommand {
                    name: other.to_owned(),
                },
                tok.start,
            )),
        }
    }

    /// `\log_{b}^{k} x`, with the name already consumed.
    fn log(&mut self) -> Result<Expr, ParseError> {
        let mut base: Option<Expr> = None;
        let mut power: Option<Expr> = None;
        loop {
            if self.eat(RawToken::Underscore) {
                base = Some(self.parse_script()?);
            } else if self.eat(RawToken::Caret) {
                power = Some(self.parse_script()?);
            } else {
                break;
            }
        }
        let arg = if self.eat(RawToken::LParen) {
            let inner = self.parse_expr()?;
            self.expect(RawToken::RParen, "`)`")?;
            inner
        } else {
            self.parse_power()?
        };

        let mut log = Expr::log(arg);
        if let Some(base) = base {
            let two = Expr::int(2);
            if base != two && base.as_rational().is_some() {
                log = log / Expr::log(base);
            }
        }
        Ok(match power {
            Some(k) if !k.is_one() => Expr::pow(log, k),
            _ => log,
        })
    }

    /// `\sum_{v=lo}^{hi} term`, with `\sum` already consumed.
    fn summation(&mut self) -> Result<Expr, ParseError> {
        self.expect(RawToken::Underscore, "`_`")?;
        self.expect(RawToken::LBrace, "`{`")?;
        let var_tok = self.expect(RawToken::Ident, "a summation index")?;
        let mut var = self.text(var_tok).to_owned();
        if self.eat(RawToken::Underscore) {
            var.push('_');
            var.push_str(&self.script_text()?);
        }
        self.expect(RawToken::Eq, "`=`")?;
        let lower = self.parse_expr()?;
        self.expect(RawToken::RBrace, "`}`")?;
        self.expect(RawToken::Caret, "`^`")?;
        let upper = self.parse_script()?;
        let body = self.parse_term()?;
        Ok(Expr::sum_over(body, var, lower, upper))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
