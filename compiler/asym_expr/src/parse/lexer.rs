//! Markup tokenizer.

use logos::Logos;

use super::{ParseError, ParseErrorKind};

/// Raw token from logos.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
// Whitespace plus thin and negative spaces: `\,` `\;` `\:` `\!` `\ `
#[logos(skip r"([ \t\r\n]|\\[,;:! ])+")]
pub(super) enum RawToken {
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,
    #[regex(r"[A-Za-z][A-Za-z0-9]*")]
    Ident,
    #[regex(r"\\[A-Za-z]+")]
    Command,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("_")]
    Underscore,
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,
}

/// Sizing and spacing commands carry no meaning for the value.
const IGNORED_COMMANDS: &[&str] = &[
    "left",
    "right",
    "big",
    "Big",
    "bigg",
    "Bigg",
    "bigl",
    "bigr",
    "Bigl",
    "Bigr",
    "displaystyle",
    "limits",
    "quad",
    "qquad",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Token {
    pub kind: RawToken,
    pub start: usize,
    pub end: usize,
}

pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let Ok(kind) = result else {
            return Err(ParseError::new(ParseErrorKind::InvalidCharacter, span.start));
        };
        if kind == RawToken::Command && IGNORED_COMMANDS.contains(&&source[span.start + 1..span.end]) {
            continue;
        }
        tokens.push(Token {
            kind,
            start: span.start,
            end: span.end,
        });
    }
    Ok(tokens)
}
