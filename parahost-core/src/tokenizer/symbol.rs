//! Operators and delimiters.
//!
//! Both are scanned by longest match over every spelling, so `==` is never
//! read as two `=` and `<=` never as `<` followed by `=`.

use std::fmt;

use nom::error::{ErrorKind, ParseError, VerboseError, context};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Operator {
    /// Member access on modules and native objects.
    Dot,
    EqualEqual,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
    Not,
}

impl Operator {
    pub fn spelling(self) -> &'static str {
        match self {
            Operator::Dot => ".",
            Operator::EqualEqual => "==",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Delimiter {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    /// Assignment, not comparison.
    Equal,
}

impl Delimiter {
    pub fn spelling(self) -> &'static str {
        match self {
            Delimiter::OpenBrace => "{",
            Delimiter::CloseBrace => "}",
            Delimiter::OpenParen => "(",
            Delimiter::CloseParen => ")",
            Delimiter::OpenBracket => "[",
            Delimiter::CloseBracket => "]",
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Equal => "=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

fn longest<T: Copy>(
    input: &str,
    symbols: impl Iterator<Item = T>,
    spelling: fn(T) -> &'static str,
) -> ParserResult<T> {
    symbols
        .filter(|symbol| input.starts_with(spelling(*symbol)))
        .max_by_key(|symbol| spelling(*symbol).len())
        .map(|symbol| (&input[spelling(symbol).len()..], symbol))
        .ok_or_else(|| nom::Err::Error(VerboseError::from_error_kind(input, ErrorKind::Tag)))
}

fn operator(input: &str) -> ParserResult<Token> {
    let (rest, op) = longest(input, Operator::iter(), Operator::spelling)?;
    Ok((rest, Token::Operator(op)))
}

fn delimiter(input: &str) -> ParserResult<Token> {
    let (rest, delimiter) = longest(input, Delimiter::iter(), Delimiter::spelling)?;
    Ok((rest, Token::Delimiter(delimiter)))
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context("operator", operator)(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context("delimiter", delimiter)(input)
}
