use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    error::context,
    sequence::{delimited, pair, preceded, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(
                char('"'),
                opt(nom::bytes::complete::escaped_transform(
                    is_not("\\\""),
                    '\\',
                    alt((
                        value("\\", tag("\\")),
                        value("\"", tag("\"")),
                        value("\n", tag("n")),
                        value("\t", tag("t")),
                    )),
                )),
                char('"'),
            ),
            |content: Option<String>| Literal::String(content.unwrap_or_default()),
        ),
    )(input)
}

fn exponent(input: &str) -> ParserResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

/// `1.5`, `1.5e-3` or `2E8`: a fraction, an exponent, or both.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    context(
        "float literal",
        map_res(
            recognize(pair(
                digit1,
                alt((
                    recognize(pair(preceded(char('.'), digit1), opt(exponent))),
                    exponent,
                )),
            )),
            |s: &str| s.parse::<f64>().map(Literal::Float),
        ),
    )(input)
}

// Negative numbers are unary minus applied to a literal.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        map_res(digit1, |s: &str| s.parse::<i64>().map(Literal::Integer)),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_float_literal,
                parse_integer_literal,
            )),
            Token::Literal,
        ),
    )(input)
}
