//! The driver grammar.
//!
//! ```text
//! program    := item*
//! item       := "import" IDENT ";" | "fn" IDENT "(" params ")" block | statement
//! statement  := let | assign | if | while | return | expression ";"
//! expression := or
//! or         := and ("||" and)*
//! and        := comparison ("&&" comparison)*
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := ("!" | "-") unary | postfix
//! postfix    := primary ("(" args ")" | "." IDENT | "[" expression "]")*
//! primary    := literal | IDENT | "[" list "]" | "(" expression ")"
//! ```

pub mod expression;
pub mod program;
pub mod statement;

use super::{combinators::*, core::*};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    satisfy(
        |token: &Token| match token {
            Token::Identifier(name) => Some(name.clone()),
            _ => None,
        },
        "identifier",
    )
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(keyword)))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(delimiter)))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(operator)))
}

pub fn parse_semicolon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Semicolon)
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

/// `{ statement* }`
pub fn parse_block() -> impl Parser<Token, Vec<crate::ast::Statement>> {
    with_context(
        preceded(
            parse_delimiter(Delimiter::OpenBrace),
            many_till(
                lazy(statement::parse_statement),
                parse_delimiter(Delimiter::CloseBrace),
            ),
        ),
        "block",
    )
}
