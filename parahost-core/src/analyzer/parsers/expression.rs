use super::{
    super::{combinators::*, core::*},
    *,
};
use crate::ast;
use crate::tokenizer::{literal::Literal, symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, ast::Expression> {
    with_context(lazy(parse_logical_or), "expression")
}

fn fold_binary(
    (first, rest): (ast::Expression, Vec<(ast::BinaryOperator, ast::Expression)>),
) -> ast::Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| ast::Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn binary_operator(
    operator: Operator,
    op: ast::BinaryOperator,
) -> Box<dyn Parser<Token, ast::BinaryOperator>> {
    Box::new(map(parse_operator(operator), move |_| op))
}

fn parse_logical_or() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_logical_and),
                many(tuple2(
                    choice(vec![binary_operator(Operator::Or, ast::BinaryOperator::Or)]),
                    lazy(parse_logical_and),
                )),
            ),
            fold_binary,
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_comparison),
                many(tuple2(
                    choice(vec![binary_operator(Operator::And, ast::BinaryOperator::And)]),
                    lazy(parse_comparison),
                )),
            ),
            fold_binary,
        ),
        "logical and",
    )
}

fn parse_comparison() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_additive),
                many(tuple2(parse_operator_comparison(), lazy(parse_additive))),
            ),
            fold_binary,
        ),
        "comparison",
    )
}

fn parse_operator_comparison() -> impl Parser<Token, ast::BinaryOperator> {
    with_context(
        choice(vec![
            binary_operator(Operator::EqualEqual, ast::BinaryOperator::Equal),
            binary_operator(Operator::NotEqual, ast::BinaryOperator::NotEqual),
            binary_operator(Operator::Greater, ast::BinaryOperator::GreaterThan),
            binary_operator(
                Operator::GreaterEqual,
                ast::BinaryOperator::GreaterThanEqual,
            ),
            binary_operator(Operator::Less, ast::BinaryOperator::LessThan),
            binary_operator(Operator::LessEqual, ast::BinaryOperator::LessThanEqual),
        ]),
        "comparison operator",
    )
}

fn parse_additive() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_multiplicative),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Plus, ast::BinaryOperator::Add),
                        binary_operator(Operator::Minus, ast::BinaryOperator::Subtract),
                    ]),
                    lazy(parse_multiplicative),
                )),
            ),
            fold_binary,
        ),
        "additive",
    )
}

fn parse_multiplicative() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_unary),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Multiply, ast::BinaryOperator::Multiply),
                        binary_operator(Operator::Divide, ast::BinaryOperator::Divide),
                    ]),
                    lazy(parse_unary),
                )),
            ),
            fold_binary,
        ),
        "multiplicative",
    )
}

fn parse_unary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple2(parse_unary_operator(), lazy(parse_unary)),
                |(op, operand)| ast::Expression::Unary {
                    op,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_postfix()),
        ]),
        "unary",
    )
}

fn parse_unary_operator() -> impl Parser<Token, ast::UnaryOperator> {
    choice(vec![
        Box::new(map(parse_operator(Operator::Not), |_| {
            ast::UnaryOperator::Not
        })),
        Box::new(map(parse_operator(Operator::Minus), |_| {
            ast::UnaryOperator::Negate
        })),
    ])
}

enum Postfix {
    Call(Vec<ast::Expression>),
    Member(String),
    Index(ast::Expression),
}

fn parse_postfix() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(parse_primary(), many(parse_postfix_operation())),
            |(first, rest)| {
                rest.into_iter().fold(first, |object, postfix| match postfix {
                    Postfix::Call(arguments) => ast::Expression::Call {
                        callee: Box::new(object),
                        arguments,
                    },
                    Postfix::Member(name) => ast::Expression::Member {
                        object: Box::new(object),
                        name,
                    },
                    Postfix::Index(index) => ast::Expression::Index {
                        object: Box::new(object),
                        index: Box::new(index),
                    },
                })
            },
        ),
        "postfix",
    )
}

fn parse_postfix_operation() -> impl Parser<Token, Postfix> {
    choice(vec![
        Box::new(map(parse_arguments(), Postfix::Call)),
        Box::new(map(
            preceded(parse_operator(Operator::Dot), parse_identifier()),
            Postfix::Member,
        )),
        Box::new(map(
            delimited(
                parse_delimiter(Delimiter::OpenBracket),
                lazy(parse_expression),
                parse_delimiter(Delimiter::CloseBracket),
            ),
            Postfix::Index,
        )),
    ])
}

pub fn parse_arguments() -> impl Parser<Token, Vec<ast::Expression>> {
    with_context(
        delimited(
            parse_delimiter(Delimiter::OpenParen),
            separated_list(lazy(parse_expression), parse_comma()),
            parse_delimiter(Delimiter::CloseParen),
        ),
        "arguments",
    )
}

fn parse_primary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), ast::Expression::Literal)),
            Box::new(map(parse_identifier(), ast::Expression::Variable)),
            Box::new(parse_list()),
            Box::new(delimited(
                parse_delimiter(Delimiter::OpenParen),
                lazy(parse_expression),
                parse_delimiter(Delimiter::CloseParen),
            )),
        ]),
        "primary",
    )
}

fn parse_list() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            delimited(
                parse_delimiter(Delimiter::OpenBracket),
                separated_list(lazy(parse_expression), parse_comma()),
                parse_delimiter(Delimiter::CloseBracket),
            ),
            ast::Expression::List,
        ),
        "list",
    )
}

fn parse_literal() -> impl Parser<Token, ast::Literal> {
    satisfy(
        |token: &Token| match token {
            Token::Literal(Literal::Null) => Some(ast::Literal::Null),
            Token::Literal(Literal::Boolean(b)) => Some(ast::Literal::Boolean(*b)),
            Token::Literal(Literal::Integer(i)) => Some(ast::Literal::Integer(*i)),
            Token::Literal(Literal::Float(f)) => Some(ast::Literal::Float(*f)),
            Token::Literal(Literal::String(s)) => Some(ast::Literal::String(s.clone())),
            _ => None,
        },
        "literal",
    )
}
