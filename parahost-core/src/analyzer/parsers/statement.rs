use super::{
    super::{combinators::*, core::*},
    expression::parse_expression,
    *,
};
use crate::ast;
use crate::tokenizer::{keyword::Keyword, symbol::Delimiter, token::Token};

pub fn parse_statement() -> impl Parser<Token, ast::Statement> {
    with_context(
        choice(vec![
            Box::new(parse_let()),
            Box::new(parse_if()),
            Box::new(parse_while()),
            Box::new(parse_return()),
            Box::new(parse_assign()),
            Box::new(parse_expression_statement()),
        ]),
        "statement",
    )
}

fn parse_let() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple3(
                preceded(parse_keyword(Keyword::Let), parse_identifier()),
                preceded(parse_delimiter(Delimiter::Equal), parse_expression()),
                parse_semicolon(),
            ),
            |(name, value, _)| ast::Statement::Let { name, value },
        ),
        "let",
    )
}

fn parse_assign() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple3(
                parse_identifier(),
                preceded(parse_delimiter(Delimiter::Equal), parse_expression()),
                parse_semicolon(),
            ),
            |(name, value, _)| ast::Statement::Assign { name, value },
        ),
        "assignment",
    )
}

/// `if cond { .. } else if cond { .. } else { .. }`
fn parse_if() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::If),
                tuple3(
                    parse_expression(),
                    parse_block(),
                    optional(preceded(parse_keyword(Keyword::Else), parse_else_body())),
                ),
            ),
            |(condition, then_block, else_block)| ast::Statement::If {
                condition,
                then_block,
                else_block,
            },
        ),
        "if",
    )
}

fn parse_else_body() -> impl Parser<Token, Vec<ast::Statement>> {
    choice(vec![
        Box::new(map(lazy(parse_if), |nested| vec![nested])),
        Box::new(parse_block()),
    ])
}

fn parse_while() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::While),
                tuple2(parse_expression(), parse_block()),
            ),
            |(condition, body)| ast::Statement::While { condition, body },
        ),
        "while",
    )
}

fn parse_return() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Return),
                tuple2(optional(parse_expression()), parse_semicolon()),
            ),
            |(value, _)| ast::Statement::Return(value),
        ),
        "return",
    )
}

fn parse_expression_statement() -> impl Parser<Token, ast::Statement> {
    map(
        tuple2(parse_expression(), parse_semicolon()),
        |(expression, _)| ast::Statement::Expression(expression),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, Expression, Literal, Statement};
    use crate::preprocessor::{Preprocessor, TokenPreprocessor};
    use crate::tokenizer::token::Tokenizer;

    fn tokens(input: &str) -> Vec<Token> {
        let spans = Tokenizer::new().tokenize(input).unwrap();
        TokenPreprocessor
            .process(spans)
            .into_iter()
            .map(|span| span.token)
            .collect()
    }

    fn parse(input: &str) -> Statement {
        let tokens = tokens(input);
        let (pos, statement) = parse_statement().parse(&tokens, 0).unwrap();
        assert_eq!(pos, tokens.len());
        statement
    }

    #[test]
    fn test_let_and_assign() {
        assert_eq!(
            parse("let n = 1;"),
            Statement::Let {
                name: "n".to_string(),
                value: Expression::Literal(Literal::Integer(1)),
            }
        );
        assert_eq!(
            parse("n = n + 1;"),
            Statement::Assign {
                name: "n".to_string(),
                value: Expression::BinaryOp {
                    op: BinaryOperator::Add,
                    left: Box::new(Expression::Variable("n".to_string())),
                    right: Box::new(Expression::Literal(Literal::Integer(1))),
                },
            }
        );
    }

    #[test]
    fn test_comparison_is_not_an_assignment() {
        assert_eq!(
            parse("n == 1;"),
            Statement::Expression(Expression::BinaryOp {
                op: BinaryOperator::Equal,
                left: Box::new(Expression::Variable("n".to_string())),
                right: Box::new(Expression::Literal(Literal::Integer(1))),
            })
        );
    }

    #[test]
    fn test_else_if_chain() {
        let statement = parse("if a { return 1; } else if b { return 2; } else { return; }");
        let Statement::If {
            else_block: Some(else_block),
            ..
        } = statement
        else {
            panic!("expected if with else");
        };
        assert_eq!(else_block.len(), 1);
        let Statement::If {
            then_block,
            else_block: Some(last),
            ..
        } = &else_block[0]
        else {
            panic!("expected nested if");
        };
        assert_eq!(
            then_block,
            &vec![Statement::Return(Some(Expression::Literal(Literal::Integer(2))))]
        );
        assert_eq!(last, &vec![Statement::Return(None)]);
    }

    #[test]
    fn test_while() {
        let statement = parse("while i < 3 { i = i + 1; }");
        assert!(matches!(statement, Statement::While { ref body, .. } if body.len() == 1));
    }

    #[test]
    fn test_missing_semicolon_points_past_the_expression() {
        let tokens = tokens("let x = 1 let");
        let err = parse_statement().parse(&tokens, 0).unwrap_err();
        assert_eq!(err.position(), 4);
    }

    #[test]
    fn test_unterminated_block() {
        let tokens = tokens("while true { f();");
        assert!(parse_statement().parse(&tokens, 0).is_err());
    }
}
