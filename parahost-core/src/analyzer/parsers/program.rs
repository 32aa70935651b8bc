use super::{
    super::{combinators::*, core::*},
    statement::parse_statement,
    *,
};
use crate::ast;
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::Delimiter,
    token::{Token, TokenSpan, Tokenizer, TokenizerError},
};
use thiserror::Error;

pub fn parse_program() -> impl Parser<Token, ast::Program> {
    with_context(
        map(many_till(parse_item(), eof()), |items| ast::Program { items }),
        "program",
    )
}

fn parse_item() -> impl Parser<Token, ast::Item> {
    choice(vec![
        Box::new(parse_import()),
        Box::new(parse_function()),
        Box::new(map(parse_statement(), ast::Item::Statement)),
    ])
}

fn parse_import() -> impl Parser<Token, ast::Item> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Import),
                tuple2(parse_identifier(), parse_semicolon()),
            ),
            |(name, _)| ast::Item::Import(name),
        ),
        "import",
    )
}

fn parse_function() -> impl Parser<Token, ast::Item> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Fn),
                tuple3(parse_identifier(), parse_parameters(), parse_block()),
            ),
            |(name, params, body)| ast::Item::Function(ast::FunctionDef { name, params, body }),
        ),
        "function",
    )
}

fn parse_parameters() -> impl Parser<Token, Vec<String>> {
    with_context(
        delimited(
            parse_delimiter(Delimiter::OpenParen),
            separated_list(parse_identifier(), parse_comma()),
            parse_delimiter(Delimiter::CloseParen),
        ),
        "parameters",
    )
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error(transparent)]
    Tokenize(#[from] TokenizerError),
    #[error("{error} (line {line}, column {column})")]
    Parse {
        error: ParseError,
        line: usize,
        column: usize,
    },
}

/// Tokenizes, preprocesses and parses one source text.
///
/// Parse errors are reported with the line and column of the offending
/// token (or of the last token when input ended early).
pub fn parse_source(source: &str) -> Result<ast::Program, SyntaxError> {
    let spans = TokenPreprocessor.process(Tokenizer::new().tokenize(source)?);
    let tokens: Vec<Token> = spans.iter().map(|span| span.token.clone()).collect();

    match parse_program().parse(&tokens, 0) {
        Ok((_, program)) => Ok(program),
        Err(error) => {
            let (line, column) = locate(&spans, error.position());
            tracing::debug!("syntax error at {}:{}: {}", line, column, error);
            Err(SyntaxError::Parse {
                error,
                line,
                column,
            })
        }
    }
}

fn locate(spans: &[TokenSpan], position: usize) -> (usize, usize) {
    spans
        .get(position)
        .or_else(|| spans.last())
        .map(|span| (span.line, span.column))
        .unwrap_or((1, 1))
}
