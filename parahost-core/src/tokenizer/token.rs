use std::fmt;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{VerboseError, context},
    sequence::pair,
};
use thiserror::Error;

use super::{
    keyword::Keyword,
    literal::{Literal, parse_literal},
    symbol::{Delimiter, Operator, parse_delimiter, parse_operator},
    trivia::parse_trivia,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    // Formatting
    Whitespace(String),
    Newline,
    Comment {
        content: String,
        kind: CommentKind,
    },
}

impl Token {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Token::Whitespace(_))
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Token::Newline)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Token::Comment { .. })
    }

    /// Blanks, line breaks and comments.
    pub fn is_trivia(&self) -> bool {
        self.is_whitespace() || self.is_newline() || self.is_comment()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{}", kw),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(d) => write!(f, "{}", d),
            Token::Literal(Literal::String(s)) => write!(f, "{:?}", s),
            Token::Literal(lit) => write!(f, "{:?}", lit),
            Token::Whitespace(_) => write!(f, "<whitespace>"),
            Token::Newline => write!(f, "<newline>"),
            Token::Comment { .. } => write!(f, "<comment>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// A point in the source. Lines and columns are 1-based, columns count chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Position {
    fn advance(&mut self, text: &str) {
        self.offset += text.len();
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A token with the source range it was scanned from.
#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    position: Position,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans the whole input. Trivia is kept; the first unscannable
    /// character stops the scan with its position.
    #[tracing::instrument(level = "debug", skip(input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut spans = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            let (next, token) = next_token(rest).map_err(|e| self.error(rest, e))?;
            let at = self.position;
            self.position.advance(&rest[..rest.len() - next.len()]);
            spans.push(TokenSpan {
                token,
                start: at.offset,
                end: self.position.offset,
                line: at.line,
                column: at.column,
            });
            rest = next;
        }
        Ok(spans)
    }

    fn error(&self, rest: &str, e: nom::Err<VerboseError<&str>>) -> TokenizerError {
        let message = match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => nom::error::convert_error(rest, e),
            nom::Err::Incomplete(needed) => format!("incomplete input ({:?})", needed),
        };
        let error = TokenizerError::Unexpected {
            found: rest.chars().take(20).collect(),
            at: self.position,
            message,
        };
        tracing::debug!("{}", error);
        error
    }
}

fn next_token(input: &str) -> ParserResult<Token> {
    // Trivia first: `//` and `/*` must not scan as division.
    alt((
        parse_trivia,
        parse_literal,
        parse_operator,
        parse_delimiter,
        parse_word,
    ))(input)
}

/// Identifiers, plus the words that scan like identifiers: keywords and the
/// `true`, `false` and `null` literals.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_word(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    if let Ok(kw) = Keyword::try_from(id) {
        return Ok((input, Token::Keyword(kw)));
    }
    let token = match id {
        "true" => Token::Literal(Literal::Boolean(true)),
        "false" => Token::Literal(Literal::Boolean(false)),
        "null" => Token::Literal(Literal::Null),
        _ => Token::Identifier(id.to_string()),
    };
    Ok((input, token))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("unexpected input {found:?} at {at}: {message}")]
    Unexpected {
        message: String,
        found: String,
        at: Position,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_for_keyword() {
        let (rest, token) = parse_word("import _parahost;").unwrap();
        assert_eq!(token, Token::Keyword(Keyword::Import));
        assert_eq!(rest, " _parahost;");

        let (_, token) = parse_word("important").unwrap();
        assert_eq!(token, Token::Identifier("important".to_string()));
    }

    #[test]
    fn test_word_literals() {
        let (_, token) = parse_word("true").unwrap();
        assert_eq!(token, Token::Literal(Literal::Boolean(true)));
        let (_, token) = parse_word("nullable").unwrap();
        assert_eq!(token, Token::Identifier("nullable".to_string()));
    }

    #[test]
    fn test_tokenizer_with_position() {
        let mut tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("x\n  y").unwrap();

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[0].token, Token::Identifier("x".to_string()));

        let y = &tokens[3];
        assert_eq!(y.token, Token::Identifier("y".to_string()));
        assert_eq!((y.line, y.column), (2, 3));
    }

    #[test]
    fn test_driver_snippet() {
        let mut tokenizer = Tokenizer::new();
        let input = r#"
            import _parahost; // native table
            fn main() {
                let data = _parahost.globally_broadcast_bytes(bytes("abc"));
                return len(data) >= 3;
            }
        "#;

        let tokens: Vec<Token> = tokenizer
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|span| span.token)
            .filter(|t| !t.is_whitespace() && !t.is_newline())
            .collect();

        assert_eq!(tokens[0], Token::Keyword(Keyword::Import));
        assert_eq!(tokens[1], Token::Identifier("_parahost".to_string()));
        assert_eq!(tokens[2], Token::Delimiter(Delimiter::Semicolon));
        assert!(tokens[3].is_comment());
        assert_eq!(tokens[4], Token::Keyword(Keyword::Fn));
        assert!(tokens.contains(&Token::Operator(Operator::GreaterEqual)));
        assert!(tokens.contains(&Token::Literal(Literal::String("abc".to_string()))));
    }

    #[test]
    fn test_unclosed_comment_reports_its_start() {
        let err = Tokenizer::new().tokenize("x = 1;\n  /* never closed").unwrap_err();
        let TokenizerError::Unexpected { at, message, .. } = err;
        assert_eq!((at.line, at.column), (2, 3));
        assert!(message.contains("unterminated block comment"));
    }

    #[test]
    fn test_tokenizer_error_position() {
        let mut tokenizer = Tokenizer::new();
        let err = tokenizer.tokenize("let x = 1;\nlet y = #;").unwrap_err();
        let TokenizerError::Unexpected { at, found, .. } = err;
        assert_eq!((at.line, at.column, at.offset), (2, 9, 19));
        assert_eq!(found, "#;");
    }
}
