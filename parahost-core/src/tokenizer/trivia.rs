//! Tokens the parser never sees: blanks, line breaks and comments.
//!
//! They are still produced as tokens so that spans stay exact; the
//! [`preprocessor`](crate::preprocessor) filters them out.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{line_ending, not_line_ending},
    combinator::{cut, map, value},
    error::context,
    sequence::{preceded, terminated},
};

use super::token::{CommentKind, ParserResult, Token};

/// One run of blanks, one line break, or one comment.
#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_trivia(input: &str) -> ParserResult<Token> {
    alt((blanks, line_break, comment))(input)
}

fn blanks(input: &str) -> ParserResult<Token> {
    map(take_while1(|c| c == ' ' || c == '\t'), |run: &str| {
        Token::Whitespace(run.to_string())
    })(input)
}

fn line_break(input: &str) -> ParserResult<Token> {
    value(Token::Newline, line_ending)(input)
}

/// `// ...` to end of line, or `/* ... */`. Block comments do not nest, and
/// an opened block comment that never closes is a hard error rather than a
/// division operator followed by garbage.
fn comment(input: &str) -> ParserResult<Token> {
    let line = map(preceded(tag("//"), not_line_ending), |text: &str| {
        Token::Comment {
            content: text.trim().to_string(),
            kind: CommentKind::Line,
        }
    });
    let block = map(
        preceded(
            tag("/*"),
            cut(context(
                "unterminated block comment",
                terminated(take_until("*/"), tag("*/")),
            )),
        ),
        |text: &str| Token::Comment {
            content: text.to_string(),
            kind: CommentKind::Block,
        },
    );
    alt((line, block))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blanks_and_line_breaks() {
        let (rest, token) = parse_trivia("\t  x").unwrap();
        assert_eq!(token, Token::Whitespace("\t  ".to_string()));
        assert_eq!(rest, "x");

        let (rest, token) = parse_trivia("\r\nnext").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "next");

        assert!(parse_trivia("x").is_err());
    }

    #[test]
    fn test_comments() {
        let (rest, token) = parse_trivia("// rank 0 only\nx").unwrap();
        assert_eq!(
            token,
            Token::Comment {
                content: "rank 0 only".to_string(),
                kind: CommentKind::Line,
            }
        );
        assert_eq!(rest, "\nx");

        let (rest, token) = parse_trivia("/* a\nb */y").unwrap();
        assert_eq!(
            token,
            Token::Comment {
                content: " a\nb ".to_string(),
                kind: CommentKind::Block,
            }
        );
        assert_eq!(rest, "y");
    }

    #[test]
    fn test_unterminated_block_comment_is_fatal() {
        assert!(matches!(parse_trivia("/* open"), Err(nom::Err::Failure(_))));
        // A lone slash is left for the operator parser.
        assert!(matches!(parse_trivia("/ 2"), Err(nom::Err::Error(_))));
    }
}
