//! # Core Parser Definitions
//!
//! The parser interface and error type underlying the combinators in
//! [`super::combinators`].

use thiserror::Error;

/// Parses a slice of tokens starting at `pos`.
///
/// On success returns the position after the consumed tokens and the
/// parsed value.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },
    #[error("expected {expected}, found end of input")]
    EndOfInput { expected: String },
    #[error("no alternative matched")]
    NoAlternative,
    #[error("repetition made no progress")]
    NoProgress,
    #[error("nesting deeper than {limit} rules")]
    TooDeep { limit: usize },
}

/// A failed parse at a token position, with the grammar rules that were
/// active when it happened, outermost first.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}{}", rule_trail(.rules))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
    pub rules: Vec<&'static str>,
}

fn rule_trail(rules: &[&str]) -> String {
    if rules.is_empty() {
        String::new()
    } else {
        format!(" in {}", rules.join(" > "))
    }
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            rules: Vec::new(),
        }
    }

    /// Records that the error happened inside `rule`.
    pub fn within(mut self, rule: &'static str) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Errors no alternative or repetition may recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ParseErrorKind::TooDeep { .. })
    }

    /// True when the failing parser started at `start` and got past it
    /// before failing, so backing out would hide where the input went wrong.
    pub fn committed(&self, start: usize) -> bool {
        self.position > start || self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_rules() {
        let err = ParseError::new(
            ParseErrorKind::Unexpected {
                expected: ";".to_string(),
                found: "let".to_string(),
            },
            4,
        )
        .within("let")
        .within("block");
        assert_eq!(err.rules, vec!["block", "let"]);
        assert_eq!(err.to_string(), "expected ;, found let in block > let");
        assert_eq!(
            ParseError::new(ParseErrorKind::NoAlternative, 0).to_string(),
            "no alternative matched"
        );
    }
}
