//! Sits between the tokenizer and the parser:
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Parser → Evaluator
//! ```
//!
//! Whitespace, newline and comment tokens are dropped; spans are kept so
//! parse errors can still be reported with a line and column.

use crate::tokenizer::token::TokenSpan;

pub trait Preprocessor<T, U = T> {
    fn process(&self, input: T) -> U;
}

#[derive(Debug, Default)]
pub struct TokenPreprocessor;

impl Preprocessor<Vec<TokenSpan>> for TokenPreprocessor {
    fn process(&self, input: Vec<TokenSpan>) -> Vec<TokenSpan> {
        let mut spans = input;
        spans.retain(|span| !span.token.is_trivia());
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::keyword::Keyword;
    use crate::tokenizer::token::{Token, Tokenizer};

    #[test]
    fn test_formatting_tokens_removed() {
        let spans = Tokenizer::new()
            .tokenize("let a = 1; // one\n/* two */ a = 2;")
            .unwrap();
        let processed = TokenPreprocessor.process(spans);

        assert_eq!(processed.len(), 9);
        assert!(processed.iter().all(|span| !span.token.is_trivia()));
        assert_eq!(processed[0].token, Token::Keyword(Keyword::Let));
        assert_eq!(processed[5].line, 2);
    }
}
