//! # Tokenizer
//!
//! Lexical analysis of driver scripts (`.phs`), turning raw text into a
//! stream of [`TokenSpan`](token::TokenSpan)s with line and column
//! information for diagnostics.
//!
//! * [`token`]: token types and the [`Tokenizer`](token::Tokenizer) driver
//! * [`keyword`]: reserved words
//! * [`symbol`]: operators and delimiters
//! * [`literal`]: string and number literals
//! * [`trivia`]: blanks, line breaks and comments, dropped by the
//!   [`preprocessor`](crate::preprocessor) before parsing

pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod trivia;
