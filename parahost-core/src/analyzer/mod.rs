//! # Analyzer
//!
//! Turns the preprocessed token stream into an [`ast::Program`] using
//! parser combinators.
//!
//! 1. [`core`]: the [`Parser`] trait and [`ParseError`]
//! 2. [`combinators`]: composable building blocks
//! 3. [`parsers`]: the driver grammar (items, statements, expressions)
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Analyzer → Evaluator
//! ```

pub mod combinators;
pub mod core;
pub mod parsers;

pub use self::core::{ParseError, ParseErrorKind};
pub use self::core::ParseResult;
pub use self::core::Parser;

pub use crate::ast;
