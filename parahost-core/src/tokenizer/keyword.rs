//! Reserved words of the driver language.
//!
//! Keywords are recognized after an identifier has been scanned, so
//! `important` is an identifier rather than `import` followed by `ant`.

/// Reserved words of the driver language.
#[derive(
    Debug, Clone, PartialEq, strum::EnumString, strum::Display, strum::EnumIter, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    /// Binds a module into the importing module's globals.
    Import,
    /// Defines a function.
    Fn,
    /// Declares a variable in the current frame.
    Let,
    If,
    Else,
    While,
    Return,
}
