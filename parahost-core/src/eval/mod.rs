//! # Evaluator
//!
//! Async tree-walking evaluation of driver programs.
//!
//! * [`value`]: runtime values
//! * [`context`]: per-call variable scope bound to its module
//! * [`expression`] / [`statement`]: the evaluators
//! * [`builtins`]: functions available in every module without import

pub mod builtins;
pub mod context;
pub mod expression;
pub mod statement;
pub mod value;

pub use context::ExecutionContext;
pub use expression::ExpressionEvaluator;
pub use statement::{ControlFlow, StatementEvaluator, StatementResult};
pub use value::{ModuleRef, Value};

use thiserror::Error;

use crate::registry::OpError;
use crate::runtime::LoadError;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
    #[error("undefined function {0}")]
    UndefinedFunction(String),
    #[error("{0} is not callable")]
    NotCallable(String),
    #[error("{target} has no member {name}")]
    NoMember { target: String, name: String },
    #[error("index error: {0}")]
    Index(String),
    #[error("type error: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {0}")]
    Overflow(String),
    #[error("{name}() takes {expected} arguments ({found} given)")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("call to {function} exceeds the call depth limit of {limit}")]
    RecursionLimit { function: String, limit: usize },
    #[error("{path}: {message}")]
    Io { path: String, message: String },
    /// Raised by the driver through `fail`.
    #[error("{0}")]
    Raised(String),
    #[error(transparent)]
    Op(#[from] OpError),
    #[error(transparent)]
    Load(Box<LoadError>),
}

impl From<LoadError> for EvalError {
    fn from(e: LoadError) -> Self {
        EvalError::Load(Box::new(e))
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
