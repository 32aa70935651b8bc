use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast;
use crate::registry::NativeModule;
use crate::runtime::ScriptModule;
use crate::types::NativeObject;

use super::{EvalError, EvalResult};

/// A runtime value of the driver language.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Instance of a readied native type.
    Object(Arc<NativeObject>),
    Module(ModuleRef),
}

#[derive(Clone)]
pub enum ModuleRef {
    Script(Arc<ScriptModule>),
    Native(Arc<NativeModule>),
}

impl ModuleRef {
    pub fn name(&self) -> &str {
        match self {
            ModuleRef::Script(module) => module.name(),
            ModuleRef::Native(module) => module.name(),
        }
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleRef::Script(module) => write!(f, "ScriptModule({})", module.name()),
            ModuleRef::Native(module) => write!(f, "NativeModule({})", module.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Module(ModuleRef::Script(a)), Value::Module(ModuleRef::Script(b))) => {
                Arc::ptr_eq(a, b)
            }
            (Value::Module(ModuleRef::Native(a)), Value::Module(ModuleRef::Native(b))) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl From<&ast::Literal> for Value {
    fn from(literal: &ast::Literal) -> Self {
        match literal {
            ast::Literal::Null => Value::Null,
            ast::Literal::Boolean(b) => Value::Boolean(*b),
            ast::Literal::Integer(i) => Value::Integer(*i),
            ast::Literal::Float(f) => Value::Float(*f),
            ast::Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::List(values.into_iter().map(Value::Float).collect())
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Module(_) => "module",
        }
    }

    /// `null`, `false`, zero and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Object(_) | Value::Module(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Reads a list of numbers as floats.
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        match self {
            Value::List(items) => items.iter().map(Value::as_f64).collect(),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    pub fn binary_op(&self, op: ast::BinaryOperator, rhs: &Value) -> EvalResult<Value> {
        use ast::BinaryOperator::*;
        match op {
            Equal => Ok(Value::Boolean(self == rhs)),
            NotEqual => Ok(Value::Boolean(self != rhs)),
            And => Ok(Value::Boolean(self.is_truthy() && rhs.is_truthy())),
            Or => Ok(Value::Boolean(self.is_truthy() || rhs.is_truthy())),
            LessThan | LessThanEqual | GreaterThan | GreaterThanEqual => self.compare(op, rhs),
            Add => self.add(rhs),
            Subtract | Multiply | Divide => self.arithmetic(op, rhs),
        }
    }

    fn add(&self, rhs: &Value) -> EvalResult<Value> {
        match (self, rhs) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(Value::Bytes([a.as_slice(), b.as_slice()].concat())),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            _ => self.arithmetic(ast::BinaryOperator::Add, rhs),
        }
    }

    fn arithmetic(&self, op: ast::BinaryOperator, rhs: &Value) -> EvalResult<Value> {
        use ast::BinaryOperator::*;
        match (self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => {
                let result = match op {
                    Add => a.checked_add(*b),
                    Subtract => a.checked_sub(*b),
                    Multiply => a.checked_mul(*b),
                    Divide if *b == 0 => return Err(EvalError::DivisionByZero),
                    Divide => a.checked_div(*b),
                    _ => None,
                };
                result
                    .map(Value::Integer)
                    .ok_or_else(|| EvalError::Overflow(op.to_string()))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => match op {
                    Add => Ok(Value::Float(a + b)),
                    Subtract => Ok(Value::Float(a - b)),
                    Multiply => Ok(Value::Float(a * b)),
                    Divide if b == 0.0 => Err(EvalError::DivisionByZero),
                    Divide => Ok(Value::Float(a / b)),
                    _ => Err(self.type_mismatch(op, rhs)),
                },
                _ => Err(self.type_mismatch(op, rhs)),
            },
        }
    }

    fn compare(&self, op: ast::BinaryOperator, rhs: &Value) -> EvalResult<Value> {
        use std::cmp::Ordering;
        let ordering = match (self, rhs) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };
        let ordering = ordering.ok_or_else(|| self.type_mismatch(op, rhs))?;
        let result = match op {
            ast::BinaryOperator::LessThan => ordering == Ordering::Less,
            ast::BinaryOperator::LessThanEqual => ordering != Ordering::Greater,
            ast::BinaryOperator::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        Ok(Value::Boolean(result))
    }

    pub fn unary_op(&self, op: ast::UnaryOperator) -> EvalResult<Value> {
        match (op, self) {
            (ast::UnaryOperator::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
            (ast::UnaryOperator::Negate, Value::Integer(i)) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| EvalError::Overflow(op.to_string())),
            (ast::UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
            (op, value) => Err(EvalError::TypeMismatch(format!(
                "cannot apply {} to {}",
                op,
                value.type_name()
            ))),
        }
    }

    fn type_mismatch(&self, op: ast::BinaryOperator, rhs: &Value) -> EvalError {
        EvalError::TypeMismatch(format!(
            "unsupported operand types for {}: {} and {}",
            op,
            self.type_name(),
            rhs.type_name()
        ))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Object(object) => write!(f, "<{} object>", object.type_name()),
            Value::Module(module) => write!(f, "<module {}>", module.name()),
        }
    }
}
