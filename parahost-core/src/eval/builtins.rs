use std::sync::Arc;

use super::context::ExecutionContext;
use super::{EvalError, EvalResult, Value};

/// Functions every module can call without importing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Print,
    Len,
    Str,
    Bytes,
    Argv,
    ReadFile,
    Fail,
    Exec,
}

fn expect_args(builtin: Builtin, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            name: builtin.to_string(),
            expected,
            found: args.len(),
        })
    }
}

impl Builtin {
    pub async fn call(
        self,
        mut args: Vec<Value>,
        context: &Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match self {
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}", line);
                Ok(Value::Null)
            }
            Builtin::Len => {
                expect_args(self, &args, 1)?;
                args[0]
                    .len()
                    .map(|len| Value::Integer(len as i64))
                    .ok_or_else(|| {
                        EvalError::TypeMismatch(format!(
                            "{} has no length",
                            args[0].type_name()
                        ))
                    })
            }
            Builtin::Str => {
                expect_args(self, &args, 1)?;
                match args.remove(0) {
                    Value::Bytes(bytes) => String::from_utf8(bytes)
                        .map(Value::String)
                        .map_err(|_| EvalError::TypeMismatch("bytes are not valid UTF-8".into())),
                    other => Ok(Value::String(other.to_string())),
                }
            }
            Builtin::Bytes => {
                expect_args(self, &args, 1)?;
                match args.remove(0) {
                    Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
                    Value::Bytes(b) => Ok(Value::Bytes(b)),
                    Value::List(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::Integer(i) => u8::try_from(*i).map_err(|_| {
                                EvalError::TypeMismatch(format!("{} is not a byte", i))
                            }),
                            other => Err(EvalError::TypeMismatch(format!(
                                "{} is not a byte",
                                other.type_name()
                            ))),
                        })
                        .collect::<EvalResult<Vec<u8>>>()
                        .map(Value::Bytes),
                    other => Err(EvalError::TypeMismatch(format!(
                        "cannot convert {} to bytes",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Argv => {
                expect_args(self, &args, 0)?;
                Ok(Value::List(
                    context
                        .interpreter()
                        .args()
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ))
            }
            Builtin::ReadFile => {
                expect_args(self, &args, 1)?;
                let Value::String(path) = &args[0] else {
                    return Err(EvalError::TypeMismatch(format!(
                        "path must be a string, not {}",
                        args[0].type_name()
                    )));
                };
                tokio::fs::read(path)
                    .await
                    .map(Value::Bytes)
                    .map_err(|e| EvalError::Io {
                        path: path.clone(),
                        message: e.to_string(),
                    })
            }
            Builtin::Fail => {
                let message = args
                    .first()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "driver failed".to_string());
                Err(EvalError::Raised(message))
            }
            Builtin::Exec => {
                expect_args(self, &args, 1)?;
                let source = match args.remove(0) {
                    Value::String(s) => s,
                    Value::Bytes(b) => String::from_utf8(b).map_err(|_| {
                        EvalError::TypeMismatch("source is not valid UTF-8".into())
                    })?,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot exec {}",
                            other.type_name()
                        )));
                    }
                };
                context.interpreter().exec_source(&source).await
            }
        }
    }
}
