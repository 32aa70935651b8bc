use std::sync::Arc;

use async_recursion::async_recursion;
use tracing::debug;

use super::builtins::Builtin;
use super::context::ExecutionContext;
use super::{EvalError, EvalResult, ModuleRef, Value};
use crate::ast::{BinaryOperator, Expression};

#[derive(Debug, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    #[async_recursion]
    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match expr {
            Expression::Literal(literal) => Ok(Value::from(literal)),
            Expression::Variable(name) => context.lookup(name),
            Expression::List(items) => Ok(Value::List(self.eval_all(items, context).await?)),
            Expression::Call { callee, arguments } => {
                self.eval_call(callee, arguments, context).await
            }
            Expression::Member { object, name } => {
                let object = self.eval_expression(object, context).await?;
                Self::member(&object, name)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, context.clone()).await?;
                let index = self.eval_expression(index, context).await?;
                Self::index(&object, &index)
            }
            Expression::Unary { op, operand } => {
                self.eval_expression(operand, context).await?.unary_op(*op)
            }
            Expression::BinaryOp { op, left, right } => {
                self.eval_binary_op(*op, left, right, context).await
            }
        }
    }

    async fn eval_all(
        &self,
        expressions: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(expressions.len());
        for expr in expressions {
            values.push(self.eval_expression(expr, context.clone()).await?);
        }
        Ok(values)
    }

    /// `&&` and `||` short-circuit; everything else evaluates both sides.
    async fn eval_binary_op(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let left = self.eval_expression(left, context.clone()).await?;
        match op {
            BinaryOperator::And if !left.is_truthy() => Ok(Value::Boolean(false)),
            BinaryOperator::Or if left.is_truthy() => Ok(Value::Boolean(true)),
            _ => {
                let right = self.eval_expression(right, context).await?;
                left.binary_op(op, &right)
            }
        }
    }

    async fn eval_call(
        &self,
        callee: &Expression,
        arguments: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match callee {
            Expression::Member { object, name } => {
                let target = self.eval_expression(object, context.clone()).await?;
                let args = self.eval_all(arguments, context.clone()).await?;
                match target {
                    Value::Module(ModuleRef::Native(module)) => {
                        Ok(module.call(name, args).await?)
                    }
                    Value::Module(ModuleRef::Script(module)) => {
                        context
                            .interpreter()
                            .call_function(module, name, args)
                            .await
                    }
                    other => Err(EvalError::NotCallable(format!(
                        "{}.{}",
                        other.type_name(),
                        name
                    ))),
                }
            }
            Expression::Variable(name) => {
                let args = self.eval_all(arguments, context.clone()).await?;
                if context.module().function(name).is_some() {
                    let module = context.module().clone();
                    return context.interpreter().call_function(module, name, args).await;
                }
                match name.parse::<Builtin>() {
                    Ok(builtin) => {
                        debug!(%builtin, "builtin call");
                        builtin.call(args, &context).await
                    }
                    Err(_) => Err(EvalError::UndefinedFunction(name.clone())),
                }
            }
            other => Err(EvalError::NotCallable(format!("{:?}", other))),
        }
    }

    fn member(object: &Value, name: &str) -> EvalResult<Value> {
        let found = match object {
            Value::Module(ModuleRef::Native(module)) => module.attribute(name),
            Value::Module(ModuleRef::Script(module)) => module.global(name),
            Value::Object(object) => object.field(name).cloned(),
            Value::Map(entries) => entries.get(name).cloned(),
            _ => None,
        };
        found.ok_or_else(|| EvalError::NoMember {
            target: object.to_string(),
            name: name.to_string(),
        })
    }

    fn index(object: &Value, index: &Value) -> EvalResult<Value> {
        let position = |len: usize| match index {
            Value::Integer(i) if *i >= 0 && (*i as usize) < len => Ok(*i as usize),
            Value::Integer(i) => Err(EvalError::Index(format!(
                "index {} out of range for length {}",
                i, len
            ))),
            other => Err(EvalError::TypeMismatch(format!(
                "index must be an int, not {}",
                other.type_name()
            ))),
        };
        match object {
            Value::List(items) => Ok(items[position(items.len())?].clone()),
            Value::Bytes(bytes) => Ok(Value::Integer(bytes[position(bytes.len())?] as i64)),
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::String(chars[position(chars.len())?].to_string()))
            }
            Value::Map(entries) => {
                let Value::String(key) = index else {
                    return Err(EvalError::TypeMismatch(format!(
                        "map keys are strings, not {}",
                        index.type_name()
                    )));
                };
                entries
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::Index(format!("no key {:?}", key)))
            }
            other => Err(EvalError::TypeMismatch(format!(
                "{} is not indexable",
                other.type_name()
            ))),
        }
    }
}
