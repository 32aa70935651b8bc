use std::sync::Arc;

use async_recursion::async_recursion;

use super::context::ExecutionContext;
use super::expression::ExpressionEvaluator;
use super::{EvalResult, Value};
use crate::ast::{Expression, Statement};

/// Result of evaluating a statement.
#[derive(Debug, Clone)]
pub enum StatementResult {
    Value(Value),
    Control(ControlFlow),
}

#[derive(Debug, Clone)]
pub enum ControlFlow {
    Return(Value),
}

pub struct StatementEvaluator {
    pub expression_evaluator: Arc<ExpressionEvaluator>,
}

impl Default for StatementEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(ExpressionEvaluator::new()))
    }
}

impl StatementEvaluator {
    pub fn new(expression_evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self {
            expression_evaluator,
        }
    }

    #[async_recursion]
    pub async fn eval_statement(
        &self,
        statement: &Statement,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        match statement {
            Statement::Let { name, value } => {
                let value = self.eval_expression(value, context.clone()).await?;
                context.define(name, value);
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::Assign { name, value } => {
                let value = self.eval_expression(value, context.clone()).await?;
                context.assign(name, value)?;
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.eval_expression(condition, context.clone()).await?.is_truthy() {
                    self.eval_block(then_block, context).await
                } else if let Some(else_block) = else_block {
                    self.eval_block(else_block, context).await
                } else {
                    Ok(StatementResult::Value(Value::Null))
                }
            }
            Statement::While { condition, body } => {
                while self.eval_expression(condition, context.clone()).await?.is_truthy() {
                    if let control @ StatementResult::Control(_) =
                        self.eval_block(body, context.clone()).await?
                    {
                        return Ok(control);
                    }
                }
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expression(expr, context).await?,
                    None => Value::Null,
                };
                Ok(StatementResult::Control(ControlFlow::Return(value)))
            }
            Statement::Expression(expr) => Ok(StatementResult::Value(
                self.eval_expression(expr, context).await?,
            )),
        }
    }

    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        self.expression_evaluator.eval_expression(expr, context).await
    }

    /// Runs statements in order until one returns.
    pub async fn eval_block(
        &self,
        statements: &[Statement],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let mut last = StatementResult::Value(Value::Null);
        for statement in statements {
            last = self.eval_statement(statement, context.clone()).await?;
            if let StatementResult::Control(_) = last {
                return Ok(last);
            }
        }
        Ok(last)
    }
}
