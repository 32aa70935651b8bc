use std::sync::Arc;

use dashmap::DashMap;

use super::{EvalError, EvalResult, Value};
use crate::runtime::{Interpreter, ScriptModule};

/// Scope of one function call or one module body.
///
/// Variables resolve through the call's locals, then the module's globals.
/// A module body has no locals: its `let` bindings become globals.
pub struct ExecutionContext {
    interpreter: Interpreter,
    module: Arc<ScriptModule>,
    locals: Option<DashMap<String, Value>>,
}

impl ExecutionContext {
    /// Context for running a module body.
    pub fn module_body(interpreter: Interpreter, module: Arc<ScriptModule>) -> Self {
        Self {
            interpreter,
            module,
            locals: None,
        }
    }

    /// Context for a function call with its parameters bound.
    pub fn function_call(
        interpreter: Interpreter,
        module: Arc<ScriptModule>,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        Self {
            interpreter,
            module,
            locals: Some(bindings.into_iter().collect()),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn module(&self) -> &Arc<ScriptModule> {
        &self.module
    }

    pub fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.locals.as_ref().and_then(|l| l.get(name)) {
            return Ok(value.clone());
        }
        self.module
            .global(name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    /// Binds a new variable in the innermost scope.
    pub fn define(&self, name: &str, value: Value) {
        match &self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => self.module.set_global(name, value),
        }
    }

    /// Updates an existing variable.
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<()> {
        if let Some(locals) = &self.locals {
            if let Some(mut slot) = locals.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        if self.module.global(name).is_some() {
            self.module.set_global(name, value);
            return Ok(());
        }
        Err(EvalError::UndefinedVariable(name.to_string()))
    }
}
