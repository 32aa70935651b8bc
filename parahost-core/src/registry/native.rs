use std::sync::Arc;

use tracing::{debug, info};

use super::{
    CallingConvention, Entry, OpContext, OpError, OpResult, Registry, RegistryError,
};
use crate::eval::Value;
use crate::fabric::Communicator;
use crate::kernels::KernelBackend;
use crate::types::ReadyTypes;

/// The registry as seen by drivers: one importable module whose members are
/// the registry's operations plus a few read-only attributes.
pub struct NativeModule {
    name: String,
    registry: Registry,
    context: Arc<OpContext>,
}

impl NativeModule {
    /// Assembles the module. Requires every type the registry can return to
    /// be ready, so no operation is reachable before its result type is.
    pub fn install(
        name: impl Into<String>,
        registry: Registry,
        types: ReadyTypes,
        comm: Arc<dyn Communicator>,
        kernels: Arc<dyn KernelBackend>,
    ) -> Result<Self, RegistryError> {
        if let Some(op) = registry
            .iter()
            .find(|op| op.returns.is_some_and(|t| !types.contains(t)))
        {
            return Err(RegistryError::TypeNotReady {
                operation: op.name,
                type_name: op.returns.unwrap_or_default(),
            });
        }

        let name = name.into();
        info!(
            module = %name,
            operations = registry.len(),
            "native module installed"
        );
        let context = Arc::new(OpContext {
            comm,
            kernels,
            types: Arc::new(types),
            flags: registry.flags(),
        });
        Ok(Self {
            name,
            registry,
            context,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn communicator(&self) -> Arc<dyn Communicator> {
        self.context.comm.clone()
    }

    /// Read-only module attributes.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "libxc_version" => Some(Value::String(self.context.kernels.xc_version())),
            "capabilities" => Some(Value::List(
                self.registry
                    .flags()
                    .capabilities()
                    .into_iter()
                    .map(|cap| Value::String(cap.to_string()))
                    .collect(),
            )),
            _ => None,
        }
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> OpResult<Value> {
        let op = self
            .registry
            .lookup(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if op.convention == CallingConvention::NoArgs && !args.is_empty() {
            return Err(OpError::NoArgs {
                name: op.name.to_string(),
                found: args.len(),
            });
        }
        debug!(operation = op.name, args = args.len(), "native call");

        match op.entry {
            Entry::Kernel => Ok(self.context.kernels.invoke(op.name, &args)?),
            Entry::Constructor(type_name) => {
                let fields = self.context.kernels.construct(type_name, &args)?;
                Ok(Value::Object(self.context.types.instantiate(type_name, fields)?))
            }
            Entry::Builtin(f) => f(self.context.clone(), args).await,
        }
    }
}
