use thiserror::Error;

use crate::analyzer::parsers::program::SyntaxError;
use crate::broadcast::BroadcastError;
use crate::config::ConfigError;
use crate::eval::EvalError;
use crate::fabric::FabricError;
use crate::kernels::KernelError;
use crate::lifecycle::LifecycleError;
use crate::registry::{OpError, RegistryError};
use crate::runtime::LoadError;
use crate::subsystem::SubsystemError;
use crate::types::ReadinessError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Fabric error: {0}")]
    Fabric(#[from] FabricError),
    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("Subsystem error: {0}")]
    Subsystem(#[from] SubsystemError),
    // native module
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Operation error: {0}")]
    Op(#[from] OpError),
    // driver
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
