//! # Runtime Embedding Controller
//!
//! Owns the embedded runtime for the life of the process: initialize once,
//! run one driver entry point, finalize once.
//!
//! `run` separates three failure classes, each with its own status:
//!
//! * the driver module cannot be imported ([`DriverStatus::ImportFailure`])
//! * it imports but lacks the entry function ([`DriverStatus::EntryPointMissing`])
//! * the entry function raises ([`DriverStatus::ExecutionFailure`])
//!
//! The diagnostic for a failed run is held back until
//! [`Embedding::print_pending_diagnostic`] is called.

use async_trait::async_trait;
use mockall::automock;
use tracing::{error, info};

use crate::args::RuntimeArgs;
use crate::config::DriverConfig;
use crate::eval::ModuleRef;
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleState};
use crate::registry::NativeModule;
use crate::runtime::{Interpreter, ModuleLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DriverStatus {
    Success,
    ImportFailure,
    EntryPointMissing,
    ExecutionFailure,
}

/// The embedded runtime as seen by the bootstrap.
#[automock]
#[async_trait]
pub trait Embedding: Send {
    /// One-time setup; makes `native` importable by drivers.
    fn initialize(&mut self, args: &RuntimeArgs, native: NativeModule)
    -> Result<(), LifecycleError>;
    async fn run(&mut self, module: &str, entry: &str) -> Result<DriverStatus, LifecycleError>;
    fn print_pending_diagnostic(&mut self);
    /// Legal after a failed run as well as after a clean one.
    fn finalize(&mut self) -> Result<(), LifecycleError>;
}

pub struct RuntimeController {
    config: DriverConfig,
    lifecycle: Lifecycle,
    interpreter: Option<Interpreter>,
    pending: Option<String>,
}

impl RuntimeController {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new("runtime"),
            interpreter: None,
            pending: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn pending_diagnostic(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    fn fail(&mut self, status: DriverStatus, message: String) -> DriverStatus {
        error!(%status, "{}", message);
        self.pending = Some(message);
        status
    }
}

#[async_trait]
impl Embedding for RuntimeController {
    fn initialize(
        &mut self,
        args: &RuntimeArgs,
        native: NativeModule,
    ) -> Result<(), LifecycleError> {
        self.lifecycle.initialize()?;
        let loader = ModuleLoader::from_config(&self.config);
        self.interpreter = Some(Interpreter::new(
            loader,
            native,
            args.to_vec(),
            self.config.broadcast_imports,
            self.config.max_call_depth,
        ));
        info!(native_module = %self.config.native_module, "runtime initialized");
        Ok(())
    }

    async fn run(&mut self, module: &str, entry: &str) -> Result<DriverStatus, LifecycleError> {
        let from = self.lifecycle.state();
        let interpreter = self
            .interpreter
            .clone()
            .ok_or(LifecycleError::OutOfOrder {
                resource: "runtime",
                from,
                to: LifecycleState::Running,
            })?;
        self.lifecycle.start()?;
        info!(module, entry, "running driver");

        let module = match interpreter.import(module).await {
            Ok(ModuleRef::Script(module)) => module,
            Ok(ModuleRef::Native(native)) => {
                return Ok(self.fail(
                    DriverStatus::EntryPointMissing,
                    format!("module {} has no function {}", native.name(), entry),
                ));
            }
            Err(e) => {
                return Ok(self.fail(
                    DriverStatus::ImportFailure,
                    format!("cannot import driver module {}: {}", module, e),
                ));
            }
        };
        if module.function(entry).is_none() {
            return Ok(self.fail(
                DriverStatus::EntryPointMissing,
                format!("module {} has no function {}", module.name(), entry),
            ));
        }

        match interpreter.call_function(module, entry, vec![]).await {
            Ok(_) => {
                info!(entry, "driver returned");
                Ok(DriverStatus::Success)
            }
            Err(e) => Ok(self.fail(
                DriverStatus::ExecutionFailure,
                format!("driver raised: {}", e),
            )),
        }
    }

    fn print_pending_diagnostic(&mut self) {
        if let Some(message) = self.pending.take() {
            eprintln!("{}", message);
        }
    }

    fn finalize(&mut self) -> Result<(), LifecycleError> {
        self.lifecycle.finalize()?;
        self.interpreter = None;
        info!("runtime finalized");
        Ok(())
    }
}
