//! # Distributed Process Bootstrap
//!
//! The per-rank entry point. [`Bootstrap::run`] walks a fixed sequence:
//!
//! 1. initialize the fabric, negotiating the thread level
//! 2. convert the process arguments
//! 3. bring up optional subsystems
//! 4. ready the type set, build the registry, hand both to the embedding
//!    and run the driver
//! 5. surface the pending diagnostic on failure
//! 6. tear down subsystems in reverse order
//! 7. finalize the embedding
//! 8. finalize the fabric
//! 9. release the argument buffers
//!
//! and returns an [`ExitStatus`]. Every failure class maps to its own code.

use std::ffi::OsString;
use std::fmt::Display;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::args::RuntimeArgs;
use crate::capability::CapabilitySet;
use crate::config::HostConfig;
use crate::controller::{DriverStatus, Embedding, RuntimeController};
use crate::error::InternalResult;
use crate::fabric::{Communicator, Fabric, FabricHandle, ThreadLevel};
use crate::kernels::{KernelBackend, ReferenceKernels};
use crate::registry::{NativeModule, build_registry};
use crate::subsystem::SubsystemStack;
use crate::types::TypeReadinessSet;

/// Process exit status. The codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ExitStatus {
    Success,
    ExecutionFailure,
    FabricInitFailure,
    ImportFailure,
    EntryPointMissing,
    SubsystemInitFailure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::ExecutionFailure => 1,
            ExitStatus::FabricInitFailure => 2,
            ExitStatus::ImportFailure => 3,
            ExitStatus::EntryPointMissing => 4,
            ExitStatus::SubsystemInitFailure => 5,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl From<DriverStatus> for ExitStatus {
    fn from(status: DriverStatus) -> Self {
        match status {
            DriverStatus::Success => ExitStatus::Success,
            DriverStatus::ImportFailure => ExitStatus::ImportFailure,
            DriverStatus::EntryPointMissing => ExitStatus::EntryPointMissing,
            DriverStatus::ExecutionFailure => ExitStatus::ExecutionFailure,
        }
    }
}

fn report(stage: &str, err: impl Display) {
    error!(stage, "{}", err);
    eprintln!("parahost: {} failed: {}", stage, err);
}

pub struct Bootstrap {
    config: HostConfig,
    flags: CapabilitySet,
    fabric: FabricHandle,
    embedding: Box<dyn Embedding>,
    kernels: Arc<dyn KernelBackend>,
    subsystems: SubsystemStack,
    types: Option<TypeReadinessSet>,
}

impl Bootstrap {
    pub fn new(config: HostConfig, fabric: Box<dyn Fabric>) -> Self {
        Self {
            flags: CapabilitySet::compiled(),
            fabric: FabricHandle::new(fabric),
            embedding: Box::new(RuntimeController::new(config.driver.clone())),
            kernels: Arc::new(ReferenceKernels::new(config.kernels.xc_version.clone())),
            subsystems: SubsystemStack::for_config(&config.subsystems),
            types: None,
            config,
        }
    }

    pub fn with_embedding(mut self, embedding: Box<dyn Embedding>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_kernels(mut self, kernels: Arc<dyn KernelBackend>) -> Self {
        self.kernels = kernels;
        self
    }

    pub fn with_subsystems(mut self, subsystems: SubsystemStack) -> Self {
        self.subsystems = subsystems;
        self
    }

    /// Overrides the compiled capability flags.
    pub fn with_capabilities(mut self, flags: CapabilitySet) -> Self {
        self.flags = flags;
        self
    }

    /// Overrides the type table readied before the native module is built.
    pub fn with_types(mut self, types: TypeReadinessSet) -> Self {
        self.types = Some(types);
        self
    }

    fn requested_thread_level(&self) -> ThreadLevel {
        self.config.fabric.thread_level.unwrap_or(
            if self.flags.contains(CapabilitySet::THREADS) {
                ThreadLevel::Multiple
            } else {
                ThreadLevel::Single
            },
        )
    }

    pub async fn run<I>(mut self, raw_args: I) -> ExitStatus
    where
        I: IntoIterator<Item = OsString>,
    {
        let requested = self.requested_thread_level();
        if let Err(e) = self.fabric.init(requested) {
            report("fabric initialization", e);
            return ExitStatus::FabricInitFailure;
        }
        let world = match self.fabric.world() {
            Ok(world) => world,
            Err(e) => {
                report("fabric initialization", e);
                self.finalize_fabric();
                return ExitStatus::FabricInitFailure;
            }
        };
        info!(rank = world.rank(), size = world.size(), "rank started");

        let args = RuntimeArgs::convert(raw_args);
        let status = self.run_driver(&args, world).await;
        self.finalize_fabric();
        drop(args);
        info!(%status, code = status.code(), "bootstrap finished");
        status
    }

    async fn run_driver(
        &mut self,
        args: &RuntimeArgs,
        world: Arc<dyn Communicator>,
    ) -> ExitStatus {
        if let Err(e) = self.subsystems.init_all(self.flags) {
            report("subsystem initialization", e);
            self.subsystems.teardown();
            return ExitStatus::SubsystemInitFailure;
        }

        // No partially readied module is ever handed to the embedding.
        let native = match self.install_native(world) {
            Ok(native) => native,
            Err(e) => {
                report("native module installation", e);
                self.subsystems.teardown();
                return ExitStatus::ImportFailure;
            }
        };

        let status = match self.embedding.initialize(args, native) {
            Ok(()) => {
                let driver = &self.config.driver;
                match self.embedding.run(&driver.module, &driver.entry).await {
                    Ok(status) => ExitStatus::from(status),
                    Err(e) => {
                        report("driver run", e);
                        ExitStatus::ExecutionFailure
                    }
                }
            }
            Err(e) => {
                report("runtime initialization", e);
                ExitStatus::ImportFailure
            }
        };

        if !status.is_success() {
            self.embedding.print_pending_diagnostic();
        }
        self.subsystems.teardown();
        if let Err(e) = self.embedding.finalize() {
            warn!("runtime finalize failed: {}", e);
        }
        status
    }

    fn install_native(&mut self, world: Arc<dyn Communicator>) -> InternalResult<NativeModule> {
        let types = self
            .types
            .take()
            .unwrap_or_else(|| TypeReadinessSet::for_capabilities(self.flags))
            .ready_all()?;
        let registry = build_registry(self.flags);
        Ok(NativeModule::install(
            self.config.driver.native_module.clone(),
            registry,
            types,
            world,
            self.kernels.clone(),
        )?)
    }

    fn finalize_fabric(&mut self) {
        if let Err(e) = self.fabric.finalize() {
            warn!("fabric finalize failed: {}", e);
        }
    }
}
