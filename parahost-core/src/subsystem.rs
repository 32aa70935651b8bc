//! Optional process-wide native subsystems, brought up after the fabric and
//! before any driver code runs.

use mockall::automock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::CapabilitySet;
use crate::config::SubsystemConfig;

/// Oldest eigensolver API the host can drive.
pub const EIGENSOLVER_MIN_API_VERSION: u32 = 20171201;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubsystemError {
    #[error("{name}: {reason}")]
    InitFailed { name: String, reason: String },
}

#[automock]
pub trait Subsystem: Send {
    fn name(&self) -> &'static str;
    /// Capability flags that must all be present for this subsystem to load.
    fn requires(&self) -> CapabilitySet;
    fn init(&mut self) -> Result<(), SubsystemError>;
    fn uninit(&mut self);
}

/// Subsystems in initialization order. Only those that initialized are torn
/// down, in reverse order, exactly once.
pub struct SubsystemStack {
    subsystems: Vec<Box<dyn Subsystem>>,
    initialized: usize,
}

impl SubsystemStack {
    pub fn new(subsystems: Vec<Box<dyn Subsystem>>) -> Self {
        Self {
            subsystems,
            initialized: 0,
        }
    }

    /// The subsystems shipped with the host.
    pub fn for_config(config: &SubsystemConfig) -> Self {
        Self::new(vec![Box::new(EigensolverSubsystem::new(
            config.eigensolver_api_version,
        ))])
    }

    /// Initializes every subsystem whose guard is satisfied by `flags`,
    /// stopping at the first failure. Already initialized subsystems stay up
    /// until [`SubsystemStack::teardown`].
    pub fn init_all(&mut self, flags: CapabilitySet) -> Result<(), SubsystemError> {
        let mut active = Vec::with_capacity(self.subsystems.len());
        for subsystem in self.subsystems.drain(..) {
            if flags.satisfies(subsystem.requires()) {
                active.push(subsystem);
            } else {
                debug!(subsystem = subsystem.name(), "subsystem not compiled in");
            }
        }
        self.subsystems = active;

        for subsystem in self.subsystems.iter_mut() {
            subsystem.init()?;
            info!(subsystem = subsystem.name(), "subsystem initialized");
            self.initialized += 1;
        }
        Ok(())
    }

    pub fn initialized(&self) -> usize {
        self.initialized
    }

    pub fn teardown(&mut self) {
        while self.initialized > 0 {
            self.initialized -= 1;
            let subsystem = &mut self.subsystems[self.initialized];
            subsystem.uninit();
            info!(subsystem = subsystem.name(), "subsystem torn down");
        }
    }
}

impl Drop for SubsystemStack {
    fn drop(&mut self) {
        if self.initialized > 0 {
            warn!(count = self.initialized, "subsystems still up at drop");
            self.teardown();
        }
    }
}

/// Alternative eigensolver library. Needs a minimum API version.
#[derive(Debug)]
pub struct EigensolverSubsystem {
    api_version: u32,
}

impl EigensolverSubsystem {
    pub fn new(api_version: u32) -> Self {
        Self { api_version }
    }
}

impl Subsystem for EigensolverSubsystem {
    fn name(&self) -> &'static str {
        "eigensolver"
    }

    fn requires(&self) -> CapabilitySet {
        CapabilitySet::ELPA
    }

    fn init(&mut self) -> Result<(), SubsystemError> {
        if self.api_version < EIGENSOLVER_MIN_API_VERSION {
            return Err(SubsystemError::InitFailed {
                name: self.name().to_string(),
                reason: format!(
                    "eigensolver API >= {} required",
                    EIGENSOLVER_MIN_API_VERSION
                ),
            });
        }
        Ok(())
    }

    fn uninit(&mut self) {
        debug!(api_version = self.api_version, "eigensolver released");
    }
}
