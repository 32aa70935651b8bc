//! # Distributed Fabric
//!
//! The collective-communication substrate connecting every rank of one job.
//!
//! * [`Fabric`]: process-wide init/finalize with thread level negotiation
//! * [`Communicator`]: the global-scope communicator used for collectives
//! * [`FabricHandle`]: the single owner of a fabric, enforcing init-once and
//!   finalize-once through a [`Lifecycle`]
//!
//! Two fabrics ship with the crate: [`serial::SerialFabric`] for a one-rank
//! image and [`local::LocalFabric`] which hosts N ranks inside one process.

pub mod local;
pub mod serial;

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleState};

/// Thread support levels, ordered from weakest to strongest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThreadLevel {
    Single,
    Funneled,
    Serialized,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    #[error("fabric initialization failed: {0}")]
    InitFailed(String),
    #[error("requested thread level {requested} but the fabric granted {granted}")]
    InsufficientThreadLevel {
        requested: ThreadLevel,
        granted: ThreadLevel,
    },
    #[error("fabric is not initialized")]
    NotInitialized,
    #[error("invalid world size {0}")]
    InvalidWorldSize(usize),
    #[error("root rank {root} is outside a world of size {size}")]
    InvalidRoot { root: usize, size: usize },
    #[error("rank {rank} is the root of this collective but supplied no length")]
    MissingLength { rank: usize },
    #[error("receive buffer holds {actual} bytes but the root is sending {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("collective received an unexpected message kind at sequence {sequence}")]
    Protocol { sequence: u64 },
    #[error("fabric aborted: {0}")]
    Aborted(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

pub type FabricResult<T> = Result<T, FabricError>;

/// Process-wide fabric initialization.
#[automock]
pub trait Fabric: Send {
    /// Initializes the fabric and returns the granted thread level.
    fn init(&mut self, requested: ThreadLevel) -> FabricResult<ThreadLevel>;
    /// The global-scope communicator. Only valid after `init`.
    fn world(&self) -> FabricResult<Arc<dyn Communicator>>;
    fn finalize(&mut self) -> FabricResult<()>;
}

/// A communicator of global scope.
///
/// Collectives are blocking: every rank must reach the same call, in the same
/// order, before any of them completes. Rank numbering is zero-based.
#[async_trait]
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Broadcasts a fixed-width length. Only `root` supplies `Some`.
    async fn broadcast_len(&self, len: Option<u64>, root: usize) -> FabricResult<u64>;

    /// Broadcasts exactly `buf.len()` bytes. The root's buffer is the source;
    /// every other rank's buffer is overwritten. A receive buffer whose length
    /// differs from the root's is rejected before any byte is copied.
    async fn broadcast_buf(&self, buf: &mut [u8], root: usize) -> FabricResult<()>;

    /// Tears down the whole job. Every pending and future collective fails.
    fn abort(&self, reason: &str);
}

/// Owns a [`Fabric`] and guards its init-once/finalize-once lifecycle.
pub struct FabricHandle {
    fabric: Box<dyn Fabric>,
    lifecycle: Lifecycle,
}

impl FabricHandle {
    pub fn new(fabric: Box<dyn Fabric>) -> Self {
        Self {
            fabric,
            lifecycle: Lifecycle::new("fabric"),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Initializes the fabric, rejecting a granted level below the request.
    ///
    /// When the level is insufficient the underlying fabric has already been
    /// brought up, so it is finalized here before the error is returned.
    pub fn init(&mut self, requested: ThreadLevel) -> FabricResult<ThreadLevel> {
        self.lifecycle.initialize()?;
        let granted = match self.fabric.init(requested) {
            Ok(granted) => granted,
            Err(e) => {
                // Nothing came up, so there is nothing to finalize later.
                self.lifecycle.finalize()?;
                return Err(e);
            }
        };
        if granted < requested {
            warn!(%requested, %granted, "fabric granted a lesser thread level");
            self.finalize()?;
            return Err(FabricError::InsufficientThreadLevel { requested, granted });
        }
        info!(%granted, "fabric initialized");
        Ok(granted)
    }

    pub fn world(&self) -> FabricResult<Arc<dyn Communicator>> {
        if !self.lifecycle.is(LifecycleState::Initialized) {
            return Err(FabricError::NotInitialized);
        }
        self.fabric.world()
    }

    pub fn finalize(&mut self) -> FabricResult<()> {
        self.lifecycle.finalize()?;
        self.fabric.finalize()?;
        info!("fabric finalized");
        Ok(())
    }
}
