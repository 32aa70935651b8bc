//! Linear lifecycle shared by process-wide singleton resources (the embedded
//! runtime and the distributed fabric handle).
//!
//! A resource moves `Uninitialized → Initialized → Running → Finalized` and
//! never goes back. Any other transition is rejected with
//! [`LifecycleError::OutOfOrder`] instead of being attempted.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Running,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{resource}: cannot move from {from} to {to}")]
    OutOfOrder {
        resource: &'static str,
        from: LifecycleState,
        to: LifecycleState,
    },
}

#[derive(Debug)]
pub struct Lifecycle {
    resource: &'static str,
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is(&self, state: LifecycleState) -> bool {
        self.state == state
    }

    /// Moves to `to` if the current state is one of `from`.
    pub fn advance(
        &mut self,
        from: &[LifecycleState],
        to: LifecycleState,
    ) -> Result<(), LifecycleError> {
        if !from.contains(&self.state) {
            return Err(LifecycleError::OutOfOrder {
                resource: self.resource,
                from: self.state,
                to,
            });
        }
        debug!(resource = self.resource, from = %self.state, to = %to, "lifecycle transition");
        self.state = to;
        Ok(())
    }

    pub fn initialize(&mut self) -> Result<(), LifecycleError> {
        self.advance(&[LifecycleState::Uninitialized], LifecycleState::Initialized)
    }

    pub fn start(&mut self) -> Result<(), LifecycleError> {
        self.advance(&[LifecycleState::Initialized], LifecycleState::Running)
    }

    /// Finalize is legal from any live state, including after a failed run.
    pub fn finalize(&mut self) -> Result<(), LifecycleError> {
        self.advance(
            &[LifecycleState::Initialized, LifecycleState::Running],
            LifecycleState::Finalized,
        )
    }
}
