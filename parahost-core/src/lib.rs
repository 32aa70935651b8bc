//! # parahost: Distributed Driver Host
//!
//! parahost embeds a small scripting runtime in every rank of a distributed
//! numerical job and exposes a build-dependent table of native operations to
//! the driver programs it runs.
//!
//! ## Startup
//!
//! Each rank goes through the same linear sequence ([`bootstrap`]):
//!
//! ```text
//! fabric init → args → subsystems → type readiness → registry
//!     → runtime initialize → run(driver, entry) → teardown → exit status
//! ```
//!
//! Exit statuses are distinct per failure class ([`bootstrap::ExitStatus`]).
//! The [`launcher`] runs N ranks in one process over [`fabric::local`] and
//! folds their statuses into one.
//!
//! ## Components
//!
//! - Broadcast channel ([`broadcast`]): coordinator-owned bytes replicated
//!   to every rank, length first
//! - Capability registry ([`capability`], [`registry`]): the flat operation
//!   table, filtered once by compile-time flags
//! - Type readiness ([`types`]): native value shapes validated before the
//!   registry is exposed
//! - Runtime controller ([`controller`]): initialize, run, finalize
//! - Distributed fabric ([`fabric`]) and optional subsystems ([`subsystem`])
//!
//! ## Driver Language Pipeline
//!
//! ```text
//! Source Code → Tokenizer → Preprocessor → Parser → Evaluator
//! ```
//!
//! - [`tokenizer`]: raw `.phs` text to tokens
//! - [`preprocessor`]: drops whitespace and comments
//! - [`analyzer`]: parser combinators producing the [`ast`]
//! - [`eval`] and [`runtime`]: module loading and async evaluation

pub mod analyzer;
pub mod args;
pub mod ast;
pub mod bootstrap;
pub mod broadcast;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod eval;
pub mod fabric;
pub mod kernels;
pub mod launcher;
pub mod lifecycle;
pub mod preprocessor;
pub mod registry;
pub mod runtime;
pub mod subsystem;
pub mod tokenizer;
pub mod types;

// Re-exports
pub use bootstrap::{Bootstrap, ExitStatus};
pub use capability::{Capability, CapabilitySet};
pub use config::HostConfig;
pub use error::*;
pub use eval::Value;
pub use launcher::Launcher;
pub use registry::{NativeModule, Registry, build_registry};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
