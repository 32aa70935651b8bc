//! # Capability Registry
//!
//! The flat name → operation table exposed to drivers as the native module.
//! [`build_registry`] filters the static operation table by a capability
//! set once; nothing on the call path consults capabilities again, so an
//! operation whose guard is absent simply does not exist under its name.
//!
//! ```text
//! CapabilitySet ─► build_registry ─► Registry ─┐
//! TypeReadinessSet ─► ready_all ─► ReadyTypes ─┴► NativeModule::install
//! ```

mod native;
mod table;

pub use native::NativeModule;
pub use table::OPERATIONS;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::broadcast::BroadcastError;
use crate::capability::CapabilitySet;
use crate::eval::Value;
use crate::fabric::Communicator;
use crate::kernels::{KernelBackend, KernelError};
use crate::types::{ReadinessError, ReadyTypes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallingConvention {
    /// Positional arguments; arity is checked by the implementation.
    Args,
    /// Calling with any argument is an arity error.
    NoArgs,
}

/// Implementation of a layer-owned operation.
pub type NativeFn = fn(Arc<OpContext>, Vec<Value>) -> BoxFuture<'static, OpResult<Value>>;

#[derive(Debug, Clone, Copy)]
pub enum Entry {
    /// Delegated to the kernel backend under the operation's name.
    Kernel,
    /// Builds an instance of the named type through the kernel backend.
    Constructor(&'static str),
    Builtin(NativeFn),
}

#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub convention: CallingConvention,
    pub requires: CapabilitySet,
    pub entry: Entry,
    /// Native type of the result, if the operation returns one.
    pub returns: Option<&'static str>,
}

impl OperationDescriptor {
    pub const fn kernel(name: &'static str) -> Self {
        Self {
            name,
            convention: CallingConvention::Args,
            requires: CapabilitySet::empty(),
            entry: Entry::Kernel,
            returns: None,
        }
    }

    pub const fn constructor(name: &'static str) -> Self {
        Self {
            entry: Entry::Constructor(name),
            returns: Some(name),
            ..Self::kernel(name)
        }
    }

    pub const fn builtin(name: &'static str, f: NativeFn) -> Self {
        Self {
            entry: Entry::Builtin(f),
            ..Self::kernel(name)
        }
    }

    pub const fn no_args(mut self) -> Self {
        self.convention = CallingConvention::NoArgs;
        self
    }

    pub const fn returning(mut self, type_name: &'static str) -> Self {
        self.returns = Some(type_name);
        self
    }

    pub const fn requires(mut self, requires: CapabilitySet) -> Self {
        self.requires = requires;
        self
    }
}

/// Capability-filtered operations in table order. Read-only once built.
#[derive(Debug, Clone)]
pub struct Registry {
    flags: CapabilitySet,
    operations: Vec<OperationDescriptor>,
    index: HashMap<&'static str, usize>,
}

/// Builds the registry for `flags`.
///
/// An operation is included iff every flag guarding it is set. The same
/// flags always produce the same names in the same order.
pub fn build_registry(flags: CapabilitySet) -> Registry {
    let operations: Vec<OperationDescriptor> = OPERATIONS
        .iter()
        .filter(|op| flags.satisfies(op.requires))
        .copied()
        .collect();
    let index = operations
        .iter()
        .enumerate()
        .map(|(i, op)| (op.name, i))
        .collect();
    tracing::debug!(
        flags = ?flags,
        operations = operations.len(),
        "registry built"
    );
    Registry {
        flags,
        operations,
        index,
    }
}

impl Registry {
    pub fn flags(&self) -> CapabilitySet {
        self.flags
    }

    pub fn lookup(&self, name: &str) -> Option<&OperationDescriptor> {
        self.index.get(name).map(|&i| &self.operations[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.operations.iter().map(|op| op.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Native types that some operation in this registry can return.
    pub fn return_types(&self) -> BTreeSet<&'static str> {
        self.operations.iter().filter_map(|op| op.returns).collect()
    }
}

/// What an operation sees of the process it runs in.
pub struct OpContext {
    pub comm: Arc<dyn Communicator>,
    pub kernels: Arc<dyn KernelBackend>,
    pub types: Arc<ReadyTypes>,
    pub flags: CapabilitySet,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("native module has no operation {0:?}")]
    NotFound(String),
    #[error("operation {operation} returns {type_name}, which is not ready")]
    TypeNotReady {
        operation: &'static str,
        type_name: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error("{name}() takes no arguments ({found} given)")]
    NoArgs { name: String, found: usize },
    #[error("{name}() takes {expected} arguments ({found} given)")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name}(): {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
}

pub type OpResult<T> = Result<T, OpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique() {
        let mut seen = HashSet::new();
        for op in OPERATIONS {
            assert!(seen.insert(op.name), "duplicate operation {}", op.name);
        }
    }

    #[test]
    fn test_serial_registry() {
        let registry = build_registry(CapabilitySet::empty());
        assert!(registry.contains("scal"));
        assert!(registry.contains("globally_broadcast_bytes"));
        assert!(registry.contains("Spline"));
        assert!(!registry.contains("Communicator"));
        assert!(!registry.contains("new_blacs_context"));
        assert!(!registry.contains("githash"));
        assert!(registry.lookup("Communicator").is_none());
    }

    #[test]
    fn test_nested_guards_compose() {
        let scalapack_only = build_registry(CapabilitySet::SCALAPACK | CapabilitySet::MR3);
        assert!(!scalapack_only.contains("scalapack_diagonalize_dc"));

        let distributed = CapabilitySet::DISTRIBUTED | CapabilitySet::SCALAPACK;
        let registry = build_registry(distributed);
        assert!(registry.contains("scalapack_diagonalize_dc"));
        assert!(!registry.contains("scalapack_diagonalize_mr3"));
        assert!(!registry.contains("pyelpa_setup"));

        let registry = build_registry(distributed | CapabilitySet::MR3 | CapabilitySet::ELPA);
        assert!(registry.contains("scalapack_diagonalize_mr3"));
        assert!(registry.contains("pyelpa_setup"));
    }

    #[test]
    fn test_conventions() {
        let registry = build_registry(CapabilitySet::HPM);
        assert_eq!(
            registry.lookup("mpi_start").map(|op| op.convention),
            Some(CallingConvention::NoArgs)
        );
        assert_eq!(
            registry.lookup("hpm_start").map(|op| op.convention),
            Some(CallingConvention::Args)
        );
        assert_eq!(
            registry.lookup("rank").map(|op| op.convention),
            Some(CallingConvention::NoArgs)
        );
    }

    #[test]
    fn test_return_types() {
        let serial = build_registry(CapabilitySet::empty()).return_types();
        assert!(serial.contains("Spline"));
        assert!(!serial.contains("Communicator"));

        let distributed = build_registry(CapabilitySet::DISTRIBUTED).return_types();
        assert!(distributed.contains("Communicator"));
    }

    #[test]
    fn test_table_order_is_kept() {
        let registry = build_registry(CapabilitySet::all());
        let names = registry.names();
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("symmetrize") < position("LocalizedFunctions"));
        assert!(position("Communicator") < position("new_blacs_context"));
        assert_eq!(names.last(), Some(&"githash"));
    }
}
