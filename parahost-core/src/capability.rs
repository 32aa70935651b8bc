//! # Capability Flags
//!
//! Compile-time feature families present in this process image. The set is
//! resolved once from the crate's cargo features and never re-evaluated.
//! Registry construction ([`crate::registry::build_registry`]) is the only
//! place where these flags are consulted.

use serde::{Deserialize, Serialize};

/// A single optional feature family.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Distributed-process fabric (multi-rank job).
    Distributed,
    /// Distributed dense eigensolver family (BLACS/PBLAS).
    Scalapack,
    /// MR3 variant of the distributed eigensolver.
    Mr3,
    /// Alternative eigensolver library with a global init step.
    Elpa,
    /// Hardware performance counters.
    Hpm,
    /// Profiling region hooks.
    Craypat,
    /// Memory-info sampling.
    Papi,
    /// Vectorized van-der-Waals density operator backend.
    Libvdwxc,
    /// Build carries a source revision identifier.
    Githash,
    /// Full multi-thread support requested from the fabric.
    Threads,
}

bitflags::bitflags! {
    /// A set of capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u32 {
        const DISTRIBUTED = 1 << 0;
        const SCALAPACK = 1 << 1;
        const MR3 = 1 << 2;
        const ELPA = 1 << 3;
        const HPM = 1 << 4;
        const CRAYPAT = 1 << 5;
        const PAPI = 1 << 6;
        const LIBVDWXC = 1 << 7;
        const GITHASH = 1 << 8;
        const THREADS = 1 << 9;
    }
}

impl Capability {
    /// Returns the bitflag for this capability.
    pub const fn as_set(self) -> CapabilitySet {
        match self {
            Self::Distributed => CapabilitySet::DISTRIBUTED,
            Self::Scalapack => CapabilitySet::SCALAPACK,
            Self::Mr3 => CapabilitySet::MR3,
            Self::Elpa => CapabilitySet::ELPA,
            Self::Hpm => CapabilitySet::HPM,
            Self::Craypat => CapabilitySet::CRAYPAT,
            Self::Papi => CapabilitySet::PAPI,
            Self::Libvdwxc => CapabilitySet::LIBVDWXC,
            Self::Githash => CapabilitySet::GITHASH,
            Self::Threads => CapabilitySet::THREADS,
        }
    }
}

impl From<Capability> for CapabilitySet {
    fn from(cap: Capability) -> Self {
        cap.as_set()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for cap in iter {
            set |= cap.as_set();
        }
        set
    }
}

impl CapabilitySet {
    /// The flags this process image was built with.
    pub fn compiled() -> Self {
        let mut set = CapabilitySet::empty();
        set.set(CapabilitySet::DISTRIBUTED, cfg!(feature = "distributed"));
        set.set(CapabilitySet::SCALAPACK, cfg!(feature = "scalapack"));
        set.set(CapabilitySet::MR3, cfg!(feature = "mr3"));
        set.set(CapabilitySet::ELPA, cfg!(feature = "elpa"));
        set.set(CapabilitySet::HPM, cfg!(feature = "hpm"));
        set.set(CapabilitySet::CRAYPAT, cfg!(feature = "craypat"));
        set.set(CapabilitySet::PAPI, cfg!(feature = "papi"));
        set.set(CapabilitySet::LIBVDWXC, cfg!(feature = "libvdwxc"));
        set.set(CapabilitySet::GITHASH, cfg!(feature = "githash"));
        set.set(CapabilitySet::THREADS, cfg!(feature = "threads"));
        set
    }

    /// Active capabilities, in declaration order.
    pub fn capabilities(&self) -> Vec<Capability> {
        use strum::IntoEnumIterator;
        Capability::iter()
            .filter(|cap| self.contains(cap.as_set()))
            .collect()
    }

    /// Returns true when every flag in `required` is present.
    pub fn satisfies(&self, required: CapabilitySet) -> bool {
        self.contains(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_iter_composes_flags() {
        let set: CapabilitySet = [Capability::Distributed, Capability::Scalapack]
            .into_iter()
            .collect();
        assert!(set.satisfies(CapabilitySet::DISTRIBUTED));
        assert!(set.satisfies(CapabilitySet::DISTRIBUTED | CapabilitySet::SCALAPACK));
        assert!(!set.satisfies(CapabilitySet::SCALAPACK | CapabilitySet::ELPA));
    }

    #[test]
    fn test_empty_requirement_always_satisfied() {
        assert!(CapabilitySet::empty().satisfies(CapabilitySet::empty()));
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::Libvdwxc.to_string(), "libvdwxc");
        assert_eq!(Capability::from_str("mr3").unwrap(), Capability::Mr3);
        let set = CapabilitySet::HPM | CapabilitySet::DISTRIBUTED;
        assert_eq!(
            set.capabilities(),
            vec![Capability::Distributed, Capability::Hpm]
        );
    }

    #[test]
    fn test_compiled_matches_features() {
        let compiled = CapabilitySet::compiled();
        assert_eq!(
            compiled.contains(CapabilitySet::DISTRIBUTED),
            cfg!(feature = "distributed")
        );
        assert_eq!(compiled.contains(CapabilitySet::ELPA), cfg!(feature = "elpa"));
    }
}
