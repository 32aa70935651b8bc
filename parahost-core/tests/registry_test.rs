use parahost_core::capability::CapabilitySet;
use parahost_core::registry::{OPERATIONS, build_registry};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn flags() -> impl Strategy<Value = CapabilitySet> {
    any::<u32>().prop_map(CapabilitySet::from_bits_truncate)
}

proptest! {
    #[test]
    fn prop_same_flags_same_registry(flags in flags()) {
        let first = build_registry(flags);
        let second = build_registry(flags);
        prop_assert_eq!(first.names(), second.names());
    }

    #[test]
    fn prop_operation_present_iff_guard_satisfied(flags in flags()) {
        let registry = build_registry(flags);
        for op in OPERATIONS {
            let expected = flags.contains(op.requires);
            prop_assert_eq!(
                registry.lookup(op.name).is_some(),
                expected,
                "{} requires {:?}, flags {:?}",
                op.name,
                op.requires,
                flags
            );
        }
    }

    #[test]
    fn prop_registry_preserves_table_order(flags in flags()) {
        let registry = build_registry(flags);
        let expected: Vec<&str> = OPERATIONS
            .iter()
            .filter(|op| flags.contains(op.requires))
            .map(|op| op.name)
            .collect();
        prop_assert_eq!(registry.names(), expected);
    }
}

#[test]
fn test_scalapack_needs_the_fabric_too() {
    let without_fabric = build_registry(CapabilitySet::SCALAPACK);
    let with_fabric = build_registry(CapabilitySet::SCALAPACK | CapabilitySet::DISTRIBUTED);
    assert!(without_fabric.lookup("scalapack_inverse").is_none());
    assert!(with_fabric.lookup("scalapack_inverse").is_some());
    assert_eq!(
        with_fabric.len() - without_fabric.len(),
        with_fabric
            .names()
            .into_iter()
            .filter(|name| !without_fabric.contains(name))
            .count()
    );
}
