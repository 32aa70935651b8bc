//! # Type Readiness Set
//!
//! Native composite value types returned by registry operations. Every
//! descriptor passes a one-time shape validation before the native module
//! can be assembled, and instances can only be minted through the
//! resulting [`ReadyTypes`] proof, so no value of an unready type ever
//! exists.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::capability::CapabilitySet;
use crate::eval::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub requires: CapabilitySet,
    pub fields: &'static [&'static str],
    pub methods: &'static [&'static str],
}

impl TypeDescriptor {
    const fn new(
        name: &'static str,
        fields: &'static [&'static str],
        methods: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            requires: CapabilitySet::empty(),
            fields,
            methods,
        }
    }

    const fn requires(mut self, requires: CapabilitySet) -> Self {
        self.requires = requires;
        self
    }

    /// Validates the descriptor shape.
    pub fn ready(&self) -> Result<(), ReadinessError> {
        let valid_name = self
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && self.name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid_name {
            return Err(ReadinessError::InvalidName(self.name.to_string()));
        }

        let mut seen = HashSet::new();
        for field in self.fields {
            if !seen.insert(*field) {
                return Err(self.duplicate(field));
            }
        }
        let mut methods = HashSet::new();
        for method in self.methods {
            if !methods.insert(*method) {
                return Err(self.duplicate(method));
            }
            if seen.contains(method) {
                return Err(ReadinessError::FieldMethodCollision {
                    type_name: self.name.to_string(),
                    member: method.to_string(),
                });
            }
        }
        Ok(())
    }

    fn duplicate(&self, member: &str) -> ReadinessError {
        ReadinessError::DuplicateMember {
            type_name: self.name.to_string(),
            member: member.to_string(),
        }
    }
}

pub const TYPE_TABLE: &[TypeDescriptor] = &[
    TypeDescriptor::new(
        "Communicator",
        &["rank", "size"],
        &[
            "broadcast",
            "barrier",
            "sum",
            "max",
            "min",
            "send",
            "receive",
            "wait",
            "get_members",
            "new_communicator",
            "translate_ranks",
        ],
    )
    .requires(CapabilitySet::DISTRIBUTED),
    TypeDescriptor::new("Request", &[], &["wait", "test", "get_message"])
        .requires(CapabilitySet::DISTRIBUTED),
    TypeDescriptor::new("LFC", &[], &["integrate", "derivative", "add", "norm"]),
    TypeDescriptor::new(
        "LocalizedFunctions",
        &[],
        &["integrate", "derivative", "add", "add_density", "add_density2", "norm"],
    ),
    TypeDescriptor::new("Operator", &[], &["apply", "relax", "get_diagonal_element"]),
    TypeDescriptor::new("WOperator", &[], &["apply", "get_diagonal_element"]),
    TypeDescriptor::new(
        "Spline",
        &["l", "rcut", "values"],
        &[
            "get_cutoff",
            "get_angular_momentum_number",
            "get_value_and_derivative",
            "map",
        ],
    ),
    TypeDescriptor::new("Transformer", &[], &["apply", "get_async_sizes"]),
    TypeDescriptor::new("XCFunctional", &["code"], &["calculate", "tpss_x"]),
    TypeDescriptor::new(
        "lxcXCFunctional",
        &["family"],
        &[
            "calculate",
            "get_exchange",
            "get_correlation",
            "set_omega",
            "set_params",
        ],
    ),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("invalid type name {0:?}")]
    InvalidName(String),
    #[error("type {type_name} declares {member} twice")]
    DuplicateMember { type_name: String, member: String },
    #[error("type {type_name} uses {member} as both field and method")]
    FieldMethodCollision { type_name: String, member: String },
    #[error("type {0} is not ready")]
    NotReady(String),
    #[error("type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },
}

/// The descriptors that must be readied before the native module is built.
#[derive(Debug, Clone)]
pub struct TypeReadinessSet {
    descriptors: Vec<TypeDescriptor>,
}

impl TypeReadinessSet {
    pub fn new(descriptors: Vec<TypeDescriptor>) -> Self {
        Self { descriptors }
    }

    /// The shipped type table filtered by the active capabilities.
    pub fn for_capabilities(flags: CapabilitySet) -> Self {
        Self::new(
            TYPE_TABLE
                .iter()
                .filter(|descriptor| flags.satisfies(descriptor.requires))
                .cloned()
                .collect(),
        )
    }

    pub fn descriptors(&self) -> &[TypeDescriptor] {
        &self.descriptors
    }

    /// Readies every descriptor, stopping at the first failure.
    pub fn ready_all(self) -> Result<ReadyTypes, ReadinessError> {
        let mut ready = BTreeMap::new();
        for descriptor in self.descriptors {
            if let Err(e) = descriptor.ready() {
                tracing::error!("readiness failed for {}: {}", descriptor.name, e);
                return Err(e);
            }
            tracing::debug!("type {} ready", descriptor.name);
            ready.insert(descriptor.name, descriptor);
        }
        Ok(ReadyTypes { ready })
    }
}

/// Proof that a set of types completed readiness.
#[derive(Debug, Clone, Default)]
pub struct ReadyTypes {
    ready: BTreeMap<&'static str, TypeDescriptor>,
}

impl ReadyTypes {
    pub fn contains(&self, type_name: &str) -> bool {
        self.ready.contains_key(type_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ready.keys().copied()
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.ready.get(type_name)
    }

    /// Creates an instance of a ready type. Every field must be declared by
    /// the descriptor; undeclared fields are rejected.
    pub fn instantiate(
        &self,
        type_name: &str,
        fields: Vec<(String, Value)>,
    ) -> Result<Arc<NativeObject>, ReadinessError> {
        let descriptor = self
            .ready
            .get(type_name)
            .ok_or_else(|| ReadinessError::NotReady(type_name.to_string()))?;
        if let Some((field, _)) = fields
            .iter()
            .find(|(field, _)| !descriptor.fields.contains(&field.as_str()))
        {
            return Err(ReadinessError::UnknownField {
                type_name: type_name.to_string(),
                field: field.clone(),
            });
        }
        Ok(Arc::new(NativeObject {
            type_name: descriptor.name,
            fields,
        }))
    }
}

/// An instance of a readied native type.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeObject {
    type_name: &'static str,
    fields: Vec<(String, Value)>,
}

impl NativeObject {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_table_is_ready() {
        let ready = TypeReadinessSet::for_capabilities(CapabilitySet::all())
            .ready_all()
            .unwrap();
        assert!(ready.contains("Communicator"));
        assert!(ready.contains("Spline"));
        assert_eq!(ready.names().count(), TYPE_TABLE.len());
    }

    #[test]
    fn test_serial_image_has_no_communicator() {
        let set = TypeReadinessSet::for_capabilities(CapabilitySet::empty());
        assert!(set.descriptors().iter().all(|d| d.name != "Communicator"));
        assert!(set.descriptors().iter().all(|d| d.name != "Request"));
    }

    #[test]
    fn test_first_failure_stops_readiness() {
        let set = TypeReadinessSet::new(vec![
            TypeDescriptor::new("Good", &["a"], &[]),
            TypeDescriptor::new("Bad", &["a"], &["a"]),
            TypeDescriptor::new("", &[], &[]),
        ]);
        assert_eq!(
            set.ready_all().unwrap_err(),
            ReadinessError::FieldMethodCollision {
                type_name: "Bad".to_string(),
                member: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_names() {
        assert!(TypeDescriptor::new("", &[], &[]).ready().is_err());
        assert!(TypeDescriptor::new("1Spline", &[], &[]).ready().is_err());
        assert!(TypeDescriptor::new("two words", &[], &[]).ready().is_err());
    }

    #[test]
    fn test_instantiate_checks_fields() {
        let ready = TypeReadinessSet::new(vec![TypeDescriptor::new("Spline", &["l"], &[])])
            .ready_all()
            .unwrap();

        let spline = ready
            .instantiate("Spline", vec![("l".to_string(), Value::Integer(2))])
            .unwrap();
        assert_eq!(spline.type_name(), "Spline");
        assert_eq!(spline.field("l"), Some(&Value::Integer(2)));

        assert!(matches!(
            ready.instantiate("Spline", vec![("x".to_string(), Value::Null)]),
            Err(ReadinessError::UnknownField { .. })
        ));
        assert_eq!(
            ready.instantiate("Transformer", vec![]).unwrap_err(),
            ReadinessError::NotReady("Transformer".to_string())
        );
    }
}
