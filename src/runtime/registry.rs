//! Runtime type registry: the table behind `new TypeName [ ... ]`.
//!
//! The registry is filled once and shared read-only afterwards. Lookups of unknown names
//! return `None`; deciding what that means is up to the caller.

use crate::config::ConfigRecord;
use crate::error::{Error, Result};
use crate::network::{construct_network, construct_node};
use crate::runtime::{BuildContext, ObjectRef, Precision, builtins};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Construction procedure: one record in, one object out.
pub type ConstructFn = fn(&ConfigRecord, &BuildContext) -> Result<ObjectRef>;

#[derive(Clone, Copy)]
pub enum Constructor {
    Single(ConstructFn),
    /// Picks the float or double procedure from the record's `precision` field.
    DualPrecision {
        float: ConstructFn,
        double: ConstructFn,
    },
}

#[derive(Clone)]
pub struct RuntimeTypeEntry {
    name: String,
    constructor: Constructor,
    is_config_record: bool,
}

impl RuntimeTypeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatches_on_precision(&self) -> bool {
        matches!(self.constructor, Constructor::DualPrecision { .. })
    }

    /// Objects of this type are containers whose `new` record members are named
    /// relative to the container rather than prefixed with its own name.
    pub fn is_config_record(&self) -> bool {
        self.is_config_record
    }

    pub fn construct(&self, record: &ConfigRecord, ctx: &BuildContext) -> Result<ObjectRef> {
        let construct = match self.constructor {
            Constructor::Single(f) => f,
            Constructor::DualPrecision { float, double } => match Precision::from_record(record)? {
                Precision::Float => float,
                Precision::Double => double,
            },
        };
        let object = construct(record, ctx)?;
        ctx.record_constructed();
        Ok(object)
    }
}

#[derive(Clone, Default)]
pub struct RuntimeTypeRegistry {
    entries: BTreeMap<String, RuntimeTypeEntry>,
}

impl RuntimeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the network types and the standard value functions.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "ComputationNode",
            Constructor::DualPrecision {
                float: construct_node::<f32>,
                double: construct_node::<f64>,
            },
        );
        registry.register_config_record(
            "ComputationNetwork",
            Constructor::DualPrecision {
                float: construct_network::<f32>,
                double: construct_network::<f64>,
            },
        );
        builtins::register(&mut registry);
        registry
    }

    /// Process-wide standard registry, built on first use.
    pub fn global() -> Arc<RuntimeTypeRegistry> {
        static GLOBAL: OnceLock<Arc<RuntimeTypeRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(RuntimeTypeRegistry::standard()))
            .clone()
    }

    /// Register (or replace) a type.
    pub fn register(&mut self, name: impl Into<String>, constructor: Constructor) {
        self.insert(name.into(), constructor, false);
    }

    pub fn register_config_record(&mut self, name: impl Into<String>, constructor: Constructor) {
        self.insert(name.into(), constructor, true);
    }

    fn insert(&mut self, name: String, constructor: Constructor, is_config_record: bool) {
        let entry = RuntimeTypeEntry {
            name: name.clone(),
            constructor,
            is_config_record,
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            log::debug!("runtime type '{}' re-registered", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&RuntimeTypeEntry> {
        self.entries.get(name)
    }

    /// Construct an object of a registered type.
    pub fn construct(
        &self,
        type_name: &str,
        record: &ConfigRecord,
        ctx: &BuildContext,
    ) -> Result<ObjectRef> {
        self.lookup(type_name)
            .ok_or_else(|| Error::construction(format!("unknown runtime type '{}'", type_name)))?
            .construct(record, ctx)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RuntimeTypeEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Value;
    use crate::network::ComputationNode;
    use crate::runtime::downcast;

    fn parameter_record(precision: &str) -> ConfigRecord {
        ConfigRecord::root()
            .with("precision", Value::String(precision.into()))
            .with("operation", Value::String("Input".into()))
            .with("rows", Value::Number(2.0))
            .with("cols", Value::Number(1.0))
    }

    #[test]
    fn standard_types_are_registered() {
        let registry = RuntimeTypeRegistry::standard();
        let node = registry.lookup("ComputationNode").unwrap();
        assert!(node.dispatches_on_precision());
        assert!(!node.is_config_record());
        assert!(registry.lookup("ComputationNetwork").unwrap().is_config_record());
        assert!(!registry.lookup("StringFunction").unwrap().dispatches_on_precision());
        assert!(registry.lookup("NoSuchType").is_none());
    }

    #[test]
    fn dual_precision_dispatch() {
        let registry = RuntimeTypeRegistry::global();
        let ctx = BuildContext::default();

        let float = registry
            .construct("ComputationNode", &parameter_record("float"), &ctx)
            .unwrap();
        assert!(downcast::<ComputationNode<f32>>(&float).is_some());

        let double = registry
            .construct("ComputationNode", &parameter_record("double"), &ctx)
            .unwrap();
        assert!(downcast::<ComputationNode<f64>>(&double).is_some());
        assert_eq!(ctx.stats().constructed, 2);

        let err = registry
            .construct("ComputationNode", &parameter_record("int8"), &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::Construction(_)), "{}", err);

        let err = registry
            .construct("Nope", &parameter_record("float"), &ctx)
            .unwrap_err();
        assert_eq!(err, Error::construction("unknown runtime type 'Nope'"));
    }
}
