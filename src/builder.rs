//! Entry point: network description in, materialized network out.

use crate::config::prelude;
use crate::config::{Evaluator, Script, Value, parse};
use crate::error::{Error, Result};
use crate::network::ComputationNetwork;
use crate::network::factory::CPU_DEVICE;
use crate::render::NetworkSummary;
use crate::runtime::{BuildContext, BuildStats, ElemType, Precision, RuntimeTypeRegistry, downcast};
use log::info;
use serde::Deserialize;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Build settings; can be loaded from JSON (`{"deviceId": 0, "precision": "double"}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildOptions {
    pub device_id: i32,
    pub precision: Precision,
    /// Added to every random seed handed out during the build.
    pub random_seed_offset: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            device_id: CPU_DEVICE,
            precision: Precision::Float,
            random_seed_offset: 0,
        }
    }
}

/// Builds the network described by `source` once and hands out the cached result after.
pub struct NetworkBuilder<E: ElemType> {
    source: String,
    options: BuildOptions,
    registry: Arc<RuntimeTypeRegistry>,
    network: Option<Rc<ComputationNetwork<E>>>,
    stats: BuildStats,
}

impl<E: ElemType> NetworkBuilder<E> {
    /// `source` is the network record, `[ ... ]`; a bare member list is accepted too.
    pub fn new(source: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            source: source.into(),
            options,
            registry: RuntimeTypeRegistry::global(),
            network: None,
            stats: BuildStats::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<RuntimeTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Counters of the build that produced the cached network.
    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Evaluate the description and materialize its network.
    ///
    /// A network with at least one node is cached and returned unchanged by later calls.
    pub fn build_network_from_description(&mut self) -> Result<Rc<ComputationNetwork<E>>> {
        if let Some(network) = &self.network {
            if !network.is_empty() {
                return Ok(network.clone());
            }
        }

        let prelude = prelude::standard()?;
        let script = self.script()?;
        let ctx = BuildContext::new(self.options.random_seed_offset);
        let evaluator = Evaluator::new(&[&prelude, &script], self.registry.clone(), ctx)?;

        let object = match evaluator.evaluate_field("network")? {
            Value::Object(object) => object,
            other => {
                return Err(Error::construction(format!(
                    "'network' is a {}, expected a ComputationNetwork",
                    other.kind()
                )));
            }
        };
        let network = downcast::<ComputationNetwork<E>>(&object).ok_or_else(|| {
            Error::PrecisionMismatch {
                requested: E::PRECISION.to_string(),
                actual: object
                    .precision()
                    .map_or_else(|| object.type_name().to_string(), |p| p.to_string()),
            }
        })?;

        self.stats = evaluator.context().stats();
        info!(
            "built {} network with {} node(s) ({} object(s) constructed)",
            E::PRECISION,
            network.len(),
            self.stats.constructed
        );
        self.network = Some(network.clone());
        Ok(network)
    }

    /// Wrap the description as the `network` member of a top-level record that also
    /// carries the build settings.
    fn script(&self) -> Result<Script> {
        let header = format!(
            "deviceId = {} ; precision = '{}' ; network = new ComputationNetwork ",
            self.options.device_id,
            E::PRECISION
        );
        let (text, shift) = if self.source.trim_start().starts_with('[') {
            (format!("{}{}", header, self.source), header.len())
        } else {
            (format!("{}[ {}\n]", header, self.source), header.len() + 2)
        };
        parse(&text).map_err(|err| match err {
            // Report positions relative to the caller's text.
            Error::Syntax {
                line: 1,
                column,
                message,
            } => Error::Syntax {
                line: 1,
                column: column.saturating_sub(shift).max(1),
                message,
            },
            other => other,
        })
    }
}

/// A built network of either element type.
#[derive(Debug, Clone)]
pub enum BuiltNetwork {
    Float(Rc<ComputationNetwork<f32>>),
    Double(Rc<ComputationNetwork<f64>>),
}

impl BuiltNetwork {
    pub fn precision(&self) -> Precision {
        match self {
            BuiltNetwork::Float(_) => Precision::Float,
            BuiltNetwork::Double(_) => Precision::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BuiltNetwork::Float(n) => n.len(),
            BuiltNetwork::Double(n) => n.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self, stats: BuildStats) -> NetworkSummary {
        match self {
            BuiltNetwork::Float(n) => NetworkSummary::from_network(n, stats),
            BuiltNetwork::Double(n) => NetworkSummary::from_network(n, stats),
        }
    }
}

impl fmt::Display for BuiltNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltNetwork::Float(n) => write!(f, "{}", n),
            BuiltNetwork::Double(n) => write!(f, "{}", n),
        }
    }
}

/// Build with the element type selected by `options.precision`.
pub fn build(source: &str, options: &BuildOptions) -> Result<(BuiltNetwork, BuildStats)> {
    match options.precision {
        Precision::Float => {
            let mut builder = NetworkBuilder::<f32>::new(source, options.clone());
            let network = builder.build_network_from_description()?;
            Ok((BuiltNetwork::Float(network), builder.stats()))
        }
        Precision::Double => {
            let mut builder = NetworkBuilder::<f64>::new(source, options.clone());
            let network = builder.build_network_from_description()?;
            Ok((BuiltNetwork::Double(network), builder.stats()))
        }
    }
}
