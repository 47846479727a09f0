//! Computation nodes, their construction, and the materialized network.

pub mod factory;
pub mod graph;
pub mod materialize;
pub mod node;
pub mod tags;

pub use factory::construct_node;
pub use graph::{ComputationNetwork, construct_network};
pub use materialize::{Materialized, NodeIndex, materialize};
pub use node::{ComputationNode, DeferredInput, InitPhase, NodeDetail, NodeKind, ParameterInit};
pub use tags::{RoleGroup, RoleGroups};
