//! Materializes computation networks from declarative descriptions.
//!
//! A description is evaluated lazily by [`config::Evaluator`]; `new` expressions go
//! through the [`runtime::RuntimeTypeRegistry`], and the network object flattens every
//! node reachable from its members into a name index with role groups
//! ([`network::materialize`]). [`builder::NetworkBuilder`] ties these together.

pub mod builder;
pub mod config;
pub mod error;
pub mod network;
pub mod render;
pub mod runtime;

pub use builder::{BuildOptions, BuiltNetwork, NetworkBuilder, build};
pub use error::{Error, Result};
