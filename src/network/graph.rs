//! The materialized network: a flat name index plus role groups.

use crate::config::ConfigRecord;
use crate::error::Result;
use crate::network::factory::device_id;
use crate::network::materialize::{Materialized, NodeIndex, materialize};
use crate::network::{ComputationNode, RoleGroup, RoleGroups};
use crate::runtime::{BuildContext, ElemType, Object, ObjectRef, Precision};
use log::debug;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

pub struct ComputationNetwork<E: ElemType> {
    device_id: i32,
    nodes: NodeIndex<E>,
    groups: RoleGroups<E>,
}

impl<E: ElemType> ComputationNetwork<E> {
    pub fn new(device_id: i32, materialized: Materialized<E>) -> Self {
        Self {
            device_id,
            nodes: materialized.nodes,
            groups: materialized.groups,
        }
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn precision(&self) -> Precision {
        E::PRECISION
    }

    pub fn node(&self, name: &str) -> Option<&Rc<ComputationNode<E>>> {
        self.nodes.get(name)
    }

    /// All nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Rc<ComputationNode<E>>> {
        self.nodes.values()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn groups(&self) -> &RoleGroups<E> {
        &self.groups
    }

    pub fn group(&self, group: RoleGroup) -> &[Rc<ComputationNode<E>>] {
        self.groups.get(group)
    }
}

impl<E: ElemType> Drop for ComputationNetwork<E> {
    fn drop(&mut self) {
        // Delay edges can close cycles; the last network holding a node cuts its edges.
        for node in self.nodes.values() {
            node.leave_network();
        }
    }
}

impl<E: ElemType> Object for ComputationNetwork<E> {
    fn type_name(&self) -> &'static str {
        "ComputationNetwork"
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn precision(&self) -> Option<Precision> {
        Some(E::PRECISION)
    }
}

impl<E: ElemType> fmt::Debug for ComputationNetwork<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationNetwork")
            .field("precision", &E::PRECISION)
            .field("device_id", &self.device_id)
            .field("nodes", &self.node_names())
            .finish()
    }
}

impl<E: ElemType> fmt::Display for ComputationNetwork<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "network: {} node(s), precision {}, device {}",
            self.len(),
            E::PRECISION,
            self.device_id
        )?;
        for node in self.nodes() {
            writeln!(f, "  {}", node)?;
        }
        for (group, members) in self.groups.iter() {
            if members.is_empty() {
                continue;
            }
            let names: Vec<String> = members.iter().map(|n| n.name()).collect();
            writeln!(f, "  {}: {}", group.as_str(), names.join(", "))?;
        }
        Ok(())
    }
}

/// Construction procedure for `new ComputationNetwork [ ... ]`.
pub fn construct_network<E: ElemType>(record: &ConfigRecord, ctx: &BuildContext) -> Result<ObjectRef> {
    let device_id = device_id(record)?;
    let network = ComputationNetwork::new(device_id, materialize::<E>(record, ctx)?);
    debug!("{}", network);
    Ok(Rc::new(network))
}
