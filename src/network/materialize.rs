//! Work-list flattening of the node graph reachable from a root record.
//!
//! Phases per node:
//! 1) register it under its name (or skip it if this exact node is already there),
//! 2) finalize deferred initialization, which may construct further nodes,
//! 3) classify its tag,
//! 4) queue its input nodes.
//!
//! Registering before finalizing is what lets a node's inputs refer back to it: by the
//! time they are reached, the node is already in the index and is skipped.

use crate::config::{ConfigRecord, Value};
use crate::error::{Error, Result};
use crate::network::{ComputationNode, RoleGroups};
use crate::runtime::{BuildContext, ElemType, Object, downcast};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::rc::Rc;

/// Name → node, in discovery order.
pub type NodeIndex<E> = IndexMap<String, Rc<ComputationNode<E>>>;

#[derive(Debug)]
pub struct Materialized<E: ElemType> {
    pub nodes: NodeIndex<E>,
    pub groups: RoleGroups<E>,
}

/// Discover, deduplicate and classify every node reachable from `root`'s own members.
pub fn materialize<E: ElemType>(root: &ConfigRecord, ctx: &BuildContext) -> Result<Materialized<E>> {
    let mut work: VecDeque<Rc<ComputationNode<E>>> = VecDeque::new();

    // Seed with the root members that are nodes of our element type.
    for id in root.member_ids() {
        let Some(value) = root.own(&id) else {
            continue;
        };
        if let Value::Object(object) = value.resolve()? {
            match downcast::<ComputationNode<E>>(&object) {
                Some(node) => work.push_back(node),
                None if object.type_name() == "ComputationNode" => warn!(
                    "member '{}' is a {:?} node and is not part of this {} network",
                    id,
                    object.precision(),
                    E::PRECISION
                ),
                None => trace!("member '{}' is a {}, not a node", id, object.type_name()),
            }
        }
    }

    let mut nodes = NodeIndex::<E>::new();
    let mut groups = RoleGroups::new();
    if let Err(err) = walk(work, ctx, &mut nodes, &mut groups) {
        // Finalized delays may already close cycles through the partial index.
        for node in nodes.values() {
            node.leave_network();
        }
        return Err(err);
    }

    debug!("materialized {} node(s)", nodes.len());
    Ok(Materialized { nodes, groups })
}

fn walk<E: ElemType>(
    mut work: VecDeque<Rc<ComputationNode<E>>>,
    ctx: &BuildContext,
    nodes: &mut NodeIndex<E>,
    groups: &mut RoleGroups<E>,
) -> Result<()> {
    while let Some(node) = work.pop_front() {
        let name = node.name();
        match nodes.entry(name) {
            Entry::Occupied(existing) => {
                if Rc::ptr_eq(existing.get(), &node) {
                    continue;
                }
                return Err(Error::NamingConflict(existing.key().clone()));
            }
            Entry::Vacant(slot) => {
                node.enter_network();
                slot.insert(node.clone());
            }
        }

        // Another network may have reached this node first.
        if let Some(deferred) = node.as_deferred_init() {
            if !deferred.is_finalized() {
                deferred.finalize_init(ctx)?;
            }
        }

        if let Some(taggable) = node.as_taggable() {
            if let Some(group) = groups.classify(&node, &taggable.tag())? {
                trace!("'{}' joins the {} group", node.name(), group.as_str());
            }
        }

        for child in node.children()? {
            trace!("queue '{}' (input of '{}')", child.name(), node.name());
            work.push_back(child);
        }
    }
    Ok(())
}
