//! Construction procedures for `ComputationNode` and helpers shared with deferred nodes.

use crate::config::{ConfigRecord, Value};
use crate::error::{Error, Result};
use crate::network::node::{ComputationNode, DeferredInput, NodeDetail, NodeKind, ParameterInit};
use crate::network::tags::RoleGroup;
use crate::runtime::{BuildContext, ElemType, ObjectRef, Taggable, downcast};
use log::debug;
use std::rc::Rc;

/// Placement used when a record does not say otherwise.
pub const CPU_DEVICE: i32 = -1;

pub(crate) fn device_id(record: &ConfigRecord) -> Result<i32> {
    if record.find("deviceId").is_none() {
        return Ok(CPU_DEVICE);
    }
    let id = record.integer("deviceId")?;
    i32::try_from(id).map_err(|_| Error::field("deviceId", format!("{} is out of range", id)))
}

/// Build one node from a `new ComputationNode [ operation = ... ]` record.
///
/// The node kind comes from `operation`. Nodes with inputs pull their `inputs` field
/// here, which may construct arbitrarily many further nodes. `Delay` keeps its `input`
/// unevaluated until the network finalizes it.
pub fn construct_node<E: ElemType>(record: &ConfigRecord, ctx: &BuildContext) -> Result<ObjectRef> {
    let operation = record.string("operation")?;
    let kind = NodeKind::from_operation(&operation)
        .ok_or_else(|| Error::construction(format!("unknown node kind '{}'", operation)))?;
    let device_id = device_id(record)?;

    let detail = match kind {
        NodeKind::LearnableParameter => parameter_detail::<E>(record, ctx)?,
        NodeKind::Input => NodeDetail::Input {
            rows: record.dimension("rows")?,
            cols: record.dimension("cols")?,
        },
        NodeKind::RowSlice => NodeDetail::RowSlice {
            first: record.dimension("first")?,
            num: record.dimension("num")?,
        },
        NodeKind::Delay => {
            let input = record
                .find("input")
                .ok_or_else(|| Error::field("input", "required field is missing"))?;
            NodeDetail::Delay(DeferredInput::new(record.integer("deltaT")?, input))
        }
        _ => NodeDetail::Standard,
    };

    let inputs = if kind.has_inputs() && !kind.defers_inputs() {
        input_nodes::<E>(record)?
    } else {
        Vec::new()
    };

    // Named after the inputs so anonymous numbering follows evaluation order.
    let name = ctx.node_name(record.name_hint(), kind.as_str());
    let node = Rc::new(ComputationNode::<E>::new(name, kind, device_id, detail));
    if kind.has_inputs() && !kind.defers_inputs() {
        node.attach_inputs(inputs)?;
    }

    let tag = record.string_or("tag", "")?;
    if RoleGroup::from_tag(&tag).is_err() {
        return Err(Error::construction(format!(
            "node '{}' has unknown tag '{}'",
            node.name(),
            tag
        )));
    }
    node.set_tag(&tag);

    debug!("constructed {}", node);
    Ok(node)
}

fn parameter_detail<E: ElemType>(record: &ConfigRecord, ctx: &BuildContext) -> Result<NodeDetail<E>> {
    let rows = record.dimension("rows")?;
    let cols = record.dimension("cols")?;
    let need_gradient = record.boolean_or("needGradient", true)?;

    let init = match record.string_or("init", "uniform")?.as_str() {
        "fixedValue" => ParameterInit::FixedValue(E::from_f64(record.number_or("value", 0.0)?)),
        "uniform" => ParameterInit::Uniform {
            scale: record.number_or("initValueScale", 1.0)?,
            seed: ctx.next_random_seed(),
        },
        "gaussian" => ParameterInit::Gaussian {
            scale: record.number_or("initValueScale", 1.0)?,
            seed: ctx.next_random_seed(),
        },
        "fromFile" => {
            let path = record.string_or("initFromFilePath", "")?;
            if path.is_empty() {
                return Err(Error::construction(
                    "initFromFilePath must be set when using the 'fromFile' initialization method",
                ));
            }
            ParameterInit::FromFile(path.into())
        }
        other => {
            return Err(Error::construction(format!(
                "init must be one of [uniform|gaussian|fixedValue|fromFile], found '{}'",
                other
            )));
        }
    };

    Ok(NodeDetail::Parameter {
        rows,
        cols,
        need_gradient,
        init,
    })
}

/// Pull the `inputs` field: a single node or an array of nodes, in declaration order.
fn input_nodes<E: ElemType>(record: &ConfigRecord) -> Result<Vec<Rc<ComputationNode<E>>>> {
    match record.get("inputs")? {
        Value::Array(items) => items
            .iter()
            .map(|item| input_node::<E>(&item.resolve()?, "inputs"))
            .collect(),
        single => Ok(vec![input_node::<E>(&single, "inputs")?]),
    }
}

/// Interpret an evaluated value as a node of element type `E`.
pub(crate) fn input_node<E: ElemType>(value: &Value, field: &str) -> Result<Rc<ComputationNode<E>>> {
    let object = match value {
        Value::Object(o) => o,
        other => {
            return Err(Error::field(
                field,
                format!("expected a ComputationNode, found {}", other.kind()),
            ));
        }
    };
    if let Some(node) = downcast::<ComputationNode<E>>(object) {
        return Ok(node);
    }
    Err(match object.precision() {
        Some(p) if object.type_name() == "ComputationNode" => Error::construction(format!(
            "input in '{}' has element type {}, expected {}",
            field,
            p,
            E::PRECISION
        )),
        _ => Error::field(
            field,
            format!("expected a ComputationNode, found {}", object.type_name()),
        ),
    })
}
