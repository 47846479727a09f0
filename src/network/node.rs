//! Computation nodes and the catalog of standard node kinds.
//!
//! Nodes are opaque structure: they record their kind, name, tag, input edges and
//! construction parameters. Numeric state lives elsewhere.

use crate::config::ConfigValue;
use crate::error::{Error, Result};
use crate::network::factory;
use crate::runtime::{BuildContext, DeferredInit, ElemType, Object, Precision, Taggable};
use serde::Serialize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    LearnableParameter,
    Input,
    Plus,
    Minus,
    Times,
    ElementTimes,
    Negate,
    Sigmoid,
    Tanh,
    RectifiedLinear,
    Log,
    Exp,
    Softmax,
    Mean,
    InvStdDev,
    PerDimMeanVarNormalization,
    RowSlice,
    CrossEntropyWithSoftmax,
    SquareError,
    ErrorPrediction,
    Delay,
}

impl NodeKind {
    pub const ALL: &'static [NodeKind] = &[
        NodeKind::LearnableParameter,
        NodeKind::Input,
        NodeKind::Plus,
        NodeKind::Minus,
        NodeKind::Times,
        NodeKind::ElementTimes,
        NodeKind::Negate,
        NodeKind::Sigmoid,
        NodeKind::Tanh,
        NodeKind::RectifiedLinear,
        NodeKind::Log,
        NodeKind::Exp,
        NodeKind::Softmax,
        NodeKind::Mean,
        NodeKind::InvStdDev,
        NodeKind::PerDimMeanVarNormalization,
        NodeKind::RowSlice,
        NodeKind::CrossEntropyWithSoftmax,
        NodeKind::SquareError,
        NodeKind::ErrorPrediction,
        NodeKind::Delay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::LearnableParameter => "LearnableParameter",
            NodeKind::Input => "Input",
            NodeKind::Plus => "Plus",
            NodeKind::Minus => "Minus",
            NodeKind::Times => "Times",
            NodeKind::ElementTimes => "ElementTimes",
            NodeKind::Negate => "Negate",
            NodeKind::Sigmoid => "Sigmoid",
            NodeKind::Tanh => "Tanh",
            NodeKind::RectifiedLinear => "RectifiedLinear",
            NodeKind::Log => "Log",
            NodeKind::Exp => "Exp",
            NodeKind::Softmax => "Softmax",
            NodeKind::Mean => "Mean",
            NodeKind::InvStdDev => "InvStdDev",
            NodeKind::PerDimMeanVarNormalization => "PerDimMeanVarNormalization",
            NodeKind::RowSlice => "RowSlice",
            NodeKind::CrossEntropyWithSoftmax => "CrossEntropyWithSoftmax",
            NodeKind::SquareError => "SquareError",
            NodeKind::ErrorPrediction => "ErrorPrediction",
            NodeKind::Delay => "Delay",
        }
    }

    /// Resolve an `operation` string; exact, case-sensitive match.
    pub fn from_operation(operation: &str) -> Option<NodeKind> {
        NodeKind::ALL.iter().copied().find(|k| k.as_str() == operation)
    }

    /// Number of input edges a node of this kind takes.
    pub fn arity(self) -> usize {
        match self {
            NodeKind::LearnableParameter | NodeKind::Input => 0,
            NodeKind::Negate
            | NodeKind::Sigmoid
            | NodeKind::Tanh
            | NodeKind::RectifiedLinear
            | NodeKind::Log
            | NodeKind::Exp
            | NodeKind::Softmax
            | NodeKind::Mean
            | NodeKind::InvStdDev
            | NodeKind::RowSlice
            | NodeKind::Delay => 1,
            NodeKind::Plus
            | NodeKind::Minus
            | NodeKind::Times
            | NodeKind::ElementTimes
            | NodeKind::CrossEntropyWithSoftmax
            | NodeKind::SquareError
            | NodeKind::ErrorPrediction => 2,
            NodeKind::PerDimMeanVarNormalization => 3,
        }
    }

    pub fn has_inputs(self) -> bool {
        self.arity() > 0
    }

    /// Kinds whose input is resolved after registration rather than at construction.
    pub fn defers_inputs(self) -> bool {
        matches!(self, NodeKind::Delay)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a learnable parameter gets its initial values.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterInit<E> {
    Uniform { seed: u64, scale: f64 },
    Gaussian { seed: u64, scale: f64 },
    FixedValue(E),
    FromFile(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Allocated,
    Finalized,
}

/// Stashed, still unevaluated input of a deferred node.
pub struct DeferredInput {
    delta_t: i64,
    pending: RefCell<Option<ConfigValue>>,
    phase: Cell<InitPhase>,
}

impl DeferredInput {
    pub fn new(delta_t: i64, input: ConfigValue) -> Self {
        Self {
            delta_t,
            pending: RefCell::new(Some(input)),
            phase: Cell::new(InitPhase::Allocated),
        }
    }

    pub fn delta_t(&self) -> i64 {
        self.delta_t
    }

    pub fn phase(&self) -> InitPhase {
        self.phase.get()
    }
}

pub enum NodeDetail<E> {
    Standard,
    Input {
        rows: usize,
        cols: usize,
    },
    Parameter {
        rows: usize,
        cols: usize,
        need_gradient: bool,
        init: ParameterInit<E>,
    },
    RowSlice {
        first: usize,
        num: usize,
    },
    Delay(DeferredInput),
}

pub struct ComputationNode<E: ElemType> {
    name: String,
    kind: NodeKind,
    device_id: i32,
    tag: RefCell<String>,
    inputs: RefCell<Vec<Rc<ComputationNode<E>>>>,
    detail: NodeDetail<E>,
    /// Networks currently indexing this node.
    networks: Cell<usize>,
}

impl<E: ElemType> ComputationNode<E> {
    pub fn new(name: impl Into<String>, kind: NodeKind, device_id: i32, detail: NodeDetail<E>) -> Self {
        Self {
            name: name.into(),
            kind,
            device_id,
            tag: RefCell::new(String::new()),
            inputs: RefCell::new(Vec::new()),
            detail,
            networks: Cell::new(0),
        }
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn detail(&self) -> &NodeDetail<E> {
        &self.detail
    }

    /// `(rows, cols)` for nodes that declare their shape.
    pub fn shape(&self) -> Option<(usize, usize)> {
        match self.detail {
            NodeDetail::Input { rows, cols } | NodeDetail::Parameter { rows, cols, .. } => {
                Some((rows, cols))
            }
            _ => None,
        }
    }

    /// Connect input edges, checking the kind's arity.
    pub fn attach_inputs(&self, inputs: Vec<Rc<ComputationNode<E>>>) -> Result<()> {
        let expected = self.kind.arity();
        if inputs.len() != expected {
            return Err(Error::construction(format!(
                "{} node '{}' expects {} input(s), got {}",
                self.kind,
                self.name(),
                expected,
                inputs.len()
            )));
        }
        *self.inputs.borrow_mut() = inputs;
        Ok(())
    }

    /// Input edges in order. Not available on deferred nodes until they are finalized.
    pub fn children(&self) -> Result<Vec<Rc<ComputationNode<E>>>> {
        if let NodeDetail::Delay(state) = &self.detail {
            if state.phase() != InitPhase::Finalized {
                return Err(Error::NotFinalized(self.name()));
            }
        }
        Ok(self.inputs.borrow().clone())
    }

    /// Names of the currently attached inputs, for diagnostics.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.borrow().iter().map(|n| n.name()).collect()
    }

    /// Drop all input edges; used to release cycles when a network goes away.
    pub(crate) fn detach_inputs(&self) {
        let inputs = std::mem::take(&mut *self.inputs.borrow_mut());
        drop(inputs);
    }

    pub(crate) fn enter_network(&self) {
        self.networks.set(self.networks.get() + 1);
    }

    /// Leave a network; the last one to let go cuts the input edges.
    pub(crate) fn leave_network(&self) {
        let remaining = self.networks.get().saturating_sub(1);
        self.networks.set(remaining);
        if remaining == 0 {
            self.detach_inputs();
        }
    }
}

impl<E: ElemType> Object for ComputationNode<E> {
    fn type_name(&self) -> &'static str {
        "ComputationNode"
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn precision(&self) -> Option<Precision> {
        Some(E::PRECISION)
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        Some(self)
    }

    fn as_deferred_init(&self) -> Option<&dyn DeferredInit> {
        match self.detail {
            NodeDetail::Delay(_) => Some(self),
            _ => None,
        }
    }
}

impl<E: ElemType> Taggable for ComputationNode<E> {
    fn tag(&self) -> String {
        self.tag.borrow().clone()
    }

    fn set_tag(&self, tag: &str) {
        *self.tag.borrow_mut() = tag.to_string();
    }
}

impl<E: ElemType> DeferredInit for ComputationNode<E> {
    fn finalize_init(&self, ctx: &BuildContext) -> Result<()> {
        let NodeDetail::Delay(state) = &self.detail else {
            return Err(Error::construction(format!(
                "node '{}' does not defer its initialization",
                self.name()
            )));
        };
        if state.phase() == InitPhase::Finalized {
            return Err(Error::construction(format!(
                "node '{}' finalized more than once",
                self.name()
            )));
        }
        let pending = state.pending.borrow_mut().take().ok_or_else(|| {
            Error::construction(format!("node '{}' has no pending input", self.name()))
        })?;

        // May construct any number of further nodes, including ones that point back here.
        let input = factory::input_node::<E>(&pending.resolve()?, "input")?;
        self.attach_inputs(vec![input])?;
        state.phase.set(InitPhase::Finalized);
        ctx.record_finalized();
        log::debug!("finalized deferred node '{}'", self.name());
        Ok(())
    }

    fn is_finalized(&self) -> bool {
        match &self.detail {
            NodeDetail::Delay(state) => state.phase() == InitPhase::Finalized,
            _ => true,
        }
    }
}

impl<E: ElemType> fmt::Debug for ComputationNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inputs by name only: the graph may be cyclic.
        f.debug_struct("ComputationNode")
            .field("name", &self.name())
            .field("kind", &self.kind)
            .field("precision", &E::PRECISION)
            .field("tag", &self.tag())
            .field("inputs", &self.input_names())
            .finish()
    }
}

impl<E: ElemType> fmt::Display for ComputationNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name(), self.kind)?;
        match &self.detail {
            NodeDetail::Input { rows, cols } => write!(f, "({} x {})", rows, cols)?,
            NodeDetail::Parameter { rows, cols, init, .. } => {
                write!(f, "({} x {}, {})", rows, cols, describe_init(init))?
            }
            NodeDetail::RowSlice { first, num } => write!(
                f,
                "({}, first={}, num={})",
                self.input_names().join(", "),
                first,
                num
            )?,
            NodeDetail::Delay(state) => write!(
                f,
                "({}, deltaT={})",
                self.input_names().join(", "),
                state.delta_t()
            )?,
            NodeDetail::Standard => write!(f, "({})", self.input_names().join(", "))?,
        }
        let tag = self.tag();
        if !tag.is_empty() {
            write!(f, " {{tag={}}}", tag)?;
        }
        Ok(())
    }
}

fn describe_init<E: ElemType>(init: &ParameterInit<E>) -> String {
    match init {
        ParameterInit::Uniform { seed, scale } => format!("uniform seed={} scale={}", seed, scale),
        ParameterInit::Gaussian { seed, scale } => format!("gaussian seed={} scale={}", seed, scale),
        ParameterInit::FixedValue(v) => format!("fixedValue {}", v),
        ParameterInit::FromFile(path) => format!("fromFile {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Value;

    fn leaf(name: &str) -> Rc<ComputationNode<f32>> {
        Rc::new(ComputationNode::new(
            name,
            NodeKind::Input,
            -1,
            NodeDetail::Input { rows: 2, cols: 1 },
        ))
    }

    #[test]
    fn catalog_lookup_is_exact() {
        assert_eq!(NodeKind::from_operation("Sigmoid"), Some(NodeKind::Sigmoid));
        assert_eq!(NodeKind::from_operation("sigmoid"), None);
        assert_eq!(NodeKind::from_operation("Bogus"), None);
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_operation(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn arity_is_enforced() {
        let plus: ComputationNode<f32> =
            ComputationNode::new("p", NodeKind::Plus, -1, NodeDetail::Standard);
        assert!(plus.attach_inputs(vec![leaf("a")]).is_err());
        plus.attach_inputs(vec![leaf("a"), leaf("b")]).unwrap();
        assert_eq!(plus.input_names(), vec!["a", "b"]);
        assert_eq!(plus.to_string(), "p = Plus(a, b)");
    }

    #[test]
    fn deferred_node_hides_children_until_finalized() {
        let target = leaf("x");
        let pending = ConfigValue::ready(Value::Object(target.clone()));
        let delay: Rc<ComputationNode<f32>> = Rc::new(ComputationNode::new(
            "d",
            NodeKind::Delay,
            -1,
            NodeDetail::Delay(DeferredInput::new(-1, pending)),
        ));
        let ctx = BuildContext::default();

        assert_eq!(delay.children().unwrap_err(), Error::NotFinalized("d".into()));
        let deferred = delay.as_deferred_init().unwrap();
        assert!(!deferred.is_finalized());
        deferred.finalize_init(&ctx).unwrap();
        assert!(deferred.is_finalized());
        assert!(Rc::ptr_eq(&delay.children().unwrap()[0], &target));
        assert!(deferred.finalize_init(&ctx).is_err());
        assert_eq!(ctx.stats().finalized, 1);
    }
}
