//! Runtime objects and their optional capabilities.
//!
//! Everything a `new` expression produces is an [`Object`]. Capabilities are queried
//! through the `as_*` methods instead of inspecting concrete types, so the graph walker
//! only needs to know about tagging and deferred initialization.

use crate::config::Value;
use crate::error::Result;
use crate::runtime::{BuildContext, Precision};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<dyn Object>;

pub trait Object: fmt::Debug + 'static {
    /// Registry name of the runtime type that produced this object.
    fn type_name(&self) -> &'static str;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Element precision for dual-precision objects.
    fn precision(&self) -> Option<Precision> {
        None
    }

    /// Boxed primitives unwrap to a plain value when they are returned from `new`.
    fn as_value(&self) -> Option<Value> {
        None
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        None
    }

    fn as_deferred_init(&self) -> Option<&dyn DeferredInit> {
        None
    }
}

/// Objects carrying a role tag.
pub trait Taggable {
    fn tag(&self) -> String;
    fn set_tag(&self, tag: &str);
}

/// Objects that keep some arguments unevaluated at construction time.
///
/// `finalize_init` runs exactly once, after the object has been registered under its
/// final name and before anything reads its input edges.
pub trait DeferredInit {
    fn finalize_init(&self, ctx: &BuildContext) -> Result<()>;
    fn is_finalized(&self) -> bool;
}

/// Downcast a shared object to its concrete type.
pub fn downcast<T: Object>(object: &ObjectRef) -> Option<Rc<T>> {
    object.clone().into_any().downcast::<T>().ok()
}

/// A primitive produced by a runtime type (string and numeric helper functions).
#[derive(Debug)]
pub struct BoxedValue {
    type_name: &'static str,
    value: Value,
}

impl BoxedValue {
    pub fn new(type_name: &'static str, value: Value) -> Self {
        Self { type_name, value }
    }
}

impl Object for BoxedValue {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn as_value(&self) -> Option<Value> {
        Some(self.value.clone())
    }
}
