//! Lazily evaluated configuration values.
//!
//! A [`ConfigValue`] is a shared cell that starts out as a pending computation and is
//! replaced by its result the first time it is read. Every later read returns a clone of
//! the cached [`Value`], so objects keep their `Rc` identity no matter how often or from
//! where they are reached.

use crate::config::eval::Lambda;
use crate::config::record::ConfigRecord;
use crate::error::{Error, Result};
use crate::runtime::ObjectRef;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A fully evaluated configuration value.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Bool(bool),
    String(String),
    /// Ordered sequence; elements stay lazy until pulled.
    Array(Vec<ConfigValue>),
    Record(Rc<ConfigRecord>),
    Function(Rc<Lambda>),
    Object(ObjectRef),
}

impl Value {
    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => write!(f, "<array of {}>", items.len()),
            Value::Record(r) => write!(f, "{:?}", r),
            Value::Function(l) => write!(f, "<function {}>", l.name()),
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

type Compute = Box<dyn FnOnce() -> Result<Value>>;

enum ThunkState {
    Pending(Compute),
    Evaluating,
    Ready(Value),
    Failed(Error),
}

struct Thunk {
    /// What this value is bound to; only used in error messages.
    what: String,
    state: RefCell<ThunkState>,
}

/// Shared handle to a lazily evaluated value.
#[derive(Clone)]
pub struct ConfigValue(Rc<Thunk>);

impl ConfigValue {
    /// An already evaluated value.
    pub fn ready(value: Value) -> Self {
        Self(Rc::new(Thunk {
            what: String::new(),
            state: RefCell::new(ThunkState::Ready(value)),
        }))
    }

    /// A value computed on first read.
    pub fn deferred(
        what: impl Into<String>,
        compute: impl FnOnce() -> Result<Value> + 'static,
    ) -> Self {
        Self(Rc::new(Thunk {
            what: what.into(),
            state: RefCell::new(ThunkState::Pending(Box::new(compute))),
        }))
    }

    /// Evaluate (at most once) and return the cached value.
    ///
    /// Reading a value from inside its own computation is a circular reference.
    pub fn resolve(&self) -> Result<Value> {
        let compute = {
            let mut state = self.0.state.borrow_mut();
            match std::mem::replace(&mut *state, ThunkState::Evaluating) {
                ThunkState::Pending(compute) => compute,
                ThunkState::Evaluating => {
                    return Err(Error::eval(format!(
                        "circular reference while evaluating '{}'",
                        self.describe()
                    )));
                }
                ThunkState::Ready(value) => {
                    *state = ThunkState::Ready(value.clone());
                    return Ok(value);
                }
                ThunkState::Failed(err) => {
                    *state = ThunkState::Failed(err.clone());
                    return Err(err);
                }
            }
        };

        // The borrow is released here: the computation may read other values.
        let result = compute();
        *self.0.state.borrow_mut() = match &result {
            Ok(value) => ThunkState::Ready(value.clone()),
            Err(err) => ThunkState::Failed(err.clone()),
        };
        result
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.0.state.borrow(), ThunkState::Ready(_))
    }

    pub fn describe(&self) -> &str {
        if self.0.what.is_empty() {
            "<value>"
        } else {
            &self.0.what
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.state.borrow() {
            ThunkState::Pending(_) => write!(f, "<pending {}>", self.describe()),
            ThunkState::Evaluating => write!(f, "<evaluating {}>", self.describe()),
            ThunkState::Ready(v) => write!(f, "{:?}", v),
            ThunkState::Failed(e) => write!(f, "<failed: {}>", e),
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        ConfigValue::ready(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn evaluates_once_and_caches() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let value = ConfigValue::deferred("x", move || {
            counter.set(counter.get() + 1);
            Ok(Value::Number(42.0))
        });

        assert!(!value.is_resolved());
        for _ in 0..3 {
            match value.resolve() {
                Ok(Value::Number(n)) => assert_eq!(n, 42.0),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(calls.get(), 1);
        assert!(value.is_resolved());
    }

    #[test]
    fn self_reference_is_circular() {
        let slot: Rc<RefCell<Option<ConfigValue>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let value = ConfigValue::deferred("a", move || {
            let me = inner.borrow().clone().expect("slot filled");
            me.resolve()
        });
        *slot.borrow_mut() = Some(value.clone());

        let err = value.resolve().unwrap_err();
        assert!(err.to_string().contains("circular reference"), "{}", err);
        // Drop the self-referencing handle so the cell is released.
        slot.borrow_mut().take();
    }

    #[test]
    fn failure_is_cached() {
        let value = ConfigValue::deferred("bad", || Err(Error::eval("boom")));
        assert_eq!(value.resolve().unwrap_err(), Error::eval("boom"));
        assert_eq!(value.resolve().unwrap_err(), Error::eval("boom"));
    }
}
