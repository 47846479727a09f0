//! Configuration records: ordered identifier → value scopes.
//!
//! Field reads walk outward through enclosing records, so a `new` record sees the
//! arguments of the function that created it as well as top-level bindings such as
//! `deviceId` and `precision`. Member enumeration only ever lists the record's own ids.

use crate::config::value::{ConfigValue, Value};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub struct ConfigRecord {
    members: RefCell<IndexMap<String, ConfigValue>>,
    parent: Option<Rc<ConfigRecord>>,
    /// Member path this record is bound to (e.g. `L1` or `network`).
    name_hint: Option<String>,
}

impl ConfigRecord {
    pub fn new(parent: Option<Rc<ConfigRecord>>, name_hint: Option<String>) -> Self {
        Self {
            members: RefCell::new(IndexMap::new()),
            parent,
            name_hint,
        }
    }

    /// Empty top-level record.
    pub fn root() -> Self {
        Self::new(None, None)
    }

    /// Builder-style insert of an evaluated member; replaces an existing one.
    pub fn with(self, id: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.members.borrow_mut().insert(id.into(), value.into());
        self
    }

    pub fn with_name_hint(mut self, hint: impl Into<String>) -> Self {
        self.name_hint = Some(hint.into());
        self
    }

    /// Add a member; ids are unique within one record.
    pub fn insert(&self, id: impl Into<String>, value: ConfigValue) -> Result<()> {
        let id = id.into();
        let mut members = self.members.borrow_mut();
        if members.contains_key(&id) {
            return Err(Error::field(id, "defined more than once in the same record"));
        }
        members.insert(id, value);
        Ok(())
    }

    pub fn name_hint(&self) -> Option<&str> {
        self.name_hint.as_deref()
    }

    /// Own member ids, in declaration order.
    pub fn member_ids(&self) -> Vec<String> {
        self.members.borrow().keys().cloned().collect()
    }

    pub fn own(&self, id: &str) -> Option<ConfigValue> {
        self.members.borrow().get(id).cloned()
    }

    /// Look `id` up here, then in the enclosing records.
    pub fn find(&self, id: &str) -> Option<ConfigValue> {
        if let Some(v) = self.own(id) {
            return Some(v);
        }
        let mut scope = self.parent.as_ref();
        while let Some(record) = scope {
            if let Some(v) = record.own(id) {
                return Some(v);
            }
            scope = record.parent.as_ref();
        }
        None
    }

    /// Evaluate a required field.
    pub fn get(&self, id: &str) -> Result<Value> {
        match self.find(id) {
            Some(v) => v.resolve(),
            None => Err(Error::field(id, "required field is missing")),
        }
    }

    /// Evaluate an optional field.
    pub fn get_opt(&self, id: &str) -> Result<Option<Value>> {
        self.find(id).map(|v| v.resolve()).transpose()
    }

    pub fn number(&self, id: &str) -> Result<f64> {
        expect_number(id, self.get(id)?)
    }

    pub fn number_or(&self, id: &str, default: f64) -> Result<f64> {
        match self.get_opt(id)? {
            Some(v) => expect_number(id, v),
            None => Ok(default),
        }
    }

    /// A number that must be integral.
    pub fn integer(&self, id: &str) -> Result<i64> {
        let n = self.number(id)?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(Error::field(id, format!("expected an integer, found {}", n)));
        }
        Ok(n as i64)
    }

    /// A non-negative integer, e.g. a row or column count.
    pub fn dimension(&self, id: &str) -> Result<usize> {
        let n = self.integer(id)?;
        usize::try_from(n)
            .map_err(|_| Error::field(id, format!("expected a non-negative integer, found {}", n)))
    }

    pub fn string(&self, id: &str) -> Result<String> {
        expect_string(id, self.get(id)?)
    }

    pub fn string_or(&self, id: &str, default: &str) -> Result<String> {
        match self.get_opt(id)? {
            Some(v) => expect_string(id, v),
            None => Ok(default.to_string()),
        }
    }

    pub fn boolean_or(&self, id: &str, default: bool) -> Result<bool> {
        match self.get_opt(id)? {
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(mismatch(id, "a boolean", &other)),
            None => Ok(default),
        }
    }

    /// Drop all members. Used when an evaluation session ends, which releases the
    /// pending computations that capture this record.
    pub(crate) fn clear(&self) {
        // Take the map out first: dropping values may re-enter other records.
        let members = std::mem::take(&mut *self.members.borrow_mut());
        drop(members);
    }
}

fn expect_number(id: &str, value: Value) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(mismatch(id, "a number", &other)),
    }
}

fn expect_string(id: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(mismatch(id, "a string", &other)),
    }
}

fn mismatch(id: &str, expected: &str, found: &Value) -> Error {
    Error::field(id, format!("expected {}, found {}", expected, found.kind()))
}

impl fmt::Debug for ConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ {} ]", self.member_ids().join(" ; "))
    }
}
