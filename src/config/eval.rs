//! Lazy evaluation of parsed descriptions.
//!
//! Every record member becomes a [`ConfigValue`] that evaluates its expression on first
//! read, in the scope of the record that declares it. Function arguments are lazy in the
//! same way. Objects are only constructed when a `new` expression is actually reached.
//!
//! Members carry a path hint (`L1.W`) into their evaluation. A `new` expression uses the
//! hint as the name of the object it creates, which is how nodes get their names.

use crate::config::ast::{Arg, BinaryOp, Expr, Member, Param, Script, UnaryOp};
use crate::config::{ConfigRecord, ConfigValue, Value};
use crate::error::{Error, Result};
use crate::runtime::{BuildContext, ObjectRef, RuntimeTypeRegistry};
use log::trace;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// A function member, closed over the record that defines it.
pub struct Lambda {
    name: String,
    params: Vec<Param>,
    body: Rc<Expr>,
    scope: Rc<ConfigRecord>,
}

impl Lambda {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.param_names().join(", "))
    }
}

struct Session {
    registry: Arc<RuntimeTypeRegistry>,
    ctx: BuildContext,
    /// Every record created by this session; cleared when the session ends.
    records: RefCell<Vec<Weak<ConfigRecord>>>,
}

/// Evaluation session over one or more scripts sharing a top-level record.
///
/// Pending members capture the records they live in, so records form reference cycles
/// until they are evaluated. Dropping the evaluator clears every record it created.
pub struct Evaluator {
    session: Rc<Session>,
    root: Rc<ConfigRecord>,
}

impl Evaluator {
    /// Bind the members of `scripts`, in order, into one top-level record. Nothing is
    /// evaluated yet.
    pub fn new(
        scripts: &[&Script],
        registry: Arc<RuntimeTypeRegistry>,
        ctx: BuildContext,
    ) -> Result<Self> {
        let session = Rc::new(Session {
            registry,
            ctx,
            records: RefCell::new(Vec::new()),
        });
        let root = Rc::new(ConfigRecord::root());
        session.track(&root);
        for script in scripts {
            session.add_members(&root, &script.members, Some(""))?;
        }
        Ok(Self { session, root })
    }

    pub fn root(&self) -> &Rc<ConfigRecord> {
        &self.root
    }

    pub fn context(&self) -> &BuildContext {
        &self.session.ctx
    }

    /// Evaluate a top-level member.
    pub fn evaluate_field(&self, id: &str) -> Result<Value> {
        match self.root.own(id) {
            Some(value) => value.resolve(),
            None => Err(Error::eval(format!("no top-level member '{}'", id))),
        }
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        let records = std::mem::take(&mut *self.session.records.borrow_mut());
        for record in records.iter().filter_map(Weak::upgrade) {
            record.clear();
        }
    }
}

fn join_path(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

fn is_node(object: &ObjectRef) -> bool {
    object.type_name() == "ComputationNode"
}

impl Session {
    fn track(&self, record: &Rc<ConfigRecord>) {
        self.records.borrow_mut().push(Rc::downgrade(record));
    }

    fn new_record(
        self: &Rc<Self>,
        members: &[Member],
        parent: &Rc<ConfigRecord>,
        name_hint: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Rc<ConfigRecord>> {
        let record = Rc::new(ConfigRecord::new(
            Some(parent.clone()),
            name_hint.map(String::from),
        ));
        self.track(&record);
        self.add_members(&record, members, namespace)?;
        Ok(record)
    }

    /// Bind `members` into `record`. With a namespace, value members are evaluated with
    /// their path as name hint; without one, whatever they create is anonymous.
    fn add_members(
        self: &Rc<Self>,
        record: &Rc<ConfigRecord>,
        members: &[Member],
        namespace: Option<&str>,
    ) -> Result<()> {
        for member in members {
            let value = match member {
                Member::Value { name, expr } => {
                    let path = namespace.map(|ns| join_path(ns, name));
                    let what = path.clone().unwrap_or_else(|| name.clone());
                    let (session, expr, scope) = (self.clone(), expr.clone(), record.clone());
                    ConfigValue::deferred(what, move || session.eval(&expr, &scope, path.as_deref()))
                }
                Member::Function { name, params, body } => {
                    ConfigValue::ready(Value::Function(Rc::new(Lambda {
                        name: name.clone(),
                        params: params.clone(),
                        body: body.clone(),
                        scope: record.clone(),
                    })))
                }
            };
            record.insert(member.name(), value)?;
        }
        Ok(())
    }

    fn lazy(self: &Rc<Self>, expr: &Rc<Expr>, scope: &Rc<ConfigRecord>, what: &str) -> ConfigValue {
        let (session, expr, scope) = (self.clone(), expr.clone(), scope.clone());
        ConfigValue::deferred(what, move || session.eval(&expr, &scope, None))
    }

    fn eval(self: &Rc<Self>, expr: &Rc<Expr>, scope: &Rc<ConfigRecord>, hint: Option<&str>) -> Result<Value> {
        match &**expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Ident(name) => match scope.find(name) {
                Some(value) => value.resolve(),
                None => Err(Error::eval(format!("unknown identifier '{}'", name))),
            },
            Expr::Record(members) => {
                let record = self.new_record(members, scope, hint, hint)?;
                Ok(Value::Record(record))
            }
            Expr::New { type_name, members } => self.construct(type_name, members, scope, hint),
            Expr::Field { target, field } => match self.eval(target, scope, None)? {
                Value::Record(record) => match record.own(field) {
                    Some(value) => value.resolve(),
                    None => Err(Error::eval(format!("record has no member '{}'", field))),
                },
                other => Err(Error::eval(format!(
                    "cannot access member '{}' of a {}",
                    field,
                    other.kind()
                ))),
            },
            Expr::Call { callee, args } => self.call(callee, args, scope, hint),
            Expr::Unary { op, operand } => self.unary(*op, operand, scope, hint),
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, scope, hint),
            Expr::If {
                cond,
                then,
                otherwise,
            } => match self.eval(cond, scope, None)? {
                Value::Bool(true) => self.eval(then, scope, hint),
                Value::Bool(false) => self.eval(otherwise, scope, hint),
                other => Err(Error::eval(format!(
                    "'if' condition must be a boolean, found {}",
                    other.kind()
                ))),
            },
            Expr::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.lazy(item, scope, "array element"))
                    .collect(),
            )),
        }
    }

    fn construct(
        self: &Rc<Self>,
        type_name: &str,
        members: &[Member],
        scope: &Rc<ConfigRecord>,
        hint: Option<&str>,
    ) -> Result<Value> {
        let entry = self
            .registry
            .lookup(type_name)
            .ok_or_else(|| Error::construction(format!("unknown runtime type '{}'", type_name)))?;
        // Containers name their members from the top, everything else nests under its path.
        let namespace = if entry.is_config_record() { Some("") } else { hint };
        let record = self.new_record(members, scope, hint, namespace)?;
        trace!("new {} {:?}", type_name, hint);
        let object = entry.construct(&record, &self.ctx)?;
        match object.as_value() {
            Some(value) => Ok(value),
            None => Ok(Value::Object(object)),
        }
    }

    fn call(
        self: &Rc<Self>,
        callee: &Rc<Expr>,
        args: &[Arg],
        scope: &Rc<ConfigRecord>,
        hint: Option<&str>,
    ) -> Result<Value> {
        let lambda = match self.eval(callee, scope, None)? {
            Value::Function(lambda) => lambda,
            other => {
                let what = match &**callee {
                    Expr::Ident(name) => format!("'{}'", name),
                    _ => "expression".to_string(),
                };
                return Err(Error::eval(format!(
                    "{} is a {}, not a function",
                    what,
                    other.kind()
                )));
            }
        };

        let frame = Rc::new(ConfigRecord::new(Some(lambda.scope.clone()), None));
        self.track(&frame);

        let mut positional = lambda.params.iter();
        for arg in args {
            let param = match &arg.name {
                None => match positional.next() {
                    Some(param) => param.name.as_str(),
                    None => {
                        return Err(Error::eval(format!(
                            "too many arguments in call to '{}': it takes {}",
                            lambda.name,
                            lambda.params.len()
                        )));
                    }
                },
                Some(name) => {
                    if !lambda.params.iter().any(|p| p.name == *name) {
                        return Err(Error::eval(format!(
                            "'{}' has no parameter named '{}'",
                            lambda.name, name
                        )));
                    }
                    name.as_str()
                }
            };
            if frame.own(param).is_some() {
                return Err(Error::eval(format!(
                    "argument '{}' given more than once in call to '{}'",
                    param, lambda.name
                )));
            }
            // Arguments evaluate in the caller's scope.
            frame.insert(param, self.lazy(&arg.value, scope, param))?;
        }

        for param in &lambda.params {
            if frame.own(&param.name).is_some() {
                continue;
            }
            match &param.default {
                // Defaults evaluate in the callee's scope and may refer to other parameters.
                Some(default) => frame.insert(param.name.as_str(), self.lazy(default, &frame, &param.name))?,
                None => {
                    return Err(Error::eval(format!(
                        "missing argument '{}' in call to '{}'",
                        param.name, lambda.name
                    )));
                }
            }
        }

        trace!("call {:?} as {:?}", lambda, hint);
        self.eval(&lambda.body, &frame, hint)
    }

    fn unary(
        self: &Rc<Self>,
        op: UnaryOp,
        operand: &Rc<Expr>,
        scope: &Rc<ConfigRecord>,
        hint: Option<&str>,
    ) -> Result<Value> {
        match (op, self.eval(operand, scope, None)?) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Object(o)) if is_node(&o) => {
                self.node_op("Negate", vec![Value::Object(o)], scope, hint)
            }
            (op, value) => Err(Error::eval(format!(
                "operator '{}' cannot be applied to a {}",
                if op == UnaryOp::Neg { "-" } else { "!" },
                value.kind()
            ))),
        }
    }

    fn boolean(self: &Rc<Self>, op: BinaryOp, expr: &Rc<Expr>, scope: &Rc<ConfigRecord>) -> Result<bool> {
        match self.eval(expr, scope, None)? {
            Value::Bool(b) => Ok(b),
            other => Err(Error::eval(format!(
                "operator '{}' needs booleans, found {}",
                op.as_str(),
                other.kind()
            ))),
        }
    }

    fn binary(
        self: &Rc<Self>,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
        scope: &Rc<ConfigRecord>,
        hint: Option<&str>,
    ) -> Result<Value> {
        if let BinaryOp::And | BinaryOp::Or = op {
            let left = self.boolean(op, lhs, scope)?;
            if left == (op == BinaryOp::Or) {
                return Ok(Value::Bool(left));
            }
            return Ok(Value::Bool(self.boolean(op, rhs, scope)?));
        }

        let left = self.eval(lhs, scope, None)?;
        let right = self.eval(rhs, scope, None)?;
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => numeric(op, a, b),
            (Value::String(a), Value::String(b)) if op == BinaryOp::Add => Ok(Value::String(a + &b)),
            (Value::String(a), Value::String(b)) if compares(op) => Ok(Value::Bool(ordering_holds(op, a.cmp(&b)))),
            (Value::Bool(a), Value::Bool(b)) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
                Ok(Value::Bool((a == b) == (op == BinaryOp::Eq)))
            }
            (Value::Object(a), Value::Object(b)) if is_node(&a) && is_node(&b) => {
                let operation = match op {
                    BinaryOp::Add => "Plus",
                    BinaryOp::Sub => "Minus",
                    BinaryOp::Mul => "Times",
                    _ => {
                        return Err(Error::eval(format!(
                            "operator '{}' is not defined on nodes",
                            op.as_str()
                        )));
                    }
                };
                self.node_op(operation, vec![Value::Object(a), Value::Object(b)], scope, hint)
            }
            (left, right) => Err(Error::eval(format!(
                "operator '{}' cannot be applied to {} and {}",
                op.as_str(),
                left.kind(),
                right.kind()
            ))),
        }
    }

    /// Node produced by an infix operator, built like `new ComputationNode [ ... ]` in the
    /// current scope.
    fn node_op(
        &self,
        operation: &str,
        inputs: Vec<Value>,
        scope: &Rc<ConfigRecord>,
        hint: Option<&str>,
    ) -> Result<Value> {
        let record = ConfigRecord::new(Some(scope.clone()), hint.map(String::from))
            .with("operation", Value::String(operation.to_string()))
            .with(
                "inputs",
                Value::Array(inputs.into_iter().map(ConfigValue::ready).collect()),
            )
            .with("tag", Value::String(String::new()));
        let object = self.registry.construct("ComputationNode", &record, &self.ctx)?;
        Ok(Value::Object(object))
    }
}

fn compares(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
    )
}

fn ordering_holds(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

fn numeric(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    Ok(match op {
        BinaryOp::Add => Value::Number(a + b),
        BinaryOp::Sub => Value::Number(a - b),
        BinaryOp::Mul => Value::Number(a * b),
        BinaryOp::Div if b == 0.0 => return Err(Error::eval("division by zero")),
        BinaryOp::Div => Value::Number(a / b),
        _ => match a.partial_cmp(&b) {
            Some(ordering) => Value::Bool(ordering_holds(op, ordering)),
            None => Value::Bool(op == BinaryOp::Ne),
        },
    })
}
