//! Syntax tree of the description language.
//!
//! Subexpressions are reference counted so lazily evaluated members can hold on to the
//! expression they will evaluate without copying it.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    /// `[ a = 1 ; f(x) = x ]`
    Record(Vec<Member>),
    /// `new TypeName [ ... ]`
    New {
        type_name: String,
        members: Vec<Member>,
    },
    /// `target.field`
    Field {
        target: Rc<Expr>,
        field: String,
    },
    Call {
        callee: Rc<Expr>,
        args: Vec<Arg>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
    },
    If {
        cond: Rc<Expr>,
        then: Rc<Expr>,
        otherwise: Rc<Expr>,
    },
    /// `a : b : c`
    Array(Vec<Rc<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Rc<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// `Some` for `name = expr` arguments.
    pub name: Option<String>,
    pub value: Rc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Value {
        name: String,
        expr: Rc<Expr>,
    },
    Function {
        name: String,
        params: Vec<Param>,
        body: Rc<Expr>,
    },
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Value { name, .. } | Member::Function { name, .. } => name,
        }
    }
}

/// A parsed description: the members of the top-level record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub members: Vec<Member>,
}
