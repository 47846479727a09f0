//! The description language: values, records, parsing and lazy evaluation.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod prelude;
pub mod record;
pub mod value;

pub use ast::Script;
pub use eval::{Evaluator, Lambda};
pub use parser::{parse, parse_expr};
pub use record::ConfigRecord;
pub use value::{ConfigValue, Value};
