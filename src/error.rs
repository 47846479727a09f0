//! Error kinds raised while evaluating descriptions and materializing networks.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A required field is missing or holds a value of the wrong kind.
    #[error("config field '{field}': {message}")]
    ConfigField { field: String, message: String },

    /// Unknown type or node kind, invalid option value, empty required path.
    #[error("construction error: {0}")]
    Construction(String),

    /// Two distinct objects claim the same name.
    #[error("multiple nodes with the same name '{0}'")]
    NamingConflict(String),

    /// The evaluated network does not have the element type that was asked for.
    #[error("network has the wrong element type: requested {requested}, got {actual}")]
    PrecisionMismatch { requested: String, actual: String },

    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Unknown identifiers, operand mismatches, circular references.
    #[error("evaluation error: {0}")]
    Eval(String),

    /// Input edges of a deferred node were read before it was finalized.
    #[error("node '{0}' was used before its deferred initialization ran")]
    NotFinalized(String),
}

impl Error {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn construction(message: impl Into<String>) -> Self {
        Error::Construction(message.into())
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Error::Eval(message.into())
    }
}
