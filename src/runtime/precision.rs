//! Element precision selection for dual-precision runtime types.

use crate::config::ConfigRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Float,
    Double,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }

    /// Read the `precision` dispatch field of a record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self> {
        record.string("precision")?.parse()
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float" => Ok(Precision::Float),
            "double" => Ok(Precision::Double),
            other => Err(Error::construction(format!(
                "invalid value '{}' for 'precision', must be 'float' or 'double'",
                other
            ))),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element types a dual-precision object can be instantiated with.
pub trait ElemType: Copy + fmt::Debug + fmt::Display + PartialEq + 'static {
    const PRECISION: Precision;

    fn from_f64(v: f64) -> Self;
}

impl ElemType for f32 {
    const PRECISION: Precision = Precision::Float;

    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl ElemType for f64 {
    const PRECISION: Precision = Precision::Double;

    fn from_f64(v: f64) -> Self {
        v
    }
}
