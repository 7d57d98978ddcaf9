//! This module defines the canonical, type-safe representation of the numeric
//! element types a state payload can carry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ComposeError;

/// The element type of an `NdArray` payload.
///
/// The string form is part of the checkpoint header contract, so variants must
/// never be renamed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Parses the canonical string form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, ComposeError> {
        match s {
            "Int32" => Ok(Self::Int32),
            "Int64" => Ok(Self::Int64),
            "Float32" => Ok(Self::Float32),
            "Float64" => Ok(Self::Float64),
            other => Err(ComposeError::Serialization(format!(
                "Unknown dtype '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
