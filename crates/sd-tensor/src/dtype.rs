use std::fmt;
use std::str::FromStr;

use crate::error::TensorError;

/// Supported element types for tensor storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer (token ids).
    I64,
    /// Boolean, stored one byte per element.
    Bool,
}

impl DType {
    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::Bool => 1,
        }
    }

    /// Returns true for floating point element types.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F16)
    }

    /// Converts an MLIR element type token (`f32`, `f16`, `i32`, `i64`, `i1`)
    /// to a `DType`.
    pub fn from_mlir(token: &str) -> Option<DType> {
        match token {
            "f32" => Some(DType::F32),
            "f16" => Some(DType::F16),
            "i32" => Some(DType::I32),
            "i64" => Some(DType::I64),
            "i1" => Some(DType::Bool),
            _ => None,
        }
    }

    /// Returns the MLIR element type token for this `DType`.
    pub fn to_mlir(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::Bool => "i1",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
            DType::Bool => write!(f, "bool"),
        }
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(DType::Bool),
            other => DType::from_mlir(other)
                .ok_or_else(|| TensorError::UnsupportedDType(other.to_string())),
        }
    }
}
