use thiserror::Error;

use crate::location::Location;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("location mismatch: {left} tensor combined with {right} tensor")]
    LocationMismatch { left: Location, right: Location },
    #[error("tensor data is resident on {0}; relocate it to host before reading")]
    NotOnHost(Location),
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("cannot concatenate an empty list of tensors")]
    EmptyConcat,
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
