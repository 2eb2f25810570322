use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model '{model}' failed: {reason}")]
    Invocation { model: String, reason: String },
    #[error("model '{model}' expects {expected} inputs, got {got}")]
    InputCount {
        model: String,
        expected: usize,
        got: usize,
    },
    #[error("function not found in module: {0}")]
    FunctionNotFound(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("unknown model version: {0}")]
    UnknownVersion(String),
    #[error("unknown precision: {0}")]
    UnknownPrecision(String),
    #[error("tokenizer error: {0}")]
    TokenizerError(String),
    #[error("tensor error: {0}")]
    TensorError(#[from] sd_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
