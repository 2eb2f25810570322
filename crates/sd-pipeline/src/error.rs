use sd_model::ModelError;
use sd_scheduler::SchedulerError;
use sd_tensor::TensorError;
use thiserror::Error;

/// Failure of a generation run, identifying the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("tokenization failed: {0}")]
    Tokenize(#[source] ModelError),

    #[error("text encoder failed: {0}")]
    TextEncode(#[source] ModelError),

    #[error("noise predictor failed at iteration {iteration}: {source}")]
    NoisePredict {
        iteration: usize,
        #[source]
        source: ModelError,
    },

    #[error("decoder failed: {0}")]
    Decode(#[source] ModelError),

    #[error("scheduler misuse: {0}")]
    SchedulerMisuse(#[from] SchedulerError),

    #[error("run cancelled before iteration {iteration}")]
    Cancelled { iteration: usize },

    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
