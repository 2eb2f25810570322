use thiserror::Error;

/// Contract violations and arithmetic failures inside a scheduler.
///
/// Everything except `Tensor` indicates a caller bug rather than a runtime
/// condition worth recovering from.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler used before initialize()")]
    NotInitialized,
    #[error("step() called without scale_input() for timestep {0}")]
    ScaleInputNotCalled(f32),
    #[error("timestep {0} is not part of the initialized sequence")]
    UnknownTimestep(f32),
    #[error("timestep out of order: expected step {expected}, got step {got}")]
    OutOfOrder { expected: usize, got: usize },
    #[error("invalid step count {steps}: must be between 1 and {max}")]
    InvalidStepCount { steps: usize, max: usize },
    #[error("unknown scheduler: {0}")]
    UnknownScheduler(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] sd_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
