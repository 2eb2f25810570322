//! Stable Diffusion text-to-image pipeline over externally compiled models.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod progress;

pub use cache::LatentCache;
pub use config::{normalize_seed, normalize_seed_with, PipelineConfig, RunConfig, MAX_STEPS};
pub use diagnostics::Diagnostics;
pub use error::{PipelineError, Result};
pub use image::Image;
pub use models::PipelineModels;
pub use pipeline::{DiffusionPipeline, Generation};
pub use progress::{CancellationToken, StepProgress};

pub use sd_model::{CompiledModel, Device, ModelVersion, Precision, Tokenizer};
pub use sd_scheduler::SchedulerKind;
