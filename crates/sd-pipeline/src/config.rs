use rand::Rng;
use sd_model::{ModelVersion, Precision, MAX_TOKEN_LENGTH};
use sd_scheduler::SchedulerKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Upper bound on denoising iterations: one per training timestep.
pub const MAX_STEPS: usize = 1000;

/// Settings fixed when a pipeline is built. The compiled models are specific
/// to a model version and numeric precision, so runs must match them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub version: ModelVersion,
    pub precision: Precision,
    /// Fixed token length of every tokenized prompt.
    pub max_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: ModelVersion::default(),
            precision: Precision::default(),
            max_length: MAX_TOKEN_LENGTH,
        }
    }
}

impl PipelineConfig {
    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

/// Parameters of a single generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: usize,
    pub guidance_scale: f32,
    /// Values outside `[0, 2^32)` are replaced by a random seed.
    pub seed: i64,
    pub scheduler: SchedulerKind,
    pub precision: Precision,
    pub version: ModelVersion,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            prompt: "a photograph of an astronaut riding a horse".to_string(),
            negative_prompt: String::new(),
            steps: 50,
            guidance_scale: 7.5,
            seed: 42,
            scheduler: SchedulerKind::default(),
            precision: Precision::default(),
            version: ModelVersion::default(),
        }
    }
}

impl RunConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
        self.guidance_scale = guidance_scale;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.version = version;
        self
    }

    /// Parse a run configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }

    /// Output image size as (height, width).
    pub fn resolution(&self) -> (usize, usize) {
        self.version.resolution()
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("prompt is empty".to_string()));
        }
        if self.steps == 0 || self.steps > MAX_STEPS {
            return Err(PipelineError::InvalidConfig(format!(
                "steps must be in 1..={}, got {}",
                MAX_STEPS, self.steps
            )));
        }
        if !self.guidance_scale.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "guidance scale must be finite, got {}",
                self.guidance_scale
            )));
        }
        Ok(())
    }
}

/// Map a requested seed into `[0, 2^32)`. In-range seeds pass through; any
/// other value is replaced by a uniformly random one.
pub fn normalize_seed(seed: i64) -> u32 {
    normalize_seed_with(seed, &mut rand::thread_rng())
}

/// [`normalize_seed`] drawing replacement seeds from `rng`, which is left
/// untouched when `seed` is already in range.
pub fn normalize_seed_with<R: Rng + ?Sized>(seed: i64, rng: &mut R) -> u32 {
    u32::try_from(seed).unwrap_or_else(|_| {
        let rerolled = rng.gen::<u32>();
        warn!(requested = seed, seed = rerolled, "seed out of range, using a random seed");
        rerolled
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults() {
        let run = RunConfig::default();
        assert_eq!(run.steps, 50);
        assert_eq!(run.guidance_scale, 7.5);
        assert_eq!(run.seed, 42);
        assert_eq!(run.scheduler, SchedulerKind::EulerDiscrete);
        assert_eq!(run.resolution(), (512, 512));
        assert!(run.validate().is_ok());
        assert_eq!(PipelineConfig::default().max_length, 77);
    }

    #[test]
    fn test_validate_steps() {
        let run = RunConfig::new("a cat");
        assert!(run.clone().with_steps(1).validate().is_ok());
        assert!(run.clone().with_steps(1000).validate().is_ok());
        assert!(matches!(
            run.clone().with_steps(0).validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(run.with_steps(1001).validate().is_err());
    }

    #[test]
    fn test_validate_prompt_and_guidance() {
        assert!(RunConfig::new("  ").validate().is_err());
        assert!(RunConfig::new("a cat")
            .with_guidance_scale(f32::NAN)
            .validate()
            .is_err());
        assert!(RunConfig::new("a cat")
            .with_guidance_scale(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_from_json() {
        let run = RunConfig::from_json(
            r#"{"prompt": "a cat", "steps": 2, "scheduler": "deterministic", "version": "v2.1"}"#,
        )
        .unwrap();
        assert_eq!(run.prompt, "a cat");
        assert_eq!(run.steps, 2);
        assert_eq!(run.scheduler, SchedulerKind::Ddim);
        assert_eq!(run.version, ModelVersion::V2_1);
        assert_eq!(run.resolution(), (768, 768));
        assert_eq!(run.guidance_scale, 7.5);

        assert!(RunConfig::from_json(r#"{"scheduler": "lms"}"#).is_err());
    }

    #[test]
    fn test_normalize_seed_in_range() {
        assert_eq!(normalize_seed(0), 0);
        assert_eq!(normalize_seed(42), 42);
        assert_eq!(normalize_seed(u32::MAX as i64), u32::MAX);
    }

    #[test]
    fn test_normalize_seed_rerolls_out_of_range() {
        for requested in [-1, 1 << 32, i64::MIN, i64::MAX] {
            let expected = StdRng::seed_from_u64(9).gen::<u32>();
            let mut rng = StdRng::seed_from_u64(9);
            assert_eq!(normalize_seed_with(requested, &mut rng), expected);
        }
    }

    #[test]
    fn test_normalize_seed_in_range_leaves_rng_alone() {
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(normalize_seed_with(7, &mut rng), 7);
        assert_eq!(rng.gen::<u32>(), StdRng::seed_from_u64(9).gen::<u32>());
    }
}
