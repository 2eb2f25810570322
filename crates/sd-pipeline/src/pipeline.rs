//! Text-to-image generation loop.
//!
//! One run: encode the prompt pair once, start from a seeded noise latent,
//! denoise it for the requested number of steps with the configured
//! scheduler, and decode the result once. Every host/device transfer happens
//! at a fixed point of the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sd_model::ModelError;
use sd_scheduler::{NoiseSchedule, Scheduler, SchedulerKind};
use sd_tensor::{ComputeBackend, CpuBackend, DType, Shape, Tensor};
use tracing::{debug, info};

use crate::cache::LatentCache;
use crate::config::{normalize_seed, PipelineConfig, RunConfig};
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result};
use crate::image::Image;
use crate::models::PipelineModels;
use crate::progress::{CancellationToken, StepProgress};

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct Generation {
    pub image: Image,
    pub diagnostics: Diagnostics,
}

pub struct DiffusionPipeline {
    config: PipelineConfig,
    models: PipelineModels,
    backend: Arc<dyn ComputeBackend>,
    /// One scheduler per kind; a run borrows the one its config names.
    schedulers: BTreeMap<SchedulerKind, Box<dyn Scheduler>>,
    cache: LatentCache,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl DiffusionPipeline {
    pub fn new(config: PipelineConfig, models: PipelineModels) -> Self {
        Self::with_backend(config, models, Arc::new(CpuBackend::new()))
    }

    /// Build a pipeline whose schedulers do their latent arithmetic on `backend`.
    pub fn with_backend(
        config: PipelineConfig,
        models: PipelineModels,
        backend: Arc<dyn ComputeBackend>,
    ) -> Self {
        let schedule = NoiseSchedule::stable_diffusion();
        let schedulers = SchedulerKind::ALL
            .iter()
            .map(|kind| (*kind, kind.build(&schedule, Arc::clone(&backend))))
            .collect();
        Self {
            config,
            models,
            backend,
            schedulers,
            cache: LatentCache::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &LatentCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Generate one image.
    pub fn generate(&mut self, run: &RunConfig) -> Result<Generation> {
        self.generate_with_progress(run, &CancellationToken::new(), |_| true)
    }

    /// Generate one image, reporting every finished iteration to `on_step`.
    ///
    /// The run stops with [`PipelineError::Cancelled`] before the next
    /// iteration once `cancel` is set or `on_step` returns false.
    pub fn generate_with_progress<F>(
        &mut self,
        run: &RunConfig,
        cancel: &CancellationToken,
        mut on_step: F,
    ) -> Result<Generation>
    where
        F: FnMut(&StepProgress) -> bool,
    {
        run.validate()?;
        self.check_compatible(run)?;

        let started = Instant::now();
        let seed = normalize_seed(run.seed);
        let effective = RunConfig {
            seed: i64::from(seed),
            ..run.clone()
        };
        info!(
            seed,
            steps = run.steps,
            scheduler = %run.scheduler,
            version = %run.version,
            "starting generation"
        );

        let latent_shape = self.config.version.latent_shape();
        let initial =
            self.cache
                .get_or_create(seed, &latent_shape, LatentCache::sample_standard_normal);

        let (conditioning, text_encoder_time) =
            self.encode_prompt(&run.prompt, &run.negative_prompt)?;

        let (latent, step_times) =
            self.denoise(run, seed, &initial, &conditioning, cancel, &mut on_step)?;

        let (pixels, decoder_time) = self.decode(&latent)?;
        let image = Image::from_tensor(&pixels)?;

        let total_time = started.elapsed();
        info!(
            total_ms = millis(total_time),
            width = image.width,
            height = image.height,
            "generation finished"
        );

        Ok(Generation {
            image,
            diagnostics: Diagnostics {
                config: effective,
                resolution: run.resolution(),
                step_times,
                text_encoder_time,
                decoder_time,
                total_time,
            },
        })
    }

    fn check_compatible(&self, run: &RunConfig) -> Result<()> {
        if run.version != self.config.version {
            return Err(PipelineError::InvalidConfig(format!(
                "run targets model version {} but the pipeline was built for {}",
                run.version, self.config.version
            )));
        }
        if run.precision != self.config.precision {
            return Err(PipelineError::InvalidConfig(format!(
                "run requests {} precision but the pipeline was built for {}",
                run.precision, self.config.precision
            )));
        }
        Ok(())
    }

    /// Tokenize both prompts, batch them negative first, and run the text
    /// encoder once. Returns host embeddings in the run precision.
    fn encode_prompt(&self, prompt: &str, negative_prompt: &str) -> Result<(Tensor, Duration)> {
        let max_length = self.config.max_length;
        let tokenizer = self.models.tokenizer.as_ref();
        let negative_ids = tokenizer
            .encode(&[negative_prompt], max_length)
            .map_err(PipelineError::Tokenize)?;
        let prompt_ids = tokenizer
            .encode(&[prompt], max_length)
            .map_err(PipelineError::Tokenize)?;
        let ids = Tensor::cat_batch(&[&negative_ids, &prompt_ids])?;

        let encoder = self.models.text_encoder.as_ref();
        let started = Instant::now();
        let embeddings = encoder
            .checked_invoke(&[ids.to_location(encoder.input_location())], false)
            .map_err(PipelineError::TextEncode)?;
        let elapsed = started.elapsed();
        info!(ms = millis(elapsed), model = encoder.name(), "text encoder finished");

        Ok((
            embeddings.to_host().to_dtype(self.config.precision.dtype()),
            elapsed,
        ))
    }

    fn denoise<F>(
        &mut self,
        run: &RunConfig,
        seed: u32,
        initial: &Tensor,
        conditioning: &Tensor,
        cancel: &CancellationToken,
        on_step: &mut F,
    ) -> Result<(Tensor, Vec<Duration>)>
    where
        F: FnMut(&StepProgress) -> bool,
    {
        let dtype = self.config.precision.dtype();
        let backend = Arc::clone(&self.backend);
        let unet = self.models.unet.as_ref();
        let scheduler = self.schedulers.get_mut(&run.scheduler).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("scheduler {} is not available", run.scheduler))
        })?;

        scheduler.reseed(u64::from(seed));
        scheduler.initialize(run.steps)?;
        let timesteps = scheduler.timesteps().to_vec();
        let scheduler_location = scheduler.mode().location();
        let unet_location = unet.input_location();
        let keep_on_device = !unet_location.is_host();
        debug!(
            scheduler = scheduler.name(),
            %scheduler_location,
            %unet_location,
            "denoising"
        );

        let mut latent = initial
            .to_location(scheduler_location)
            .scale(scheduler.init_noise_sigma(), backend.as_ref())?;
        let conditioning = conditioning.to_dtype(dtype).to_location(unet_location);
        let guidance = Tensor::scalar(run.guidance_scale).to_location(unet_location);

        let total = timesteps.len();
        let mut step_times = Vec::with_capacity(total);
        let mut stop = false;
        for (iteration, &timestep) in timesteps.iter().enumerate() {
            if stop || cancel.is_cancelled() {
                info!(iteration, "generation cancelled");
                return Err(PipelineError::Cancelled { iteration });
            }
            let started = Instant::now();

            let scaled = scheduler.scale_input(&latent, timestep)?;
            let inputs = [
                scaled.to_dtype(dtype).to_location(unet_location),
                Tensor::new(vec![timestep], Shape::new(vec![1]))
                    .to_dtype(dtype)
                    .to_location(unet_location),
                conditioning.clone(),
                guidance.clone(),
            ];
            let noise_pred = unet
                .checked_invoke(&inputs, keep_on_device)
                .map_err(|source| PipelineError::NoisePredict { iteration, source })?;
            if noise_pred.shape() != latent.shape() {
                return Err(PipelineError::NoisePredict {
                    iteration,
                    source: ModelError::Invocation {
                        model: unet.name().to_string(),
                        reason: format!(
                            "predicted noise has shape {}, latent has shape {}",
                            noise_pred.shape(),
                            latent.shape()
                        ),
                    },
                });
            }
            let noise_pred = noise_pred
                .to_dtype(DType::F32)
                .to_location(scheduler_location);
            latent = scheduler.step(&noise_pred, timestep, &latent)?;

            let elapsed = started.elapsed();
            step_times.push(elapsed);
            debug!(iteration, timestep, ms = millis(elapsed), "denoising step");
            stop = !on_step(&StepProgress {
                iteration,
                total,
                timestep,
                elapsed,
            });
        }

        Ok((latent, step_times))
    }

    /// Run the decoder once and bring its output back to the host.
    fn decode(&self, latent: &Tensor) -> Result<(Tensor, Duration)> {
        let vae = self.models.vae.as_ref();
        let input = latent
            .to_dtype(self.config.precision.dtype())
            .to_location(vae.input_location());
        let started = Instant::now();
        let pixels = vae.checked_invoke(&[input], false).map_err(PipelineError::Decode)?;
        let elapsed = started.elapsed();
        info!(ms = millis(elapsed), model = vae.name(), "decoder finished");
        Ok((pixels.to_host(), elapsed))
    }
}
