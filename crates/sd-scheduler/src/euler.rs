//! Euler scheduler for diffusion models
//!
//! Solves the probability-flow ODE with the explicit Euler method in σ
//! space (k-diffusion formulation). The same arithmetic backs the host
//! scheduled `euler` kind and the device scheduled `shark_euler` kind.

use std::sync::Arc;

use sd_tensor::{ComputeBackend, Tensor};

use crate::error::Result;
use crate::schedule::{linspace, NoiseSchedule};
use crate::scheduler::{
    check_steps, expect_location, Scheduler, SchedulerKind, SchedulerMode, StepGate,
};

pub struct EulerDiscreteScheduler {
    schedule: NoiseSchedule,
    backend: Arc<dyn ComputeBackend>,
    mode: SchedulerMode,
    gate: StepGate,
    /// σ for every timestep plus a trailing 0.0.
    sigmas: Vec<f32>,
}

impl EulerDiscreteScheduler {
    pub fn new(
        schedule: NoiseSchedule,
        backend: Arc<dyn ComputeBackend>,
        mode: SchedulerMode,
    ) -> Self {
        Self {
            schedule,
            backend,
            mode,
            gate: StepGate::default(),
            sigmas: Vec::new(),
        }
    }

    /// σ values of the current run, ending with 0.0.
    pub fn sigmas(&self) -> &[f32] {
        &self.sigmas
    }
}

/// Evenly spaced timesteps from the last training step down to 0, with the
/// σ of each and a terminal 0.0.
pub(crate) fn sigma_schedule(schedule: &NoiseSchedule, steps: usize) -> (Vec<f32>, Vec<f32>) {
    let last = (schedule.num_train_steps() - 1) as f64;
    let timesteps: Vec<f32> = linspace(0.0, last, steps)
        .into_iter()
        .rev()
        .map(|t| t as f32)
        .collect();
    let mut sigmas: Vec<f32> = timesteps.iter().map(|&t| schedule.sigma(t)).collect();
    sigmas.push(0.0);
    (timesteps, sigmas)
}

/// k-diffusion input preconditioning: x / sqrt(σ² + 1).
pub(crate) fn scale_by_sigma(
    latent: &Tensor,
    sigma: f32,
    backend: &dyn ComputeBackend,
) -> Result<Tensor> {
    Ok(latent.scale(1.0 / (sigma * sigma + 1.0).sqrt(), backend)?)
}

impl Scheduler for EulerDiscreteScheduler {
    fn name(&self) -> &str {
        match self.mode {
            SchedulerMode::Host => "euler",
            SchedulerMode::Device => "shark_euler",
        }
    }

    fn kind(&self) -> SchedulerKind {
        match self.mode {
            SchedulerMode::Host => SchedulerKind::EulerDiscrete,
            SchedulerMode::Device => SchedulerKind::SharkEulerDiscrete,
        }
    }

    fn mode(&self) -> SchedulerMode {
        self.mode
    }

    fn initialize(&mut self, steps: usize) -> Result<()> {
        check_steps(steps, &self.schedule)?;
        let (timesteps, sigmas) = sigma_schedule(&self.schedule, steps);
        self.sigmas = sigmas;
        self.gate.reset(timesteps);
        Ok(())
    }

    fn timesteps(&self) -> &[f32] {
        self.gate.timesteps()
    }

    fn init_noise_sigma(&self) -> f32 {
        self.sigmas.first().copied().unwrap_or(1.0)
    }

    fn scale_input(&mut self, latent: &Tensor, timestep: f32) -> Result<Tensor> {
        expect_location(latent, self.mode)?;
        let index = self.gate.mark_scaled(timestep)?;
        scale_by_sigma(latent, self.sigmas[index], self.backend.as_ref())
    }

    fn step(&mut self, noise_pred: &Tensor, timestep: f32, latent: &Tensor) -> Result<Tensor> {
        expect_location(latent, self.mode)?;
        let index = self.gate.advance(timestep)?;
        let sigma = self.sigmas[index];
        let sigma_next = self.sigmas[index + 1];

        // denoised = x - σ ε, so dx/dσ = (x - denoised) / σ = ε
        Ok(latent.axpby(1.0, noise_pred, sigma_next - sigma, self.backend.as_ref())?)
    }
}
