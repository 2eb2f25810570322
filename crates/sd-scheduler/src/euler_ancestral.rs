//! Euler Ancestral scheduler
//!
//! Steps down to σ_down with Euler, then injects fresh noise of size σ_up.
//! The noise generator is reseeded on every `initialize`, so a run is fully
//! determined by its seed.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use sd_tensor::{ComputeBackend, Tensor};

use crate::error::Result;
use crate::euler::{scale_by_sigma, sigma_schedule};
use crate::schedule::NoiseSchedule;
use crate::scheduler::{check_steps, expect_location, Scheduler, SchedulerKind, StepGate};

pub struct EulerAncestralScheduler {
    schedule: NoiseSchedule,
    backend: Arc<dyn ComputeBackend>,
    gate: StepGate,
    sigmas: Vec<f32>,
    seed: u64,
    rng: StdRng,
}

impl EulerAncestralScheduler {
    pub fn new(schedule: NoiseSchedule, backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            schedule,
            backend,
            gate: StepGate::default(),
            sigmas: Vec::new(),
            seed: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    fn noise_like(&mut self, latent: &Tensor) -> Tensor {
        let data: Vec<f32> = (0..latent.shape().numel())
            .map(|_| self.rng.sample::<f32, _>(StandardNormal))
            .collect();
        Tensor::new(data, latent.shape().clone()).to_location(latent.location())
    }
}

impl Scheduler for EulerAncestralScheduler {
    fn name(&self) -> &str {
        "euler_a"
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::EulerAncestral
    }

    fn initialize(&mut self, steps: usize) -> Result<()> {
        check_steps(steps, &self.schedule)?;
        let (timesteps, sigmas) = sigma_schedule(&self.schedule, steps);
        self.sigmas = sigmas;
        self.rng = StdRng::seed_from_u64(self.seed);
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
        expect_location(latent, self.mode())?;
        let index = self.gate.mark_scaled(timestep)?;
        scale_by_sigma(latent, self.sigmas[index], self.backend.as_ref())
    }

    fn step(&mut self, noise_pred: &Tensor, timestep: f32, latent: &Tensor) -> Result<Tensor> {
        expect_location(latent, self.mode())?;
        let index = self.gate.advance(timestep)?;
        let sigma = self.sigmas[index];
        let sigma_next = self.sigmas[index + 1];

        let sigma_up = (sigma_next.powi(2) * (sigma.powi(2) - sigma_next.powi(2))
            / sigma.powi(2))
        .max(0.0)
        .sqrt();
        let sigma_down = (sigma_next.powi(2) - sigma_up.powi(2)).max(0.0).sqrt();

        let backend = Arc::clone(&self.backend);
        let stepped = latent.axpby(1.0, noise_pred, sigma_down - sigma, backend.as_ref())?;
        if sigma_up == 0.0 {
            return Ok(stepped);
        }
        let noise = self.noise_like(latent);
        Ok(stepped.axpby(1.0, &noise, sigma_up, backend.as_ref())?)
    }

    fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sd_tensor::{CpuBackend, Shape};

    fn run(seed: u64) -> Tensor {
        let mut s =
            EulerAncestralScheduler::new(NoiseSchedule::stable_diffusion(), Arc::new(CpuBackend::new()));
        s.reseed(seed);
        s.initialize(4).unwrap();
        let eps = Tensor::new(vec![0.5; 16], Shape::new(vec![1, 1, 4, 4]));
        let mut latent = Tensor::new(vec![1.0; 16], Shape::new(vec![1, 1, 4, 4]));
        for t in s.timesteps().to_vec() {
            let _ = s.scale_input(&latent, t).unwrap();
            latent = s.step(&eps, t, &latent).unwrap();
        }
        latent
    }

    #[test]
    fn test_same_seed_same_result() {
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_different_seed_different_result() {
        assert_ne!(run(1), run(2));
    }

    #[test]
    fn test_final_step_is_noise_free() {
        let mut s =
            EulerAncestralScheduler::new(NoiseSchedule::stable_diffusion(), Arc::new(CpuBackend::new()));
        s.initialize(1).unwrap();
        let t = s.timesteps()[0];
        let sigma = s.init_noise_sigma();
        let x = Tensor::new(vec![1.0], Shape::new(vec![1]));
        let eps = Tensor::new(vec![2.0], Shape::new(vec![1]));
        s.scale_input(&x, t).unwrap();
        let out = s.step(&eps, t, &x).unwrap();
        assert_relative_eq!(out.data_f32().unwrap()[0], 1.0 - 2.0 * sigma, epsilon = 1e-6);
    }
}
