//! DDIM (Denoising Diffusion Implicit Models) scheduler.
//!
//! Deterministic (η = 0) sampling; no input scaling.

use std::sync::Arc;

use sd_tensor::{ComputeBackend, Tensor};

use crate::error::Result;
use crate::schedule::NoiseSchedule;
use crate::scheduler::{check_steps, expect_location, Scheduler, SchedulerKind, StepGate};

pub struct DdimScheduler {
    schedule: NoiseSchedule,
    backend: Arc<dyn ComputeBackend>,
    gate: StepGate,
    /// Training timesteps between consecutive inference steps.
    step_ratio: usize,
}

impl DdimScheduler {
    pub fn new(schedule: NoiseSchedule, backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            schedule,
            backend,
            gate: StepGate::default(),
            step_ratio: 0,
        }
    }

    /// ᾱ for the timestep `step_ratio` below `t`; the final step lands on a
    /// clean sample (ᾱ = 1).
    fn alpha_cumprod_prev(&self, t: usize) -> f32 {
        match t.checked_sub(self.step_ratio) {
            Some(prev) => self.schedule.alpha_cumprod(prev),
            None => 1.0,
        }
    }
}

impl Scheduler for DdimScheduler {
    fn name(&self) -> &str {
        "ddim"
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Ddim
    }

    fn initialize(&mut self, steps: usize) -> Result<()> {
        check_steps(steps, &self.schedule)?;
        let step_ratio = self.schedule.num_train_steps() / steps;
        let timesteps = (0..steps).rev().map(|i| (i * step_ratio) as f32).collect();
        self.step_ratio = step_ratio;
        self.gate.reset(timesteps);
        Ok(())
    }

    fn timesteps(&self) -> &[f32] {
        self.gate.timesteps()
    }

    fn init_noise_sigma(&self) -> f32 {
        1.0
    }

    fn scale_input(&mut self, latent: &Tensor, timestep: f32) -> Result<Tensor> {
        expect_location(latent, self.mode())?;
        self.gate.mark_scaled(timestep)?;
        Ok(latent.clone())
    }

    fn step(&mut self, noise_pred: &Tensor, timestep: f32, latent: &Tensor) -> Result<Tensor> {
        expect_location(latent, self.mode())?;
        self.gate.advance(timestep)?;

        let t = timestep as usize;
        let alpha_t = self.schedule.alpha_cumprod(t);
        let alpha_prev = self.alpha_cumprod_prev(t);

        // pred_x0 = (x - sqrt(1 - ᾱₜ) ε) / sqrt(ᾱₜ)
        // x_prev  = sqrt(ᾱₚ) pred_x0 + sqrt(1 - ᾱₚ) ε
        let sqrt_alpha_t = alpha_t.sqrt();
        let sqrt_alpha_prev = alpha_prev.sqrt();
        let latent_coeff = sqrt_alpha_prev / sqrt_alpha_t;
        let noise_coeff =
            (1.0 - alpha_prev).sqrt() - sqrt_alpha_prev * (1.0 - alpha_t).sqrt() / sqrt_alpha_t;

        Ok(latent.axpby(latent_coeff, noise_pred, noise_coeff, self.backend.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sd_tensor::{CpuBackend, Shape};

    fn ddim() -> DdimScheduler {
        DdimScheduler::new(NoiseSchedule::stable_diffusion(), Arc::new(CpuBackend::new()))
    }

    #[test]
    fn test_timesteps_spacing() {
        let mut s = ddim();
        s.initialize(50).unwrap();
        assert_eq!(s.timesteps().len(), 50);
        assert_eq!(s.timesteps()[0], 980.0); // highest noise first
        assert_eq!(s.timesteps()[49], 0.0);
    }

    #[test]
    fn test_scale_input_is_identity() {
        let mut s = ddim();
        s.initialize(2).unwrap();
        let x = Tensor::new(vec![0.25, -3.0], Shape::new(vec![2]));
        assert_eq!(s.scale_input(&x, 500.0).unwrap(), x);
    }

    #[test]
    fn test_exact_noise_prediction_recovers_clean_sample() {
        // x_t = sqrt(ᾱ) x0 + sqrt(1-ᾱ) ε; the last step lands on ᾱ = 1.
        let mut s = ddim();
        s.initialize(1).unwrap();
        let t = s.timesteps()[0];
        assert_eq!(t, 0.0);
        let ac = NoiseSchedule::stable_diffusion().alpha_cumprod(0);
        let x0 = [0.5f32, -1.0];
        let eps = [0.3f32, 0.7];
        let xt: Vec<f32> = x0
            .iter()
            .zip(eps.iter())
            .map(|(x, e)| ac.sqrt() * x + (1.0 - ac).sqrt() * e)
            .collect();
        let xt = Tensor::new(xt, Shape::new(vec![2]));
        let eps = Tensor::new(eps.to_vec(), Shape::new(vec![2]));

        let scaled = s.scale_input(&xt, t).unwrap();
        let out = s.step(&eps, t, &scaled).unwrap();
        let out = out.data_f32().unwrap();
        assert_relative_eq!(out[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(out[1], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_step_is_deterministic() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let eps = Tensor::new(vec![0.1, 0.2, 0.3], Shape::new(vec![3]));
        let run = || {
            let mut s = ddim();
            s.initialize(4).unwrap();
            let mut latent = x.clone();
            for t in s.timesteps().to_vec() {
                let _ = s.scale_input(&latent, t).unwrap();
                latent = s.step(&eps, t, &latent).unwrap();
            }
            latent
        };
        assert_eq!(run(), run());
    }
}
