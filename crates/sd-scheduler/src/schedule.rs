//! Noise schedules shared by every scheduler variant.

/// Precomputed cumulative signal rates of a training noise schedule.
#[derive(Debug, Clone)]
pub struct NoiseSchedule {
    /// Cumulative product of alphas: ᾱₜ for t in 0..num_train_steps.
    alphas_cumprod: Vec<f32>,
}

impl NoiseSchedule {
    /// Betas spaced linearly between `beta_start` and `beta_end`.
    ///
    /// # Panics
    /// Panics if `num_steps == 0`.
    pub fn linear(num_steps: usize, beta_start: f64, beta_end: f64) -> Self {
        let betas = linspace(beta_start, beta_end, num_steps);
        Self::from_betas(&betas)
    }

    /// Betas whose square roots are spaced linearly (the "scaled_linear" schedule).
    ///
    /// # Panics
    /// Panics if `num_steps == 0`.
    pub fn scaled_linear(num_steps: usize, beta_start: f64, beta_end: f64) -> Self {
        let betas: Vec<f64> = linspace(beta_start.sqrt(), beta_end.sqrt(), num_steps)
            .into_iter()
            .map(|b| b * b)
            .collect();
        Self::from_betas(&betas)
    }

    /// The schedule all supported model versions were trained with.
    pub fn stable_diffusion() -> Self {
        Self::scaled_linear(1000, 0.00085, 0.012)
    }

    fn from_betas(betas: &[f64]) -> Self {
        assert!(!betas.is_empty(), "noise schedule needs at least one training step");
        let mut cumprod = 1.0f64;
        let alphas_cumprod = betas
            .iter()
            .map(|b| {
                cumprod *= 1.0 - b;
                cumprod as f32
            })
            .collect();
        Self { alphas_cumprod }
    }

    /// Number of training timesteps.
    pub fn num_train_steps(&self) -> usize {
        self.alphas_cumprod.len()
    }

    /// ᾱ at an integer training timestep.
    ///
    /// # Panics
    /// Panics if `t >= num_train_steps()`.
    pub fn alpha_cumprod(&self, t: usize) -> f32 {
        self.alphas_cumprod[t]
    }

    /// Noise level σ = sqrt((1 - ᾱ) / ᾱ), linearly interpolated for
    /// fractional timesteps and clamped to the training range.
    pub fn sigma(&self, t: f32) -> f32 {
        let max = (self.num_train_steps() - 1) as f32;
        let t = t.clamp(0.0, max);
        let low = t.floor() as usize;
        let high = t.ceil() as usize;
        let w = t - low as f32;
        let s = |i: usize| {
            let ac = self.alphas_cumprod[i];
            ((1.0 - ac) / ac).sqrt()
        };
        s(low) * (1.0 - w) + s(high) * w
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive; `[start]` when `n == 1`.
pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stable_diffusion_endpoints() {
        let s = NoiseSchedule::stable_diffusion();
        assert_eq!(s.num_train_steps(), 1000);
        assert_relative_eq!(s.alpha_cumprod(0), 0.99915, epsilon = 1e-5);
        assert_relative_eq!(s.alpha_cumprod(999), 0.0047, epsilon = 1e-4);
        assert_relative_eq!(s.sigma(999.0), 14.6146, epsilon = 1e-2);
        assert_relative_eq!(s.sigma(0.0), 0.0292, epsilon = 1e-3);
    }

    #[test]
    fn test_alphas_cumprod_decreasing() {
        let s = NoiseSchedule::linear(100, 0.0001, 0.02);
        for t in 1..100 {
            assert!(s.alpha_cumprod(t) < s.alpha_cumprod(t - 1));
        }
    }

    #[test]
    fn test_sigma_interpolates() {
        let s = NoiseSchedule::stable_diffusion();
        let mid = s.sigma(500.5);
        assert!(mid > s.sigma(500.0) && mid < s.sigma(501.0));
        assert_eq!(s.sigma(5000.0), s.sigma(999.0));
    }

    #[test]
    #[should_panic(expected = "at least one training step")]
    fn test_empty_linear_schedule_panics() {
        NoiseSchedule::linear(0, 0.1, 0.2);
    }

    #[test]
    #[should_panic(expected = "at least one training step")]
    fn test_empty_scaled_linear_schedule_panics() {
        NoiseSchedule::scaled_linear(0, 0.00085, 0.012);
    }

    #[test]
    fn test_single_step_schedule_sigma() {
        let s = NoiseSchedule::linear(1, 0.5, 0.5);
        assert_eq!(s.num_train_steps(), 1);
        assert_relative_eq!(s.sigma(0.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(s.sigma(10.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 999.0, 1), vec![0.0]);
        assert_eq!(linspace(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
