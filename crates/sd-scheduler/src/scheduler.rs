use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sd_tensor::{ComputeBackend, Location, Tensor, TensorError};
use serde::{Deserialize, Serialize};

use crate::ddim::DdimScheduler;
use crate::error::{Result, SchedulerError};
use crate::euler::EulerDiscreteScheduler;
use crate::euler_ancestral::EulerAncestralScheduler;
use crate::schedule::NoiseSchedule;

/// Where a scheduler's arithmetic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Latents and predictions are host tensors; predictions coming back
    /// from an accelerator must be copied to the host before stepping.
    Host,
    /// Stepping consumes device-resident predictions without a host transfer.
    Device,
}

impl SchedulerMode {
    pub fn location(&self) -> Location {
        match self {
            SchedulerMode::Host => Location::Host,
            SchedulerMode::Device => Location::Device,
        }
    }
}

/// Numerical integration scheme advancing a latent along a fixed timestep
/// sequence.
///
/// Per run: `initialize` once, then for every timestep in `timesteps()`
/// order call `scale_input` followed by `step`.
pub trait Scheduler: Send {
    /// Returns the name of this scheduler.
    fn name(&self) -> &str;

    fn kind(&self) -> SchedulerKind;

    fn mode(&self) -> SchedulerMode {
        SchedulerMode::Host
    }

    /// Derive the timestep sequence and coefficients for `steps` iterations,
    /// replacing any previous run's state.
    fn initialize(&mut self, steps: usize) -> Result<()>;

    /// Timesteps of the current run, strictly decreasing. Empty before `initialize`.
    fn timesteps(&self) -> &[f32];

    /// Factor applied once to the initial noise latent.
    fn init_noise_sigma(&self) -> f32;

    /// Scale the latent fed to the noise predictor at `timestep`.
    fn scale_input(&mut self, latent: &Tensor, timestep: f32) -> Result<Tensor>;

    /// Advance `latent` one step using the model's noise prediction.
    fn step(&mut self, noise_pred: &Tensor, timestep: f32, latent: &Tensor) -> Result<Tensor>;

    /// Seed any noise the scheme injects. Deterministic schemes ignore it.
    fn reseed(&mut self, _seed: u64) {}
}

/// Enumerated scheduler identifier, resolved once when configuration is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum SchedulerKind {
    #[serde(rename = "ddim", alias = "deterministic")]
    Ddim,
    #[default]
    #[serde(rename = "euler")]
    EulerDiscrete,
    #[serde(rename = "euler_a", alias = "euler_ancestral")]
    EulerAncestral,
    #[serde(rename = "shark_euler", alias = "device_euler")]
    SharkEulerDiscrete,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 4] = [
        SchedulerKind::Ddim,
        SchedulerKind::EulerDiscrete,
        SchedulerKind::EulerAncestral,
        SchedulerKind::SharkEulerDiscrete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Ddim => "ddim",
            SchedulerKind::EulerDiscrete => "euler",
            SchedulerKind::EulerAncestral => "euler_a",
            SchedulerKind::SharkEulerDiscrete => "shark_euler",
        }
    }

    /// Construct a fresh, uninitialized scheduler of this kind.
    pub fn build(
        &self,
        schedule: &NoiseSchedule,
        backend: Arc<dyn ComputeBackend>,
    ) -> Box<dyn Scheduler> {
        match self {
            SchedulerKind::Ddim => Box::new(DdimScheduler::new(schedule.clone(), backend)),
            SchedulerKind::EulerDiscrete => Box::new(EulerDiscreteScheduler::new(
                schedule.clone(),
                backend,
                SchedulerMode::Host,
            )),
            SchedulerKind::EulerAncestral => {
                Box::new(EulerAncestralScheduler::new(schedule.clone(), backend))
            }
            SchedulerKind::SharkEulerDiscrete => Box::new(EulerDiscreteScheduler::new(
                schedule.clone(),
                backend,
                SchedulerMode::Device,
            )),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ddim" | "deterministic" => Ok(SchedulerKind::Ddim),
            "euler" => Ok(SchedulerKind::EulerDiscrete),
            "euler_a" | "euler_ancestral" => Ok(SchedulerKind::EulerAncestral),
            "shark_euler" | "device_euler" => Ok(SchedulerKind::SharkEulerDiscrete),
            other => Err(SchedulerError::UnknownScheduler(other.to_string())),
        }
    }
}

/// Bookkeeping shared by all variants: the timestep sequence, the position
/// of the next step, and which step index `scale_input` last prepared.
#[derive(Debug, Default)]
pub(crate) struct StepGate {
    timesteps: Vec<f32>,
    next: usize,
    scaled: Option<usize>,
}

impl StepGate {
    pub(crate) fn reset(&mut self, timesteps: Vec<f32>) {
        self.timesteps = timesteps;
        self.next = 0;
        self.scaled = None;
    }

    pub(crate) fn timesteps(&self) -> &[f32] {
        &self.timesteps
    }

    fn index_of(&self, timestep: f32) -> Result<usize> {
        if self.timesteps.is_empty() {
            return Err(SchedulerError::NotInitialized);
        }
        self.timesteps
            .iter()
            .position(|&t| t == timestep)
            .ok_or(SchedulerError::UnknownTimestep(timestep))
    }

    /// Record a `scale_input` call and return the step index of `timestep`.
    pub(crate) fn mark_scaled(&mut self, timestep: f32) -> Result<usize> {
        let index = self.index_of(timestep)?;
        self.scaled = Some(index);
        Ok(index)
    }

    /// Validate and consume one `step` call, returning its step index.
    pub(crate) fn advance(&mut self, timestep: f32) -> Result<usize> {
        let index = self.index_of(timestep)?;
        // The scaled input must belong to this very timestep.
        if self.scaled != Some(index) {
            return Err(SchedulerError::ScaleInputNotCalled(timestep));
        }
        if index != self.next {
            return Err(SchedulerError::OutOfOrder {
                expected: self.next,
                got: index,
            });
        }
        self.next += 1;
        self.scaled = None;
        Ok(index)
    }
}

/// Validate a requested step count against the training schedule length.
pub(crate) fn check_steps(steps: usize, schedule: &NoiseSchedule) -> Result<()> {
    let max = schedule.num_train_steps();
    if steps == 0 || steps > max {
        return Err(SchedulerError::InvalidStepCount { steps, max });
    }
    Ok(())
}

/// Reject tensors that are not where the scheduler's arithmetic runs.
pub(crate) fn expect_location(tensor: &Tensor, mode: SchedulerMode) -> Result<()> {
    let expected = mode.location();
    if tensor.location() != expected {
        return Err(TensorError::LocationMismatch {
            left: expected,
            right: tensor.location(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_tensor::{CpuBackend, Shape};

    fn latent() -> Tensor {
        Tensor::new(vec![1.0; 8], Shape::new(vec![1, 2, 2, 2]))
    }

    fn all_schedulers() -> Vec<Box<dyn Scheduler>> {
        let schedule = NoiseSchedule::stable_diffusion();
        SchedulerKind::ALL
            .iter()
            .map(|k| k.build(&schedule, Arc::new(CpuBackend::new())))
            .collect()
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("deterministic".parse::<SchedulerKind>().unwrap(), SchedulerKind::Ddim);
        assert_eq!("EULER".parse::<SchedulerKind>().unwrap(), SchedulerKind::EulerDiscrete);
        assert_eq!(
            "euler_ancestral".parse::<SchedulerKind>().unwrap(),
            SchedulerKind::EulerAncestral
        );
        assert!("lms".parse::<SchedulerKind>().is_err());
        for kind in SchedulerKind::ALL {
            assert_eq!(kind.to_string().parse::<SchedulerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_alias() {
        let k: SchedulerKind = serde_json::from_str("\"deterministic\"").unwrap();
        assert_eq!(k, SchedulerKind::Ddim);
        assert_eq!(serde_json::to_string(&k).unwrap(), "\"ddim\"");
    }

    #[test]
    fn test_initialize_produces_strictly_decreasing_sequence() {
        for mut s in all_schedulers() {
            for n in [1, 2, 7, 50, 1000] {
                s.initialize(n).unwrap();
                let ts = s.timesteps();
                assert_eq!(ts.len(), n, "{}", s.name());
                assert!(ts.windows(2).all(|w| w[0] > w[1]), "{} n={}", s.name(), n);
            }
        }
    }

    #[test]
    fn test_initialize_rejects_bad_counts() {
        for mut s in all_schedulers() {
            assert!(matches!(
                s.initialize(0),
                Err(SchedulerError::InvalidStepCount { .. })
            ));
            assert!(s.initialize(1001).is_err());
        }
    }

    #[test]
    fn test_use_before_initialize_is_rejected() {
        for mut s in all_schedulers() {
            let x = latent().to_location(s.mode().location());
            assert!(matches!(
                s.scale_input(&x, 999.0),
                Err(SchedulerError::NotInitialized)
            ));
            assert!(matches!(
                s.step(&x, 999.0, &x),
                Err(SchedulerError::NotInitialized)
            ));
        }
    }

    #[test]
    fn test_step_requires_scale_input() {
        for mut s in all_schedulers() {
            s.initialize(3).unwrap();
            let t = s.timesteps()[0];
            let x = latent().to_location(s.mode().location());
            assert!(matches!(
                s.step(&x, t, &x),
                Err(SchedulerError::ScaleInputNotCalled(_))
            ));
            let scaled = s.scale_input(&x, t).unwrap();
            assert!(s.step(&x, t, &scaled).is_ok());
            // the flag is consumed by the step
            let t1 = s.timesteps()[1];
            assert!(s.step(&x, t1, &x).is_err());
        }
    }

    #[test]
    fn test_steps_must_follow_sequence() {
        for mut s in all_schedulers() {
            s.initialize(3).unwrap();
            let t2 = s.timesteps()[2];
            let x = latent().to_location(s.mode().location());
            s.scale_input(&x, t2).unwrap();
            assert!(matches!(
                s.step(&x, t2, &x),
                Err(SchedulerError::OutOfOrder { expected: 0, got: 2 })
            ));
        }
    }

    #[test]
    fn test_step_rejects_input_scaled_for_another_timestep() {
        for mut s in all_schedulers() {
            s.initialize(3).unwrap();
            let t0 = s.timesteps()[0];
            let t2 = s.timesteps()[2];
            let x = latent().to_location(s.mode().location());
            s.scale_input(&x, t2).unwrap();
            assert!(
                matches!(
                    s.step(&x, t0, &x),
                    Err(SchedulerError::ScaleInputNotCalled(_))
                ),
                "{} accepted a step at {} after scaling for {}",
                s.name(),
                t0,
                t2
            );
            // Rescaling for the right timestep recovers.
            s.scale_input(&x, t0).unwrap();
            assert!(s.step(&x, t0, &x).is_ok());
        }
    }

    #[test]
    fn test_unknown_timestep() {
        for mut s in all_schedulers() {
            s.initialize(2).unwrap();
            let x = latent().to_location(s.mode().location());
            assert!(matches!(
                s.scale_input(&x, 12345.5),
                Err(SchedulerError::UnknownTimestep(_))
            ));
        }
    }

    #[test]
    fn test_reinitialize_replaces_state() {
        for mut s in all_schedulers() {
            s.initialize(4).unwrap();
            let x = latent().to_location(s.mode().location());
            let t0 = s.timesteps()[0];
            s.scale_input(&x, t0).unwrap();
            s.step(&x, t0, &x).unwrap();
            s.initialize(2).unwrap();
            assert_eq!(s.timesteps().len(), 2);
            let t0 = s.timesteps()[0];
            assert!(s.step(&x, t0, &x).is_err());
            s.scale_input(&x, t0).unwrap();
            assert!(s.step(&x, t0, &x).is_ok());
        }
    }

    #[test]
    fn test_location_is_enforced() {
        for mut s in all_schedulers() {
            s.initialize(2).unwrap();
            let wrong = match s.mode() {
                SchedulerMode::Host => sd_tensor::Location::Device,
                SchedulerMode::Device => sd_tensor::Location::Host,
            };
            let x = latent().to_location(wrong);
            let t0 = s.timesteps()[0];
            assert!(matches!(s.scale_input(&x, t0), Err(SchedulerError::Tensor(_))));
        }
    }

    #[test]
    fn test_modes() {
        let schedule = NoiseSchedule::stable_diffusion();
        let backend: Arc<dyn ComputeBackend> = Arc::new(CpuBackend::new());
        assert_eq!(
            SchedulerKind::SharkEulerDiscrete.build(&schedule, backend.clone()).mode(),
            SchedulerMode::Device
        );
        assert_eq!(
            SchedulerKind::Ddim.build(&schedule, backend).mode(),
            SchedulerMode::Host
        );
    }
}
