use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::RunConfig;

/// Timings and the effective configuration of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Configuration as executed, with the seed after normalization.
    pub config: RunConfig,
    /// Output size as (height, width).
    pub resolution: (usize, usize),
    pub step_times: Vec<Duration>,
    pub text_encoder_time: Duration,
    pub decoder_time: Duration,
    pub total_time: Duration,
}

impl Diagnostics {
    pub fn average_step_time(&self) -> Duration {
        if self.step_times.is_empty() {
            return Duration::ZERO;
        }
        self.step_times.iter().sum::<Duration>() / self.step_times.len() as u32
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        writeln!(f, "prompt=[{}]", c.prompt)?;
        writeln!(f, "negative prompt=[{}]", c.negative_prompt)?;
        writeln!(
            f,
            "steps={}, guidance_scale={}, scheduler={}, seed={}, size={}x{}, version={}, precision={}",
            c.steps,
            c.guidance_scale,
            c.scheduler,
            c.seed,
            self.resolution.0,
            self.resolution.1,
            c.version,
            c.precision
        )?;
        writeln!(f, "Average step time: {:.2}ms/it", millis(self.average_step_time()))?;
        writeln!(f, "Text encoder time: {:.2}ms", millis(self.text_encoder_time))?;
        writeln!(f, "Decoder time: {:.2}ms", millis(self.decoder_time))?;
        write!(f, "Total image generation time: {:.2}sec", self.total_time.as_secs_f64())
    }
}
