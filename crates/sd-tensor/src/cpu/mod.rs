use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Host reference backend: plain iterator loops over the latent elements.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn same_len(x: &[f32], y: &[f32]) -> Result<()> {
    if x.len() == y.len() {
        Ok(())
    } else {
        Err(TensorError::ShapeMismatch {
            expected: vec![x.len()],
            got: vec![y.len()],
        })
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>> {
        Ok(a.iter().map(|x| x * s).collect())
    }

    fn axpby(&self, alpha: f32, x: &[f32], beta: f32, y: &[f32]) -> Result<Vec<f32>> {
        same_len(x, y)?;
        Ok(x
            .iter()
            .zip(y.iter())
            .map(|(xi, yi)| alpha * xi + beta * yi)
            .collect())
    }
}
