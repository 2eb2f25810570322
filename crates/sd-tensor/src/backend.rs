use std::fmt::Debug;

use crate::error::Result;

/// Element-wise latent arithmetic performed by schedulers between model
/// invocations. Operands arrive as f32 slices; results are owned vectors.
pub trait ComputeBackend: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Scalar multiplication: result[i] = a[i] * s.
    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>>;

    /// Linear combination: result[i] = alpha * x[i] + beta * y[i].
    ///
    /// Every scheduler update in this workspace reduces to one or two of these.
    fn axpby(&self, alpha: f32, x: &[f32], beta: f32, y: &[f32]) -> Result<Vec<f32>>;
}
