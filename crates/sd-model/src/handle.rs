use sd_tensor::{Location, Tensor};

use crate::device::Device;
use crate::signature::Signature;

/// An executable artifact produced by an external tensor compiler.
///
/// Implementations wrap a loaded module for one entry function on one
/// backend. Compilation, artifact loading and backend session management
/// happen before a handle exists; this trait only describes invocation.
pub trait CompiledModel: Send + Sync {
    /// Short name used in logs and error messages (e.g. "unet").
    fn name(&self) -> &str;

    /// Backend the module was compiled for.
    fn device(&self) -> Device;

    /// Where positional inputs must live when passed to [`invoke`](Self::invoke).
    fn input_location(&self) -> Location {
        self.device().input_location()
    }

    /// Declared input shapes and dtypes, when the module exposes them.
    fn signature(&self) -> Option<&Signature> {
        None
    }

    /// Execute the module on positional `inputs`.
    ///
    /// With `keep_on_device` the output is left where the backend produced
    /// it (a `Location::Device` tensor on accelerators); otherwise it is
    /// copied back and returned as a host tensor.
    fn invoke(&self, inputs: &[Tensor], keep_on_device: bool) -> crate::Result<Tensor>;

    /// [`invoke`](Self::invoke), after checking `inputs` against the declared
    /// signature when there is one.
    fn checked_invoke(&self, inputs: &[Tensor], keep_on_device: bool) -> crate::Result<Tensor> {
        if let Some(signature) = self.signature() {
            signature.check_inputs(self.name(), inputs)?;
        }
        self.invoke(inputs, keep_on_device)
    }
}
