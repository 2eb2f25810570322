//! Static input information recovered from a module's entry function.

use rand::Rng;
use sd_tensor::{DType, Shape, Tensor};

use crate::error::{ModelError, Result};

/// Shape and element type of one positional input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub shape: Shape,
    pub dtype: DType,
}

/// Ordered inputs of a compiled entry function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub function_name: String,
    pub inputs: Vec<InputSpec>,
}

impl Signature {
    pub fn new(function_name: impl Into<String>, inputs: Vec<InputSpec>) -> Self {
        Signature {
            function_name: function_name.into(),
            inputs,
        }
    }

    /// Parse the argument list of `func.func @<function_name>(...)` in MLIR text.
    ///
    /// Every argument must be a statically shaped `tensor<AxBx...xT>`, where
    /// `T` is one of `f32`, `f16`, `i32`, `i64` or `i1`.
    pub fn parse(module: &str, function_name: &str) -> Result<Signature> {
        let key = format!("func.func @{}(", function_name);
        let header = module
            .lines()
            .find(|line| line.contains(&key))
            .ok_or_else(|| ModelError::FunctionNotFound(function_name.to_string()))?;

        // The argument list runs from the opening paren of the key to the
        // first closing paren after it.
        let start = header.find(&key).map(|i| i + key.len()).unwrap_or(0);
        let rest = &header[start..];
        let end = rest
            .find(')')
            .ok_or_else(|| ModelError::InvalidSignature(header.trim().to_string()))?;
        let args = rest[..end].trim();

        let mut inputs = Vec::new();
        if !args.is_empty() {
            for arg in args.split(',') {
                inputs.push(parse_tensor_type(arg)?);
            }
        }
        Ok(Signature::new(function_name, inputs))
    }

    /// Uniformly random host inputs matching this signature.
    ///
    /// Values are drawn from `[low, high)` as f32 and then converted to each
    /// input's dtype, so integer inputs are truncated samples.
    pub fn random_inputs<R: Rng + ?Sized>(&self, low: f32, high: f32, rng: &mut R) -> Vec<Tensor> {
        self.inputs
            .iter()
            .map(|spec| {
                let data: Vec<f32> = (0..spec.shape.numel())
                    .map(|_| if high > low { rng.gen_range(low..high) } else { low })
                    .collect();
                Tensor::new(data, spec.shape.clone()).to_dtype(spec.dtype)
            })
            .collect()
    }

    /// Check positional inputs against this signature before invoking `model`.
    pub fn check_inputs(&self, model: &str, inputs: &[Tensor]) -> Result<()> {
        if inputs.len() != self.inputs.len() {
            return Err(ModelError::InputCount {
                model: model.to_string(),
                expected: self.inputs.len(),
                got: inputs.len(),
            });
        }
        for (i, (spec, input)) in self.inputs.iter().zip(inputs).enumerate() {
            if input.shape() != &spec.shape || input.dtype() != spec.dtype {
                return Err(ModelError::Invocation {
                    model: model.to_string(),
                    reason: format!(
                        "input {} is {} {}, expected {} {}",
                        i,
                        input.dtype(),
                        input.shape(),
                        spec.dtype,
                        spec.shape
                    ),
                });
            }
        }
        Ok(())
    }
}

fn parse_tensor_type(arg: &str) -> Result<InputSpec> {
    let invalid = || ModelError::InvalidSignature(arg.trim().to_string());

    let open = arg.find('<').ok_or_else(invalid)?;
    let close = arg[open..].find('>').map(|i| open + i).ok_or_else(invalid)?;
    let parts: Vec<&str> = arg[open + 1..close].split('x').collect();
    let (elem, dims) = parts.split_last().ok_or_else(invalid)?;

    let dtype = DType::from_mlir(elem.trim()).ok_or_else(invalid)?;
    let dims = dims
        .iter()
        .map(|d| d.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<Vec<usize>>>()?;

    Ok(InputSpec {
        shape: Shape::new(dims),
        dtype,
    })
}
