use crate::backend::ComputeBackend;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::location::Location;
use crate::shape::Shape;
use crate::storage::Storage;

/// An n-dimensional array with an element type, a shape and a location tag.
///
/// Tensors are plain values: cloning copies the elements, and relocating
/// produces a new tensor rather than moving the original. Element access
/// from host code requires `Location::Host`; arithmetic dispatched to a
/// `ComputeBackend` runs wherever its operands live, as long as they all
/// live in the same place.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
    location: Location,
}

impl Tensor {
    /// Create a new host tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: Storage::F32(data),
            shape,
            location: Location::Host,
        }
    }

    /// Create a host tensor from any storage, validating the element count.
    pub fn from_storage(storage: Storage, shape: Shape) -> Result<Self> {
        if storage.len() != shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.dims().to_vec(),
                got: vec![storage.len()],
            });
        }
        Ok(Tensor {
            storage,
            shape,
            location: Location::Host,
        })
    }

    /// A rank-0 f32 host tensor.
    pub fn scalar(value: f32) -> Self {
        Tensor::new(vec![value], Shape::scalar())
    }

    /// Create a zero-filled host tensor with the given shape and dtype.
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let n = shape.numel();
        Tensor {
            storage: Storage::zeros(dtype, n),
            shape,
            location: Location::Host,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's element type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns where the tensor's elements currently live.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Copy this tensor to `location`.
    ///
    /// Returns a clone when the tensor is already there.
    pub fn to_location(&self, location: Location) -> Tensor {
        Tensor {
            storage: self.storage.clone(),
            shape: self.shape.clone(),
            location,
        }
    }

    /// Shorthand for `to_location(Location::Host)`.
    pub fn to_host(&self) -> Tensor {
        self.to_location(Location::Host)
    }

    /// Convert the elements to `dtype`, keeping shape and location.
    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        Tensor {
            storage: self.storage.cast(dtype),
            shape: self.shape.clone(),
            location: self.location,
        }
    }

    /// Returns the underlying storage of a host tensor.
    pub fn host_storage(&self) -> Result<&Storage> {
        if !self.location.is_host() {
            return Err(TensorError::NotOnHost(self.location));
        }
        Ok(&self.storage)
    }

    /// Returns the elements of a host f32 tensor.
    pub fn data_f32(&self) -> Result<&[f32]> {
        self.host_storage()?.as_f32_slice()
    }

    /// Returns the elements of a host i64 tensor.
    pub fn data_i64(&self) -> Result<&[i64]> {
        self.host_storage()?.as_i64_slice()
    }

    /// Returns the elements of a host floating point tensor widened to f32.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        self.host_storage()?.to_f32_vec()
    }

    /// Stack tensors along the leading (batch) axis, preserving order.
    ///
    /// All parts must share dtype, location and trailing dimensions.
    pub fn cat_batch(parts: &[&Tensor]) -> Result<Tensor> {
        let first = parts.first().ok_or(TensorError::EmptyConcat)?;
        for part in &parts[1..] {
            if part.location != first.location {
                return Err(TensorError::LocationMismatch {
                    left: first.location,
                    right: part.location,
                });
            }
        }
        let shapes: Vec<&Shape> = parts.iter().map(|t| &t.shape).collect();
        let shape = Shape::concat(&shapes, 0)?;
        let storages: Vec<&Storage> = parts.iter().map(|t| &t.storage).collect();
        Ok(Tensor {
            storage: Storage::concat(&storages)?,
            shape,
            location: first.location,
        })
    }

    /// Multiply every element by `s`.
    pub fn scale(&self, s: f32, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let data = backend.scale(self.f32_elements()?, s)?;
        Ok(self.with_data(data))
    }

    /// Computes `alpha * self + beta * other`.
    pub fn axpby(
        &self,
        alpha: f32,
        other: &Tensor,
        beta: f32,
        backend: &dyn ComputeBackend,
    ) -> Result<Tensor> {
        self.check_compatible(other)?;
        let data = backend.axpby(alpha, self.f32_elements()?, beta, other.f32_elements()?)?;
        Ok(self.with_data(data))
    }

    fn check_compatible(&self, other: &Tensor) -> Result<()> {
        if self.location != other.location {
            return Err(TensorError::LocationMismatch {
                left: self.location,
                right: other.location,
            });
        }
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: other.shape.dims().to_vec(),
            });
        }
        Ok(())
    }

    // Backend kernels see the raw elements regardless of location.
    fn f32_elements(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    fn with_data(&self, data: Vec<f32>) -> Tensor {
        Tensor {
            storage: Storage::F32(data),
            shape: self.shape.clone(),
            location: self.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.location(), Location::Host);
        assert_eq!(t.data_f32().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_from_storage_checks_len() {
        assert!(Tensor::from_storage(Storage::I64(vec![1, 2, 3]), Shape::new(vec![1, 3])).is_ok());
        assert!(Tensor::from_storage(Storage::I64(vec![1, 2]), Shape::new(vec![1, 3])).is_err());
    }

    #[test]
    fn test_device_tensor_is_not_readable_from_host() {
        let t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2]));
        let d = t.to_location(Location::Device);
        assert_eq!(d.location(), Location::Device);
        assert!(matches!(d.data_f32(), Err(TensorError::NotOnHost(Location::Device))));
        // relocation does not touch the source
        assert_eq!(t.location(), Location::Host);
        assert_eq!(d.to_host().data_f32().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_to_dtype_keeps_location() {
        let t = Tensor::scalar(7.5).to_location(Location::Device).to_dtype(DType::F16);
        assert_eq!(t.dtype(), DType::F16);
        assert_eq!(t.location(), Location::Device);
        assert_eq!(t.to_host().to_f32_vec().unwrap(), vec![7.5]);
    }

    #[test]
    fn test_cat_batch_preserves_order() {
        let neg = Tensor::from_storage(Storage::I64(vec![1, 2]), Shape::new(vec![1, 2])).unwrap();
        let pos = Tensor::from_storage(Storage::I64(vec![3, 4]), Shape::new(vec![1, 2])).unwrap();
        let batch = Tensor::cat_batch(&[&neg, &pos]).unwrap();
        assert_eq!(batch.shape().dims(), &[2, 2]);
        assert_eq!(batch.data_i64().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_cat_batch_rejects_mixed_locations() {
        let a = Tensor::new(vec![1.0], Shape::new(vec![1, 1]));
        let b = a.to_location(Location::Device);
        assert!(matches!(
            Tensor::cat_batch(&[&a, &b]),
            Err(TensorError::LocationMismatch { .. })
        ));
    }

    #[test]
    fn test_arithmetic_on_device() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2])).to_location(Location::Device);
        let b = Tensor::new(vec![3.0, 4.0], Shape::new(vec![2])).to_location(Location::Device);
        let c = a.axpby(2.0, &b, 1.0, &backend).unwrap();
        assert_eq!(c.location(), Location::Device);
        assert_eq!(c.to_host().data_f32().unwrap(), &[5.0, 8.0]);
        let s = a.scale(0.5, &backend).unwrap();
        assert_eq!(s.to_host().data_f32().unwrap(), &[0.5, 1.0]);
    }

    #[test]
    fn test_arithmetic_rejects_mixed_locations() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2]));
        let b = a.to_location(Location::Device);
        assert!(matches!(
            a.axpby(1.0, &b, 1.0, &backend),
            Err(TensorError::LocationMismatch { .. })
        ));
    }

    #[test]
    fn test_arithmetic_rejects_non_f32() {
        let backend = CpuBackend::new();
        let a = Tensor::zeros(Shape::new(vec![2]), DType::I64);
        assert!(a.scale(2.0, &backend).is_err());
    }
}
