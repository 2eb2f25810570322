use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// Contiguous row-major element storage, one variant per `DType`.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl Storage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            Storage::F32(v) => v.len(),
            Storage::F16(v) => v.len(),
            Storage::I32(v) => v.len(),
            Storage::I64(v) => v.len(),
            Storage::Bool(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            Storage::F32(_) => DType::F32,
            Storage::F16(_) => DType::F16,
            Storage::I32(_) => DType::I32,
            Storage::I64(_) => DType::I64,
            Storage::Bool(_) => DType::Bool,
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => Storage::F32(vec![0.0; n]),
            DType::F16 => Storage::F16(vec![f16::ZERO; n]),
            DType::I32 => Storage::I32(vec![0; n]),
            DType::I64 => Storage::I64(vec![0; n]),
            DType::Bool => Storage::Bool(vec![false; n]),
        }
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            Storage::F32(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as an i64 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not I64.
    pub fn as_i64_slice(&self) -> Result<&[i64]> {
        match self {
            Storage::I64(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::I64, other.dtype())),
        }
    }

    /// Widen any floating point storage to f32 values.
    ///
    /// # Errors
    /// Returns an error for integer and boolean storage.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self {
            Storage::F32(v) => Ok(v.clone()),
            Storage::F16(v) => Ok(v.iter().map(|x| x.to_f32()).collect()),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    /// Convert every element to `dtype`.
    ///
    /// Float to integer conversions truncate toward zero and saturate,
    /// matching Rust's `as` casts; booleans map to 0/1 and back to `!= 0`.
    pub fn cast(&self, dtype: DType) -> Storage {
        if self.dtype() == dtype {
            return self.clone();
        }
        let values = self.to_f64_values();
        match dtype {
            DType::F32 => Storage::F32(values.iter().map(|&x| x as f32).collect()),
            DType::F16 => Storage::F16(values.iter().map(|&x| f16::from_f64(x)).collect()),
            DType::I32 => Storage::I32(values.iter().map(|&x| x as i32).collect()),
            DType::I64 => Storage::I64(values.iter().map(|&x| x as i64).collect()),
            DType::Bool => Storage::Bool(values.iter().map(|&x| x != 0.0).collect()),
        }
    }

    /// Append the elements of every part, in order. All parts must share a dtype.
    pub fn concat(parts: &[&Storage]) -> Result<Storage> {
        let first = parts.first().ok_or(TensorError::EmptyConcat)?;
        let dtype = first.dtype();
        if let Some(bad) = parts.iter().find(|p| p.dtype() != dtype) {
            return Err(mismatch(dtype, bad.dtype()));
        }

        let mut out = Storage::zeros(dtype, 0);
        for part in parts {
            match (&mut out, part) {
                (Storage::F32(o), Storage::F32(p)) => o.extend_from_slice(p),
                (Storage::F16(o), Storage::F16(p)) => o.extend_from_slice(p),
                (Storage::I32(o), Storage::I32(p)) => o.extend_from_slice(p),
                (Storage::I64(o), Storage::I64(p)) => o.extend_from_slice(p),
                (Storage::Bool(o), Storage::Bool(p)) => o.extend_from_slice(p),
                _ => unreachable!("dtypes checked above"),
            }
        }
        Ok(out)
    }

    fn to_f64_values(&self) -> Vec<f64> {
        match self {
            Storage::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Storage::F16(v) => v.iter().map(|x| x.to_f64()).collect(),
            Storage::I32(v) => v.iter().map(|&x| x as f64).collect(),
            Storage::I64(v) => v.iter().map(|&x| x as f64).collect(),
            Storage::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
        }
    }
}

fn mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
