use crate::error::{Result, TensorError};
use std::fmt;

/// Dimension sizes of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// The rank-0 shape of a single scalar.
    pub fn scalar() -> Self {
        Shape { dims: Vec::new() }
    }

    /// Rank.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count; 1 for a scalar.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Shape obtained by stacking `shapes` along `axis`.
    ///
    /// Every shape must have the same rank and agree on all other axes.
    pub fn concat(shapes: &[&Shape], axis: usize) -> Result<Shape> {
        let first = shapes.first().ok_or(TensorError::EmptyConcat)?;
        if axis >= first.ndim() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: first.ndim(),
            });
        }

        let mut dims = first.dims.clone();
        for other in &shapes[1..] {
            let compatible = other.ndim() == first.ndim()
                && other
                    .dims
                    .iter()
                    .zip(first.dims.iter())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(TensorError::ShapeMismatch {
                    expected: first.dims.clone(),
                    got: other.dims.clone(),
                });
            }
            dims[axis] += other.dims[axis];
        }
        Ok(Shape::new(dims))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}
