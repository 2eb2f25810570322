//! Tensors for the sd-runtime pipeline.
//!
//! Every [`Tensor`] records whether its data lives on the host or on an
//! accelerator. Host code may only read host tensors; moving data is an
//! explicit [`Tensor::to_location`] call. Latent arithmetic goes through a
//! [`ComputeBackend`], with [`CpuBackend`] as the reference implementation.

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod location;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use location::Location;
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;
