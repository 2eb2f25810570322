pub mod config;
pub mod device;
pub mod error;
pub mod handle;
pub mod signature;
pub mod tokenizer;

pub use config::{ModelVersion, Precision, LATENT_CHANNELS, MAX_TOKEN_LENGTH, VAE_SCALE_FACTOR};
pub use device::Device;
pub use error::{ModelError, Result};
pub use handle::CompiledModel;
pub use signature::{InputSpec, Signature};
pub use tokenizer::{BpeTokenizer, Tokenizer, Vocab};
