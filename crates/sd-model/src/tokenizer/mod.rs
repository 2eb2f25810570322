pub mod bpe;
pub mod vocab;

pub use bpe::BpeTokenizer;
pub use vocab::Vocab;

use sd_tensor::Tensor;

/// Turns text into fixed-length token id batches for a text encoder.
pub trait Tokenizer: Send + Sync {
    /// Encode each text to exactly `max_length` ids, truncating long inputs
    /// and padding short ones.
    ///
    /// Returns a host `I64` tensor of shape `[texts.len(), max_length]`,
    /// one row per text in input order.
    fn encode(&self, texts: &[&str], max_length: usize) -> crate::Result<Tensor>;
}
