use sd_model::{CompiledModel, Tokenizer};

/// The tokenizer and the three compiled models a pipeline drives.
pub struct PipelineModels {
    pub tokenizer: Box<dyn Tokenizer>,
    /// Maps `[2, max_length]` token ids to conditioning embeddings.
    pub text_encoder: Box<dyn CompiledModel>,
    /// Inputs: latent, timestep, conditioning, guidance scale. Output: the
    /// guided noise prediction, shaped like the latent.
    pub unet: Box<dyn CompiledModel>,
    /// Maps the final latent to an NCHW pixel tensor.
    pub vae: Box<dyn CompiledModel>,
}

impl PipelineModels {
    pub fn new(
        tokenizer: Box<dyn Tokenizer>,
        text_encoder: Box<dyn CompiledModel>,
        unet: Box<dyn CompiledModel>,
        vae: Box<dyn CompiledModel>,
    ) -> Self {
        Self {
            tokenizer,
            text_encoder,
            unet,
            vae,
        }
    }
}
