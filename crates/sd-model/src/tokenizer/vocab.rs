use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ModelError, Result};

pub const START_OF_TEXT: &str = "<|startoftext|>";
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Token vocabulary for a CLIP-style text encoder.
pub struct Vocab {
    /// Token strings, indexed by token ID.
    pub tokens: Vec<String>,
    /// Reverse mapping from token string to token ID.
    pub token_to_id: HashMap<String, u32>,
    /// Beginning-of-sequence token ID.
    pub bos_id: u32,
    /// End-of-sequence token ID.
    pub eos_id: u32,
    /// ID written into padding positions.
    pub pad_id: u32,
}

impl Vocab {
    /// Build a vocabulary from token strings indexed by id.
    ///
    /// The list must contain `<|startoftext|>` and `<|endoftext|>`; padding
    /// defaults to the end-of-text id, as the v1 text encoder expects.
    pub fn new(tokens: Vec<String>) -> Result<Vocab> {
        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, tok) in tokens.iter().enumerate() {
            token_to_id.insert(tok.clone(), id as u32);
        }

        let special = |name: &str| {
            token_to_id.get(name).copied().ok_or_else(|| {
                ModelError::TokenizerError(format!("vocabulary has no {} token", name))
            })
        };
        let bos_id = special(START_OF_TEXT)?;
        let eos_id = special(END_OF_TEXT)?;

        Ok(Vocab {
            tokens,
            token_to_id,
            bos_id,
            eos_id,
            pad_id: eos_id,
        })
    }

    /// Load a `vocab.json` file mapping token strings to ids.
    ///
    /// Ids must be dense: every id in `0..len` appears exactly once.
    pub fn from_json_file(path: &Path) -> Result<Vocab> {
        let text = fs::read_to_string(path)?;
        let map: HashMap<String, u32> = serde_json::from_str(&text)?;

        let mut tokens = vec![None; map.len()];
        for (tok, id) in map {
            let slot = tokens.get_mut(id as usize).ok_or_else(|| {
                ModelError::TokenizerError(format!("token id {} out of range", id))
            })?;
            if slot.replace(tok).is_some() {
                return Err(ModelError::TokenizerError(format!("duplicate token id {}", id)));
            }
        }

        let tokens = tokens
            .into_iter()
            .collect::<Option<Vec<String>>>()
            .ok_or_else(|| ModelError::TokenizerError("vocabulary ids are not dense".into()))?;
        Vocab::new(tokens)
    }

    /// Override the padding id (v2 text encoders pad with id 0).
    pub fn with_pad_id(mut self, pad_id: u32) -> Self {
        self.pad_id = pad_id;
        self
    }

    /// Number of tokens in the vocabulary.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
