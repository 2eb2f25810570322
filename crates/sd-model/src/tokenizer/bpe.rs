use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sd_tensor::{Shape, Storage, Tensor};

use super::vocab::Vocab;
use super::Tokenizer;
use crate::error::{ModelError, Result};

const END_OF_WORD: &str = "</w>";

/// CLIP-style Byte-Pair Encoding tokenizer.
///
/// Text is lowercased and split on whitespace; each word starts as single
/// characters with `</w>` attached to the last one, then ranked merges are
/// applied until none match.
pub struct BpeTokenizer {
    /// The token vocabulary (strings and special token IDs).
    pub vocab: Vocab,
    /// Map from merge pair to priority rank (lower rank = higher priority).
    merge_ranks: HashMap<(String, String), usize>,
}

impl BpeTokenizer {
    /// Build a tokenizer from a vocabulary and merge rules in priority order.
    pub fn new(vocab: Vocab, merges: Vec<(String, String)>) -> Self {
        let merge_ranks = merges
            .into_iter()
            .enumerate()
            .map(|(rank, pair)| (pair, rank))
            .collect();
        BpeTokenizer { vocab, merge_ranks }
    }

    /// Load `vocab.json` and `merges.txt` as shipped with CLIP text encoders.
    ///
    /// Each merges line is "token1 token2"; a leading `#version` line is skipped.
    pub fn from_files(vocab_path: &Path, merges_path: &Path) -> Result<BpeTokenizer> {
        let vocab = Vocab::from_json_file(vocab_path)?;
        let text = fs::read_to_string(merges_path)?;

        let mut merges = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("#version") {
                continue;
            }
            // Split on the first space only.
            let parts: Vec<&str> = line.splitn(2, ' ').collect();
            if parts.len() != 2 {
                return Err(ModelError::TokenizerError(format!(
                    "invalid merge entry: {:?}",
                    line
                )));
            }
            merges.push((parts[0].to_string(), parts[1].to_string()));
        }

        Ok(BpeTokenizer::new(vocab, merges))
    }

    /// Encode text to token ids without special tokens or padding.
    ///
    /// Pieces missing from the vocabulary map to the end-of-text id.
    pub fn encode_text(&self, text: &str) -> Vec<u32> {
        let lowered = text.to_lowercase();
        let mut ids = Vec::new();
        for word in lowered.split_whitespace() {
            for piece in self.bpe(word) {
                let id = self
                    .vocab
                    .token_to_id
                    .get(&piece)
                    .copied()
                    .unwrap_or(self.vocab.eos_id);
                ids.push(id);
            }
        }
        ids
    }

    fn bpe(&self, word: &str) -> Vec<String> {
        let mut tokens: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        if let Some(last) = tokens.last_mut() {
            last.push_str(END_OF_WORD);
        }

        loop {
            if tokens.len() < 2 {
                break;
            }

            // Find the best (lowest rank) merge pair among all adjacent pairs.
            let mut best: Option<(usize, usize)> = None;
            for i in 0..tokens.len() - 1 {
                let pair = (tokens[i].clone(), tokens[i + 1].clone());
                if let Some(&rank) = self.merge_ranks.get(&pair) {
                    if best.map_or(true, |(r, _)| rank < r) {
                        best = Some((rank, i));
                    }
                }
            }

            let Some((_, idx)) = best else {
                break;
            };
            let merged = format!("{}{}", tokens[idx], tokens[idx + 1]);
            tokens[idx] = merged;
            tokens.remove(idx + 1);
        }

        tokens
    }

    /// Decode token ids back into space-separated words, skipping special tokens.
    pub fn decode(&self, tokens: &[u32]) -> String {
        let mut text = String::new();
        for &id in tokens {
            if id == self.vocab.bos_id || id == self.vocab.eos_id || id == self.vocab.pad_id {
                continue;
            }
            let Some(tok) = self.vocab.tokens.get(id as usize) else {
                continue;
            };
            text.push_str(&tok.replace(END_OF_WORD, " "));
        }
        text.trim_end().to_string()
    }

    /// Frame `ids` with start/end tokens and pad or truncate to `max_length`.
    fn frame(&self, mut ids: Vec<u32>, max_length: usize) -> Vec<i64> {
        ids.truncate(max_length - 2);
        let mut row = Vec::with_capacity(max_length);
        row.push(self.vocab.bos_id as i64);
        row.extend(ids.into_iter().map(|id| id as i64));
        row.push(self.vocab.eos_id as i64);
        row.resize(max_length, self.vocab.pad_id as i64);
        row
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, texts: &[&str], max_length: usize) -> Result<Tensor> {
        if max_length < 2 {
            return Err(ModelError::TokenizerError(format!(
                "max_length {} leaves no room for start and end tokens",
                max_length
            )));
        }

        let mut data = Vec::with_capacity(texts.len() * max_length);
        for text in texts {
            data.extend(self.frame(self.encode_text(text), max_length));
        }
        let tensor = Tensor::from_storage(
            Storage::I64(data),
            Shape::new(vec![texts.len(), max_length]),
        )?;
        Ok(tensor)
    }
}
