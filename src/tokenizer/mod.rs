use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

/// Thin wrapper over a pretrained `tokenizers::Tokenizer` loaded from the HF Hub.
///
/// Chunking arithmetic needs full-length encodings, so truncation and padding
/// are disabled here; the generator applies its own prompt truncation.
#[derive(Clone)]
pub struct SummaryTokenizer {
    inner: Tokenizer,
}

impl SummaryTokenizer {
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        let mut tok = Tokenizer::from_pretrained(model_id, None)
            .map_err(|e| anyhow!("{}", e))?;

        tok.with_truncation(None).map_err(|e| anyhow!("{}", e))?;
        tok.with_padding(None);

        Ok(Self { inner: tok })
    }

    /// encode to raw token IDs: no special tokens, no truncation
    pub fn ids(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self.inner
            .encode(text, false)
            .map_err(|e| anyhow!("{}", e))?;
        Ok(enc.get_ids().to_vec())
    }

    /// encode for a generation pass: special tokens added
    pub fn ids_for_generation(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self.inner
            .encode(text, true)
            .map_err(|e| anyhow!("{}", e))?;
        Ok(enc.get_ids().to_vec())
    }

    /// decode token IDs back to text, stripping special tokens
    pub fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        self.inner.decode(ids, true)
            .map_err(|e| anyhow!("{}", e))
    }

    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}
