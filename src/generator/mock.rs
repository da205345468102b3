use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenerateParams, Generator, GeneratorError};

/// Deterministic in-process generator for tests.
///
/// Tokenizes by whitespace with an interned word table, so token counts are
/// predictable and `tokenize`/`detokenize` round-trip exactly. Scripted
/// responses are served FIFO; with an empty queue `generate_summary` falls
/// back to a deterministic digest of its input.
#[derive(Default)]
pub struct MockGenerator {
    vocab: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<String, GeneratorError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, resp: Result<String, GeneratorError>) {
        self.responses.lock().unwrap().push_back(resp);
    }

    /// Texts passed to `generate_summary`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn intern(&self, word: &str) -> u32 {
        let mut vocab = self.vocab.lock().unwrap();
        if let Some(pos) = vocab.iter().position(|w| w == word) {
            return pos as u32;
        }
        vocab.push(word.to_string());
        (vocab.len() - 1) as u32
    }
}

impl Generator for MockGenerator {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, GeneratorError> {
        Ok(text.split_whitespace().map(|w| self.intern(w)).collect())
    }

    fn detokenize(&self, ids: &[u32]) -> Result<String, GeneratorError> {
        let vocab = self.vocab.lock().unwrap();
        let words: Result<Vec<&str>, GeneratorError> = ids
            .iter()
            .map(|&id| {
                vocab
                    .get(id as usize)
                    .map(|w| w.as_str())
                    .ok_or_else(|| GeneratorError::Tokenize(format!("unknown token id {id}")))
            })
            .collect();
        Ok(words?.join(" "))
    }

    fn generate_summary(
        &self,
        text: &str,
        _params: &GenerateParams,
    ) -> Result<String, GeneratorError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(resp) = self.responses.lock().unwrap().pop_front() {
            return resp;
        }
        let words = text.split_whitespace().count();
        Ok(format!("sum[{words}]"))
    }
}
