pub mod decode;
pub mod mock;
pub mod onnx;

pub use mock::MockGenerator;
pub use onnx::{Device, OnnxGenerator};

/// Decoding parameters forwarded to the model for a single generation call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerateParams {
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            num_beams: 4,
            length_penalty: 2.0,
        }
    }
}

/// Black-box seq2seq summarization capability.
///
/// `tokenize`/`detokenize` expose the model's tokenizer (no special tokens,
/// no truncation); `generate_summary` re-tokenizes internally with its own
/// hard prompt ceiling, so round-tripping token slices through text is lossy
/// at the margins.
pub trait Generator: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, GeneratorError>;

    fn detokenize(&self, ids: &[u32]) -> Result<String, GeneratorError>;

    fn generate_summary(
        &self,
        text: &str,
        params: &GenerateParams,
    ) -> Result<String, GeneratorError>;
}

#[derive(Debug)]
pub enum GeneratorError {
    /// Model artifacts or compute device could not be made ready.
    Unavailable(String),
    /// Tokenizer failed while encoding or decoding.
    Tokenize(String),
    /// The generation call itself failed.
    Inference(String),
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Unavailable(msg) => write!(f, "generator unavailable: {msg}"),
            GeneratorError::Tokenize(msg) => write!(f, "tokenizer error: {msg}"),
            GeneratorError::Inference(msg) => write!(f, "inference error: {msg}"),
        }
    }
}

impl std::error::Error for GeneratorError {}
