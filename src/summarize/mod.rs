pub mod chunking;

use std::sync::Arc;

use tracing::debug;

use crate::generator::{GenerateParams, Generator, GeneratorError};

use self::chunking::chunk_token_ids;

/// Knobs for one summarization call. All defaults are overridable from the
/// CLI; the generator's internal prompt ceiling is not among them.
#[derive(Clone, Debug, PartialEq)]
pub struct SummarizeOptions {
    /// Max tokens per window handed to the generator.
    pub max_input_tokens: usize,
    /// Tokens shared between adjacent windows.
    pub chunk_overlap: usize,
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
    /// Condense the joined chunk summaries with one more generation pass.
    pub summarize_final: bool,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_input_tokens: 400,
            chunk_overlap: 40,
            max_new_tokens: 256,
            num_beams: 4,
            length_penalty: 2.0,
            summarize_final: true,
        }
    }
}

#[derive(Debug)]
pub enum SummarizeError {
    /// Caller-supplied options violate a precondition.
    Config(String),
    /// Generator failure, propagated unmodified.
    Generator(GeneratorError),
}

impl std::fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummarizeError::Config(msg) => write!(f, "invalid options: {msg}"),
            SummarizeError::Generator(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SummarizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SummarizeError::Generator(err) => Some(err),
            SummarizeError::Config(_) => None,
        }
    }
}

impl From<GeneratorError> for SummarizeError {
    fn from(err: GeneratorError) -> Self {
        SummarizeError::Generator(err)
    }
}

/// Hierarchical summarizer: splits over-long input into overlapping token
/// windows, summarizes each window, then condenses the partial summaries.
/// Stateless per call; holds only the generator seam.
pub struct Summarizer {
    generator: Arc<dyn Generator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Summarize `text` of any token length.
    ///
    /// Inputs that fit a single window go straight to the generator
    /// unchanged. Longer inputs are windowed, summarized per window in
    /// order, joined with blank lines, and (when `summarize_final`)
    /// condensed by one more pass — retruncated to `max_input_tokens`
    /// first if the joined text is still too long. Window decode and the
    /// generator's own re-tokenization may shift token boundaries by a few
    /// tokens; that imprecision is part of the design.
    pub fn summarize(
        &self,
        text: &str,
        opts: &SummarizeOptions,
    ) -> Result<String, SummarizeError> {
        if opts.max_input_tokens == 0 {
            return Err(SummarizeError::Config("max_input_tokens must be > 0".into()));
        }
        if opts.chunk_overlap >= opts.max_input_tokens {
            return Err(SummarizeError::Config(format!(
                "chunk_overlap ({}) must be smaller than max_input_tokens ({})",
                opts.chunk_overlap, opts.max_input_tokens
            )));
        }

        let params = GenerateParams {
            max_new_tokens: opts.max_new_tokens,
            num_beams: opts.num_beams,
            length_penalty: opts.length_penalty,
        };

        let ids = self.generator.tokenize(text)?;

        // short input: single pass over the original text
        if ids.len() <= opts.max_input_tokens {
            return Ok(self.generator.generate_summary(text, &params)?);
        }

        let windows = chunk_token_ids(&ids, opts.max_input_tokens, opts.chunk_overlap);
        debug!(total_tokens = ids.len(), chunks = windows.len(), "input exceeds window, chunking");

        let mut chunks = Vec::with_capacity(windows.len());
        for window in &windows {
            chunks.push(self.generator.detokenize(window)?);
        }

        let mut chunk_summaries = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let summary = self.generator.generate_summary(chunk, &params)?;
            debug!(chunk = i, "chunk summarized");
            chunk_summaries.push(summary);
        }

        let mut combined = chunk_summaries.join("\n\n");
        if !opts.summarize_final {
            return Ok(combined);
        }

        // the joined summaries can themselves exceed the window; keep the
        // leading max_input_tokens and drop the rest
        let combined_ids = self.generator.tokenize(&combined)?;
        if combined_ids.len() > opts.max_input_tokens {
            debug!(
                combined_tokens = combined_ids.len(),
                kept = opts.max_input_tokens,
                "retruncating combined summary"
            );
            combined = self
                .generator
                .detokenize(&combined_ids[..opts.max_input_tokens])?;
        }

        Ok(self.generator.generate_summary(&combined, &params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn summarizer() -> (Arc<MockGenerator>, Summarizer) {
        let generator = Arc::new(MockGenerator::new());
        (generator.clone(), Summarizer::new(generator))
    }

    fn opts(max_input_tokens: usize, chunk_overlap: usize) -> SummarizeOptions {
        SummarizeOptions { max_input_tokens, chunk_overlap, ..Default::default() }
    }

    #[test]
    fn short_input_single_generator_call_on_original_text() {
        let (generator, summarizer) = summarizer();
        generator.push_response(Ok("short summary".into()));

        let text = words(10);
        let out = summarizer.summarize(&text, &opts(400, 40)).unwrap();

        assert_eq!(out, "short summary");
        assert_eq!(generator.calls(), vec![text]);
    }

    #[test]
    fn short_circuit_is_idempotent() {
        let (_, summarizer) = summarizer();
        let text = words(10);
        let first = summarizer.summarize(&text, &opts(400, 40)).unwrap();
        let second = summarizer.summarize(&text, &opts(400, 40)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn long_input_chunks_and_summarizes_in_order() {
        let (generator, summarizer) = summarizer();
        for i in 0..3 {
            generator.push_response(Ok(format!("part{i}")));
        }
        generator.push_response(Ok("final".into()));

        // 1000 words, window 400, overlap 40: chunks at 0, 360, 720
        let text = words(1000);
        let out = summarizer.summarize(&text, &opts(400, 40)).unwrap();

        assert_eq!(out, "final");
        let calls = generator.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].starts_with("w0 "));
        assert!(calls[1].starts_with("w360 "));
        assert!(calls[2].starts_with("w720 "));
        assert!(calls[2].ends_with("w999"));
        // final pass sees the joined chunk summaries
        assert_eq!(calls[3], "part0\n\npart1\n\npart2");
    }

    #[test]
    fn chunk_token_counts_stay_within_window() {
        let (generator, summarizer) = summarizer();
        let text = words(1000);
        summarizer.summarize(&text, &opts(400, 40)).unwrap();

        for call in &generator.calls()[..3] {
            assert!(generator.tokenize(call).unwrap().len() <= 400);
        }
    }

    #[test]
    fn no_final_pass_returns_joined_summaries() {
        let (generator, summarizer) = summarizer();
        generator.push_response(Ok("alpha".into()));
        generator.push_response(Ok("beta".into()));
        generator.push_response(Ok("gamma".into()));

        let text = words(1000);
        let options = SummarizeOptions { summarize_final: false, ..opts(400, 40) };
        let out = summarizer.summarize(&text, &options).unwrap();

        assert_eq!(out, "alpha\n\nbeta\n\ngamma");
        // exactly one generator call per chunk, none for combination
        assert_eq!(generator.calls().len(), 3);
    }

    #[test]
    fn oversized_combined_summary_is_retruncated() {
        let (generator, summarizer) = summarizer();
        // three chunk summaries of 60 words each: combined 180 > 100 window
        for i in 0..3 {
            let summary = (0..60)
                .map(|j| format!("s{i}x{j}"))
                .collect::<Vec<_>>()
                .join(" ");
            generator.push_response(Ok(summary));
        }
        generator.push_response(Ok("condensed".into()));

        // 280 words with window 100 / overlap 10: windows [0,100), [90,190), [180,280)
        let text = words(280);
        let out = summarizer.summarize(&text, &opts(100, 10)).unwrap();
        assert_eq!(out, "condensed");

        let calls = generator.calls();
        let final_input = calls.last().unwrap();
        // the final pass input re-tokenizes to exactly the window size
        assert_eq!(generator.tokenize(final_input).unwrap().len(), 100);
        assert!(final_input.starts_with("s0x0 "));
    }

    #[test]
    fn combined_summary_within_window_is_not_retruncated() {
        let (generator, summarizer) = summarizer();
        generator.push_response(Ok("tiny one".into()));
        generator.push_response(Ok("tiny two".into()));
        generator.push_response(Ok("tiny three".into()));
        generator.push_response(Ok("done".into()));

        let text = words(1000);
        summarizer.summarize(&text, &opts(400, 40)).unwrap();

        let calls = generator.calls();
        assert_eq!(calls[3], "tiny one\n\ntiny two\n\ntiny three");
    }

    #[test]
    fn generator_error_aborts_without_partial_result() {
        let (generator, summarizer) = summarizer();
        generator.push_response(Ok("first ok".into()));
        generator.push_response(Err(GeneratorError::Inference("device lost".into())));

        let text = words(1000);
        let err = summarizer.summarize(&text, &opts(400, 40)).unwrap_err();
        assert!(matches!(
            err,
            SummarizeError::Generator(GeneratorError::Inference(_))
        ));
        // second chunk failed; no further calls were attempted
        assert_eq!(generator.calls().len(), 2);
    }

    #[test]
    fn overlap_not_below_window_is_rejected() {
        let (generator, summarizer) = summarizer();
        let err = summarizer.summarize("hello", &opts(40, 40)).unwrap_err();
        assert!(matches!(err, SummarizeError::Config(_)));
        let err = summarizer.summarize("hello", &opts(40, 100)).unwrap_err();
        assert!(matches!(err, SummarizeError::Config(_)));
        // rejected before any generator work
        assert!(generator.calls().is_empty());
    }

    #[test]
    fn zero_window_is_rejected() {
        let (_, summarizer) = summarizer();
        let err = summarizer.summarize("hello", &opts(0, 0)).unwrap_err();
        assert!(matches!(err, SummarizeError::Config(_)));
    }

    #[test]
    fn empty_input_takes_short_circuit() {
        let (generator, summarizer) = summarizer();
        generator.push_response(Ok("nothing to say".into()));

        let out = summarizer.summarize("", &opts(400, 40)).unwrap();
        assert_eq!(out, "nothing to say");
        // zero tokens still means one generation call, on the original text
        assert_eq!(generator.calls(), vec![""]);
    }
}
