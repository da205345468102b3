//! Beam-search primitives shared by the ONNX generator.

/// One beam: decoder token prefix (starts with the decoder start token) and
/// the running sum of log-probabilities of its generated tokens.
#[derive(Clone, Debug)]
pub struct Hypothesis {
    pub tokens: Vec<u32>,
    pub score: f32,
}

impl Hypothesis {
    pub fn new(start_token: u32) -> Self {
        Self { tokens: vec![start_token], score: 0.0 }
    }

    /// Generated length, excluding the decoder start token.
    pub fn generated_len(&self) -> usize {
        self.tokens.len().saturating_sub(1)
    }
}

/// Length-penalized ranking score: sum of log-probs divided by
/// `generated_len ^ penalty`. Higher is better; penalty > 1 favors longer
/// hypotheses.
pub fn length_penalized(score: f32, generated_len: usize, penalty: f32) -> f32 {
    let len = generated_len.max(1) as f32;
    score / len.powf(penalty)
}

/// Numerically stable log-softmax over a logits row.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
    logits.iter().map(|&x| x - max - log_sum).collect()
}

/// Tokens that would close a repeated n-gram if emitted next.
///
/// A token is banned when the last `n - 1` generated tokens plus that token
/// form an n-gram already present in `tokens`.
pub fn banned_ngram_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    let mut banned = Vec::new();
    for window in tokens.windows(n) {
        if &window[..n - 1] == prefix {
            banned.push(window[n - 1]);
        }
    }
    banned
}

/// Indices and values of the `k` largest entries, descending.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().cloned().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_softmax_normalizes() {
        let probs = log_softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = probs.iter().map(|p| p.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
        // ordering preserved
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn log_softmax_handles_large_logits() {
        let probs = log_softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - probs[1]).abs() < 1e-6);
        assert!(probs[0].is_finite());
    }

    #[test]
    fn trigram_ban_blocks_repeat() {
        // sequence contains trigram (1, 2, 3); after ... 1, 2 the token 3 is banned
        let tokens = [5, 1, 2, 3, 4, 1, 2];
        assert_eq!(banned_ngram_tokens(&tokens, 3), vec![3]);
    }

    #[test]
    fn no_ban_for_short_sequences() {
        assert!(banned_ngram_tokens(&[1], 3).is_empty());
        assert!(banned_ngram_tokens(&[], 3).is_empty());
        assert!(banned_ngram_tokens(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    fn no_ban_without_matching_prefix() {
        let tokens = [1, 2, 3, 4, 5];
        assert!(banned_ngram_tokens(&tokens, 3).is_empty());
    }

    #[test]
    fn top_k_returns_descending() {
        let got = top_k(&[0.1, 0.9, 0.5], 2);
        assert_eq!(got[0].0, 1);
        assert_eq!(got[1].0, 2);
    }

    #[test]
    fn length_penalty_favors_longer_at_equal_mass() {
        // same total log-prob, longer hypothesis scores higher under penalty > 0
        let short = length_penalized(-4.0, 2, 2.0);
        let long = length_penalized(-4.0, 4, 2.0);
        assert!(long > short);
    }

    #[test]
    fn generated_len_excludes_start_token() {
        let mut hyp = Hypothesis::new(0);
        assert_eq!(hyp.generated_len(), 0);
        hyp.tokens.push(17);
        assert_eq!(hyp.generated_len(), 1);
    }
}
