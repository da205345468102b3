use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use hf_hub::api::sync::Api;
use ndarray::{s, Array2, Array3, ArrayD};

// onnx runtime (ORT)
use ort::inputs;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::Value;

use crate::tokenizer::SummaryTokenizer;

use super::decode::{banned_ngram_tokens, length_penalized, log_softmax, top_k, Hypothesis};
use super::{GenerateParams, Generator, GeneratorError};

/// Hard ceiling on the encoded prompt; longer prompts are truncated before
/// the encoder runs. Internal to the generator, not a tuning knob.
const MAX_PROMPT_TOKENS: usize = 500;
/// T5 task prefix prepended to every summarization prompt.
const TASK_PREFIX: &str = "summarize: ";
/// Ban any token that would repeat an n-gram of this size.
const NO_REPEAT_NGRAM: usize = 3;

const ENCODER_CANDIDATES: &[&str] = &["onnx/encoder_model.onnx", "encoder_model.onnx"];
const DECODER_CANDIDATES: &[&str] = &["onnx/decoder_model.onnx", "decoder_model.onnx"];

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum Device {
    #[value(name = "cpu")] Cpu,
    #[value(name = "cuda")] Cuda,
}

/// Seq2seq summarizer backed by encoder/decoder ONNX sessions.
///
/// Sessions are built once and shared for the process lifetime; `ort` runs
/// take `&mut`, so inference is serialized behind mutexes.
pub struct OnnxGenerator {
    tok: SummaryTokenizer,
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    decoder_start: u32,
    eos: u32,
}

impl OnnxGenerator {
    pub fn new(
        model_id: &str,
        encoder_filename: Option<&str>,
        decoder_filename: Option<&str>,
        device: Device,
    ) -> Result<Self, GeneratorError> {
        Self::build(model_id, encoder_filename, decoder_filename, device)
            .map_err(|e| GeneratorError::Unavailable(format!("{e:#}")))
    }

    fn build(
        model_id: &str,
        encoder_filename: Option<&str>,
        decoder_filename: Option<&str>,
        device: Device,
    ) -> Result<Self> {
        let tok = SummaryTokenizer::from_pretrained(model_id).context("init tokenizer")?;
        let encoder_path = resolve_onnx(model_id, encoder_filename, ENCODER_CANDIDATES)
            .context("resolve encoder ONNX via HF Hub")?;
        let decoder_path = resolve_onnx(model_id, decoder_filename, DECODER_CANDIDATES)
            .context("resolve decoder ONNX via HF Hub")?;
        let encoder = build_session(&encoder_path, device)?;
        let decoder = build_session(&decoder_path, device)?;

        // T5 decodes from the pad token; </s> terminates a hypothesis
        let decoder_start = tok.token_id("<pad>").unwrap_or(0);
        let eos = tok.token_id("</s>").unwrap_or(1);

        Ok(Self {
            tok,
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            decoder_start,
            eos,
        })
    }

    fn run_encoder(&self, ids: &[u32]) -> Result<Array3<f32>> {
        let len = ids.len();
        let mut input_ids = Array2::<i64>::zeros((1, len));
        let mut mask = Array2::<i64>::zeros((1, len));
        for (j, &id) in ids.iter().enumerate() {
            input_ids[[0, j]] = id as i64;
            mask[[0, j]] = 1;
        }

        let input_ids_val = Value::from_array(input_ids).map_err(|e| anyhow!("{}", e))?;
        let mask_val = Value::from_array(mask).map_err(|e| anyhow!("{}", e))?;

        let mut session = self.encoder.lock().unwrap();
        let outputs = session
            .run(inputs! {
                "input_ids" => &input_ids_val,
                "attention_mask" => &mask_val,
            })
            .map_err(|e| anyhow!("{}", e))?;

        let first = outputs.iter().next().map(|(_n, v)| v)
            .ok_or_else(|| anyhow!("no outputs from encoder session"))?;
        let arr_view = first.try_extract_array().map_err(|e| anyhow!("{}", e))?;
        let arr: ArrayD<f32> = arr_view.to_owned();
        arr.into_dimensionality()
            .map_err(|_| anyhow!("expect [batch, seq, dim] encoder output"))
    }

    /// Run the decoder on every live beam; returns one next-token logits row
    /// per beam. Beams advance in lockstep, so all prefixes share a length.
    fn decoder_step(&self, beams: &[Hypothesis], enc_hidden: &Array3<f32>) -> Result<Vec<Vec<f32>>> {
        let batch = beams.len();
        let cur_len = beams[0].tokens.len();
        let (src, dim) = (enc_hidden.shape()[1], enc_hidden.shape()[2]);

        let mut input_ids = Array2::<i64>::zeros((batch, cur_len));
        for (i, beam) in beams.iter().enumerate() {
            for (j, &t) in beam.tokens.iter().enumerate() {
                input_ids[[i, j]] = t as i64;
            }
        }
        let mut hidden = Array3::<f32>::zeros((batch, src, dim));
        for i in 0..batch {
            hidden.slice_mut(s![i, .., ..]).assign(&enc_hidden.slice(s![0, .., ..]));
        }
        let enc_mask = Array2::<i64>::ones((batch, src));

        let input_ids_val = Value::from_array(input_ids).map_err(|e| anyhow!("{}", e))?;
        let enc_mask_val = Value::from_array(enc_mask).map_err(|e| anyhow!("{}", e))?;
        let hidden_val = Value::from_array(hidden).map_err(|e| anyhow!("{}", e))?;

        let mut session = self.decoder.lock().unwrap();
        let outputs = session
            .run(inputs! {
                "input_ids" => &input_ids_val,
                "encoder_attention_mask" => &enc_mask_val,
                "encoder_hidden_states" => &hidden_val,
            })
            .map_err(|e| anyhow!("{}", e))?;

        let first = outputs.iter().next().map(|(_n, v)| v)
            .ok_or_else(|| anyhow!("no outputs from decoder session"))?;
        let arr_view = first.try_extract_array().map_err(|e| anyhow!("{}", e))?;
        let arr: ArrayD<f32> = arr_view.to_owned();
        let logits: Array3<f32> = arr
            .into_dimensionality()
            .map_err(|_| anyhow!("expect [batch, seq, vocab] decoder output"))?;

        let mut rows = Vec::with_capacity(batch);
        for i in 0..batch {
            rows.push(logits.slice(s![i, cur_len - 1, ..]).to_vec());
        }
        Ok(rows)
    }

    /// Beam search without KV cache: the decoder re-runs on the full prefix
    /// each step. Early stopping once `num_beams` hypotheses have finished.
    fn beam_search(&self, enc_hidden: &Array3<f32>, params: &GenerateParams) -> Result<Vec<u32>> {
        let num_beams = params.num_beams.max(1);
        let mut beams = vec![Hypothesis::new(self.decoder_start)];
        let mut finished: Vec<(f32, Vec<u32>)> = Vec::new();

        for _ in 0..params.max_new_tokens.max(1) {
            let rows = self.decoder_step(&beams, enc_hidden)?;

            let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
            for (b, row) in rows.iter().enumerate() {
                let mut logprobs = log_softmax(row);
                for t in banned_ngram_tokens(&beams[b].tokens, NO_REPEAT_NGRAM) {
                    logprobs[t as usize] = f32::NEG_INFINITY;
                }
                for (idx, lp) in top_k(&logprobs, 2 * num_beams) {
                    candidates.push((b, idx as u32, beams[b].score + lp));
                }
            }
            candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

            let mut next: Vec<Hypothesis> = Vec::with_capacity(num_beams);
            for (b, token, score) in candidates {
                if next.len() == num_beams {
                    break;
                }
                let parent = &beams[b];
                if token == self.eos {
                    let ranked =
                        length_penalized(score, parent.generated_len() + 1, params.length_penalty);
                    finished.push((ranked, parent.tokens.clone()));
                } else {
                    let mut tokens = parent.tokens.clone();
                    tokens.push(token);
                    next.push(Hypothesis { tokens, score });
                }
            }

            if next.is_empty() || finished.len() >= num_beams {
                break;
            }
            beams = next;
        }

        // budget exhausted before enough beams closed: rank the live ones too
        if finished.len() < num_beams {
            for beam in &beams {
                let ranked =
                    length_penalized(beam.score, beam.generated_len(), params.length_penalty);
                finished.push((ranked, beam.tokens.clone()));
            }
        }

        let best = finished
            .into_iter()
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| anyhow!("beam search produced no hypotheses"))?;

        // strip the decoder start token
        Ok(best.1[1..].to_vec())
    }
}

impl Generator for OnnxGenerator {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, GeneratorError> {
        self.tok
            .ids(text)
            .map_err(|e| GeneratorError::Tokenize(format!("{e:#}")))
    }

    fn detokenize(&self, ids: &[u32]) -> Result<String, GeneratorError> {
        self.tok
            .decode_ids(ids)
            .map_err(|e| GeneratorError::Tokenize(format!("{e:#}")))
    }

    fn generate_summary(
        &self,
        text: &str,
        params: &GenerateParams,
    ) -> Result<String, GeneratorError> {
        let prompt = format!("{TASK_PREFIX}{text}");
        let mut ids = self
            .tok
            .ids_for_generation(&prompt)
            .map_err(|e| GeneratorError::Tokenize(format!("{e:#}")))?;
        ids.truncate(MAX_PROMPT_TOKENS);

        let enc_hidden = self
            .run_encoder(&ids)
            .map_err(|e| GeneratorError::Inference(format!("{e:#}")))?;
        let out_ids = self
            .beam_search(&enc_hidden, params)
            .map_err(|e| GeneratorError::Inference(format!("{e:#}")))?;

        self.tok
            .decode_ids(&out_ids)
            .map_err(|e| GeneratorError::Tokenize(format!("{e:#}")))
    }
}

fn resolve_onnx(
    model_id: &str,
    filename: Option<&str>,
    candidates: &[&str],
) -> Result<std::path::PathBuf> {
    let api = Api::new()?;
    let repo = api.model(model_id.to_string());

    if let Some(name) = filename {
        let p = repo.get(name)?;
        return Ok(p);
    }

    for name in candidates {
        if let Ok(p) = repo.get(name) { return Ok(p); }
    }

    bail!("Could not find {} in {model_id}. Pass an explicit ONNX filename to override.", candidates[0])
}

fn build_session(onnx_path: &std::path::Path, device: Device) -> Result<Session> {
    let builder = SessionBuilder::new()
        .map_err(|e| anyhow!("{}", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| anyhow!("{}", e))?;

    #[allow(unreachable_code)]
    let builder = match device {
        Device::Cpu => builder,
        Device::Cuda => {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                builder
                    .with_execution_providers([CUDAExecutionProvider::default().into()])
                    .map_err(|e| anyhow!("{}", e))?
            }
            #[cfg(not(feature = "cuda"))]
            {
                bail!("Binary built without CUDA support. Rebuild with `--features cuda` and ensure CUDA is available.")
            }
        }
    };

    let model_bytes = std::fs::read(onnx_path).map_err(|e| anyhow!("{}", e))?;
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| anyhow!("{}", e))?;
    Ok(session)
}
