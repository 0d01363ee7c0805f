//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] for all-MiniLM-L6-v2 via `ort`:
//! tokenize, run the transformer, mean-pool over real tokens, L2-normalize.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained at 256 tokens.
const MAX_SEQ_LEN: usize = 256;

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync. Session is only touched behind the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

/// Model and tokenizer locations inside the cache directory.
pub fn model_files(config: &EmbeddingConfig) -> (std::path::PathBuf, std::path::PathBuf) {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    (cache_dir.join("model.onnx"), cache_dir.join("tokenizer.json"))
}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_path, tokenizer_path) = model_files(config);

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `memoria model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `memoria model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Run the transformer and return `(token_embeddings, seq_len)` where the
    /// flat buffer is laid out `[batch, seq_len, EMBEDDING_DIM]`.
    fn token_embeddings(&self, encodings: &[Encoding]) -> Result<(Vec<f32>, usize)> {
        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();
        let shape = vec![batch_size as i64, seq_len as i64];

        let input_ids: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().map(|&id| id as i64))
            .collect();
        let attention_mask: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&m| m as i64))
            .collect();
        // Single segment input, so token types are all zero
        let token_type_ids = vec![0i64; batch_size * seq_len];

        let input_ids = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask =
            Tensor::from_array((shape.clone(), attention_mask.into_boxed_slice()))?;
        let token_type_ids = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        })?;

        // Output naming differs between exports
        let value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (dims, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embeddings shape: {dims:?}, expected [{batch_size}, seq, {EMBEDDING_DIM}]"
        );

        Ok((data.to_vec(), dims[1] as usize))
    }
}

/// Attention-masked mean over the token axis for one batch row.
fn mean_pool(data: &[f32], row: usize, seq_len: usize, mask: &[u32]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; EMBEDDING_DIM];
    let mut count = 0.0f32;

    for (s, &m) in mask.iter().take(seq_len).enumerate() {
        if m == 0 {
            continue;
        }
        let offset = (row * seq_len + s) * EMBEDDING_DIM;
        for (acc, x) in pooled.iter_mut().zip(&data[offset..offset + EMBEDDING_DIM]) {
            *acc += x;
        }
        count += 1.0;
    }

    if count > 0.0 {
        pooled.iter_mut().for_each(|x| *x /= count);
    }
    pooled
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("embedding batch returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let (data, seq_len) = self.token_embeddings(&encodings)?;

        Ok(encodings
            .iter()
            .enumerate()
            .map(|(row, encoding)| {
                let mut v = mean_pool(&data, row, seq_len, encoding.get_attention_mask());
                l2_normalize(&mut v);
                v
            })
            .collect())
    }
}
