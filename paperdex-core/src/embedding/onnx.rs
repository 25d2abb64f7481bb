//! Sentence-transformer embeddings on ONNX Runtime.
//!
//! `model.onnx` and `tokenizer.json` are read from the cache directory and
//! fetched from huggingface.co/sentence-transformers on first use. Token
//! states are mean-pooled under the attention mask and L2-normalized.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use super::Embedder;
use crate::config::OnnxConfig;
use crate::error::{EmbeddingError, EmbeddingResult};

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub struct OnnxEmbedder {
    // `Session::run` needs exclusive access on some ort releases
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    max_length: usize,
    batch_size: usize,
    model_name: String,
}

fn backend<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> EmbeddingError + '_ {
    move |e| EmbeddingError::Backend(format!("{}: {}", context, e))
}

impl OnnxEmbedder {
    pub fn new(config: &OnnxConfig, dimension: usize) -> EmbeddingResult<Self> {
        let cache_dir = config.cache_dir.as_deref().ok_or_else(|| {
            EmbeddingError::InvalidInput("index.onnx.cache_dir is not set".to_string())
        })?;
        std::fs::create_dir_all(cache_dir).map_err(backend("failed to create model cache"))?;

        let model_path = cache_dir.join(MODEL_FILE);
        let tokenizer_path = cache_dir.join(TOKENIZER_FILE);
        if !model_path.exists() {
            download(&config.model, "onnx/model.onnx", &model_path)?;
        }
        if !tokenizer_path.exists() {
            download(&config.model, TOKENIZER_FILE, &tokenizer_path)?;
        }

        info!("Loading ONNX model {} from {}", config.model, cache_dir.display());
        let session = Session::builder()
            .map_err(backend("failed to create session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(backend("failed to set optimization level"))?
            .with_intra_threads(4)
            .map_err(backend("failed to set threads"))?
            .commit_from_file(&model_path)
            .map_err(backend("failed to load model"))?;
        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(backend("failed to load tokenizer"))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
            max_length: config.max_length.max(1),
            batch_size: config.batch_size.max(1),
            model_name: format!("onnx-{}", config.model),
        })
    }

    fn embed_chunk(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let batch = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(backend("tokenization failed"))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        let mut token_type_ids = vec![0i64; batch * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            let tokens = encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .take(seq_len);
            for (j, ((id, mask), type_id)) in tokens.enumerate() {
                input_ids[row + j] = i64::from(*id);
                attention_mask[row + j] = i64::from(*mask);
                token_type_ids[row + j] = i64::from(*type_id);
            }
        }

        let shape = vec![batch, seq_len];
        let ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
            .map_err(backend("input tensor"))?;
        let mask_tensor = Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
            .map_err(backend("attention mask tensor"))?;
        let types_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
            .map_err(backend("token type tensor"))?;
        let inputs = vec![
            ("input_ids", ids_tensor.into_dyn()),
            ("attention_mask", mask_tensor.into_dyn()),
            ("token_type_ids", types_tensor.into_dyn()),
        ];

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::Backend("ONNX session lock poisoned".to_string()))?;
        let outputs = session.run(inputs).map_err(backend("inference failed"))?;

        let named: Vec<_> = outputs.iter().collect();
        let (_, hidden) = named
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| named.first())
            .ok_or_else(|| EmbeddingError::Backend("model produced no output".to_string()))?;
        let (out_shape, data) = hidden
            .try_extract_tensor::<f32>()
            .map_err(backend("failed to read output tensor"))?;

        let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims.get(2).copied().unwrap_or(0);
        if hidden_size != self.dimension || data.len() < batch * seq_len * hidden_size {
            return Err(EmbeddingError::Backend(format!(
                "model output {:?} does not match {} x {} x {}",
                dims, batch, seq_len, self.dimension
            )));
        }

        Ok((0..batch)
            .map(|i| mean_pool(data, &attention_mask[i * seq_len..(i + 1) * seq_len], i, hidden_size))
            .collect())
    }
}

/// Masked mean over the token states of row `row`, L2-normalized.
fn mean_pool(data: &[f32], mask: &[i64], row: usize, hidden_size: usize) -> Vec<f32> {
    let seq_len = mask.len();
    let mut pooled = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;
    for (j, &m) in mask.iter().enumerate() {
        if m == 0 {
            continue;
        }
        let start = (row * seq_len + j) * hidden_size;
        for (acc, value) in pooled.iter_mut().zip(&data[start..start + hidden_size]) {
            *acc += value;
        }
        count += 1.0;
    }
    if count > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= count);
    }
    let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= norm);
    }
    pooled
}

/// Fetch `file` of `model` into `dest` through a temp file in the same directory.
fn download(model: &str, file: &str, dest: &Path) -> EmbeddingResult<()> {
    let url = format!(
        "https://huggingface.co/sentence-transformers/{}/resolve/main/{}",
        model, file
    );
    info!("Downloading {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(backend("failed to build HTTP client"))?;
    let bytes = client
        .get(&url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(|response| response.bytes())
        .map_err(|e| EmbeddingError::Backend(format!("download of {} failed: {}", url, e)))?;

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(backend("failed to create temp file"))?;
    tmp.write_all(&bytes).map_err(backend("failed to write download"))?;
    tmp.persist(dest).map_err(backend("failed to store download"))?;

    info!("Saved {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.embed_chunk(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Backend("empty embedding result".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_chunk(chunk)?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        // two tokens of width 2, second one padded out
        let data = [3.0, 4.0, 100.0, 100.0];
        let pooled = mean_pool(&data, &[1, 0], 0, 2);
        assert!((pooled[0] - 0.6).abs() < 1e-6);
        assert!((pooled[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_missing_cache_dir_is_rejected() {
        let config = OnnxConfig::default();
        assert!(matches!(
            OnnxEmbedder::new(&config, 384),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    /// Downloads all-MiniLM-L6-v2 (~90MB); run with `--features onnx -- --ignored`.
    #[test]
    #[ignore]
    fn test_minilm_ranks_related_text_higher() {
        let dir = tempfile::tempdir().unwrap();
        let config = OnnxConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let embedder = OnnxEmbedder::new(&config, 384).unwrap();
        let vectors = embedder
            .embed_batch(&["protein folding", "how proteins fold", "tax policy on islands"])
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].len(), 384);
        let cosine = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(cosine(&vectors[0], &vectors[1]) > cosine(&vectors[0], &vectors[2]));
        assert_eq!(embedder.model_name(), "onnx-all-MiniLM-L6-v2");
    }
}
