//! Embedding seam.
//!
//! [`Embedder`] is what the index and query handle depend on. The bundled
//! [`HashingEmbedder`] needs no model files: it hashes lowercase alphanumeric
//! tokens into a fixed number of signed buckets and L2-normalizes the result,
//! so texts sharing words land close together under cosine similarity.

use crate::config::{EmbedderKind, IndexConfig};
use crate::error::{EmbeddingError, EmbeddingResult};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Embeddings in the same order as `texts`.
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize;

    /// Identifier recorded in the index; indexes built by a different model
    /// are refused on load.
    fn model_name(&self) -> &str;
}

/// Build the embedder `index.embedder` selects.
pub fn embedder_from_config(config: &IndexConfig) -> EmbeddingResult<Arc<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding_dimension)?)),
        #[cfg(feature = "onnx")]
        EmbedderKind::Onnx => Ok(Arc::new(OnnxEmbedder::new(
            &config.onnx,
            config.embedding_dimension,
        )?)),
        #[cfg(not(feature = "onnx"))]
        EmbedderKind::Onnx => Err(EmbeddingError::InvalidInput(
            "index.embedder is onnx but paperdex was built without the `onnx` feature".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> EmbeddingResult<Self> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_name: format!("hashing-sha256-{}", dimension),
        })
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Graph neural networks for proteins").unwrap();
        let b = embedder.embed("Graph neural networks for proteins").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_do_not_matter() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed("Transformer, Attention!").unwrap();
        let b = embedder.embed("transformer attention").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let query = embedder.embed("protein folding").unwrap();
        let related = embedder.embed("a study of protein folding dynamics").unwrap();
        let unrelated = embedder.embed("economic policy in small islands").unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed("  ...  ").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_batch_and_metadata() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let batch = embedder.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.model_name(), "hashing-sha256-32");
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_config_builds_hashing_embedder() {
        let config = IndexConfig {
            embedding_dimension: 48,
            ..Default::default()
        };
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.dimension(), 48);
        assert_eq!(embedder.model_name(), "hashing-sha256-48");
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_needs_the_feature() {
        let config = IndexConfig {
            embedder: EmbedderKind::Onnx,
            ..Default::default()
        };
        let err = embedder_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("`onnx` feature"));
    }
}
