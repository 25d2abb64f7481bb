//! Brute-force vector index over artifact chunks.

use crate::artifact::LoadedDocument;
use crate::chunking::RecursiveCharacterSplitter;
use crate::embedding::Embedder;
use crate::error::{IndexError, IndexResult};
use crate::types::{ChunkMetadata, IndexedChunk, SearchHit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub version: u32,
    /// Embedder that produced every vector in the index
    pub model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Content hash per source path
    pub documents: BTreeMap<String, String>,
    pub chunks: Vec<IndexedChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Unchanged,
    Indexed { chunks: usize },
}

impl VectorIndex {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        let now = Utc::now();
        Self {
            version: Self::FORMAT_VERSION,
            model: model.into(),
            dimension,
            created_at: now,
            updated_at: now,
            documents: BTreeMap::new(),
            chunks: Vec::new(),
        }
    }

    pub fn for_embedder(embedder: &dyn Embedder) -> Self {
        Self::new(embedder.model_name(), embedder.dimension())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Refuse to mix vectors from different embedders.
    pub fn ensure_compatible(&self, embedder: &dyn Embedder) -> IndexResult<()> {
        if self.model != embedder.model_name() {
            return Err(IndexError::ModelMismatch {
                expected: embedder.model_name().to_string(),
                found: self.model.clone(),
            });
        }
        if self.dimension != embedder.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: embedder.dimension(),
            });
        }
        Ok(())
    }

    /// Index `document`, replacing its previous chunks. Skipped when the
    /// stored content hash for the same source is unchanged.
    pub fn upsert_document(
        &mut self,
        document: &LoadedDocument,
        splitter: &RecursiveCharacterSplitter,
        embedder: &dyn Embedder,
    ) -> IndexResult<UpsertOutcome> {
        let metadata = ChunkMetadata::from(document);
        if self.documents.get(&metadata.source) == Some(&document.content_hash) {
            debug!(source = %metadata.source, "document unchanged, skipping");
            return Ok(UpsertOutcome::Unchanged);
        }

        let texts = splitter.split_text(&document.body);
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = embedder.embed_batch(&text_refs)?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: bad.len(),
            });
        }

        self.remove_document(&metadata.source);
        let now = Utc::now();
        let count = texts.len();
        for (chunk_index, (text, embedding)) in texts.into_iter().zip(embeddings).enumerate() {
            self.chunks.push(IndexedChunk {
                id: Uuid::new_v4(),
                text,
                embedding,
                chunk_index,
                metadata: metadata.clone(),
                indexed_at: now,
            });
        }
        self.documents
            .insert(metadata.source.clone(), document.content_hash.clone());
        self.updated_at = now;

        debug!(source = %metadata.source, chunks = count, "indexed document");
        Ok(UpsertOutcome::Indexed { chunks: count })
    }

    /// Drop every chunk of `source`. Returns how many were removed.
    pub fn remove_document(&mut self, source: &str) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|chunk| chunk.metadata.source != source);
        if self.documents.remove(source).is_some() {
            self.updated_at = Utc::now();
        }
        before - self.chunks.len()
    }

    /// Top `k` chunks by cosine similarity, highest score first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(query, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, chunk)| SearchHit {
                chunk_id: chunk.id,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                score,
            })
            .collect()
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
