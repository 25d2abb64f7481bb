// Paperdex Core Library
//
// Turns GROBID TEI output into Markdown with YAML front matter, and the
// Markdown into a chunked vector index that can be queried.

pub mod artifact;
pub mod chunking;
pub mod config;
pub mod converter;
pub mod embedding;
pub mod error;
pub mod index;
pub mod preprocessors;
pub mod processor;
pub mod query;
pub mod storage;
pub mod tei;
pub mod types;

// Re-export main types and functions for easy use
pub use types::*;
pub use artifact::{load_artifact, parse_artifact, LoadedDocument};
pub use chunking::RecursiveCharacterSplitter;
pub use config::PipelineConfig;
pub use converter::Converter;
pub use embedding::{embedder_from_config, Embedder, HashingEmbedder};
#[cfg(feature = "onnx")]
pub use embedding::OnnxEmbedder;
pub use error::{ArtifactError, ConvertError, EmbeddingError, GrobidError, IndexError};
pub use index::VectorIndex;
pub use preprocessors::{GrobidBackend, PdfBackend, PdfPreprocessor};
pub use processor::{PaperProcessor, PipelineDirs, PipelineReport};
pub use query::SearchHandle;
pub use storage::{FileIndexStorage, IndexStorage, MemoryIndexStorage};
