// Error types for the paperdex core library.
//
// Each stage with a closed set of failure modes gets its own enum. Orchestration
// code (processor, CLI) wraps these in anyhow with context.

use std::io;
use std::path::PathBuf;

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Failures while turning one TEI document into a Markdown artifact.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("malformed TEI document: {0}")]
    Malformed(String),

    #[error("document has no root element")]
    EmptyDocument,

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("input path has no usable file name: {}", .0.display())]
    InvalidInputPath(PathBuf),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures talking to a GROBID server.
#[derive(Debug, Error)]
pub enum GrobidError {
    #[error("GROBID server at {url} is not reachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("GROBID returned HTTP {status} for {file}: {body}")]
    Status {
        status: u16,
        file: String,
        body: String,
    },

    #[error("GROBID stayed busy after {attempts} attempts for {file}")]
    Busy { attempts: u32, file: String },

    #[error("transport error talking to GROBID: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),

    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Failures loading a converted Markdown artifact back into structured form.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid front matter in {}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index was built with model '{found}' but the active embedder is '{expected}'")]
    ModelMismatch { expected: String, found: String },

    #[error("embedding dimension mismatch: index expects {expected}, embedder produced {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("failed to parse index file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
pub type IndexResult<T> = std::result::Result<T, IndexError>;
pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;
