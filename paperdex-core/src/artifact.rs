//! Reading converted Markdown artifacts back into structured form.
//!
//! The front matter is parsed with serde_yaml. A file without front matter is
//! not an error: its metadata is empty and the whole text is the body.

use crate::error::ArtifactError;
use crate::storage::calculate_content_hash;
use crate::types::ChunkMetadata;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    authors: Option<Vec<String>>,
    doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub source: PathBuf,
    pub title: String,
    pub authors: Vec<String>,
    pub doi: String,
    /// Body text after the front matter, trimmed
    pub body: String,
    /// Hash of the whole file, used to skip unchanged documents when indexing
    pub content_hash: String,
}

impl From<&LoadedDocument> for ChunkMetadata {
    fn from(document: &LoadedDocument) -> Self {
        ChunkMetadata {
            title: document.title.clone(),
            authors: document.authors.join(", "),
            doi: document.doi.clone(),
            source: document.source.display().to_string(),
        }
    }
}

pub fn load_artifact(path: &Path) -> Result<LoadedDocument, ArtifactError> {
    let text = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_artifact(&text, path)
}

/// Parse artifact text; `source` is recorded as-is in the result.
pub fn parse_artifact(text: &str, source: &Path) -> Result<LoadedDocument, ArtifactError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (front_matter, body) = match split_front_matter(text) {
        Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
        Some((yaml, body)) => {
            let front_matter: FrontMatter =
                serde_yaml::from_str(yaml).map_err(|source_err| ArtifactError::FrontMatter {
                    path: source.to_path_buf(),
                    source: source_err,
                })?;
            (front_matter, body)
        }
        None => (FrontMatter::default(), text),
    };

    Ok(LoadedDocument {
        source: source.to_path_buf(),
        title: front_matter.title.unwrap_or_default(),
        authors: front_matter.authors.unwrap_or_default(),
        doi: front_matter.doi.unwrap_or_default(),
        body: body.trim().to_string(),
        content_hash: calculate_content_hash(text),
    })
}

/// Split `---` delimited front matter from the rest of the text.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}
