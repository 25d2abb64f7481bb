use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

// Default value functions for serde
fn default_true() -> bool {
    true
}

/// Top-level configuration for every stage of the pipeline.
///
/// Every section is `#[serde(default)]`, so a YAML file only needs to name the
/// values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub converter: ConverterConfig,
    pub grobid: GrobidConfig,
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
}

// ===== CONVERTER =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub filter: SectionFilterConfig,
    pub metadata: MetadataConfig,
    pub body: BodyConfig,
    pub output: OutputNamingConfig,
}

/// Which `div` blocks are stripped before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionFilterConfig {
    /// Headings (or regular expressions in `pattern` mode) to remove
    pub excluded_headings: Vec<String>,
    pub match_mode: MatchMode,
    pub case_sensitive: bool,
}

impl Default for SectionFilterConfig {
    fn default() -> Self {
        Self {
            excluded_headings: vec![
                "references".to_string(),
                "bibliography".to_string(),
                "credit authorship contribution statement".to_string(),
                "declaration of competing interest".to_string(),
            ],
            match_mode: MatchMode::Exact,
            case_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    Prefix,
    Contains,
    Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub analytic_lookup: AnalyticLookup,
    /// Title used when the document has no `titleStmt/title`
    pub missing_title: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            analytic_lookup: AnalyticLookup::FrontMatter,
            missing_title: "No Title Found".to_string(),
        }
    }
}

/// Where the authors and DOI are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticLookup {
    /// `front/div[type=analytic]` only
    #[default]
    FrontMatter,
    /// Fall back to `teiHeader/.../sourceDesc/biblStruct/analytic`
    FrontMatterThenHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub headless_sections: HeadlessSectionPolicy,
    pub placeholder_heading: String,
    pub subsections: SubsectionPolicy,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            headless_sections: HeadlessSectionPolicy::Drop,
            placeholder_heading: "Untitled Section".to_string(),
            subsections: SubsectionPolicy::Ignore,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadlessSectionPolicy {
    #[default]
    Drop,
    SynthesizePlaceholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsectionPolicy {
    #[default]
    Ignore,
    Flatten,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNamingConfig {
    /// Token removed from the input file name, wherever it occurs
    pub strip_infix: String,
    /// Extension of written artifacts, without the dot
    pub extension: String,
    /// Suffix a file name must end with to be picked up by directory conversion
    pub input_suffix: String,
}

impl Default for OutputNamingConfig {
    fn default() -> Self {
        Self {
            strip_infix: ".grobid.tei".to_string(),
            extension: "md".to_string(),
            input_suffix: ".xml".to_string(),
        }
    }
}

// ===== GROBID =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrobidConfig {
    pub server_url: String,
    /// Worker threads used when extracting a directory
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Attempts made while the server answers 503
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    #[serde(default = "default_true")]
    pub consolidate_header: bool,
    pub consolidate_citations: bool,
    pub include_raw_citations: bool,
    pub tei_coordinates: bool,
    pub segment_sentences: bool,
    /// Appended to the PDF stem to name the extracted TEI file
    pub output_suffix: String,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8070".to_string(),
            concurrency: 10,
            timeout_secs: 180,
            max_retries: 5,
            retry_delay_secs: 5,
            consolidate_header: true,
            consolidate_citations: false,
            include_raw_citations: false,
            tei_coordinates: false,
            segment_sentences: false,
            output_suffix: ".grobid.tei.xml".to_string(),
        }
    }
}

// ===== CHUNKING / INDEX =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index file location; the CLI picks a per-user data path when unset
    pub path: Option<PathBuf>,
    pub embedder: EmbedderKind,
    pub embedding_dimension: usize,
    pub default_top_k: usize,
    pub onnx: OnnxConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            embedder: EmbedderKind::Hashing,
            embedding_dimension: 384,
            default_top_k: 3,
            onnx: OnnxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Lexical feature hashing, no model files
    #[default]
    Hashing,
    /// Sentence-transformer model on ONNX Runtime (`onnx` feature)
    Onnx,
}

/// Settings for [`EmbedderKind::Onnx`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    /// Name under huggingface.co/sentence-transformers
    pub model: String,
    /// Where `model.onnx` and `tokenizer.json` live; downloaded when missing
    pub cache_dir: Option<PathBuf>,
    /// Tokens per input; longer chunks are truncated
    pub max_length: usize,
    pub batch_size: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            max_length: 256,
            batch_size: 32,
        }
    }
}

impl PipelineConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(path = %p.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.grobid.concurrency == 0 {
            bail!("grobid.concurrency must be at least 1");
        }
        if self.index.embedding_dimension == 0 {
            bail!("index.embedding_dimension must be greater than zero");
        }
        if self.index.embedder == EmbedderKind::Onnx
            && (self.index.onnx.max_length == 0 || self.index.onnx.batch_size == 0)
        {
            bail!("index.onnx.max_length and index.onnx.batch_size must be greater than zero");
        }
        if self.converter.output.extension.is_empty() {
            bail!("converter.output.extension must not be empty");
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = PipelineConfig::default();
        assert_eq!(config.converter.filter.excluded_headings.len(), 4);
        assert_eq!(config.converter.filter.match_mode, MatchMode::Exact);
        assert!(!config.converter.filter.case_sensitive);
        assert_eq!(config.converter.metadata.missing_title, "No Title Found");
        assert_eq!(config.converter.body.headless_sections, HeadlessSectionPolicy::Drop);
        assert_eq!(config.converter.body.subsections, SubsectionPolicy::Ignore);
        assert_eq!(config.converter.output.strip_infix, ".grobid.tei");
        assert_eq!(config.grobid.concurrency, 10);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.index.default_top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
converter:
  filter:
    match_mode: contains
  body:
    subsections: flatten
chunking:
  chunk_size: 500
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.converter.filter.match_mode, MatchMode::Contains);
        assert_eq!(config.converter.filter.excluded_headings.len(), 4);
        assert_eq!(config.converter.body.subsections, SubsectionPolicy::Flatten);
        assert_eq!(config.converter.body.placeholder_heading, "Untitled Section");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.grobid.server_url, "http://localhost:8070");
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let mut config = PipelineConfig::default();
        config.chunking.chunk_overlap = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_with_fallback_on_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunking: [not, a, map]").unwrap();
        assert!(PipelineConfig::load_from_file(file.path()).is_err());

        let config = PipelineConfig::load_with_fallback(Some(file.path()));
        assert_eq!(config.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_embedder_selection() {
        assert_eq!(PipelineConfig::default().index.embedder, EmbedderKind::Hashing);

        let yaml = "index:\n  embedder: onnx\n  onnx:\n    batch_size: 8\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.index.embedder, EmbedderKind::Onnx);
        assert_eq!(config.index.onnx.model, "all-MiniLM-L6-v2");
        assert_eq!(config.index.onnx.batch_size, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_of_defaults() {
        let yaml = PipelineConfig::default().to_yaml().unwrap();
        let parsed: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.converter.output.extension, "md");
        assert_eq!(parsed.grobid.output_suffix, ".grobid.tei.xml");
    }
}
