//! TEI → Markdown conversion.
//!
//! A conversion runs three stages over one parsed document, then renders:
//!
//! 1. [`SectionFilter`] drops excluded `div`s from the whole tree
//! 2. [`extract_metadata`] resolves title, authors, DOI and abstract
//! 3. [`reconstruct`] turns the top-level body sections into headed sections
//!
//! The result is a [`MarkdownArtifact`] whose `Display` output is written to
//! disk atomically.

pub mod body;
pub mod filter;
pub mod metadata;

pub use body::{heading_level, reconstruct};
pub use filter::SectionFilter;
pub use metadata::extract_metadata;

use crate::config::{ConverterConfig, OutputNamingConfig};
use crate::error::{ConvertError, ConvertResult};
use crate::storage::{list_files_with_suffix, write_atomic};
use crate::tei::parse_xml;
use crate::types::{BatchReport, MarkdownArtifact, TeiDocument};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Converter {
    config: ConverterConfig,
    filter: SectionFilter,
}

impl Converter {
    /// Fails only when the filter configuration is invalid.
    pub fn new(config: ConverterConfig) -> ConvertResult<Self> {
        let filter = SectionFilter::new(&config.filter)?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert TEI text held in memory. Performs no I/O.
    pub fn convert_str(&self, xml: &str) -> ConvertResult<MarkdownArtifact> {
        let tree = parse_xml(xml)?;
        let filtered = self.filter.apply(&tree);
        let document = TeiDocument::from_tree(&filtered, self.config.metadata.analytic_lookup);

        let metadata = extract_metadata(&document, &self.config.metadata);
        let sections = reconstruct(&document.body, &self.config.body);
        debug!(
            title = %metadata.title,
            authors = metadata.authors.len(),
            sections = sections.len(),
            "assembled artifact"
        );

        Ok(MarkdownArtifact { metadata, sections })
    }

    /// Destination for `input` inside `output_dir`.
    pub fn output_path(&self, input: &Path, output_dir: &Path) -> ConvertResult<PathBuf> {
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ConvertError::InvalidInputPath(input.to_path_buf()))?;
        Ok(output_dir.join(output_file_name(file_name, &self.config.output)))
    }

    /// Convert one file and write the artifact. Returns the written path.
    pub fn convert_file(&self, input: &Path, output_dir: &Path) -> ConvertResult<PathBuf> {
        let output = self.output_path(input, output_dir)?;
        let xml = fs::read_to_string(input).map_err(|source| ConvertError::Read {
            path: input.to_path_buf(),
            source,
        })?;
        let artifact = self.convert_str(&xml)?;

        let write_error = |source| ConvertError::Write {
            path: output.clone(),
            source,
        };
        fs::create_dir_all(output_dir).map_err(write_error)?;
        write_atomic(&output, artifact.render().as_bytes()).map_err(write_error)?;

        info!(
            input = %input.display(),
            output = %output.display(),
            "converted TEI document"
        );
        Ok(output)
    }

    /// Convert every input, isolating failures. Report entries keep input order.
    pub fn convert_batch(&self, inputs: &[PathBuf], output_dir: &Path, parallel: bool) -> BatchReport {
        let convert_one = |input: &PathBuf| (input.clone(), self.convert_file(input, output_dir));
        let results: Vec<(PathBuf, ConvertResult<PathBuf>)> = if parallel {
            inputs.par_iter().map(convert_one).collect()
        } else {
            inputs.iter().map(convert_one).collect()
        };

        let mut report = BatchReport::default();
        for (input, result) in results {
            match result {
                Ok(output) => report.converted.push((input, output)),
                Err(e) => {
                    warn!(input = %input.display(), error = %e, "failed to convert TEI document");
                    report.failed.push((input, e.to_string()));
                }
            }
        }
        report
    }

    /// Convert every matching file directly inside `input_dir`, in sorted order.
    ///
    /// Only listing the directory can fail; per-file errors land in the report.
    pub fn convert_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        parallel: bool,
    ) -> ConvertResult<BatchReport> {
        let inputs = list_files_with_suffix(input_dir, &self.config.output.input_suffix).map_err(
            |source| ConvertError::Read {
                path: input_dir.to_path_buf(),
                source,
            },
        )?;
        debug!(dir = %input_dir.display(), files = inputs.len(), "converting directory");
        Ok(self.convert_batch(&inputs, output_dir, parallel))
    }
}

/// Derive the artifact file name from an input file name: remove every
/// occurrence of the infix, drop the last extension, append the output one.
///
/// `paper.grobid.tei.xml` → `paper.md`
pub fn output_file_name(file_name: &str, naming: &OutputNamingConfig) -> String {
    let cleaned = if naming.strip_infix.is_empty() {
        file_name.to_string()
    } else {
        file_name.replace(&naming.strip_infix, "")
    };
    let stem = Path::new(&cleaned)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(cleaned);
    format!("{}.{}", stem, naming.extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> OutputNamingConfig {
        OutputNamingConfig::default()
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("paper.grobid.tei.xml", &naming()), "paper.md");
        assert_eq!(output_file_name("paper.xml", &naming()), "paper.md");
        assert_eq!(output_file_name("paper.tei", &naming()), "paper.md");
        assert_eq!(output_file_name("noext", &naming()), "noext.md");
        assert_eq!(output_file_name("a.grobid.tei.b.grobid.tei.xml", &naming()), "a.b.md");
        assert_eq!(output_file_name("v1.2.paper.xml", &naming()), "v1.2.paper.md");
    }

    #[test]
    fn test_output_file_name_custom_naming() {
        let naming = OutputNamingConfig {
            strip_infix: String::new(),
            extension: "markdown".to_string(),
            input_suffix: ".xml".to_string(),
        };
        assert_eq!(output_file_name("paper.grobid.tei.xml", &naming), "paper.grobid.tei.markdown");
    }

    #[test]
    fn test_output_path_rejects_pathless_input() {
        let converter = Converter::new(ConverterConfig::default()).unwrap();
        assert!(matches!(
            converter.output_path(Path::new(".."), Path::new("out")),
            Err(ConvertError::InvalidInputPath(_))
        ));
    }

    #[test]
    fn test_convert_str_minimal_document() {
        let converter = Converter::new(ConverterConfig::default()).unwrap();
        let artifact = converter.convert_str("<TEI/>").unwrap();
        assert_eq!(
            artifact.render(),
            "---\ntitle: \"No Title Found\"\nauthors:\ndoi: \"\"\n---\n\n"
        );
    }

    #[test]
    fn test_convert_str_rejects_garbage() {
        let converter = Converter::new(ConverterConfig::default()).unwrap();
        assert!(converter.convert_str("not xml at all").is_err());
        assert!(converter.convert_str("<TEI><body></TEI>").is_err());
    }
}
