use crate::artifact::load_artifact;
use crate::chunking::RecursiveCharacterSplitter;
use crate::config::PipelineConfig;
use crate::converter::Converter;
use crate::embedding::{embedder_from_config, Embedder};
use crate::index::{UpsertOutcome, VectorIndex};
use crate::preprocessors::PdfPreprocessor;
use crate::query::SearchHandle;
use crate::storage::{list_files_with_suffix, FileIndexStorage, IndexStorage};
use crate::types::{BatchReport, ExtractionReport, IndexReport};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Directories used by a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineDirs {
    pub pdfs: PathBuf,
    pub xml: PathBuf,
    pub markdown: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub extraction: ExtractionReport,
    pub conversion: BatchReport,
    pub index: IndexReport,
    /// Per-stage timings; empty unless profiling was requested
    pub timings: Vec<(String, Duration)>,
}

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        debug!(step = step_name, elapsed_ms = elapsed.as_millis() as u64, "step finished");

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn log_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();
        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            info!(
                step = %step,
                elapsed_ms = duration.as_millis() as u64,
                share = %format!("{:.1}%", percentage),
                "stage timing"
            );
        }
        info!(elapsed_ms = total.as_millis() as u64, "pipeline total");
    }

    pub fn into_timings(self) -> Vec<(String, Duration)> {
        self.timings
    }
}

/// Wires extraction, conversion, indexing and querying together.
pub struct PaperProcessor {
    config: PipelineConfig,
    converter: Converter,
    splitter: RecursiveCharacterSplitter,
    embedder: Arc<dyn Embedder>,
    storage: Arc<dyn IndexStorage>,
    preprocessor: Option<PdfPreprocessor>,
}

impl PaperProcessor {
    /// Create a processor with explicit dependencies (testable)
    pub fn new_with_dependencies(
        config: PipelineConfig,
        embedder: Arc<dyn Embedder>,
        storage: Arc<dyn IndexStorage>,
        preprocessor: Option<PdfPreprocessor>,
    ) -> Result<Self> {
        config.validate()?;
        let converter =
            Converter::new(config.converter.clone()).context("invalid converter configuration")?;
        let splitter = RecursiveCharacterSplitter::from_config(&config.chunking);
        Ok(Self {
            config,
            converter,
            splitter,
            embedder,
            storage,
            preprocessor,
        })
    }

    /// Hashing embedder, JSON index at `index_path`, GROBID from the config.
    pub fn new_local(config: PipelineConfig, index_path: &Path) -> Result<Self> {
        let embedder = embedder_from_config(&config.index)?;
        let storage = Arc::new(FileIndexStorage::new(index_path));
        let preprocessor = PdfPreprocessor::new_with_grobid(&config.grobid)?;
        Self::new_with_dependencies(config, embedder, storage, Some(preprocessor))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn preprocessor(&self) -> Option<&PdfPreprocessor> {
        self.preprocessor.as_ref()
    }

    /// A query handle over the same storage and embedder.
    pub fn search_handle(&self) -> SearchHandle {
        SearchHandle::new(Arc::clone(&self.storage), Arc::clone(&self.embedder))
    }

    pub fn extract(&self, pdf_dir: &Path, xml_dir: &Path, force: bool) -> Result<ExtractionReport> {
        let preprocessor = self
            .preprocessor
            .as_ref()
            .ok_or_else(|| anyhow!("no PDF backend configured"))?;
        preprocessor.process_directory(pdf_dir, xml_dir, force)
    }

    /// Convert a single TEI file or every TEI file in a directory.
    pub fn convert(&self, input: &Path, markdown_dir: &Path, parallel: bool) -> Result<BatchReport> {
        if input.is_dir() {
            Ok(self.converter.convert_directory(input, markdown_dir, parallel)?)
        } else {
            Ok(self
                .converter
                .convert_batch(&[input.to_path_buf()], markdown_dir, parallel))
        }
    }

    /// Index every artifact in `markdown_dir`, reusing unchanged documents
    /// from the stored index, then persist the index.
    pub fn build_index(&self, markdown_dir: &Path) -> Result<IndexReport> {
        let mut index = match self
            .storage
            .load_index()
            .with_context(|| format!("failed to load index from {}", self.storage.describe()))?
        {
            Some(index) => {
                index.ensure_compatible(self.embedder.as_ref())?;
                index
            }
            None => VectorIndex::for_embedder(self.embedder.as_ref()),
        };

        let suffix = format!(".{}", self.config.converter.output.extension);
        let artifacts = list_files_with_suffix(markdown_dir, &suffix)
            .with_context(|| format!("failed to list {}", markdown_dir.display()))?;

        let mut report = IndexReport::default();
        for path in artifacts {
            let outcome = load_artifact(&path)
                .map_err(anyhow::Error::from)
                .and_then(|document| {
                    index
                        .upsert_document(&document, &self.splitter, self.embedder.as_ref())
                        .map_err(anyhow::Error::from)
                });
            match outcome {
                Ok(UpsertOutcome::Indexed { chunks }) => {
                    info!(artifact = %path.display(), chunks, "indexed artifact");
                    report.indexed.push((path, chunks));
                }
                Ok(UpsertOutcome::Unchanged) => report.unchanged.push(path),
                Err(e) => {
                    warn!(artifact = %path.display(), error = %e, "failed to index artifact");
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        self.storage
            .store_index(&index)
            .with_context(|| format!("failed to store index at {}", self.storage.describe()))?;
        report.total_chunks = index.len();
        Ok(report)
    }

    /// Extract, convert and index in sequence.
    pub fn run_pipeline(&self, dirs: &PipelineDirs, force: bool, profile: bool) -> Result<PipelineReport> {
        let mut profiler = StepProfiler::new(profile);

        let extraction = profiler.time_step("PDF → TEI (GROBID)", || {
            self.extract(&dirs.pdfs, &dirs.xml, force)
        })?;
        let conversion = profiler.time_step("TEI → Markdown", || {
            self.convert(&dirs.xml, &dirs.markdown, true)
        })?;
        let index = profiler.time_step("Chunk + embed + index", || {
            self.build_index(&dirs.markdown)
        })?;

        profiler.log_summary();
        Ok(PipelineReport {
            extraction,
            conversion,
            index,
            timings: profiler.into_timings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::storage::MemoryIndexStorage;

    #[test]
    fn test_profiler_disabled_records_nothing() {
        let mut profiler = StepProfiler::new(false);
        assert_eq!(profiler.time_step("a", || 41 + 1), 42);
        assert!(profiler.timings().is_empty());
    }

    #[test]
    fn test_profiler_records_steps_in_order() {
        let mut profiler = StepProfiler::new(true);
        profiler.time_step("first", || ());
        profiler.time_step("second", || ());
        let names: Vec<_> = profiler.timings().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_extract_without_backend_is_error() {
        let processor = PaperProcessor::new_with_dependencies(
            PipelineConfig::default(),
            Arc::new(HashingEmbedder::new(16).unwrap()),
            Arc::new(MemoryIndexStorage::new()),
            None,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(processor.extract(dir.path(), dir.path(), false).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.chunking.chunk_overlap = 5000;
        let result = PaperProcessor::new_with_dependencies(
            config,
            Arc::new(HashingEmbedder::new(16).unwrap()),
            Arc::new(MemoryIndexStorage::new()),
            None,
        );
        assert!(result.is_err());
    }
}
