//! PDF Preprocessor
//!
//! Sends every PDF of a directory through a pluggable backend (GROBID by
//! default) and writes the returned TEI next to the other intermediate files
//! as `<stem>.grobid.tei.xml`.

pub mod backends;

use crate::config::GrobidConfig;
use crate::storage::write_atomic;
use crate::types::ExtractionReport;
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use backends::{GrobidBackend, PdfBackend};

/// Backend enum for runtime backend selection
pub enum PdfBackendImpl {
    Grobid(GrobidBackend),
    /// Any other implementation, e.g. a stub in tests
    Custom(Box<dyn PdfBackend>),
}

impl PdfBackend for PdfBackendImpl {
    fn extract_to_tei(&self, pdf_bytes: &[u8], file_name: &str) -> Result<String> {
        match self {
            PdfBackendImpl::Grobid(backend) => backend.extract_to_tei(pdf_bytes, file_name),
            PdfBackendImpl::Custom(backend) => backend.extract_to_tei(pdf_bytes, file_name),
        }
    }

    fn name(&self) -> &str {
        match self {
            PdfBackendImpl::Grobid(backend) => backend.name(),
            PdfBackendImpl::Custom(backend) => backend.name(),
        }
    }

    fn is_healthy(&self) -> bool {
        match self {
            PdfBackendImpl::Grobid(backend) => backend.is_healthy(),
            PdfBackendImpl::Custom(backend) => backend.is_healthy(),
        }
    }
}

/// PDF Preprocessor with pluggable backend and a bounded worker pool
pub struct PdfPreprocessor {
    backend: PdfBackendImpl,
    concurrency: usize,
    output_suffix: String,
}

impl PdfPreprocessor {
    /// Create PdfPreprocessor with the GROBID HTTP backend
    pub fn new_with_grobid(config: &GrobidConfig) -> Result<Self> {
        Ok(Self {
            backend: PdfBackendImpl::Grobid(GrobidBackend::new(config)?),
            concurrency: config.concurrency.max(1),
            output_suffix: config.output_suffix.clone(),
        })
    }

    pub fn new_with_backend(backend: Box<dyn PdfBackend>, concurrency: usize, output_suffix: &str) -> Self {
        Self {
            backend: PdfBackendImpl::Custom(backend),
            concurrency: concurrency.max(1),
            output_suffix: output_suffix.to_string(),
        }
    }

    /// Get the backend name for logging
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Check if the backend is healthy
    pub fn is_healthy(&self) -> bool {
        self.backend.is_healthy()
    }

    pub fn supports_file_type(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    /// Where the TEI for `pdf` is written inside `output_dir`.
    pub fn output_path(&self, pdf: &Path, output_dir: &Path) -> Option<PathBuf> {
        let stem = pdf.file_stem()?.to_str()?;
        Some(output_dir.join(format!("{}{}", stem, self.output_suffix)))
    }

    /// Extract one PDF and write its TEI. Returns the written path.
    pub fn extract_file(&self, pdf: &Path, output_dir: &Path) -> Result<PathBuf> {
        let output = self
            .output_path(pdf, output_dir)
            .ok_or_else(|| anyhow!("cannot derive an output name for {}", pdf.display()))?;
        let file_name = pdf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pdf_bytes = fs::read(pdf).with_context(|| format!("failed to read {}", pdf.display()))?;
        let tei = self
            .backend
            .extract_to_tei(&pdf_bytes, &file_name)
            .with_context(|| format!("{} failed on {}", self.backend.name(), pdf.display()))?;
        write_atomic(&output, tei.as_bytes())
            .with_context(|| format!("failed to write {}", output.display()))?;

        info!(input = %pdf.display(), output = %output.display(), "extracted TEI");
        Ok(output)
    }

    /// Extract every PDF directly inside `input_dir`.
    ///
    /// PDFs whose output already exists are skipped unless `force` is set.
    /// Failures are collected per file; only setup problems are errors.
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path, force: bool) -> Result<ExtractionReport> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;

        let mut pdfs = Vec::new();
        for entry in fs::read_dir(input_dir)
            .with_context(|| format!("failed to list {}", input_dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && self.supports_file_type(&path) {
                pdfs.push(path);
            }
        }
        pdfs.sort();

        let mut report = ExtractionReport::default();
        let mut pending = Vec::new();
        for pdf in pdfs {
            let exists = self
                .output_path(&pdf, output_dir)
                .is_some_and(|output| output.exists());
            if exists && !force {
                report.skipped.push(pdf);
            } else {
                pending.push(pdf);
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .context("failed to build extraction worker pool")?;
        let results: Vec<(PathBuf, Result<PathBuf>)> = pool.install(|| {
            pending
                .par_iter()
                .map(|pdf| (pdf.clone(), self.extract_file(pdf, output_dir)))
                .collect()
        });

        for (pdf, result) in results {
            match result {
                Ok(output) => report.extracted.push((pdf, output)),
                Err(e) => {
                    warn!(input = %pdf.display(), error = %format!("{:#}", e), "failed to extract PDF");
                    report.failed.push((pdf, format!("{:#}", e)));
                }
            }
        }
        Ok(report)
    }
}
