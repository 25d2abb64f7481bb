//! PDF backend trait
//!
//! A backend turns PDF bytes into GROBID-style TEI XML. The preprocessor only
//! depends on this trait, so a different extraction service (or a stub in
//! tests) can stand in for GROBID.

use anyhow::Result;

/// Backend trait for PDF extraction
pub trait PdfBackend: Send + Sync {
    /// Extract PDF bytes to TEI XML. `file_name` is used for the upload and
    /// in error messages.
    fn extract_to_tei(&self, pdf_bytes: &[u8], file_name: &str) -> Result<String>;

    /// Backend identifier for logging/debugging
    fn name(&self) -> &str;

    /// Check if backend is healthy/ready
    fn is_healthy(&self) -> bool;
}

pub mod grobid;

pub use grobid::GrobidBackend;
