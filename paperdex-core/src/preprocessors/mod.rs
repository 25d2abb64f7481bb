//! Document Preprocessors
//!
//! The extraction stage in front of the converter.
//!
//! ```text
//! PDF directory
//!     ↓
//! [PdfPreprocessor + PdfBackend (GROBID)]
//!     ↓
//! <stem>.grobid.tei.xml
//!     ↓
//! [Converter]
//! ```

pub mod pdf;

// Re-export main types
pub use pdf::{GrobidBackend, PdfBackend, PdfBackendImpl, PdfPreprocessor};
