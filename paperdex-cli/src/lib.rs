// All processing lives in paperdex-core.
// This CLI only resolves servers and paths, then prints summaries.

pub mod data_dir;
pub mod grobid_probe;

pub use paperdex_core::*;

pub use data_dir::{default_index_path, default_model_dir, resolve_index_path};
pub use grobid_probe::{resolve_server_url, GrobidProbe};
