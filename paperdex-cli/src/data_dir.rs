//! Where the CLI keeps its index when nothing else is specified.

use anyhow::{anyhow, Result};
use paperdex_core::config::IndexConfig;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "paperdex";
const INDEX_FILE: &str = "index.json";
const MODELS_DIR: &str = "models";

/// `<data_local_dir>/paperdex`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine local data directory"))?;
    Ok(base.join(APP_DIR))
}

pub fn default_index_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(INDEX_FILE))
}

/// `<data_local_dir>/paperdex/models/<model>`, where ONNX model files are cached
pub fn default_model_dir(model: &str) -> Result<PathBuf> {
    Ok(data_dir()?.join(MODELS_DIR).join(model))
}

/// `--index`, then `index.path` from the config, then the data directory.
pub fn resolve_index_path(arg: Option<&Path>, config: &IndexConfig) -> Result<PathBuf> {
    match arg.or(config.path.as_deref()) {
        Some(path) => Ok(path.to_path_buf()),
        None => default_index_path(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path_precedence() {
        let mut config = IndexConfig::default();
        config.path = Some(PathBuf::from("/from/config.json"));

        let explicit = resolve_index_path(Some(Path::new("/from/arg.json")), &config).unwrap();
        assert_eq!(explicit, PathBuf::from("/from/arg.json"));

        let configured = resolve_index_path(None, &config).unwrap();
        assert_eq!(configured, PathBuf::from("/from/config.json"));
    }

    #[test]
    fn test_default_lives_under_app_dir() {
        if let Ok(path) = resolve_index_path(None, &IndexConfig::default()) {
            assert!(path.ends_with("paperdex/index.json"));
        }
    }

    #[test]
    fn test_model_dir_is_per_model() {
        if let Ok(path) = default_model_dir("all-MiniLM-L6-v2") {
            assert!(path.ends_with("paperdex/models/all-MiniLM-L6-v2"));
        }
    }
}
