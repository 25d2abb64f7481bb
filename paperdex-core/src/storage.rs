use crate::error::{IndexError, IndexResult};
use crate::index::VectorIndex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Storage abstraction for the persisted vector index
pub trait IndexStorage: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load_index(&self) -> IndexResult<Option<VectorIndex>>;
    fn store_index(&self, index: &VectorIndex) -> IndexResult<()>;
    fn describe(&self) -> String;
}

/// Index stored as pretty-printed JSON in a single file
pub struct FileIndexStorage {
    path: PathBuf,
}

impl FileIndexStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexStorage for FileIndexStorage {
    fn load_index(&self) -> IndexResult<Option<VectorIndex>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json_str = fs::read_to_string(&self.path)?;
        let index: VectorIndex =
            serde_json::from_str(&json_str).map_err(|source| IndexError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), chunks = index.len(), "loaded index");
        Ok(Some(index))
    }

    fn store_index(&self, index: &VectorIndex) -> IndexResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json_str = serde_json::to_string_pretty(index)?;
        write_atomic(&self.path, json_str.as_bytes())?;
        debug!(path = %self.path.display(), chunks = index.len(), "stored index");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory storage for tests and dry runs
#[derive(Default)]
pub struct MemoryIndexStorage {
    slot: Mutex<Option<VectorIndex>>,
}

impl MemoryIndexStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            slot: Mutex::new(Some(index)),
        }
    }
}

impl IndexStorage for MemoryIndexStorage {
    fn load_index(&self) -> IndexResult<Option<VectorIndex>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store_index(&self, index: &VectorIndex) -> IndexResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(index.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

/// Write `contents` to `path` through a temporary file in the same directory,
/// so readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Regular files directly inside `dir` whose name ends with `suffix`, sorted.
pub fn list_files_with_suffix(dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// SHA-256 of a text, hex encoded (content hash for incremental indexing)
pub fn calculate_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
