//! Record store: one pretty-printed JSON file per batch.
//!
//! Files are named `metadata_{batch_id}.json`. Writes go to a temporary file in
//! the same directory and are renamed over the target, so a reader sees either
//! the previous collection or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::BatchCollection;

/// Batch identifier for a run started today (`YYYY-MM-DD`).
#[must_use]
pub fn batch_id_for_today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Check that a batch identifier is safe to embed in a file name.
///
/// # Errors
///
/// Returns [`StoreError::InvalidBatchId`] for an empty identifier or one with
/// characters other than ASCII letters, digits, `-`, `_` and `.`.
pub fn validate_batch_id(batch_id: &str) -> Result<(), StoreError> {
    let valid = !batch_id.is_empty()
        && !batch_id.starts_with('.')
        && batch_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid { Ok(()) } else { Err(StoreError::InvalidBatchId(batch_id.to_string())) }
}

/// Directory of persisted batches.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the given batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBatchId`] if the identifier is unusable.
    pub fn path_for(&self, batch_id: &str) -> Result<PathBuf, StoreError> {
        validate_batch_id(batch_id)?;
        Ok(self.dir.join(format!("metadata_{batch_id}.json")))
    }

    /// Check whether a batch has been saved.
    #[must_use]
    pub fn exists(&self, batch_id: &str) -> bool {
        self.path_for(batch_id).is_ok_and(|p| p.is_file())
    }

    /// Write the full collection, replacing any previous version atomically.
    ///
    /// # Errors
    ///
    /// Returns error on an invalid batch id, encoding failure or I/O failure. The
    /// previous file is untouched in every error case.
    pub fn save(&self, batch_id: &str, batch: &BatchCollection) -> Result<PathBuf, StoreError> {
        let path = self.path_for(batch_id)?;
        let json = serde_json::to_string_pretty(batch)?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;

        let io_err = |source| StoreError::Io { path: path.clone(), source };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!(path = %path.display(), records = batch.len(), "Batch saved");
        Ok(path)
    }

    /// Read a previously saved collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the batch was never saved, or
    /// [`StoreError::Corrupt`] if the file does not hold a valid collection.
    pub fn load(&self, batch_id: &str) -> Result<BatchCollection, StoreError> {
        let path = self.path_for(batch_id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let batch: BatchCollection = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?;
        debug!(path = %path.display(), records = batch.len(), "Batch loaded");
        Ok(batch)
    }

    /// Identifiers of every saved batch, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: self.dir.clone(), source }),
        };

        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let id = name.strip_prefix("metadata_")?.strip_suffix(".json")?;
                validate_batch_id(id).ok().map(|()| id.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
