//! Blob Store: keyed opaque blobs with atomic replacement
//!
//! Features:
//! - `BlobStore` trait: `load` returns `None` for a missing key, `save`
//!   replaces the whole blob
//! - `FileBlobStore`: one file per key under a root directory, written
//!   via a uniquely named tmp file + fsync + rename, so concurrent saves
//!   of the same key never share a tmp file
//! - `MemoryBlobStore`: in-process map for tests and disk-less embedders
//!
//! Keys are relative, `/`-separated paths (`app_data.json`,
//! `players/76561197960287930`). Empty keys, absolute keys and keys with
//! `..` or `.` components are rejected.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),
}

// ── Trait ───────────────────────────────────────────────────────────

/// Keyed blob storage.
pub trait BlobStore: Send + Sync {
    /// Load the blob stored under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Replace the blob stored under `key`.
    fn save(&self, key: &str, blob: &[u8]) -> Result<(), PersistenceError>;
}

fn validate_key(key: &str) -> Result<(), PersistenceError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && !key.contains('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

// ── File Store ──────────────────────────────────────────────────────

/// Stores each blob as a file under `root`.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => {
                debug!(key, bytes = data.len(), "Blob loaded");
                Ok(Some(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;

        // Atomic write: unique tmp in the target dir, fsync, rename.
        // A failed write drops (and deletes) the tmp file.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(blob)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(key, bytes = blob.len(), "Blob saved");
        Ok(())
    }
}

// ── Memory Store ────────────────────────────────────────────────────

/// Keeps blobs in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        validate_key(key)?;
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), PersistenceError> {
        validate_key(key)?;
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
