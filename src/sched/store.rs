//! Silence persistence backends.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::sched::silence::Silence;

/// Errors that can occur when reading or writing persisted silences.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while accessing the silence file.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// JSON encoding or decoding error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable storage for the silence set.
pub trait SilenceStore: Send + Sync {
    /// Read the persisted silences; an absent store yields an empty set.
    fn load(&self) -> Result<BTreeMap<String, Silence>, StoreError>;

    /// Replace the persisted silences with `silences`.
    fn save(&self, silences: &BTreeMap<String, Silence>) -> Result<(), StoreError>;
}

/// Stores silences as a JSON object of ID to silence.
///
/// Saves share one temporary file, so callers serialize them; [`crate::Schedule`] does.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SilenceStore for JsonFileStore {
    fn load(&self) -> Result<BTreeMap<String, Silence>, StoreError> {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let silences: BTreeMap<String, Silence> = serde_json::from_str(&txt)?;
        debug!(path = %self.path.display(), count = silences.len(), "loaded silences");
        Ok(silences)
    }

    fn save(&self, silences: &BTreeMap<String, Silence>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(silences)?;
        // write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = silences.len(), "saved silences");
        Ok(())
    }
}

/// Keeps the last saved silence set in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<BTreeMap<String, Silence>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SilenceStore for MemoryStore {
    fn load(&self) -> Result<BTreeMap<String, Silence>, StoreError> {
        Ok(self.saved.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, silences: &BTreeMap<String, Silence>) -> Result<(), StoreError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = silences.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
