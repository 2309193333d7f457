//! Inventory storage adapters.
//!
//! Implements [`InventoryBackend`] twice:
//!
//! - [`JsonFileBackend`]: the production store.  The whole document is
//!   written to a sibling temp file, flushed, then renamed over the
//!   target, so a crash leaves either the old or the new document.
//! - [`MemoryBackend`]: simulation backend for tests and dry runs, with
//!   a switch that makes every write fail.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{InventoryBackend, StorageError};
use crate::inventory::InventoryDocument;

// ── JSON file ────────────────────────────────────────────────

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "inventory.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_err(context: &str, path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io(format!("{} {}: {}", context, path.display(), e))
}

impl InventoryBackend for JsonFileBackend {
    fn load(&mut self) -> Result<Option<InventoryDocument>, StorageError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store: {} absent, starting empty", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(io_err("reading", &self.path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupted(format!("{}: {}", self.path.display(), e)))
    }

    fn persist(&mut self, doc: &InventoryDocument) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp).map_err(|e| io_err("creating", &tmp, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| io_err("writing", &tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| {
            warn!("Store: rename into {} failed", self.path.display());
            io_err("replacing", &self.path, e)
        })
    }
}

// ── In-memory ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryBackend {
    stored: Option<InventoryDocument>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: InventoryDocument) -> Self {
        Self {
            stored: Some(doc),
            ..Self::default()
        }
    }

    /// Make every subsequent `persist` fail (or succeed again).
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn stored(&self) -> Option<&InventoryDocument> {
        self.stored.as_ref()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl InventoryBackend for MemoryBackend {
    fn load(&mut self) -> Result<Option<InventoryDocument>, StorageError> {
        Ok(self.stored.clone())
    }

    fn persist(&mut self, doc: &InventoryDocument) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io("simulated write failure".into()));
        }
        self.stored = Some(doc.clone());
        self.writes += 1;
        Ok(())
    }
}
