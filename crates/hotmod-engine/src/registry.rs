//! Module registry
//!
//! Maps canonical paths to the last committed record. Each record lives in a
//! shared slot that the path's handle forwards through, so committing a new
//! record is a single slot write.

use hotmod_kernel::{CacheSnapshot, HotImportError, HotImportResult, Module, ModuleLoader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Cell holding the current record for one path
pub(crate) type RecordSlot = RwLock<Arc<dyn Module>>;

/// Registry of committed module records
pub struct ModuleRegistry {
    loader: Arc<dyn ModuleLoader>,
    records: RwLock<HashMap<PathBuf, Arc<RecordSlot>>>,
}

impl ModuleRegistry {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    /// Last committed record for `path`
    pub fn get(&self, path: &Path) -> Option<Arc<dyn Module>> {
        self.records.read().get(path).map(|slot| slot.read().clone())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.records.read().contains_key(path)
    }

    /// Load `path` through the loader.
    ///
    /// The committed record is left untouched whatever the outcome; only
    /// [`commit`](Self::commit) replaces it.
    pub async fn load(&self, path: &Path) -> HotImportResult<Arc<dyn Module>> {
        ensure_absolute(path)?;
        self.loader.load(path).await
    }

    /// Drop `path` from the loader cache, returning what was removed.
    pub fn purge(&self, path: &Path) -> HotImportResult<CacheSnapshot> {
        ensure_absolute(path)?;
        let snapshot = self
            .loader
            .invalidate(path)
            .ok_or_else(|| HotImportError::CacheMiss(path.to_path_buf()))?;
        debug!(
            "Purged {:?} (version {}) from the loader cache",
            path,
            snapshot.module().version()
        );
        Ok(snapshot)
    }

    /// Put a snapshot back; the next load of `path` returns it again.
    pub fn restore(&self, path: &Path, snapshot: CacheSnapshot) -> HotImportResult<()> {
        ensure_absolute(path)?;
        self.loader.reinstate(path, snapshot);
        Ok(())
    }

    /// Make `record` the current record for `path` and return its slot.
    pub(crate) fn commit(&self, path: &Path, record: Arc<dyn Module>) -> Arc<RecordSlot> {
        let mut records = self.records.write();
        match records.get(path) {
            Some(slot) => {
                *slot.write() = record;
                slot.clone()
            }
            None => {
                let slot = Arc::new(RwLock::new(record));
                records.insert(path.to_path_buf(), slot.clone());
                slot
            }
        }
    }

    pub(crate) fn slot(&self, path: &Path) -> Option<Arc<RecordSlot>> {
        self.records.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn ensure_absolute(path: &Path) -> HotImportResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(HotImportError::RelativePath(path.to_path_buf()))
    }
}
