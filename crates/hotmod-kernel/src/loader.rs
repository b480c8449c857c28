//! Load primitive contract
//!
//! The engine never evaluates module code itself. It asks a [`ModuleLoader`]
//! for a record and controls the loader's cache through `invalidate` and
//! `reinstate`.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::HotImportResult;
use crate::module::Module;

/// Loader cache entry removed by `invalidate`, kept so it can be reinstated.
#[derive(Clone)]
pub struct CacheSnapshot {
    path: PathBuf,
    module: Arc<dyn Module>,
    taken_at: Instant,
}

impl CacheSnapshot {
    pub fn new(path: impl Into<PathBuf>, module: Arc<dyn Module>) -> Self {
        Self {
            path: path.into(),
            module,
            taken_at: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached record that was forgotten
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }

    pub fn into_module(self) -> Arc<dyn Module> {
        self.module
    }
}

impl fmt::Debug for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSnapshot")
            .field("path", &self.path)
            .field("version", &self.module.version())
            .field("kind", &self.module.kind())
            .finish()
    }
}

/// Dynamic load primitive with a per-path cache.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the module at an absolute path.
    ///
    /// Returns the cached record when one exists; only a cache miss
    /// evaluates the source again.
    async fn load(&self, path: &Path) -> HotImportResult<Arc<dyn Module>>;

    /// Forget the cached record for `path`, returning what was forgotten.
    fn invalidate(&self, path: &Path) -> Option<CacheSnapshot>;

    /// Put a previously invalidated entry back.
    fn reinstate(&self, path: &Path, snapshot: CacheSnapshot);

    fn is_cached(&self, path: &Path) -> bool;
}
