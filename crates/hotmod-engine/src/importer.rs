//! Hot importer
//!
//! Owns the registry, the handle table and the active watches for one
//! engine instance. There is no global state: two importers never share
//! records or handles.

use hotmod_kernel::{
    CacheSnapshot, FsWatch, HotImportConfig, HotImportError, HotImportResult, Module,
    ModuleLoader, ReloadEvent, ReloadOutcome, ReloadPhase,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::coordinator::{HandleTable, ReloadCoordinator};
use crate::handle::ModuleHandle;
use crate::projector::project;
use crate::registry::ModuleRegistry;
use crate::resolver::PathResolver;
use crate::watcher::{self, NotifyFsWatch, WatchHandle};

/// Entry point: import modules as hot handles and manage their lifecycle
pub struct HotImporter {
    config: HotImportConfig,
    resolver: PathResolver,
    registry: Arc<ModuleRegistry>,
    handles: Arc<HandleTable>,
    watches: Mutex<HashMap<PathBuf, WatchHandle>>,
    coordinator: Arc<ReloadCoordinator>,
    fs_watch: Arc<dyn FsWatch>,
    events: broadcast::Sender<ReloadEvent>,
}

impl HotImporter {
    /// Create an importer watching through `notify`.
    pub fn new(config: HotImportConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let registry = Arc::new(ModuleRegistry::new(loader));
        let handles: Arc<HandleTable> = Arc::new(RwLock::new(HashMap::new()));
        let coordinator = Arc::new(ReloadCoordinator::new(
            registry.clone(),
            handles.clone(),
            events.clone(),
        ));

        Self {
            resolver: PathResolver::new(config.extensions.clone()),
            config,
            registry,
            handles,
            watches: Mutex::new(HashMap::new()),
            coordinator,
            fs_watch: Arc::new(NotifyFsWatch),
            events,
        }
    }

    /// Replace the watch primitive
    pub fn with_fs_watch(mut self, fs_watch: Arc<dyn FsWatch>) -> Self {
        self.fs_watch = fs_watch;
        self
    }

    pub fn config(&self) -> &HotImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Subscribe to watch and reload events
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Resolve `reference` against the configured base directory.
    pub fn resolve(&self, reference: impl AsRef<Path>) -> HotImportResult<PathBuf> {
        self.resolver
            .resolve_module(reference.as_ref(), self.config.base_dir.as_deref())
    }

    /// Import a module and return its stable handle.
    ///
    /// The first import of a path fails if loading fails. Later imports of
    /// the same path return the same handle without reloading; if the path
    /// was made cold, it is watched again.
    pub async fn hot_import(
        &self,
        reference: impl AsRef<Path>,
    ) -> HotImportResult<Arc<ModuleHandle>> {
        let path = self.resolve(reference)?;
        self.import_resolved(path).await
    }

    /// [`hot_import`](Self::hot_import) resolving against `base_dir`.
    pub async fn hot_import_from(
        &self,
        reference: impl AsRef<Path>,
        base_dir: &Path,
    ) -> HotImportResult<Arc<ModuleHandle>> {
        let path = self
            .resolver
            .resolve_module(reference.as_ref(), Some(base_dir))?;
        self.import_resolved(path).await
    }

    async fn import_resolved(&self, path: PathBuf) -> HotImportResult<Arc<ModuleHandle>> {
        if let Some(handle) = self.handle(&path) {
            debug!("{:?} already imported", path);
            if self.config.watch {
                self.ensure_hot(&path)?;
            }
            return Ok(handle);
        }

        let record = self.registry.load(&path).await?;

        // another import of the same path may have finished meanwhile
        let handle = {
            let mut handles = self.handles.write();
            match handles.get(&path) {
                Some(existing) => existing.clone(),
                None => {
                    let slot = self.registry.commit(&path, record.clone());
                    let handle = Arc::new(ModuleHandle::new(path.clone(), slot));
                    project(&handle, &record);
                    handles.insert(path.clone(), handle.clone());
                    info!(
                        "Imported {} module {:?} (version {})",
                        record.kind(),
                        path,
                        record.version()
                    );
                    handle
                }
            }
        };

        if self.config.watch {
            self.ensure_hot(&path)?;
        }
        Ok(handle)
    }

    /// Handle for an already imported path
    pub fn handle(&self, path: &Path) -> Option<Arc<ModuleHandle>> {
        self.handles.read().get(path).cloned()
    }

    /// Load a module through the loader without creating a handle.
    pub async fn import_file(&self, path: impl AsRef<Path>) -> HotImportResult<Arc<dyn Module>> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(HotImportError::RelativePath(path.to_path_buf()));
        }
        self.registry.load(path).await
    }

    /// Reload an imported module now.
    pub async fn refresh(&self, reference: impl AsRef<Path>) -> HotImportResult<ReloadOutcome> {
        let path = self.resolve(reference)?;
        if !self.registry.contains(&path) {
            return Err(HotImportError::NotLoaded(path));
        }
        Ok(self.coordinator.reload(&path).await)
    }

    /// Remove a module from the loader cache.
    pub fn purge_cache(&self, reference: impl AsRef<Path>) -> HotImportResult<CacheSnapshot> {
        let path = self.resolve(reference)?;
        self.registry.purge(&path)
    }

    /// Put a purged snapshot back into the loader cache.
    pub fn restore_cache(
        &self,
        reference: impl AsRef<Path>,
        snapshot: CacheSnapshot,
    ) -> HotImportResult<()> {
        let path = self.resolve(reference)?;
        self.registry.restore(&path, snapshot)
    }

    /// Start watching an imported module. Must run inside a tokio runtime.
    pub fn make_hot(&self, reference: impl AsRef<Path>) -> HotImportResult<()> {
        let path = self.resolve(reference)?;
        if self.watches.lock().contains_key(&path) {
            return Err(HotImportError::AlreadyWatching(path));
        }
        self.ensure_hot(&path)
    }

    fn ensure_hot(&self, path: &Path) -> HotImportResult<()> {
        let mut watches = self.watches.lock();
        if watches.contains_key(path) {
            return Ok(());
        }
        if !self.registry.contains(path) {
            return Err(HotImportError::NotLoaded(path.to_path_buf()));
        }

        let watch = watcher::watch(
            path,
            self.fs_watch.as_ref(),
            self.config.debounce(),
            self.coordinator.clone(),
            self.events.clone(),
        )?;
        watches.insert(path.to_path_buf(), watch);
        let _ = self.events.send(ReloadEvent::WatchStarted {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Stop watching one module. Its handle keeps serving the last record.
    pub fn make_cold(&self, reference: impl AsRef<Path>) -> HotImportResult<()> {
        let path = self.resolve(reference)?;
        let removed = self.watches.lock().remove(&path);
        match removed {
            Some(mut watch) => {
                watch.close();
                info!("{:?} is cold", path);
                let _ = self.events.send(ReloadEvent::WatchStopped { path });
            }
            None => debug!("{:?} was not hot", path),
        }
        Ok(())
    }

    /// Stop every watch.
    pub fn make_cold_all(&self) {
        let drained: Vec<(PathBuf, WatchHandle)> = self.watches.lock().drain().collect();
        if drained.is_empty() {
            return;
        }
        for (path, mut watch) in drained {
            watch.close();
            let _ = self.events.send(ReloadEvent::WatchStopped { path });
        }
        info!("All modules are cold");
    }

    /// `Some(reference)` makes one module cold, `None` makes all cold.
    pub fn stop_watching(&self, reference: Option<&Path>) -> HotImportResult<()> {
        match reference {
            Some(reference) => self.make_cold(reference),
            None => {
                self.make_cold_all();
                Ok(())
            }
        }
    }

    pub fn is_hot(&self, path: &Path) -> bool {
        self.watches.lock().contains_key(path)
    }

    pub fn hot_paths(&self) -> Vec<PathBuf> {
        self.watches.lock().keys().cloned().collect()
    }

    /// Reload phase of a path
    pub fn phase(&self, path: &Path) -> ReloadPhase {
        self.coordinator.phase(path)
    }

    pub fn last_outcome(&self, path: &Path) -> Option<ReloadOutcome> {
        self.coordinator.last_outcome(path)
    }

    /// Close every watch; handles stay usable.
    pub fn shutdown(&self) {
        info!("Shutting down hot importer");
        self.make_cold_all();
    }
}

impl Drop for HotImporter {
    fn drop(&mut self) {
        self.make_cold_all();
    }
}
