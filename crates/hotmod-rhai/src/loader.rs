//! Rhai module loader
//!
//! Reads, compiles and evaluates module scripts and caches the resulting
//! records per absolute path. A cached record is returned as-is (including
//! any members set on it) until the path is invalidated.

use async_trait::async_trait;
use hotmod_kernel::{
    CacheSnapshot, HotImportError, HotImportResult, Module, ModuleLoader, ScriptLimits,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::engine::ScriptEngine;
use crate::module::RhaiModule;

/// Load primitive for `.rhai` module scripts
pub struct RhaiModuleLoader {
    engine: Arc<ScriptEngine>,
    cache: RwLock<HashMap<PathBuf, Arc<dyn Module>>>,
    next_version: AtomicU64,
}

impl RhaiModuleLoader {
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            engine: Arc::new(ScriptEngine::new(limits)),
            cache: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn engine(&self) -> &Arc<ScriptEngine> {
        &self.engine
    }

    /// Compile and evaluate `source` as the module at `path`, bypassing the cache.
    pub fn evaluate_source(&self, path: &Path, source: &str) -> HotImportResult<RhaiModule> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| HotImportError::load(path, e))?;
        let export = self
            .engine
            .evaluate(path, &ast)
            .map_err(|e| HotImportError::load(path, e))?;

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        RhaiModule::from_export(
            path,
            export,
            self.engine.clone(),
            ast,
            version,
            source_hash(source),
        )
        .map_err(|e| HotImportError::load(path, e))
    }

    /// Paths currently held in the cache
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.cache.read().keys().cloned().collect()
    }
}

impl Default for RhaiModuleLoader {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

#[async_trait]
impl ModuleLoader for RhaiModuleLoader {
    async fn load(&self, path: &Path) -> HotImportResult<Arc<dyn Module>> {
        if !path.is_absolute() {
            return Err(HotImportError::RelativePath(path.to_path_buf()));
        }

        if let Some(cached) = self.cache.read().get(path) {
            debug!("Loader cache hit: {:?}", path);
            return Ok(cached.clone());
        }

        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HotImportError::load(path, e))?;
        let module: Arc<dyn Module> = Arc::new(self.evaluate_source(path, &source)?);

        info!(
            "Loaded {} module {:?} (version {})",
            module.kind(),
            path,
            module.version()
        );

        // a concurrent load of the same path may have won the race
        let mut cache = self.cache.write();
        Ok(cache
            .entry(path.to_path_buf())
            .or_insert(module)
            .clone())
    }

    fn invalidate(&self, path: &Path) -> Option<CacheSnapshot> {
        let removed = self.cache.write().remove(path)?;
        debug!("Invalidated loader cache for {:?}", path);
        Some(CacheSnapshot::new(path, removed))
    }

    fn reinstate(&self, path: &Path, snapshot: CacheSnapshot) {
        debug!(
            "Reinstating loader cache for {:?} (version {})",
            path,
            snapshot.module().version()
        );
        self.cache
            .write()
            .insert(path.to_path_buf(), snapshot.into_module());
    }

    fn is_cached(&self, path: &Path) -> bool {
        self.cache.read().contains_key(path)
    }
}

fn source_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
