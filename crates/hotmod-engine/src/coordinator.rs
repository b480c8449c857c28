//! Reload coordination
//!
//! Per path: `Idle -> Reloading -> Committed | RolledBack -> Idle`.
//!
//! A reload purges the loader cache, loads afresh and either commits the new
//! record (slot write plus projection) or puts the purged snapshot back. The
//! committed record is never touched by a failed attempt.
//!
//! Requests arriving while a reload of the same path is running are
//! coalesced: they return [`ReloadOutcome::Coalesced`] and exactly one more
//! attempt runs once the current one finishes, so the latest content wins.

use hotmod_kernel::{Module, ReloadEvent, ReloadOutcome, ReloadPhase};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::handle::ModuleHandle;
use crate::projector::project;
use crate::registry::ModuleRegistry;

/// Handles by canonical path
pub(crate) type HandleTable = RwLock<HashMap<PathBuf, Arc<ModuleHandle>>>;

#[derive(Debug, Default)]
struct PathState {
    phase: ReloadPhase,
    pending: bool,
    last_outcome: Option<ReloadOutcome>,
}

/// Runs reload attempts with commit/rollback semantics
pub struct ReloadCoordinator {
    registry: Arc<ModuleRegistry>,
    handles: Arc<HandleTable>,
    states: Mutex<HashMap<PathBuf, PathState>>,
    events: broadcast::Sender<ReloadEvent>,
}

impl ReloadCoordinator {
    pub(crate) fn new(
        registry: Arc<ModuleRegistry>,
        handles: Arc<HandleTable>,
        events: broadcast::Sender<ReloadEvent>,
    ) -> Self {
        Self {
            registry,
            handles,
            states: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Reload `path`, or queue one more attempt if a reload is already running.
    pub async fn reload(&self, path: &Path) -> ReloadOutcome {
        if !self.begin(path) {
            debug!("Reload of {:?} already running, coalesced", path);
            return ReloadOutcome::Coalesced;
        }

        loop {
            let outcome = self.attempt(path).await;
            if !self.finish(path, &outcome) {
                return outcome;
            }
            debug!("Changes to {:?} arrived during reload, reloading again", path);
        }
    }

    /// Current phase for `path`
    pub fn phase(&self, path: &Path) -> ReloadPhase {
        self.states
            .lock()
            .get(path)
            .map(|state| state.phase)
            .unwrap_or_default()
    }

    /// Outcome of the last finished attempt for `path`
    pub fn last_outcome(&self, path: &Path) -> Option<ReloadOutcome> {
        self.states
            .lock()
            .get(path)
            .and_then(|state| state.last_outcome.clone())
    }

    /// Enter `Reloading`; false when an attempt is already running.
    fn begin(&self, path: &Path) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(path.to_path_buf()).or_default();
        if state.phase == ReloadPhase::Reloading {
            state.pending = true;
            return false;
        }
        state.phase = ReloadPhase::Reloading;
        true
    }

    /// Record the outcome; true when a queued attempt should run next.
    fn finish(&self, path: &Path, outcome: &ReloadOutcome) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(path.to_path_buf()).or_default();
        state.phase = match outcome {
            ReloadOutcome::Committed { .. } => ReloadPhase::Committed,
            _ => ReloadPhase::RolledBack,
        };
        debug!("Reload of {:?} finished: {}", path, state.phase);
        state.last_outcome = Some(outcome.clone());

        if std::mem::take(&mut state.pending) {
            state.phase = ReloadPhase::Reloading;
            true
        } else {
            state.phase = ReloadPhase::Idle;
            false
        }
    }

    async fn attempt(&self, path: &Path) -> ReloadOutcome {
        let start = Instant::now();
        info!("Reloading module {:?}", path);
        self.emit(ReloadEvent::ReloadStarted {
            path: path.to_path_buf(),
        });

        let snapshot = match self.registry.purge(path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("{}; loading {:?} fresh", e, path);
                None
            }
        };

        match self.registry.load(path).await {
            Ok(record) => {
                let version = record.version();
                self.commit(path, record);

                let duration = start.elapsed();
                info!("Module {:?} reloaded (version {}) in {:?}", path, version, duration);
                self.emit(ReloadEvent::Committed {
                    path: path.to_path_buf(),
                    version,
                    duration,
                });
                ReloadOutcome::Committed { version }
            }
            Err(e) => {
                error!("Failed to reload {:?}: {}", path, e);
                if let Some(snapshot) = snapshot {
                    if let Err(restore_err) = self.registry.restore(path, snapshot) {
                        warn!("Failed to restore loader cache for {:?}: {}", path, restore_err);
                    }
                }
                info!("Keeping the last committed version of {:?}", path);

                let reason = e.to_string();
                self.emit(ReloadEvent::RolledBack {
                    path: path.to_path_buf(),
                    error: reason.clone(),
                    duration: start.elapsed(),
                });
                ReloadOutcome::RolledBack { reason }
            }
        }
    }

    fn commit(&self, path: &Path, record: Arc<dyn Module>) {
        self.registry.commit(path, record.clone());
        if let Some(handle) = self.handles.read().get(path) {
            project(handle, &record);
        }
    }

    fn emit(&self, event: ReloadEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
