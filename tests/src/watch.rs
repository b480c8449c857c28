use hotmod_kernel::{
    FsWatch, HotImportResult, RawEvent, RawEventKind, RawEventSink, ReloadEvent, WatchGuard,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// A watch primitive the test drives by hand
///
/// Events are only delivered when the test calls [`emit`](Self::emit), so
/// reload timing is fully deterministic. Releasing a guard forgets the sink.
#[derive(Default)]
pub struct ManualFsWatch {
    sinks: Arc<Mutex<HashMap<PathBuf, RawEventSink>>>,
    watches_started: Mutex<usize>,
}

impl ManualFsWatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a raw event; false when nothing watches `path`.
    pub fn emit(&self, path: &Path, kind: RawEventKind) -> bool {
        match self.sinks.lock().get(path) {
            Some(sink) => sink.send(RawEvent::new(path, kind)).is_ok(),
            None => false,
        }
    }

    pub fn emit_change(&self, path: &Path) -> bool {
        self.emit(path, RawEventKind::Changed)
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.sinks.lock().contains_key(path)
    }

    /// Number of watches ever established
    pub fn watches_started(&self) -> usize {
        *self.watches_started.lock()
    }
}

struct ManualGuard {
    path: PathBuf,
    sinks: Arc<Mutex<HashMap<PathBuf, RawEventSink>>>,
}

impl WatchGuard for ManualGuard {}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        self.sinks.lock().remove(&self.path);
    }
}

impl FsWatch for ManualFsWatch {
    fn watch(&self, path: &Path, sink: RawEventSink) -> HotImportResult<Box<dyn WatchGuard>> {
        self.sinks.lock().insert(path.to_path_buf(), sink);
        *self.watches_started.lock() += 1;
        Ok(Box::new(ManualGuard {
            path: path.to_path_buf(),
            sinks: self.sinks.clone(),
        }))
    }
}

/// Wait for the next `Committed` or `RolledBack` event for `path`.
pub async fn next_terminal(
    rx: &mut broadcast::Receiver<ReloadEvent>,
    path: &Path,
    timeout: Duration,
) -> Option<ReloadEvent> {
    next_matching(rx, timeout, |event| event.is_terminal() && event.path() == path).await
}

/// Wait for the next `ChangeDiscarded` event for `path`.
pub async fn next_discard(
    rx: &mut broadcast::Receiver<ReloadEvent>,
    path: &Path,
    timeout: Duration,
) -> Option<ReloadEvent> {
    next_matching(rx, timeout, |event| {
        matches!(event, ReloadEvent::ChangeDiscarded { .. }) && event.path() == path
    })
    .await
}

async fn next_matching(
    rx: &mut broadcast::Receiver<ReloadEvent>,
    timeout: Duration,
    wanted: impl Fn(&ReloadEvent) -> bool,
) -> Option<ReloadEvent> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if wanted(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
