//! File watching for hot paths
//!
//! [`NotifyFsWatch`] adapts `notify` to the kernel's `FsWatch` contract. A
//! [`WatchHandle`] owns one watch plus the task that filters its raw events
//! and asks the coordinator to reload:
//!
//! - only content changes count; renames and metadata events are dropped,
//! - a change that leaves the file empty (or unreadable) is dropped, editors
//!   truncate before writing,
//! - genuine changes are debounced with a trailing window.

use hotmod_kernel::{
    FsWatch, HotImportError, HotImportResult, RawEvent, RawEventKind, RawEventSink, ReloadEvent,
    WatchGuard,
};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::ReloadCoordinator;

/// `FsWatch` backed by the platform's recommended `notify` watcher
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyFsWatch;

struct NotifyGuard {
    _watcher: RecommendedWatcher,
}

impl WatchGuard for NotifyGuard {}

impl FsWatch for NotifyFsWatch {
    fn watch(&self, path: &Path, sink: RawEventSink) -> HotImportResult<Box<dyn WatchGuard>> {
        let watched = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // receiver gone means the watch is closing
                let _ = sink.send(RawEvent::new(watched.clone(), raw_kind(&event.kind)));
            }
            Err(e) => warn!("Watch error on {:?}: {}", watched, e),
        })
        .map_err(|e| HotImportError::Watch(e.to_string()))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| HotImportError::Watch(format!("{}: {}", path.display(), e)))?;

        Ok(Box::new(NotifyGuard { _watcher: watcher }))
    }
}

fn raw_kind(kind: &EventKind) -> RawEventKind {
    match kind {
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            RawEventKind::Changed
        }
        EventKind::Modify(ModifyKind::Name(_)) => RawEventKind::Renamed,
        _ => RawEventKind::Other,
    }
}

/// Why a raw event did or did not count as a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerdict {
    Genuine,
    NotAContentChange,
    EmptyFile,
    Unreadable,
}

impl ChangeVerdict {
    pub fn is_genuine(&self) -> bool {
        matches!(self, ChangeVerdict::Genuine)
    }

    fn reason(&self) -> &'static str {
        match self {
            ChangeVerdict::Genuine => "genuine change",
            ChangeVerdict::NotAContentChange => "not a content change",
            ChangeVerdict::EmptyFile => "file is empty",
            ChangeVerdict::Unreadable => "file cannot be stat'ed",
        }
    }
}

/// Classify one raw event.
pub fn classify_change(event: &RawEvent) -> ChangeVerdict {
    if event.kind != RawEventKind::Changed {
        return ChangeVerdict::NotAContentChange;
    }
    match std::fs::metadata(&event.path) {
        Ok(meta) if meta.len() == 0 => ChangeVerdict::EmptyFile,
        Ok(_) => ChangeVerdict::Genuine,
        Err(_) => ChangeVerdict::Unreadable,
    }
}

/// One active watch
pub struct WatchHandle {
    path: PathBuf,
    guard: Option<Box<dyn WatchGuard>>,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop reacting to changes. Idempotent.
    ///
    /// A reload already running finishes; raw events seen after this call
    /// are ignored.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
        // the task ends on its own once the event channel closes
        self.task.take();
        debug!("Closed watch on {:?}", self.path);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Start watching `path` and spawn its event task on the current runtime.
pub(crate) fn watch(
    path: &Path,
    fs_watch: &dyn FsWatch,
    debounce: Duration,
    coordinator: Arc<ReloadCoordinator>,
    events: broadcast::Sender<ReloadEvent>,
) -> HotImportResult<WatchHandle> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| HotImportError::Watch(format!("no async runtime: {}", e)))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let guard = fs_watch.watch(path, tx)?;
    let closed = Arc::new(AtomicBool::new(false));

    let task = runtime.spawn(run_watch(
        path.to_path_buf(),
        rx,
        closed.clone(),
        debounce,
        coordinator,
        events,
    ));

    info!("Watching {:?} for changes", path);
    Ok(WatchHandle {
        path: path.to_path_buf(),
        guard: Some(guard),
        closed,
        task: Some(task),
    })
}

async fn run_watch(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<RawEvent>,
    closed: Arc<AtomicBool>,
    debounce: Duration,
    coordinator: Arc<ReloadCoordinator>,
    events: broadcast::Sender<ReloadEvent>,
) {
    while let Some(raw) = rx.recv().await {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        if !accept(&raw, &events) {
            continue;
        }

        // trailing window: wait until no event has arrived for `debounce`
        if !debounce.is_zero() {
            loop {
                match tokio::time::timeout(debounce, rx.recv()).await {
                    Ok(Some(next)) if !closed.load(Ordering::SeqCst) => {
                        debug!("Debouncing {:?} ({:?})", path, next.kind);
                    }
                    Ok(_) | Err(_) => break,
                }
            }
            // the file may have been truncated again inside the window
            if !accept(&RawEvent::changed(&path), &events) {
                continue;
            }
        }

        let outcome = coordinator.reload(&path).await;
        debug!("Watch-triggered reload of {:?}: {:?}", path, outcome);
    }
    debug!("Watch task for {:?} stopped", path);
}

fn accept(raw: &RawEvent, events: &broadcast::Sender<ReloadEvent>) -> bool {
    let verdict = classify_change(raw);
    if !verdict.is_genuine() {
        debug!("Discarding {:?} event on {:?}: {}", raw.kind, raw.path, verdict.reason());
        let _ = events.send(ReloadEvent::ChangeDiscarded {
            path: raw.path.clone(),
            reason: verdict.reason().to_string(),
        });
    }
    verdict.is_genuine()
}
