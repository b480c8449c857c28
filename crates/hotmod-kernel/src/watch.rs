//! Filesystem watch primitive contract

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::HotImportResult;

/// Raw watch event kinds, before any filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// File content changed
    Changed,
    /// File renamed or moved
    Renamed,
    /// Anything else (metadata, access, create, remove)
    Other,
}

/// Unfiltered event delivered by a watch primitive
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, RawEventKind::Changed)
    }
}

/// Where a watch primitive pushes raw events.
pub type RawEventSink = mpsc::UnboundedSender<RawEvent>;

/// Owns one OS-level watch. Dropping the guard releases it.
pub trait WatchGuard: Send {
    /// Release the watch now.
    fn release(self: Box<Self>) {}
}

/// Filesystem watch primitive: one watch per path.
pub trait FsWatch: Send + Sync {
    fn watch(&self, path: &Path, sink: RawEventSink) -> HotImportResult<Box<dyn WatchGuard>>;
}
