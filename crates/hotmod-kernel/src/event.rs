//! Reload events and outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Per-path reload state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReloadPhase {
    #[default]
    Idle,
    Reloading,
    Committed,
    RolledBack,
}

impl fmt::Display for ReloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadPhase::Idle => write!(f, "Idle"),
            ReloadPhase::Reloading => write!(f, "Reloading"),
            ReloadPhase::Committed => write!(f, "Committed"),
            ReloadPhase::RolledBack => write!(f, "RolledBack"),
        }
    }
}

/// Result of one reload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The handle now forwards to the new record
    Committed { version: u64 },
    /// Loading failed; the last committed record is still served
    RolledBack { reason: String },
    /// A reload was already running for the path; one more attempt was queued
    Coalesced,
}

impl ReloadOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReloadOutcome::Committed { .. })
    }
}

/// Events broadcast by the engine
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    /// A path went hot
    WatchStarted { path: PathBuf },
    /// A path went cold
    WatchStopped { path: PathBuf },
    /// A raw change was dropped by the filter
    ChangeDiscarded { path: PathBuf, reason: String },
    ReloadStarted { path: PathBuf },
    Committed {
        path: PathBuf,
        version: u64,
        duration: Duration,
    },
    RolledBack {
        path: PathBuf,
        error: String,
        duration: Duration,
    },
}

impl ReloadEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            ReloadEvent::WatchStarted { path }
            | ReloadEvent::WatchStopped { path }
            | ReloadEvent::ChangeDiscarded { path, .. }
            | ReloadEvent::ReloadStarted { path }
            | ReloadEvent::Committed { path, .. }
            | ReloadEvent::RolledBack { path, .. } => path,
        }
    }

    /// Whether this event ends a reload attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReloadEvent::Committed { .. } | ReloadEvent::RolledBack { .. }
        )
    }
}
