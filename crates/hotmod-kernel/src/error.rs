//! Typed errors for the hot-reload engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by path resolution, loading, forwarding and watching.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HotImportError {
    /// A relative reference had no usable base directory.
    #[error("Cannot resolve {}: {reason}", .reference.display())]
    PathResolution { reference: PathBuf, reason: String },

    /// A relative path reached the registry.
    #[error("Module path must be absolute: {}", .0.display())]
    RelativePath(PathBuf),

    /// The load primitive rejected the module.
    #[error("Failed to load module {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// Purge requested with nothing cached for the path.
    #[error("No cached loader state for {}", .0.display())]
    CacheMiss(PathBuf),

    /// Handle invoked but the current record is not a function.
    #[error("Module {} is not a function", .0.display())]
    NotCallable(PathBuf),

    /// Handle constructed but the current record is not a class.
    #[error("Module {} is not a class", .0.display())]
    NotConstructible(PathBuf),

    /// Instance method lookup failed.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Module code raised while running.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Module {} is already hot", .0.display())]
    AlreadyWatching(PathBuf),

    #[error("Module {} has not been imported", .0.display())]
    NotLoaded(PathBuf),

    /// The OS watch could not be established.
    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HotImportError {
    /// Build a [`HotImportError::Load`] from any displayable cause.
    pub fn load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}

/// Convenience result alias for the engine.
pub type HotImportResult<T> = Result<T, HotImportError>;

impl From<config::ConfigError> for HotImportError {
    fn from(err: config::ConfigError) -> Self {
        HotImportError::Config(err.to_string())
    }
}
