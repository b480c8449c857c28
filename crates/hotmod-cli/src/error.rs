use hotmod_kernel::HotImportError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{} has {count} error(s)", .path.display())]
    CheckFailed { path: PathBuf, count: usize },

    #[error(transparent)]
    Import(#[from] HotImportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
