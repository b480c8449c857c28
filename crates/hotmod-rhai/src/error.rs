//! Typed errors for Rhai script modules.

use hotmod_kernel::HotImportError;
use thiserror::Error;

/// Errors raised while compiling or running module scripts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScriptError {
    /// Script compilation failed.
    #[error("Compile error: {0}")]
    CompileError(String),

    /// Evaluating the module body failed.
    #[error("Evaluation error: {0}")]
    EvalError(String),

    /// Calling an exported function, constructor or method failed.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// The export does not have the expected shape.
    #[error("Invalid export: {0}")]
    InvalidExport(String),
}

/// Convenience result alias for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

impl From<ScriptError> for HotImportError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::ExecutionError(msg) => HotImportError::Execution(msg),
            other => HotImportError::Execution(other.to_string()),
        }
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        ScriptError::ExecutionError(err.to_string())
    }
}
