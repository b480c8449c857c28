//! `hotmod check` command implementation

use crate::error::CliError;
use colored::Colorize;
use hotmod_kernel::HotImportConfig;
use hotmod_rhai::ScriptEngine;
use std::path::Path;

/// Execute the `hotmod check` command
pub fn run(config: &HotImportConfig, file: &Path) -> Result<(), CliError> {
    let source = std::fs::read_to_string(file)?;
    let engine = ScriptEngine::new(config.script.clone());
    let diagnostics = engine.validate(&source);

    if diagnostics.is_empty() {
        println!("{} {}", "ok".green().bold(), file.display());
        return Ok(());
    }

    for diagnostic in &diagnostics {
        println!("{} {}: {}", "error".red().bold(), file.display(), diagnostic);
    }
    Err(CliError::CheckFailed {
        path: file.to_path_buf(),
        count: diagnostics.len(),
    })
}
