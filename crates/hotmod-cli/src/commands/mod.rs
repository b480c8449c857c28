//! Command implementations

pub mod check;
pub mod run;
pub mod watch;

use crate::error::CliError;
use hotmod_engine::{HotImporter, ModuleHandle, ModuleKind};
use hotmod_kernel::HotImportConfig;
use hotmod_rhai::RhaiModuleLoader;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Load the configuration file, or defaults, rooted at the working directory.
pub fn load_config(path: Option<&Path>) -> Result<HotImportConfig, CliError> {
    let mut config = match path {
        Some(path) => HotImportConfig::from_file(path)
            .map_err(|e| CliError::ConfigError(e.to_string()))?,
        None => HotImportConfig::default(),
    };
    if config.base_dir.is_none() {
        config.base_dir = Some(std::env::current_dir()?);
    }
    Ok(config)
}

pub fn build_importer(config: HotImportConfig) -> HotImporter {
    let loader = Arc::new(RhaiModuleLoader::new(config.script.clone()));
    HotImporter::new(config, loader)
}

/// Parse each argument as JSON; anything that is not JSON is a plain string.
pub fn parse_args(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}

/// Call, construct or read the module depending on what it exports.
pub fn evaluate(handle: &ModuleHandle, args: Vec<Value>) -> Result<Value, CliError> {
    let value = match handle.kind() {
        ModuleKind::Function => handle.invoke(args)?,
        ModuleKind::Class => Value::Object(handle.construct(args)?.fields().clone()),
        ModuleKind::Data => handle.value(),
    };
    Ok(value)
}
