//! Engine configuration
//!
//! Configuration can be built in code with the `with_*` methods or loaded
//! from a file. The file format is detected from the extension (TOML, YAML,
//! JSON) and `HOTMOD_*` environment variables override file values, with
//! `__` separating nested keys (`HOTMOD_SCRIPT__MAX_OPERATIONS=5000`).

use config::{Config as Cfg, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HotImportError, HotImportResult};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "HOTMOD";

/// Default debounce window in milliseconds.
const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Execution limits applied to module scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Maximum number of operations per evaluation
    pub max_operations: u64,
    /// Maximum call stack depth
    pub max_call_levels: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_string_size: 1_000_000,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

/// Hot-import configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotImportConfig {
    /// Base directory for relative module references
    pub base_dir: Option<PathBuf>,
    /// Attach a watch on first import
    pub watch: bool,
    /// Trailing debounce window for change events (0 disables)
    pub debounce_ms: u64,
    /// Extensions tried when a reference has none
    pub extensions: Vec<String>,
    /// Capacity of the reload event broadcast channel
    pub event_capacity: usize,
    /// Script execution limits
    pub script: ScriptLimits,
}

impl Default for HotImportConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            watch: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            extensions: vec!["rhai".to_string()],
            event_capacity: 256,
            script: ScriptLimits::default(),
        }
    }
}

impl HotImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.extensions.push(ext.trim_start_matches('.').to_string());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_script_limits(mut self, limits: ScriptLimits) -> Self {
        self.script = limits;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load from a file, then apply `HOTMOD_*` environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> HotImportResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        if !path.is_file() {
            return Err(HotImportError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let config = Cfg::builder()
            .add_source(File::from(path).format(format))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Parse from a string with an explicit format. No environment overrides.
    pub fn from_str(content: &str, format: FileFormat) -> HotImportResult<Self> {
        let config = Cfg::builder()
            .add_source(File::from_str(content, format))
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> HotImportResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| HotImportError::Config("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "toml" => Ok(FileFormat::Toml),
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "json" => Ok(FileFormat::Json),
        other => Err(HotImportError::Config(format!(
            "Unsupported format: {}",
            other
        ))),
    }
}
